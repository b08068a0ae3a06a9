// Longest-chain reconciliation across the registered peers
//
// A round fetches every peer chain, keeps the ones that validate and are
// strictly longer than ours, and adopts the unique longest. Blocks that lose
// out are orphaned. Transfers from our orphaned blocks that the winner does not
// carry go back into the memory pool, and exactly those (with our orphaned
// coinbases) have their ledger effects reversed.

use crate::core::{reverse_settlement, Block, Blockchain, ChainGuard, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{PeerRegistry, Transport};
use crate::storage::{Ledger, MemoryPool};
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Outcome of one reconciliation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A strictly longer valid peer chain was adopted
    Replaced {
        winner: String,
        previous_length: usize,
        new_length: usize,
        orphaned_blocks: usize,
        restaged: usize,
    },
    /// No peer offered a valid chain longer than ours
    Kept { length: usize },
    /// Several different chains share the maximal length
    Tied { length: usize, peers: Vec<String> },
}

enum Selection<'a> {
    None,
    Tied(usize, Vec<String>),
    Winner(&'a str, &'a [Block]),
}

pub struct ConsensusResolver {
    chain: Blockchain,
    mempool: Arc<MemoryPool>,
    ledger: Arc<dyn Ledger>,
    peers: Arc<PeerRegistry>,
    transport: Arc<dyn Transport>,
}

impl ConsensusResolver {
    pub fn new(
        chain: Blockchain,
        mempool: Arc<MemoryPool>,
        ledger: Arc<dyn Ledger>,
        peers: Arc<PeerRegistry>,
        transport: Arc<dyn Transport>,
    ) -> ConsensusResolver {
        ConsensusResolver {
            chain,
            mempool,
            ledger,
            peers,
            transport,
        }
    }

    pub fn resolve(&self) -> Result<Resolution> {
        let peers = self.peers.peers()?;
        if peers.is_empty() {
            return Err(BlockchainError::NoPeersRegistered);
        }

        let fetched = self.collect(&peers);
        // Validation needs no lock, so do it before blocking sealers
        let valid: Vec<&(String, Vec<Block>)> = fetched
            .iter()
            .filter(|(peer, blocks)| {
                let ok = self.chain.validate(blocks);
                if !ok {
                    warn!("Discarding invalid chain of length {} from {peer}", blocks.len());
                }
                ok
            })
            .collect();

        let mut guard = self.chain.lock_exclusive()?;
        let local_len = guard.blocks().len();

        let (winner_peer, winner) = match select_winner(&valid, local_len) {
            Selection::None => {
                info!("Local chain of length {local_len} kept, no longer valid chain offered");
                return Ok(Resolution::Kept { length: local_len });
            }
            Selection::Tied(length, peers) => {
                warn!("Consensus not reached: {} peers tie at length {length}", peers.len());
                return Ok(Resolution::Tied { length, peers });
            }
            Selection::Winner(peer, blocks) => (peer, blocks),
        };

        // Chains are hash-linked, so once ours diverges from the winner every
        // later local block is orphaned
        let shared = guard
            .blocks()
            .iter()
            .zip(winner)
            .take_while(|(ours, theirs)| ours.get_hash() == theirs.get_hash())
            .count();
        let local_orphans = guard.blocks()[shared..].to_vec();
        let all_orphans = orphaned_blocks(
            winner,
            std::iter::once(guard.blocks()).chain(fetched.iter().map(|(_, b)| b.as_slice())),
        );

        let ours = unsettled_transfers(&local_orphans, &winner[shared..]);
        let mut candidates = ours.clone();
        candidates.extend(foreign_transfers(&all_orphans, winner, &ours));

        // Only what actually goes back into the pool is reversed
        let restaged = self.mempool.reinsert(&candidates, |added| {
            let reversed = claim(added, &ours);
            let coinbases = local_orphans
                .iter()
                .flat_map(|block| block.get_transactions())
                .filter(|tx| tx.is_coinbase());
            self.apply(&mut guard, winner, coinbases.chain(reversed.iter()))
        })?;
        drop(guard);

        info!(
            "Adopted chain of length {} from {winner_peer}, {} blocks orphaned, {restaged} transactions re-staged",
            winner.len(),
            all_orphans.len()
        );

        Ok(Resolution::Replaced {
            winner: winner_peer.to_string(),
            previous_length: local_len,
            new_length: winner.len(),
            orphaned_blocks: all_orphans.len(),
            restaged,
        })
    }

    // Reverse, swap and commit while the chain lock is held
    fn apply<'a>(
        &self,
        guard: &mut ChainGuard<'_>,
        winner: &[Block],
        reversed: impl Iterator<Item = &'a Transaction>,
    ) -> Result<()> {
        if let Err(e) = reverse_settlement(reversed, self.ledger.as_ref()) {
            self.ledger.rollback();
            error!("Aborting reconciliation, ledger reversal failed: {e}");
            return Err(e);
        }
        if let Err(e) = guard.replace(winner.to_vec()) {
            self.ledger.rollback();
            error!("Aborting reconciliation, chain replacement failed: {e}");
            return Err(e);
        }
        if let Err(e) = self.ledger.commit() {
            self.ledger.rollback();
            error!("Chain was replaced but the ledger reversal failed to commit: {e}");
            return Err(e);
        }
        Ok(())
    }

    // Every peer is asked at once; a failing peer only costs its own chain
    fn collect(&self, peers: &[String]) -> Vec<(String, Vec<Block>)> {
        let transport = self.transport.as_ref();
        std::thread::scope(|scope| {
            let handles: Vec<_> = peers
                .iter()
                .map(|peer| (peer, scope.spawn(move || transport.fetch_remote_chain(peer))))
                .collect();

            handles
                .into_iter()
                .filter_map(|(peer, handle)| match handle.join() {
                    Ok(Ok(blocks)) => Some((peer.clone(), blocks)),
                    Ok(Err(e)) => {
                        warn!("Skipping peer {peer}: {e}");
                        None
                    }
                    Err(_) => {
                        error!("Fetch from {peer} panicked");
                        None
                    }
                })
                .collect()
        })
    }
}

// Strictly longer than local, unique at the maximum. Peers serving the very
// same chain count once.
fn select_winner<'a>(candidates: &[&'a (String, Vec<Block>)], local_len: usize) -> Selection<'a> {
    let Some(max_len) = candidates
        .iter()
        .map(|(_, blocks)| blocks.len())
        .filter(|len| *len > local_len)
        .max()
    else {
        return Selection::None;
    };

    let longest: Vec<&'a (String, Vec<Block>)> = candidates
        .iter()
        .copied()
        .filter(|(_, blocks)| blocks.len() == max_len)
        .collect();
    let distinct_tips: HashSet<String> = longest
        .iter()
        .filter_map(|(_, blocks)| blocks.last().map(Block::get_hash))
        .collect();

    if distinct_tips.len() > 1 {
        return Selection::Tied(max_len, longest.iter().map(|(peer, _)| peer.clone()).collect());
    }
    let (peer, blocks) = longest[0];
    Selection::Winner(peer.as_str(), blocks.as_slice())
}

/// Blocks of the given chains that differ from the winner at the same index,
/// deduplicated by hash, in first-seen order.
pub fn orphaned_blocks<'a>(
    winner: &[Block],
    chains: impl Iterator<Item = &'a [Block]>,
) -> Vec<Block> {
    let winner_hashes: Vec<String> = winner.iter().map(Block::get_hash).collect();
    let mut seen = HashSet::new();
    let mut orphans = Vec::new();
    for chain in chains {
        for (position, block) in chain.iter().enumerate() {
            let hash = block.get_hash();
            if winner_hashes.get(position) != Some(&hash) && seen.insert(hash) {
                orphans.push(block.clone());
            }
        }
    }
    orphans
}

/// Transfers of our orphaned blocks that the winner's new blocks do not
/// carry. Counted per occurrence: a transfer sealed twice locally but once by
/// the winner leaves one copy here.
pub fn unsettled_transfers(local_orphans: &[Block], winner_new: &[Block]) -> Vec<Transaction> {
    let mut settled: HashMap<&Transaction, usize> = HashMap::new();
    for tx in winner_new.iter().flat_map(|block| block.transfers()) {
        *settled.entry(tx).or_insert(0) += 1;
    }
    local_orphans
        .iter()
        .flat_map(|block| block.transfers())
        .filter(|tx| match settled.get_mut(tx) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

// Transfers seen only on losing peer forks. They never touched our ledger, and
// the same relayed transfer may sit on several forks, so these are taken once.
fn foreign_transfers(
    all_orphans: &[Block],
    winner: &[Block],
    ours: &[Transaction],
) -> Vec<Transaction> {
    let mut known: HashSet<&Transaction> = winner
        .iter()
        .flat_map(|block| block.transfers())
        .chain(ours)
        .collect();
    let mut found = Vec::new();
    for tx in all_orphans.iter().flat_map(|block| block.transfers()) {
        if known.insert(tx) {
            found.push(tx.clone());
        }
    }
    found
}

// The added transactions that came from our own orphaned blocks
fn claim(added: &[Transaction], ours: &[Transaction]) -> Vec<Transaction> {
    let mut owed: HashMap<&Transaction, usize> = HashMap::new();
    for tx in ours {
        *owed.entry(tx).or_insert(0) += 1;
    }
    added
        .iter()
        .filter(|tx| match owed.get_mut(tx) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        })
        .cloned()
        .collect()
}
