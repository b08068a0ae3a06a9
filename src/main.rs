// Entry point for the ledger node CLI
// Every command opens this node's engine from its settings, does one thing and exits,
// except startnode which keeps serving peers
use clap::Parser;
use data_encoding::HEXLOWER;
use ledger_chain::core::monetary::conversions::format_units;
use ledger_chain::{
    Command, EcdsaP256, LedgerEngine, Opt, Resolution, Server, Settings, Transaction,
};
use log::{error, LevelFilter};
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(opt.config.as_deref())?;

    let engine = LedgerEngine::open(settings)?;

    match opt.command {
        Command::StartNode => {
            let addr = engine.get_settings().node_addr.clone();
            println!(
                "Node {} serving a chain of length {}",
                engine.get_settings().node_id(),
                engine.chain().length()?
            );
            let server = Server::new(Arc::new(engine));
            server
                .run(&addr)
                .map_err(|e| format!("Server error: {e}"))?
        }
        Command::Mine { miner } => {
            let block = engine.mine(miner)?;
            println!(
                "Sealed block {} with {} transactions: {}",
                block.get_index(),
                block.get_transactions().len(),
                block.get_hash()
            );
        }
        Command::Send {
            from,
            to,
            amount,
            key,
            mine,
        } => {
            let mut transaction = Transaction::new_transfer(from, to, amount);
            if let Some(key) = key {
                let pkcs8 = HEXLOWER
                    .decode(key.as_bytes())
                    .map_err(|e| format!("Invalid private key: {e}"))?;
                transaction.sign(&EcdsaP256, &pkcs8)?;
            }
            engine.submit_transaction(transaction)?;

            if let Some(miner) = mine {
                let block = engine.mine(miner)?;
                println!("Sealed block {}", block.get_index());
            }
            println!("Success!")
        }
        Command::Printchain => {
            engine.chain().for_each(|block| {
                println!("Index: {}", block.get_index());
                println!("Pre block hash: {}", block.get_previous_hash());
                println!("Cur block hash: {}", block.get_hash());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                for tx in block.get_transactions() {
                    match tx.get_sender_id() {
                        Some(sender) => println!(
                            "- Transfer {sender} -> {}: {}",
                            tx.get_recipient_id(),
                            format_units(tx.get_amount())
                        ),
                        None => println!(
                            "- Coinbase -> {}: {}",
                            tx.get_recipient_id(),
                            format_units(tx.get_amount())
                        ),
                    }
                }
                println!()
            })?;
        }
        Command::Validate => {
            if engine.validate_chain()? {
                println!("Chain of length {} is valid", engine.chain().length()?);
            } else {
                return Err("Local chain failed validation".into());
            }
        }
        Command::Resolve => match engine.resolve_conflicts()? {
            Resolution::Replaced {
                winner,
                previous_length,
                new_length,
                orphaned_blocks,
                restaged,
            } => println!(
                "Replaced chain ({previous_length} -> {new_length} blocks) with the one from {winner}; {orphaned_blocks} blocks orphaned, {restaged} transactions re-staged"
            ),
            Resolution::Kept { length } => {
                println!("Local chain of length {length} is authoritative")
            }
            Resolution::Tied { length, peers } => println!(
                "No consensus: {} peers tie at length {length}",
                peers.len()
            ),
        },
        Command::AddPeer { addr } => {
            if engine.peers().add(&addr)? {
                println!("Added peer {addr}");
            } else {
                println!("Peer {addr} is already registered");
            }
        }
        Command::RemovePeer { addr } => {
            if engine.peers().remove(&addr)? {
                println!("Removed peer {addr}");
            } else {
                println!("Peer {addr} is not registered");
            }
        }
        Command::ListPeers => {
            for peer in engine.peers().peers()? {
                println!("{peer}")
            }
        }
        Command::ClearPeers => {
            engine.peers().clear()?;
            println!("Done!");
        }
        Command::CreateAccount {
            id,
            balance,
            public_key,
        } => {
            let public_key = match public_key {
                Some(hex) => Some(
                    HEXLOWER
                        .decode(hex.as_bytes())
                        .map_err(|e| format!("Invalid public key: {e}"))?,
                ),
                None => None,
            };
            engine.open_account(id, balance, public_key)?;
            println!("Opened account {id}");
        }
        Command::GetBalance { id } => {
            let balance = engine.balance(id)?;
            println!("Balance of {id}: {} ({balance} units)", format_units(balance));
        }
        Command::Mempool => {
            for tx in engine.mempool().pending()? {
                println!("{tx}")
            }
        }
        Command::CreateKeyPair => {
            let pkcs8 = EcdsaP256::generate_pkcs8()?;
            let public_key = EcdsaP256::public_key(&pkcs8)?;
            println!("Private key (keep secret): {}", HEXLOWER.encode(&pkcs8));
            println!("Public key: {}", HEXLOWER.encode(&public_key));
        }
    }
    Ok(())
}
