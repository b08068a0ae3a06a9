//! Nodes talking over loopback TCP, and sealing from several threads at once.

use ledger_chain::core::monetary::UNITS_PER_COIN;
use ledger_chain::network::{ChainResponse, Package};
use ledger_chain::storage::open_database;
use ledger_chain::{
    BlockchainError, EcdsaP256, LedgerEngine, Resolution, Server, Settings, TcpTransport,
    Transaction, Transport,
};
use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

/// Node with sender 1 (1000 coins), recipient 2 and miner 9, talking TCP
fn funded_engine() -> (Arc<LedgerEngine>, TempDir) {
    let dir = tempdir().unwrap();
    let settings = Settings {
        data_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    let db = open_database(&settings.node_data_path()).unwrap();
    let transport = Arc::new(TcpTransport::new(
        &settings.node_addr,
        settings.peer_timeout_ms,
    ));
    let engine =
        LedgerEngine::with_components(settings, &db, transport, Box::new(EcdsaP256)).unwrap();
    engine.open_account(1, 1_000 * UNITS_PER_COIN, None).unwrap();
    engine.open_account(2, 0, None).unwrap();
    engine.open_account(9, 0, None).unwrap();
    (Arc::new(engine), dir)
}

fn spawn_server(engine: Arc<LedgerEngine>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || Server::new(engine).serve(listener));
    addr
}

/// Answers the first request on one connection with a canned package
fn spawn_canned_peer(reply: Package) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let mut requests = serde_json::Deserializer::from_reader(BufReader::new(&stream))
                .into_iter::<Package>();
            let _ = requests.next();
            let _ = serde_json::to_writer(&stream, &reply);
            let _ = (&stream).flush();
        }
    });
    addr
}

fn client(timeout_ms: u64) -> TcpTransport {
    TcpTransport::new("127.0.0.1:2999", timeout_ms)
}

#[test]
fn test_chain_is_served_over_tcp() {
    let (engine, _dir) = funded_engine();
    engine.mine(9).unwrap();
    engine.mine(9).unwrap();
    let addr = spawn_server(engine.clone());

    let blocks = client(2_000).fetch_remote_chain(&addr).unwrap();
    assert_eq!(blocks, engine.chain().blocks().unwrap());
    assert!(engine.chain().validate(&blocks));
}

#[test]
fn test_pushed_transactions_are_acked_or_rejected() {
    let (engine, _dir) = funded_engine();
    let addr = spawn_server(engine.clone());
    let transport = client(2_000);

    let tx = Transaction::new_transfer(1, 2, 100);
    transport.push_transaction(&addr, &tx).unwrap();
    assert_eq!(engine.mempool().pending().unwrap(), vec![tx]);

    // Account 42 does not exist on the receiving node
    match transport.push_transaction(&addr, &Transaction::new_transfer(1, 42, 5)) {
        Err(BlockchainError::Network(reason)) => assert!(reason.contains("rejected")),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(engine.mempool().len().unwrap(), 1);
}

#[test]
fn test_inconsistent_chain_response_is_refused() {
    let (engine, _dir) = funded_engine();
    engine.mine(9).unwrap();
    engine.mine(9).unwrap();
    let blocks = engine.chain().blocks().unwrap();

    let addr = spawn_canned_peer(Package::Chain {
        addr_from: "127.0.0.1:3001".to_string(),
        response: ChainResponse { blocks, length: 3 },
    });
    assert!(matches!(
        client(2_000).fetch_remote_chain(&addr),
        Err(BlockchainError::Network(_))
    ));
}

#[test]
fn test_silent_peer_times_out() {
    // Connections queue in the backlog but nobody ever answers
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let started = Instant::now();
    let result = client(200).fetch_remote_chain(&addr);
    assert!(matches!(result, Err(BlockchainError::Network(_))));
    assert!(started.elapsed() < Duration::from_secs(5));
    drop(listener);
}

#[test]
fn test_resolve_against_a_live_peer() {
    let (remote, _remote_dir) = funded_engine();
    for _ in 0..4 {
        remote.mine(9).unwrap();
    }
    let addr = spawn_server(remote.clone());

    let (local, _dir) = funded_engine();
    local.mine(9).unwrap();
    local.peers().add(&addr).unwrap();

    match local.resolve_conflicts().unwrap() {
        Resolution::Replaced {
            winner, new_length, ..
        } => {
            assert_eq!(winner, addr);
            assert_eq!(new_length, 4);
        }
        other => panic!("expected a replacement, got {other:?}"),
    }
    assert_eq!(local.chain().blocks().unwrap(), remote.chain().blocks().unwrap());
}

#[test]
fn test_concurrent_seals_keep_chain_contiguous() {
    let (engine, _dir) = funded_engine();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..3 {
                    engine.mine(9).unwrap();
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..20 {
                engine
                    .submit_transaction(Transaction::new_transfer(1, 2, 10))
                    .unwrap();
            }
        });
    });
    // Whatever arrived after the last seal
    engine.mine(9).unwrap();

    let blocks = engine.chain().blocks().unwrap();
    assert_eq!(blocks.len(), 13);
    assert!(engine.validate_chain().unwrap());
    for (position, pair) in blocks.windows(2).enumerate() {
        assert_eq!(pair[0].get_index(), position as u64);
        assert_eq!(pair[1].get_previous_hash(), pair[0].get_hash());
    }

    let sealed = blocks.iter().map(|block| block.transfers().count()).sum::<usize>();
    assert_eq!(sealed, 20);
    assert!(engine.mempool().is_empty().unwrap());
    // Fees on 10 units floor to zero, so the recipient gets every unit
    assert_eq!(engine.balance(2).unwrap(), 200);
    assert_eq!(engine.balance(1).unwrap(), 1_000 * UNITS_PER_COIN - 200);
}
