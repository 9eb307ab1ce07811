//! Miner and node integration tests
//!
//! Mining at a one-bit target, double-spend admission and a node answering over TCP.

use powchain_node::core::{Amount, Blockchain, GenesisAllocation, PublicKey};
use powchain_node::network::NoopBroadcaster;
use powchain_node::{
    send_request, Identity, KeyPairIdentity, Miner, MinerConfig, Node, Package, Response, Server,
    Wallet,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn seeded(difficulty_bits: u32, coins: u64) -> (Blockchain, Arc<KeyPairIdentity>) {
    let identity = Arc::new(KeyPairIdentity::generate().unwrap());
    let blockchain = Blockchain::in_memory(
        difficulty_bits,
        &[GenesisAllocation {
            pub_key: identity.own_public_key(),
            amount: Amount::from_coins(coins),
        }],
    )
    .unwrap();
    (blockchain, identity)
}

#[test]
fn test_double_spend_is_left_out_of_the_block() {
    let (blockchain, identity) = seeded(1, 100);
    let wallet = Wallet::new(blockchain.clone(), identity);
    let miner = Miner::spawn(
        blockchain.clone(),
        wallet.clone(),
        Arc::new(NoopBroadcaster),
        MinerConfig::default(),
    )
    .unwrap();

    // Both spend the same genesis output
    let first = wallet
        .transfer(PublicKey::from("j"), Amount::from_coins(10), Amount::ZERO)
        .unwrap();
    let second = wallet
        .transfer(PublicKey::from("l"), Amount::from_coins(20), Amount::ZERO)
        .unwrap();
    miner.submit_transaction(first.clone()).unwrap();
    miner.submit_transaction(second.clone()).unwrap();

    miner.start();
    assert!(wait_until(Duration::from_secs(20), || {
        blockchain.block_count().unwrap() == 2
    }));
    miner.stop();

    let head = blockchain.get_canonical_head().unwrap();
    assert!(head.contains_transaction(first.get_id()));
    assert!(!head.contains_transaction(second.get_id()));
    assert!(!miner.pool().contains(first.get_id()));
    assert!(miner.pool().contains(second.get_id()));
    assert_eq!(wallet.check_balance(&PublicKey::from("j")).unwrap(), Amount::from_coins(10));
    assert_eq!(wallet.check_balance(&PublicKey::from("l")).unwrap(), Amount::ZERO);
    assert!(blockchain.is_valid());
}

#[test]
fn test_node_answers_over_tcp() {
    let (blockchain, identity) = seeded(1, 5);
    let own = identity.own_public_key();
    let node = Node::new(
        blockchain,
        identity,
        Arc::new(NoopBroadcaster),
        MinerConfig::default(),
        Duration::from_secs(60),
        Amount::from_millis(1),
    )
    .unwrap();
    let node = Arc::new(node);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = Server::new(node.clone());
    thread::spawn(move || server.serve(listener));

    assert_eq!(
        send_request(&addr, &Package::GetBlockCount).unwrap(),
        Response::Count { count: 1 }
    );
    assert_eq!(
        send_request(&addr, &Package::GetBalance { pub_key: Some(own) }).unwrap(),
        Response::Balance {
            current_balance: Amount::from_coins(5)
        }
    );
    assert_eq!(
        send_request(&addr, &Package::VerifyBlockchain).unwrap(),
        Response::Verified { verified: true }
    );

    let response = send_request(
        &addr,
        &Package::Send {
            to: PublicKey::from("j"),
            amount: Amount::from_coins(2),
            fee: None,
        },
    )
    .unwrap();
    assert!(matches!(response, Response::Submitted { .. }));
    assert_eq!(node.miner().pool().len(), 1);

    // Spending more than the balance is refused with a reason
    let response = send_request(
        &addr,
        &Package::Send {
            to: PublicKey::from("j"),
            amount: Amount::from_coins(50),
            fee: None,
        },
    )
    .unwrap();
    assert!(matches!(response, Response::Ack { accepted: false, reason: Some(_) }));

    send_request(&addr, &Package::StartMining).unwrap();
    assert!(wait_until(Duration::from_secs(20), || node.block_count().unwrap() == 2));
    send_request(&addr, &Package::StopMining).unwrap();
    assert_eq!(
        node.balance(Some(&PublicKey::from("j"))).unwrap(),
        Amount::from_coins(2)
    );
    node.shutdown();
}
