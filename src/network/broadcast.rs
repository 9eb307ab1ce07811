// Outbound propagation of blocks and transactions. Delivery is best effort: each peer is
// tried once with connect and write timeouts, and failures are recorded per peer without
// affecting local acceptance.

use crate::core::{BlockRecord, PublicKey, Transaction};
use crate::network::{send_request, Package};
use crate::wallet::{PeerDirectory, PeerEntry};
use log::{debug, warn};

/// Per-peer outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub trait Broadcaster: Send + Sync {
    fn broadcast_block(&self, record: &BlockRecord) -> BroadcastReport;

    fn broadcast_transaction(&self, transaction: &Transaction) -> BroadcastReport;
}

/// Sends packages over TCP to every peer in the directory except this node
pub struct TcpBroadcaster {
    own_address: String,
    own_key: PublicKey,
    peers: PeerDirectory,
}

impl TcpBroadcaster {
    pub fn new(own_address: String, own_key: PublicKey, peers: PeerDirectory) -> TcpBroadcaster {
        TcpBroadcaster {
            own_address,
            own_key,
            peers,
        }
    }

    pub fn targets(&self) -> Vec<&PeerEntry> {
        self.peers
            .others(&self.own_key)
            .filter(|peer| peer.ip != self.own_address)
            .collect()
    }

    fn deliver(&self, package: &Package) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for peer in self.targets() {
            match send_request(&peer.ip, package) {
                Ok(response) => {
                    debug!("Peer {} answered {response:?}", peer.ip);
                    report.delivered.push(peer.ip.clone());
                }
                Err(e) => {
                    warn!("Failed to reach peer {}: {e}", peer.ip);
                    report.failed.push((peer.ip.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

impl Broadcaster for TcpBroadcaster {
    fn broadcast_block(&self, record: &BlockRecord) -> BroadcastReport {
        self.deliver(&Package::SubmitBlock {
            addr_from: self.own_address.clone(),
            block: record.clone(),
        })
    }

    fn broadcast_transaction(&self, transaction: &Transaction) -> BroadcastReport {
        self.deliver(&Package::SubmitTransaction {
            addr_from: self.own_address.clone(),
            transaction: transaction.clone(),
        })
    }
}

/// For nodes running alone
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast_block(&self, _record: &BlockRecord) -> BroadcastReport {
        BroadcastReport::default()
    }

    fn broadcast_transaction(&self, _transaction: &Transaction) -> BroadcastReport {
        BroadcastReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, Block};
    use std::net::TcpListener;

    fn entry(ip: &str, key: &str) -> PeerEntry {
        PeerEntry {
            ip: ip.to_string(),
            pub_key: PublicKey::from(key),
        }
    }

    #[test]
    fn test_targets_skip_self() {
        let broadcaster = TcpBroadcaster::new(
            "127.0.0.1:2001".to_string(),
            PublicKey::from("me"),
            PeerDirectory::new(vec![
                entry("127.0.0.1:2001", "me"),
                entry("127.0.0.1:2002", "peer"),
                entry("127.0.0.1:2001", "alias"),
            ]),
        );
        let targets: Vec<&str> = broadcaster.targets().iter().map(|p| p.ip.as_str()).collect();
        assert_eq!(targets, vec!["127.0.0.1:2002"]);
    }

    #[test]
    fn test_unreachable_peer_is_recorded() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let broadcaster = TcpBroadcaster::new(
            "127.0.0.1:1".to_string(),
            PublicKey::from("me"),
            PeerDirectory::new(vec![entry(&addr, "peer")]),
        );
        let tx = Transaction::new_coinbase(PublicKey::from("me"), Amount::from_coins(1));
        let block = Block::new(None, 0, vec![tx], None).unwrap();

        let report = broadcaster.broadcast_block(&block.to_record());
        assert!(!report.is_complete());
        assert_eq!(report.failed[0].0, addr);
        assert!(report.delivered.is_empty());
    }
}
