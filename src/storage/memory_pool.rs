use crate::core::Transaction;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct PoolInner {
    by_arrival: BTreeMap<u64, Transaction>,
    index: HashMap<String, u64>, // tx id -> arrival sequence
    next_seq: u64,
}

/// Pending transactions in arrival order
/// ( K -> tx id, V => Transaction )
pub struct MemoryPool {
    inner: RwLock<PoolInner>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(PoolInner::default()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool
                .index
                .get(id)
                .and_then(|seq| pool.by_arrival.get(seq))
                .cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    /// Queue a transaction at the back. Returns false if its id is already pooled.
    pub fn add(&self, tx: Transaction) -> bool {
        match self.inner.write() {
            Ok(mut pool) => {
                if pool.index.contains_key(tx.get_id()) {
                    return false;
                }
                let seq = pool.next_seq;
                pool.next_seq += 1;
                pool.index.insert(tx.get_id().to_string(), seq);
                pool.by_arrival.insert(seq, tx);
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                false
            }
        }
    }

    /// Put transactions back at the front, keeping their relative order. Ids already pooled
    /// are skipped.
    pub fn restore(&self, txs: Vec<Transaction>) -> usize {
        match self.inner.write() {
            Ok(mut pool) => {
                let first = pool.by_arrival.keys().next().copied().unwrap_or(pool.next_seq);
                let fresh: Vec<Transaction> = txs
                    .into_iter()
                    .filter(|tx| !pool.index.contains_key(tx.get_id()))
                    .collect();
                let count = fresh.len() as u64;
                if first < count {
                    // Not enough room below the current front; shift everything up
                    let shift = count - first;
                    let old = std::mem::take(&mut pool.by_arrival);
                    for (seq, tx) in old {
                        pool.index.insert(tx.get_id().to_string(), seq + shift);
                        pool.by_arrival.insert(seq + shift, tx);
                    }
                    pool.next_seq += shift;
                }
                let front = pool.by_arrival.keys().next().copied().unwrap_or(pool.next_seq);
                let base = front - count;
                for (offset, tx) in fresh.into_iter().enumerate() {
                    let seq = base + offset as u64;
                    pool.index.insert(tx.get_id().to_string(), seq);
                    pool.by_arrival.insert(seq, tx);
                }
                if pool.next_seq < base + count {
                    pool.next_seq = base + count;
                }
                count as usize
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                0
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.index.contains_key(id),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<Transaction> {
        match self.inner.write() {
            Ok(mut pool) => {
                let seq = pool.index.remove(id)?;
                pool.by_arrival.remove(&seq)
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.by_arrival.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    /// Every pooled transaction, oldest first
    pub fn get_all(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.by_arrival.values().cloned().collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    pub fn clear(&self) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.by_arrival.clear();
                pool.index.clear();
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.by_arrival.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                true // Conservative default
            }
        }
    }
}
