// Proof-of-work worker thread. Each search gets its own thread, cancel flag and single-slot
// result channel; dropping the handle cancels the search.

use crate::core::{BlockHash, MiningJob, ProofOfWork, SearchOutcome};
use crate::error::{BlockchainError, Result};
use crossbeam_channel::{bounded, Receiver};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

pub struct SearchHandle {
    parent: BlockHash,
    cancel: Arc<AtomicBool>,
    results: Receiver<Result<SearchOutcome>>,
}

impl SearchHandle {
    pub fn parent(&self) -> BlockHash {
        self.parent
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn results(&self) -> &Receiver<Result<SearchOutcome>> {
        &self.results
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub fn spawn_search(pow: ProofOfWork, job: MiningJob) -> Result<SearchHandle> {
    let (sender, results) = bounded(1);
    let cancel = Arc::new(AtomicBool::new(false));
    let parent = job.parent;

    let flag = cancel.clone();
    thread::Builder::new()
        .name("pow-worker".to_string())
        .spawn(move || {
            debug!(
                "Searching {} nonces from {} on top of {}",
                job.attempts, job.start_nonce, job.parent
            );
            let outcome = pow.search(job, &flag);
            // The controller may have moved on; a closed slot is fine
            let _ = sender.send(outcome);
        })
        .map_err(|e| BlockchainError::Mining(format!("Failed to spawn PoW worker: {e}")))?;

    Ok(SearchHandle {
        parent,
        cancel,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Block;
    use std::time::Duration;

    fn job(attempts: u64) -> MiningJob {
        let parent = Block::new(None, 0, vec![], None).unwrap();
        MiningJob {
            parent: parent.get_hash(),
            data: vec![],
            start_nonce: 0,
            attempts,
        }
    }

    #[test]
    fn test_worker_reports_found_block() {
        let pow = ProofOfWork::new(2).unwrap();
        let handle = spawn_search(pow.clone(), job(100_000)).unwrap();
        match handle.results().recv_timeout(Duration::from_secs(10)).unwrap() {
            Ok(SearchOutcome::Found(block)) => {
                assert!(pow.validate(&block));
                assert_eq!(block.get_previous_block_hash(), Some(handle.parent()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_worker_stops() {
        let pow = ProofOfWork::new(255).unwrap();
        let handle = spawn_search(pow, job(u64::MAX)).unwrap();
        handle.cancel();
        let outcome = handle
            .results()
            .recv_timeout(Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled));
    }
}
