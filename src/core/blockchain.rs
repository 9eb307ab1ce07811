// The block tree. Every accepted block lives in one arena keyed by hash, each carrying the
// height it sits at. The leaves of the tree are the heads; the canonical head is the deepest
// one, and on equal depth the head that already held the title keeps it.
// Blocks whose parent is unknown wait in the orphan pool and are spliced in as soon as the
// missing ancestor is accepted.

use crate::core::{
    genesis_block, Block, BlockHash, BlockRecord, GenesisAllocation, OrphanLink, OrphanPool,
    ProofOfWork, Transaction,
};
use crate::error::{BlockchainError, Result};
use crate::storage::ChainFile;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Where a block can be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Its parent is in the tree
    Linked(BlockHash),
    Orphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Accepted,
    Orphaned(OrphanLink),
    /// Already in the tree or the orphan pool
    Duplicate,
}

/// Result of offering one block to the tree
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub hash: BlockHash,
    pub status: BlockStatus,
    /// Every block that joined the tree, spliced orphans included, in attach order
    pub accepted: Vec<BlockHash>,
    pub previous_head: BlockHash,
    pub canonical_head: BlockHash,
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == BlockStatus::Accepted
    }

    pub fn head_changed(&self) -> bool {
        self.previous_head != self.canonical_head
    }
}

/// Blocks that left and joined the canonical chain when the head moved, each list ordered
/// from the common ancestor outwards
#[derive(Debug, Clone, Default)]
pub struct ForkDiff {
    pub detached: Vec<Block>,
    pub attached: Vec<Block>,
}

impl ForkDiff {
    pub fn is_reorg(&self) -> bool {
        !self.detached.is_empty()
    }

    pub fn detached_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.detached.iter().flat_map(|b| b.get_transactions().iter())
    }

    pub fn attached_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.attached.iter().flat_map(|b| b.get_transactions().iter())
    }
}

#[derive(Debug, Clone)]
struct StoredBlock {
    block: Block,
    height: u64,
}

struct ChainState {
    blocks: HashMap<BlockHash, StoredBlock>,
    heads: Vec<BlockHash>, // First-seen order
    canonical_head: BlockHash,
    genesis: BlockHash,
    orphans: OrphanPool,
}

impl ChainState {
    fn with_genesis(genesis: Block) -> ChainState {
        let hash = genesis.get_hash();
        let mut blocks = HashMap::new();
        blocks.insert(
            hash,
            StoredBlock {
                block: genesis,
                height: 0,
            },
        );
        ChainState {
            blocks,
            heads: vec![hash],
            canonical_head: hash,
            genesis: hash,
            orphans: OrphanPool::new(),
        }
    }

    fn height(&self, hash: &BlockHash) -> Option<u64> {
        self.blocks.get(hash).map(|stored| stored.height)
    }

    fn is_known(&self, hash: &BlockHash) -> bool {
        self.blocks.contains_key(hash) || self.orphans.contains(hash)
    }

    fn classify(&self, block: &Block) -> Classification {
        match block.get_previous_block_hash() {
            Some(parent) if self.blocks.contains_key(&parent) => Classification::Linked(parent),
            _ => Classification::Orphan,
        }
    }

    /// Attach a block whose parent is in the tree. The head list and the canonical head are
    /// updated before returning.
    fn link(&mut self, mut block: Block, parent: BlockHash, store: Option<&ChainFile>) -> Result<()> {
        let hash = block.get_hash();
        let height = self.height(&parent).ok_or_else(|| {
            BlockchainError::Internal(format!("Parent {parent} of block {hash} is not in the tree"))
        })? + 1;
        block.set_parent(parent);

        if let Some(store) = store {
            if let Err(e) = store.append(&block.to_record()) {
                error!("Failed to persist block {hash}: {e}");
            }
        }

        match self.heads.iter().position(|head| *head == parent) {
            Some(idx) => self.heads[idx] = hash,
            None => self.heads.push(hash),
        }
        self.blocks.insert(hash, StoredBlock { block, height });
        self.choose_canonical_head();
        debug!("Linked block {hash} at height {height}");
        Ok(())
    }

    /// Deepest head wins; on a tie the current canonical head stays, otherwise the
    /// earliest-seen head of that depth is taken.
    fn choose_canonical_head(&mut self) {
        let best = match self.heads.iter().filter_map(|h| self.height(h)).max() {
            Some(best) => best,
            None => return,
        };
        let incumbent_holds = self.heads.contains(&self.canonical_head)
            && self.height(&self.canonical_head) == Some(best);
        if incumbent_holds {
            return;
        }
        if let Some(head) = self
            .heads
            .iter()
            .find(|h| self.height(h) == Some(best))
            .copied()
        {
            self.canonical_head = head;
        }
    }

    /// Move every orphan chain whose missing ancestor is now present into the tree,
    /// repeating until no chain qualifies.
    fn splice_orphans(&mut self, store: Option<&ChainFile>, accepted: &mut Vec<BlockHash>) -> Result<()> {
        loop {
            let blocks = &self.blocks;
            let chain = match self.orphans.take_ready_chain(|h| blocks.contains_key(h)) {
                Some(chain) => chain,
                None => return Ok(()),
            };
            for block in chain {
                let hash = block.get_hash();
                if self.blocks.contains_key(&hash) {
                    continue;
                }
                match self.classify(&block) {
                    Classification::Linked(parent) => {
                        self.link(block, parent, store)?;
                        info!("Spliced former orphan {hash} into the tree");
                        accepted.push(hash);
                    }
                    Classification::Orphan => {
                        warn!("Orphan {hash} has no parent in the tree after splicing");
                        self.orphans.insert(block);
                    }
                }
            }
        }
    }

    fn accept(&mut self, block: Block, store: Option<&ChainFile>) -> Result<(BlockStatus, Vec<BlockHash>)> {
        let hash = block.get_hash();
        if self.is_known(&hash) {
            return Ok((BlockStatus::Duplicate, Vec::new()));
        }
        match self.classify(&block) {
            Classification::Linked(parent) => {
                self.link(block, parent, store)?;
                let mut accepted = vec![hash];
                self.splice_orphans(store, &mut accepted)?;
                Ok((BlockStatus::Accepted, accepted))
            }
            Classification::Orphan => {
                let link = self.orphans.insert(block);
                Ok((BlockStatus::Orphaned(link), Vec::new()))
            }
        }
    }

    fn path_to_genesis(&self, from: BlockHash) -> Result<Vec<Block>> {
        let mut chain = Vec::new();
        let mut cursor = Some(from);
        while let Some(hash) = cursor {
            let stored = self.blocks.get(&hash).ok_or_else(|| {
                BlockchainError::Internal(format!("Block {hash} is referenced but missing"))
            })?;
            chain.push(stored.block.clone());
            cursor = stored.block.get_previous_block_hash();
        }
        Ok(chain)
    }
}

// The tree is shared between the server, the miner and the wallet; clones share state.
#[derive(Clone)]
pub struct Blockchain {
    state: Arc<RwLock<ChainState>>,
    pow: ProofOfWork,
    genesis_hash: BlockHash,
    store: Option<ChainFile>,
}

impl Blockchain {
    /// Tree without a chain file, seeded with the genesis built from `allocations`
    pub fn in_memory(difficulty_bits: u32, allocations: &[GenesisAllocation]) -> Result<Blockchain> {
        let pow = ProofOfWork::new(difficulty_bits)?;
        let genesis = genesis_block(allocations)?;
        Ok(Blockchain::from_state(ChainState::with_genesis(genesis), pow, None))
    }

    /// Open the chain file in `data_dir`, replaying every stored block. A missing file is
    /// started with the genesis block.
    pub fn open(
        data_dir: &Path,
        difficulty_bits: u32,
        allocations: &[GenesisAllocation],
    ) -> Result<Blockchain> {
        let pow = ProofOfWork::new(difficulty_bits)?;
        let store = ChainFile::in_dir(data_dir)?;
        let configured = genesis_block(allocations)?;

        let mut records = store.replay()?.into_iter();
        let genesis = match records.next() {
            Some(record) => {
                let block = Block::from_record(record)?;
                if block.get_previous_block_hash().is_some() {
                    return Err(BlockchainError::InvalidBlock(format!(
                        "First record in {} is not a genesis block",
                        store.path().display()
                    )));
                }
                if block.get_hash() != configured.get_hash() {
                    warn!(
                        "Stored genesis {} differs from the configured genesis {}",
                        block.get_hash(),
                        configured.get_hash()
                    );
                }
                block
            }
            None => {
                store.append(&configured.to_record())?;
                info!("Created genesis block {}", configured.get_hash());
                configured
            }
        };

        let mut state = ChainState::with_genesis(genesis);
        let genesis_hash = state.genesis;
        let mut replayed = 0usize;
        for record in records {
            let block = match Self::check_with(&pow, genesis_hash, record) {
                Ok(block) => block,
                Err(e) => {
                    warn!("Skipping stored block: {e}");
                    continue;
                }
            };
            let (_, accepted) = state.accept(block, None)?;
            replayed += accepted.len();
        }
        if !state.orphans.is_empty() {
            warn!(
                "{} stored blocks could not be linked to the tree, missing parents {:?}",
                state.orphans.len(),
                state.orphans.missing_parents()
            );
        }
        info!(
            "Loaded {} blocks from {}, canonical head {}",
            replayed + 1,
            store.path().display(),
            state.canonical_head
        );

        Ok(Blockchain::from_state(state, pow, Some(store)))
    }

    fn from_state(state: ChainState, pow: ProofOfWork, store: Option<ChainFile>) -> Blockchain {
        let genesis_hash = state.genesis;
        Blockchain {
            state: Arc::new(RwLock::new(state)),
            pow,
            genesis_hash,
            store,
        }
    }

    fn check_with(pow: &ProofOfWork, genesis: BlockHash, record: BlockRecord) -> Result<Block> {
        let block = Block::from_record(record)?;
        Self::validate_with(pow, genesis, &block)?;
        Ok(block)
    }

    fn validate_with(pow: &ProofOfWork, genesis: BlockHash, block: &Block) -> Result<()> {
        let hash = block.get_hash();
        if block.get_previous_block_hash().is_none() {
            if hash == genesis {
                return Ok(());
            }
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {hash} has no previous block hash"
            )));
        }
        if !pow.validate(block) {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {hash} does not meet the difficulty target"
            )));
        }
        Ok(())
    }

    /// Rebuild a block from its record and check it against the difficulty target
    pub fn check_block(&self, record: BlockRecord) -> Result<Block> {
        Self::check_with(&self.pow, self.genesis_hash, record)
    }

    pub fn classify(&self, block: &Block) -> Result<Classification> {
        Ok(self.state.read()?.classify(block))
    }

    /// Attach a block whose parent is already in the tree. Orphans that become linkable are
    /// spliced in too; all attached hashes are returned.
    pub fn add_block(&self, block: Block) -> Result<Vec<BlockHash>> {
        let mut state = self.state.write()?;
        let hash = block.get_hash();
        let parent = match state.classify(&block) {
            Classification::Linked(parent) => parent,
            Classification::Orphan => {
                return Err(BlockchainError::InvalidBlock(format!(
                    "Parent of block {hash} is not in the tree"
                )))
            }
        };
        if state.blocks.contains_key(&hash) {
            return Ok(Vec::new());
        }
        state.link(block, parent, self.store.as_ref())?;
        let mut accepted = vec![hash];
        state.splice_orphans(self.store.as_ref(), &mut accepted)?;
        Ok(accepted)
    }

    pub fn add_to_orphan_list(&self, block: Block) -> Result<OrphanLink> {
        let mut state = self.state.write()?;
        if state.classify(&block) != Classification::Orphan {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {} links to the tree and is not an orphan",
                block.get_hash()
            )));
        }
        Ok(state.orphans.insert(block))
    }

    /// Validate and place a block: attach it, pool it as an orphan, or report it as known.
    /// Classification and attachment happen under one write lock.
    pub fn submit_block(&self, block: Block) -> Result<SubmitOutcome> {
        Self::validate_with(&self.pow, self.genesis_hash, &block)?;

        let hash = block.get_hash();
        let mut state = self.state.write()?;
        let previous_head = state.canonical_head;
        let (status, accepted) = state.accept(block, self.store.as_ref())?;
        let canonical_head = state.canonical_head;
        drop(state);

        match status {
            BlockStatus::Accepted => info!("Accepted block {hash} ({} attached)", accepted.len()),
            BlockStatus::Orphaned(link) => info!("Stored orphan block {hash} ({link:?})"),
            BlockStatus::Duplicate => debug!("Ignoring known block {hash}"),
        }
        if previous_head != canonical_head {
            info!("Canonical head moved from {previous_head} to {canonical_head}");
        }

        Ok(SubmitOutcome {
            hash,
            status,
            accepted,
            previous_head,
            canonical_head,
        })
    }

    pub fn submit_record(&self, record: BlockRecord) -> Result<SubmitOutcome> {
        let block = self.check_block(record)?;
        self.submit_block(block)
    }

    /// Walk every head back to genesis checking stored hashes, the target, heights and
    /// `previous_block_hash == hash(parent)`. Shared ancestors are checked once.
    pub fn verify_blockchain(&self) -> Result<()> {
        let state = self.state.read()?;
        let mut verified: HashSet<BlockHash> = HashSet::new();

        for head in &state.heads {
            let mut cursor = *head;
            while !verified.contains(&cursor) {
                let stored = state.blocks.get(&cursor).ok_or_else(|| {
                    BlockchainError::InvalidBlock(format!("Block {cursor} is referenced but missing"))
                })?;
                let block = &stored.block;
                if Block::from_record(block.to_record())?.get_hash() != cursor {
                    return Err(BlockchainError::InvalidBlock(format!(
                        "Block {cursor} does not hash to its key"
                    )));
                }
                match block.get_previous_block_hash() {
                    None => {
                        if cursor != state.genesis {
                            return Err(BlockchainError::InvalidBlock(format!(
                                "Block {cursor} claims to be a second genesis"
                            )));
                        }
                        verified.insert(cursor);
                    }
                    Some(previous) => {
                        if !self.pow.validate(block) {
                            return Err(BlockchainError::InvalidBlock(format!(
                                "Block {cursor} does not meet the difficulty target"
                            )));
                        }
                        let parent = state.blocks.get(&previous).ok_or_else(|| {
                            BlockchainError::InvalidBlock(format!(
                                "Parent {previous} of block {cursor} is missing"
                            ))
                        })?;
                        if Block::from_record(parent.block.to_record())?.get_hash() != previous {
                            return Err(BlockchainError::InvalidBlock(format!(
                                "Block {cursor} does not link to the hash of its parent"
                            )));
                        }
                        if parent.height + 1 != stored.height {
                            return Err(BlockchainError::InvalidBlock(format!(
                                "Block {cursor} has an inconsistent height"
                            )));
                        }
                        verified.insert(cursor);
                        cursor = previous;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        match self.verify_blockchain() {
            Ok(()) => true,
            Err(e) => {
                warn!("Blockchain verification failed: {e}");
                false
            }
        }
    }

    pub fn get_canonical_head(&self) -> Result<Block> {
        let state = self.state.read()?;
        state
            .blocks
            .get(&state.canonical_head)
            .map(|stored| stored.block.clone())
            .ok_or_else(|| BlockchainError::Internal("Canonical head is missing".to_string()))
    }

    pub fn canonical_head_hash(&self) -> Result<BlockHash> {
        Ok(self.state.read()?.canonical_head)
    }

    /// Canonical chain from the head down to genesis
    pub fn canonical_chain(&self) -> Result<Vec<Block>> {
        let state = self.state.read()?;
        state.path_to_genesis(state.canonical_head)
    }

    /// Chain ending in `head`, from `head` down to genesis
    pub fn chain_from(&self, head: BlockHash) -> Result<Vec<Block>> {
        self.state.read()?.path_to_genesis(head)
    }

    /// True when a transaction with `id` sits on the canonical chain
    pub fn is_confirmed(&self, id: &str) -> Result<bool> {
        let state = self.state.read()?;
        let mut cursor = Some(state.canonical_head);
        while let Some(hash) = cursor {
            let stored = state.blocks.get(&hash).ok_or_else(|| {
                BlockchainError::Internal(format!("Block {hash} is referenced but missing"))
            })?;
            if stored.block.contains_transaction(id) {
                return Ok(true);
            }
            cursor = stored.block.get_previous_block_hash();
        }
        Ok(false)
    }

    /// Length of the canonical chain, genesis included
    pub fn block_count(&self) -> Result<usize> {
        let state = self.state.read()?;
        let height = state.height(&state.canonical_head).unwrap_or(0);
        Ok(height as usize + 1)
    }

    pub fn heads(&self) -> Result<Vec<BlockHash>> {
        Ok(self.state.read()?.heads.clone())
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>> {
        Ok(self
            .state
            .read()?
            .blocks
            .get(hash)
            .map(|stored| stored.block.clone()))
    }

    pub fn height(&self, hash: &BlockHash) -> Result<Option<u64>> {
        Ok(self.state.read()?.height(hash))
    }

    /// True for blocks in the tree; pooled orphans do not count
    pub fn contains_block(&self, hash: &BlockHash) -> Result<bool> {
        Ok(self.state.read()?.blocks.contains_key(hash))
    }

    pub fn orphan_count(&self) -> Result<usize> {
        Ok(self.state.read()?.orphans.len())
    }

    /// Blocks that left and joined the canonical chain when it moved from `old_head`
    /// to `new_head`
    pub fn fork_diff(&self, old_head: BlockHash, new_head: BlockHash) -> Result<ForkDiff> {
        let state = self.state.read()?;
        let lookup = |hash: &BlockHash| {
            state.blocks.get(hash).ok_or_else(|| {
                BlockchainError::Internal(format!("Block {hash} is not in the tree"))
            })
        };

        let mut diff = ForkDiff::default();
        let (mut old, mut new) = (old_head, new_head);
        while old != new {
            let old_stored = lookup(&old)?;
            let new_stored = lookup(&new)?;
            if old_stored.height >= new_stored.height {
                diff.detached.push(old_stored.block.clone());
                old = old_stored.block.get_previous_block_hash().ok_or_else(|| {
                    BlockchainError::Internal("Chains share no ancestor".to_string())
                })?;
            } else {
                diff.attached.push(new_stored.block.clone());
                new = new_stored.block.get_previous_block_hash().ok_or_else(|| {
                    BlockchainError::Internal("Chains share no ancestor".to_string())
                })?;
            }
        }
        diff.detached.reverse();
        diff.attached.reverse();
        Ok(diff)
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_hash
    }

    pub fn chain_path(&self) -> Option<&Path> {
        self.store.as_ref().map(ChainFile::path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, PublicKey};

    // Zero difficulty bits accept every hash, so blocks can be built without mining
    fn chain() -> Blockchain {
        Blockchain::in_memory(0, &[]).unwrap()
    }

    fn child(parent: BlockHash, nonce: u64) -> Block {
        let tx = Transaction::new_coinbase(PublicKey::from("miner"), Amount::from_millis(5));
        Block::new(Some(parent), nonce, vec![tx], None).unwrap()
    }

    fn extend(blockchain: &Blockchain, from: BlockHash, len: usize, salt: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut parent = from;
        for i in 0..len {
            let block = child(parent, salt * 100 + i as u64);
            parent = block.get_hash();
            blockchain.submit_block(block.clone()).unwrap();
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn test_new_chain_has_only_genesis() {
        let blockchain = chain();
        assert_eq!(blockchain.block_count().unwrap(), 1);
        assert_eq!(blockchain.heads().unwrap(), vec![blockchain.genesis_hash()]);
        assert_eq!(
            blockchain.canonical_head_hash().unwrap(),
            blockchain.genesis_hash()
        );
        assert!(blockchain.verify_blockchain().is_ok());
    }

    #[test]
    fn test_extending_the_head_moves_it() {
        let blockchain = chain();
        let blocks = extend(&blockchain, blockchain.genesis_hash(), 3, 1);
        assert_eq!(blockchain.block_count().unwrap(), 4);
        assert_eq!(blockchain.heads().unwrap(), vec![blocks[2].get_hash()]);
        assert_eq!(
            blockchain.get_canonical_head().unwrap().get_parent(),
            Some(blocks[1].get_hash())
        );
    }

    #[test]
    fn test_equal_fork_keeps_incumbent_then_longer_fork_wins() {
        let blockchain = chain();
        let genesis = blockchain.genesis_hash();
        let first = extend(&blockchain, genesis, 1, 1);
        let second = extend(&blockchain, genesis, 1, 2);

        assert_eq!(blockchain.heads().unwrap().len(), 2);
        assert_eq!(blockchain.canonical_head_hash().unwrap(), first[0].get_hash());

        let longer = child(second[0].get_hash(), 77);
        let outcome = blockchain.submit_block(longer.clone()).unwrap();
        assert!(outcome.head_changed());
        assert_eq!(outcome.canonical_head, longer.get_hash());
        assert_eq!(blockchain.block_count().unwrap(), 3);

        let diff = blockchain
            .fork_diff(outcome.previous_head, outcome.canonical_head)
            .unwrap();
        assert!(diff.is_reorg());
        assert_eq!(diff.detached.len(), 1);
        assert_eq!(diff.detached[0].get_hash(), first[0].get_hash());
        let attached: Vec<BlockHash> = diff.attached.iter().map(Block::get_hash).collect();
        assert_eq!(attached, vec![second[0].get_hash(), longer.get_hash()]);
    }

    #[test]
    fn test_orphans_are_spliced_when_parent_arrives() {
        let blockchain = chain();
        let a = child(blockchain.genesis_hash(), 1);
        let b = child(a.get_hash(), 2);
        let c = child(b.get_hash(), 3);

        let outcome = blockchain.submit_block(c.clone()).unwrap();
        assert_eq!(outcome.status, BlockStatus::Orphaned(OrphanLink::Singleton));
        let outcome = blockchain.submit_block(b.clone()).unwrap();
        assert_eq!(outcome.status, BlockStatus::Orphaned(OrphanLink::ParentOfRoot));
        assert_eq!(blockchain.block_count().unwrap(), 1);
        assert_eq!(blockchain.orphan_count().unwrap(), 2);

        let outcome = blockchain.submit_block(a.clone()).unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome.accepted,
            vec![a.get_hash(), b.get_hash(), c.get_hash()]
        );
        assert_eq!(blockchain.canonical_head_hash().unwrap(), c.get_hash());
        assert_eq!(blockchain.orphan_count().unwrap(), 0);
        assert!(blockchain.verify_blockchain().is_ok());
    }

    #[test]
    fn test_duplicates_are_reported() {
        let blockchain = chain();
        let a = child(blockchain.genesis_hash(), 1);
        blockchain.submit_block(a.clone()).unwrap();
        let outcome = blockchain.submit_block(a).unwrap();
        assert_eq!(outcome.status, BlockStatus::Duplicate);
        assert!(outcome.accepted.is_empty());

        let orphan = child(BlockHash::digest(b"unknown"), 1);
        blockchain.submit_block(orphan.clone()).unwrap();
        assert_eq!(
            blockchain.submit_block(orphan).unwrap().status,
            BlockStatus::Duplicate
        );
    }

    #[test]
    fn test_block_missing_target_is_rejected() {
        let blockchain = Blockchain::in_memory(256, &[]).unwrap();
        let block = child(blockchain.genesis_hash(), 1);
        let err = blockchain.check_block(block.to_record()).unwrap_err();
        assert!(err.is_rejection());
        assert!(blockchain.submit_block(block).is_err());
        assert_eq!(blockchain.block_count().unwrap(), 1);
    }

    #[test]
    fn test_second_genesis_is_rejected() {
        let blockchain = chain();
        let other = Block::new(None, 9, vec![], None).unwrap();
        assert!(blockchain.check_block(other.to_record()).is_err());
    }

    #[test]
    fn test_add_block_and_orphan_list_guard_their_preconditions() {
        let blockchain = chain();
        let orphan = child(BlockHash::digest(b"elsewhere"), 1);
        assert!(blockchain.add_block(orphan.clone()).is_err());
        assert_eq!(
            blockchain.add_to_orphan_list(orphan).unwrap(),
            OrphanLink::Singleton
        );

        let linked = child(blockchain.genesis_hash(), 2);
        assert!(blockchain.add_to_orphan_list(linked.clone()).is_err());
        assert_eq!(blockchain.add_block(linked.clone()).unwrap(), vec![linked.get_hash()]);
    }

    #[test]
    fn test_tampered_parent_breaks_the_link() {
        let blockchain = chain();
        let blocks = extend(&blockchain, blockchain.genesis_hash(), 2, 1);
        assert!(blockchain.verify_blockchain().is_ok());

        {
            let mut state = blockchain.state.write().unwrap();
            let stored = state.blocks.get_mut(&blocks[0].get_hash()).unwrap();
            stored.block = child(blockchain.genesis_hash(), 999);
        }
        let err = blockchain.verify_blockchain().unwrap_err();
        assert!(err.to_string().contains("does not link to the hash of its parent"));
        assert!(!blockchain.is_valid());
    }

    #[test]
    fn test_reopen_replays_the_chain_file() {
        let dir = tempfile::tempdir().unwrap();
        let head = {
            let blockchain = Blockchain::open(dir.path(), 0, &[]).unwrap();
            let genesis = blockchain.genesis_hash();
            extend(&blockchain, genesis, 2, 1);
            extend(&blockchain, genesis, 1, 2);
            // Orphans are not persisted
            blockchain
                .submit_block(child(BlockHash::digest(b"nowhere"), 5))
                .unwrap();
            blockchain.canonical_head_hash().unwrap()
        };

        let reopened = Blockchain::open(dir.path(), 0, &[]).unwrap();
        assert_eq!(reopened.canonical_head_hash().unwrap(), head);
        assert_eq!(reopened.block_count().unwrap(), 3);
        assert_eq!(reopened.heads().unwrap().len(), 2);
        assert_eq!(reopened.orphan_count().unwrap(), 0);
        assert!(reopened.verify_blockchain().is_ok());
    }
}
