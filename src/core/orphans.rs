// Orphan pool: blocks whose parent is not in the accepted tree yet.
//
// Orphans are kept as chains, root first and head last. A chain's root is the only member
// whose parent is unknown; every other member's parent is the member before it. Forks
// inside the pool are represented by separate chains that share a prefix, so a block may be
// listed in more than one chain while being stored once.

use crate::core::{Block, BlockHash};
use std::collections::HashMap;

/// How an arriving orphan was attached to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanLink {
    /// It is the missing parent of one or more chain roots
    ParentOfRoot,
    /// Its parent is a member of an existing chain
    ChildOfMember,
    /// Both at once: two chains were joined through it
    Merged,
    /// Unrelated to anything pooled
    Singleton,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OrphanChain {
    members: Vec<BlockHash>,
}

impl OrphanChain {
    fn root(&self) -> BlockHash {
        self.members[0]
    }

    fn head(&self) -> BlockHash {
        self.members[self.members.len() - 1]
    }
}

#[derive(Debug, Default)]
pub struct OrphanPool {
    blocks: HashMap<BlockHash, Block>,
    chains: Vec<OrphanChain>,
}

impl OrphanPool {
    pub fn new() -> OrphanPool {
        OrphanPool::default()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.blocks.contains_key(hash)
    }

    /// Number of pooled blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Root-to-head hashes of every chain
    pub fn chains(&self) -> Vec<Vec<BlockHash>> {
        self.chains.iter().map(|c| c.members.clone()).collect()
    }

    /// Parent hash each chain is still waiting for
    pub fn missing_parents(&self) -> Vec<BlockHash> {
        let mut missing: Vec<BlockHash> = self
            .chains
            .iter()
            .filter_map(|c| self.blocks.get(&c.root()))
            .filter_map(|root| root.get_previous_block_hash())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Link `block` against the pooled chains. The caller guarantees the block is not
    /// pooled yet and its parent is not in the accepted tree.
    pub fn insert(&mut self, mut block: Block) -> OrphanLink {
        let hash = block.get_hash();
        let previous = block.get_previous_block_hash();

        // Chains whose root names the new block as parent
        let child_chains: Vec<usize> = self
            .chains
            .iter()
            .enumerate()
            .filter(|(_, chain)| {
                self.blocks
                    .get(&chain.root())
                    .and_then(Block::get_previous_block_hash)
                    == Some(hash)
            })
            .map(|(idx, _)| idx)
            .collect();

        // Chain holding the new block's parent; a chain ending in it is preferred
        let parent_position = previous.and_then(|parent| {
            self.chains
                .iter()
                .enumerate()
                .find(|(_, chain)| chain.head() == parent)
                .map(|(idx, chain)| (idx, chain.members.len() - 1))
                .or_else(|| {
                    self.chains.iter().enumerate().find_map(|(idx, chain)| {
                        chain
                            .members
                            .iter()
                            .position(|member| *member == parent)
                            .map(|pos| (idx, pos))
                    })
                })
        });

        let link = match (child_chains.is_empty(), parent_position.is_some()) {
            (false, true) => OrphanLink::Merged,
            (false, false) => OrphanLink::ParentOfRoot,
            (true, true) => OrphanLink::ChildOfMember,
            (true, false) => OrphanLink::Singleton,
        };

        let mut prefix = Vec::new();
        let mut absorbed: Vec<usize> = child_chains.clone();
        if let Some((chain_idx, pos)) = parent_position {
            let chain = &self.chains[chain_idx];
            prefix.extend_from_slice(&chain.members[..=pos]);
            if pos == chain.members.len() - 1 {
                absorbed.push(chain_idx);
            }
            block.set_parent(chain.members[pos]);
        }
        prefix.push(hash);

        let mut new_chains = Vec::new();
        if child_chains.is_empty() {
            new_chains.push(OrphanChain { members: prefix });
        } else {
            for idx in &child_chains {
                let mut members = prefix.clone();
                members.extend_from_slice(&self.chains[*idx].members);
                new_chains.push(OrphanChain { members });
                let root = self.chains[*idx].root();
                if let Some(root_block) = self.blocks.get_mut(&root) {
                    root_block.set_parent(hash);
                }
            }
        }

        absorbed.sort_unstable();
        absorbed.dedup();
        for idx in absorbed.into_iter().rev() {
            self.chains.remove(idx);
        }
        for chain in new_chains {
            if !self.chains.contains(&chain) {
                self.chains.push(chain);
            }
        }
        self.blocks.insert(hash, block);
        link
    }

    /// Remove and return the first chain whose root's parent satisfies `is_accepted`,
    /// as blocks in root-to-head order.
    pub fn take_ready_chain(&mut self, is_accepted: impl Fn(&BlockHash) -> bool) -> Option<Vec<Block>> {
        let idx = self.chains.iter().position(|chain| {
            self.blocks
                .get(&chain.root())
                .and_then(Block::get_previous_block_hash)
                .map(|parent| is_accepted(&parent))
                .unwrap_or(false)
        })?;
        let chain = self.chains.remove(idx);

        let blocks: Vec<Block> = chain
            .members
            .iter()
            .filter_map(|hash| self.blocks.get(hash).cloned())
            .collect();

        // Drop blocks that no remaining chain references
        for hash in &chain.members {
            if !self.chains.iter().any(|c| c.members.contains(hash)) {
                self.blocks.remove(hash);
            }
        }
        Some(blocks)
    }
}
