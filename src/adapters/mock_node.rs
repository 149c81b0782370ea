//! In-memory `NodeClient` for tests and dry runs.
//!
//! Seed it with encrypted logs keyed by siloed tag and oracle prices
//! keyed by `(block, public-data slot)`. Block headers and public-data
//! witnesses are derived from the seeded price table with the same
//! indexed-tree leaf hashing the mirror backend verifies against.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::B256;
use tokio::sync::Mutex;

use crate::crypto::poseidon::{domain_tag, field_from_u64, poseidon2};
use crate::domain::merkle::{
    indexed_leaf_hash, padded_root, padded_sibling_path, ZeroHashes,
};
use crate::domain::witness::PUBLIC_DATA_TREE_DEPTH;
use crate::ports::node::{
    BlockHeader, EncryptedLog, NodeClient, NodeError, PublicDataLeafPreimage, PublicDataWitness,
};

#[derive(Default)]
struct MockNodeState {
    /// siloed tag -> logs in emission order
    logs: HashMap<B256, Vec<EncryptedLog>>,
    /// block -> (slot -> value), slots sorted ascending
    prices: BTreeMap<u64, BTreeMap<B256, B256>>,
}

/// Seedable in-memory node.
pub struct MockNode {
    state: Mutex<MockNodeState>,
    zeros: ZeroHashes,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockNodeState::default()),
            zeros: ZeroHashes::new(PUBLIC_DATA_TREE_DEPTH),
        }
    }

    /// Register an encrypted log under its siloed tag.
    pub async fn add_log(&self, tag: B256, ciphertext: Vec<u8>, block_number: u64) {
        self.state.lock().await.logs.entry(tag).or_default().push(EncryptedLog {
            ciphertext,
            block_number,
        });
    }

    /// Register a public-data value (an oracle price) at a block.
    pub async fn set_public_data(&self, block: u64, slot: B256, value: B256) {
        self.state
            .lock()
            .await
            .prices
            .entry(block)
            .or_default()
            .insert(slot, value);
    }

    /// Ordered indexed-tree leaves for a block's price table.
    fn leaves_for(prices: &BTreeMap<B256, B256>) -> Vec<(PublicDataLeafPreimage, B256)> {
        let entries: Vec<(&B256, &B256)> = prices.iter().collect();
        entries
            .iter()
            .enumerate()
            .map(|(i, (slot, value))| {
                let (next_slot, next_index) = match entries.get(i + 1) {
                    Some((next, _)) => (**next, (i + 1) as u64),
                    None => (B256::ZERO, 0),
                };
                let preimage = PublicDataLeafPreimage {
                    slot: **slot,
                    value: **value,
                    next_slot,
                    next_index,
                };
                let leaf = indexed_leaf_hash(preimage.slot, preimage.value, next_slot, next_index);
                (preimage, leaf)
            })
            .collect()
    }

    fn public_data_root(&self, prices: &BTreeMap<B256, B256>) -> B256 {
        let leaves: Vec<B256> = Self::leaves_for(prices).into_iter().map(|(_, l)| l).collect();
        padded_root(&leaves, PUBLIC_DATA_TREE_DEPTH, &self.zeros)
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeClient for MockNode {
    async fn get_logs_by_tags(&self, tags: &[B256]) -> Result<Vec<Vec<EncryptedLog>>, NodeError> {
        let state = self.state.lock().await;
        Ok(tags
            .iter()
            .map(|tag| state.logs.get(tag).cloned().unwrap_or_default())
            .collect())
    }

    async fn get_block_header(&self, block: u64) -> Result<BlockHeader, NodeError> {
        let state = self.state.lock().await;
        let empty = BTreeMap::new();
        let prices = state.prices.get(&block).unwrap_or(&empty);
        Ok(BlockHeader {
            block_number: block,
            public_data_tree_root: self.public_data_root(prices),
            note_hash_tree_root: poseidon2(domain_tag("mock.note_hash"), field_from_u64(block)),
            nullifier_tree_root: poseidon2(domain_tag("mock.nullifier"), field_from_u64(block)),
            next_available_leaf_index: prices.len() as u64,
        })
    }

    async fn get_public_data_witness(
        &self,
        block: u64,
        index: B256,
    ) -> Result<PublicDataWitness, NodeError> {
        let state = self.state.lock().await;
        let prices = state
            .prices
            .get(&block)
            .ok_or(NodeError::BlockNotFound(block))?;

        let leaves = Self::leaves_for(prices);
        let position = leaves
            .iter()
            .position(|(preimage, _)| preimage.slot == index)
            .ok_or(NodeError::WitnessUnavailable { block, index })?;

        let hashes: Vec<B256> = leaves.iter().map(|(_, l)| *l).collect();
        let sibling_path =
            padded_sibling_path(&hashes, position, PUBLIC_DATA_TREE_DEPTH, &self.zeros);

        Ok(PublicDataWitness {
            leaf_preimage: leaves[position].0,
            index: position as u64,
            sibling_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merkle::root_from_sibling_path;

    #[tokio::test]
    async fn test_logs_preserve_order() {
        let node = MockNode::new();
        let tag = B256::repeat_byte(0x01);
        node.add_log(tag, vec![1], 10).await;
        node.add_log(tag, vec![2], 11).await;

        let hits = node.get_logs_by_tags(&[tag, B256::repeat_byte(0x02)]).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].len(), 2);
        assert_eq!(hits[0][0].ciphertext, vec![1]);
        assert_eq!(hits[0][1].ciphertext, vec![2]);
        assert!(hits[1].is_empty());
    }

    #[tokio::test]
    async fn test_witness_verifies_against_header_root() {
        let node = MockNode::new();
        let slot_a = B256::repeat_byte(0x10);
        let slot_b = B256::repeat_byte(0x20);
        node.set_public_data(5, slot_a, B256::repeat_byte(0x01)).await;
        node.set_public_data(5, slot_b, B256::repeat_byte(0x02)).await;

        let header = node.get_block_header(5).await.unwrap();
        let witness = node.get_public_data_witness(5, slot_a).await.unwrap();

        assert_eq!(witness.sibling_path.len(), PUBLIC_DATA_TREE_DEPTH);
        let leaf = indexed_leaf_hash(
            witness.leaf_preimage.slot,
            witness.leaf_preimage.value,
            witness.leaf_preimage.next_slot,
            witness.leaf_preimage.next_index,
        );
        assert_eq!(
            root_from_sibling_path(leaf, witness.index, &witness.sibling_path),
            header.public_data_tree_root
        );
    }

    #[tokio::test]
    async fn test_missing_witness_errors() {
        let node = MockNode::new();
        node.set_public_data(5, B256::repeat_byte(0x10), B256::ZERO).await;

        let err = node
            .get_public_data_witness(5, B256::repeat_byte(0x99))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::WitnessUnavailable { .. }));

        let err = node
            .get_public_data_witness(6, B256::repeat_byte(0x10))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::BlockNotFound(6)));
    }
}
