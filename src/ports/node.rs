//! Port for the chain-facing node.
//!
//! Implementations:
//! - `HttpNode` (JSON-RPC over HTTP)
//! - `MockNode` for tests and dry runs

use std::future::Future;

use alloy_primitives::B256;

/// One encrypted log hit under a siloed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedLog {
    /// Raw `[tag | body]` buffer as emitted on-chain.
    pub ciphertext: Vec<u8>,
    /// Block in which the log was emitted.
    pub block_number: u64,
}

/// The block-header slice the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_number: u64,
    pub public_data_tree_root: B256,
    pub note_hash_tree_root: B256,
    pub nullifier_tree_root: B256,
    pub next_available_leaf_index: u64,
}

/// Preimage of an indexed-tree leaf in the public data tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicDataLeafPreimage {
    pub slot: B256,
    pub value: B256,
    pub next_slot: B256,
    pub next_index: u64,
}

/// Membership artifact for a public-data-tree leaf at a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicDataWitness {
    pub leaf_preimage: PublicDataLeafPreimage,
    pub index: u64,
    pub sibling_path: Vec<B256>,
}

/// Port for node queries. One instance per network.
pub trait NodeClient: Send + Sync {
    /// Batch tag lookup. The outer vector is parallel to `tags`; each
    /// inner vector is ordered by on-chain emission order.
    fn get_logs_by_tags(
        &self,
        tags: &[B256],
    ) -> impl Future<Output = Result<Vec<Vec<EncryptedLog>>, NodeError>> + Send;

    /// Header of the given block.
    fn get_block_header(
        &self,
        block: u64,
    ) -> impl Future<Output = Result<BlockHeader, NodeError>> + Send;

    /// Membership witness for a public-data-tree index at a block.
    fn get_public_data_witness(
        &self,
        block: u64,
        index: B256,
    ) -> impl Future<Output = Result<PublicDataWitness, NodeError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("no public data witness for index {index} at block {block}")]
    WitnessUnavailable { block: u64, index: B256 },

    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}
