//! JSON-RPC `NodeClient` over HTTP.

use alloy_primitives::{Bytes, B256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::witness::PUBLIC_DATA_TREE_DEPTH;
use crate::ports::node::{
    BlockHeader, EncryptedLog, NodeClient, NodeError, PublicDataLeafPreimage, PublicDataWitness,
};

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct LogWire {
    ciphertext: Bytes,
    block_number: u64,
}

#[derive(Deserialize)]
struct TreeSnapshotWire {
    root: B256,
    #[serde(default)]
    next_available_leaf_index: u64,
}

#[derive(Deserialize)]
struct PartialStateWire {
    public_data_tree: TreeSnapshotWire,
    note_hash_tree: TreeSnapshotWire,
    nullifier_tree: TreeSnapshotWire,
}

#[derive(Deserialize)]
struct HeaderWire {
    block_number: u64,
    partial: PartialStateWire,
}

#[derive(Deserialize)]
struct LeafPreimageWire {
    slot: B256,
    value: B256,
    next_slot: B256,
    next_index: u64,
}

#[derive(Deserialize)]
struct WitnessWire {
    leaf_preimage: LeafPreimageWire,
    index: u64,
    sibling_path: Vec<B256>,
}

/// Node adapter speaking JSON-RPC 2.0 over HTTP.
pub struct HttpNode {
    client: reqwest::Client,
    url: String,
}

impl HttpNode {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Issue a request; a `null` result maps to `None`.
    async fn call_nullable<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<T>, NodeError> {
        tracing::debug!(method, "node rpc call");
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NodeError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| NodeError::Rpc(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(NodeError::Rpc(format!(
                "{method} failed with code {}: {}",
                error.code, error.message
            )));
        }
        Ok(response.result)
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<T, NodeError> {
        self.call_nullable(method, params)
            .await?
            .ok_or_else(|| NodeError::InvalidResponse(format!("{method}: missing result")))
    }
}

impl NodeClient for HttpNode {
    async fn get_logs_by_tags(&self, tags: &[B256]) -> Result<Vec<Vec<EncryptedLog>>, NodeError> {
        let hits: Vec<Vec<LogWire>> = self.call("node_getLogsByTags", (tags.to_vec(),)).await?;
        if hits.len() != tags.len() {
            return Err(NodeError::InvalidResponse(format!(
                "tag lookup returned {} entries for {} tags",
                hits.len(),
                tags.len()
            )));
        }
        Ok(hits
            .into_iter()
            .map(|logs| {
                logs.into_iter()
                    .map(|log| EncryptedLog {
                        ciphertext: log.ciphertext.to_vec(),
                        block_number: log.block_number,
                    })
                    .collect()
            })
            .collect())
    }

    async fn get_block_header(&self, block: u64) -> Result<BlockHeader, NodeError> {
        let header: HeaderWire = self.call("node_getBlockHeader", (block,)).await?;
        Ok(BlockHeader {
            block_number: header.block_number,
            public_data_tree_root: header.partial.public_data_tree.root,
            note_hash_tree_root: header.partial.note_hash_tree.root,
            nullifier_tree_root: header.partial.nullifier_tree.root,
            next_available_leaf_index: header.partial.note_hash_tree.next_available_leaf_index,
        })
    }

    async fn get_public_data_witness(
        &self,
        block: u64,
        index: B256,
    ) -> Result<PublicDataWitness, NodeError> {
        let witness: WitnessWire = self
            .call_nullable("node_getPublicDataWitness", (block, index))
            .await?
            .ok_or(NodeError::WitnessUnavailable { block, index })?;

        if witness.sibling_path.len() != PUBLIC_DATA_TREE_DEPTH {
            return Err(NodeError::InvalidResponse(format!(
                "public data sibling path has {} entries, expected {PUBLIC_DATA_TREE_DEPTH}",
                witness.sibling_path.len()
            )));
        }
        Ok(PublicDataWitness {
            leaf_preimage: PublicDataLeafPreimage {
                slot: witness.leaf_preimage.slot,
                value: witness.leaf_preimage.value,
                next_slot: witness.leaf_preimage.next_slot,
                next_index: witness.leaf_preimage.next_index,
            },
            index: witness.index,
            sibling_path: witness.sibling_path,
        })
    }
}
