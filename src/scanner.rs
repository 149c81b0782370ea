//! Tag-driven discovery of encrypted logs.
//!
//! The scanner walks a recipient's tagging-secret windows, derives the
//! app-siloed tag for every index in the window, and asks the node for
//! all of them in one batched query. The scan stops at the first
//! window in which every tag came back empty, capped by `max_indices`.
//!
//! Both derivation steps are load-bearing: the node indexes only the
//! siloed form `H(app, H(secret, index))`, so submitting base tags
//! matches nothing.

use std::time::Duration;

use alloy_primitives::B256;

use crate::domain::tags::tag_at;
use crate::ports::node::{NodeClient, NodeError};

/// Window-walk parameters for one `(secret, app)` pair.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// First tag index to derive.
    pub start_index: u64,
    /// Hard cap on scanned indices; truncation past it is silent.
    pub max_indices: u64,
    /// Tags per batched node query.
    pub batch_size: u64,
    /// Per-request timeout for the batched lookups.
    pub request_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            max_indices: 256,
            batch_size: 16,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One tag hit, carrying its provenance through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLog {
    pub tag_index: u64,
    pub siloed_tag: B256,
    pub ciphertext: Vec<u8>,
    pub block_number: u64,
}

/// Scan a `(secret, app)` pair's tag windows and return every hit in
/// tag-index order. Hits under the same tag keep their on-chain order.
pub async fn scan_tagged_logs<N: NodeClient>(
    node: &N,
    secret: B256,
    app: B256,
    config: &ScanConfig,
) -> Result<Vec<DiscoveredLog>, NodeError> {
    let mut discovered = Vec::new();
    let end = config.start_index.saturating_add(config.max_indices);
    let mut window_start = config.start_index;

    while window_start < end {
        let window_end = end.min(window_start.saturating_add(config.batch_size));
        let indices: Vec<u64> = (window_start..window_end).collect();
        let tags: Vec<B256> = indices
            .iter()
            .map(|&index| tag_at(secret, app, index))
            .collect();

        let hits = tokio::time::timeout(config.request_timeout, node.get_logs_by_tags(&tags))
            .await
            .map_err(|_| NodeError::Rpc("tag lookup timed out".into()))??;
        if hits.len() != tags.len() {
            return Err(NodeError::InvalidResponse(format!(
                "tag lookup returned {} entries for {} tags",
                hits.len(),
                tags.len()
            )));
        }

        let mut window_hits = 0usize;
        for ((index, tag), logs) in indices.iter().zip(&tags).zip(hits) {
            for log in logs {
                window_hits += 1;
                discovered.push(DiscoveredLog {
                    tag_index: *index,
                    siloed_tag: *tag,
                    ciphertext: log.ciphertext,
                    block_number: log.block_number,
                });
            }
        }
        tracing::debug!(
            window_start,
            window_end,
            hits = window_hits,
            "scanned tag window"
        );

        if window_hits == 0 {
            break;
        }
        window_start = window_end;
    }

    Ok(discovered)
}
