//! Tagging secrets and the two-step tag derivation.
//!
//! A tag at window index `i` is `H(secret, i)`. The node only indexes
//! the app-siloed form `H(app, tag)` — a scanner that submits base tags
//! matches nothing, so every lookup must run both steps.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::crypto::poseidon::{field_from_u64, poseidon2};

/// Whether the secret tags logs sent to us or by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagDirection {
    Inbound,
    Outbound,
}

/// One shared tagging secret scoped to a contract.
///
/// Only `(secret, app)` participates in discovery; the remaining fields
/// are metadata carried through retrieval results untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggingSecretEntry {
    pub secret: B256,
    pub app: B256,
    pub counterparty: B256,
    pub direction: TagDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Structured export of an account's tagging secrets, accepted at run
/// time. Nothing in the core persists this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingSecretExport {
    pub account: B256,
    pub secrets: Vec<TaggingSecretEntry>,
}

/// Base tag for a window index: `H(secret, index)`.
pub fn base_tag(secret: B256, index: u64) -> B256 {
    poseidon2(secret, field_from_u64(index))
}

/// App-siloed tag: `H(app, base_tag)` — the only form the node indexes.
pub fn siloed_tag(app: B256, base: B256) -> B256 {
    poseidon2(app, base)
}

/// Full derivation for a `(secret, app)` pair at a window index.
pub fn tag_at(secret: B256, app: B256, index: u64) -> B256 {
    siloed_tag(app, base_tag(secret, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_pure_function() {
        let secret = B256::repeat_byte(0x11);
        let app = B256::repeat_byte(0x22);
        assert_eq!(tag_at(secret, app, 5), tag_at(secret, app, 5));
    }

    #[test]
    fn test_tag_varies_with_index_and_app() {
        let secret = B256::repeat_byte(0x11);
        let app_a = B256::repeat_byte(0x22);
        let app_b = B256::repeat_byte(0x33);
        assert_ne!(tag_at(secret, app_a, 0), tag_at(secret, app_a, 1));
        assert_ne!(tag_at(secret, app_a, 0), tag_at(secret, app_b, 0));
    }

    #[test]
    fn test_siloed_differs_from_base() {
        let secret = B256::repeat_byte(0x11);
        let app = B256::repeat_byte(0x22);
        assert_ne!(base_tag(secret, 0), tag_at(secret, app, 0));
    }

    #[test]
    fn test_export_roundtrip() {
        let export = TaggingSecretExport {
            account: B256::repeat_byte(0x01),
            secrets: vec![TaggingSecretEntry {
                secret: B256::repeat_byte(0x02),
                app: B256::repeat_byte(0x03),
                counterparty: B256::repeat_byte(0x04),
                direction: TagDirection::Inbound,
                label: Some("amm swaps".into()),
            }],
        };
        let json = serde_json::to_string(&export).unwrap();
        let parsed: TaggingSecretExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.secrets, export.secrets);
    }
}
