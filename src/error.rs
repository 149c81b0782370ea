//! Pipeline-level error taxonomy.
//!
//! Port errors (`NodeError`, `ProverError`) bubble up wrapped in a
//! variant that records where in the run they happened: which swap, or
//! which aggregation level and pair.

use alloy_primitives::B256;
use thiserror::Error;

use crate::ports::node::NodeError;
use crate::ports::prover::ProverError;

/// Which mirrored circuit assertion was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// Swap block numbers out of chronological order.
    Chronology,
    /// Two proofs in one batch reference different price feeds.
    OracleMismatch,
    /// A sell exceeded the tracked FIFO balance.
    FifoUnderConsumption,
    /// `left.remaining_lot_state_root != right.initial_lot_state_root`.
    RootChainMismatch,
    /// A child proof carried an inadmissible verifier key.
    VkMismatch,
    /// The prover's PnL output disagrees with the host mirror.
    PnlMirrorMismatch,
    /// The final root does not commit to the processed ciphertext set.
    CiphertextRootMismatch,
}

#[derive(Debug, Error)]
pub enum PnlProofError {
    #[error("tag discovery failed: {0}")]
    TagDiscovery(#[source] NodeError),

    #[error("swap {swap_index}: ciphertext did not decrypt under the viewing secret")]
    Decrypt { swap_index: usize },

    #[error("swap {swap_index}: lot state tree is full (token {token})")]
    LotTreeFull { swap_index: usize, token: B256 },

    #[error("assertion violated ({kind:?}): {detail}")]
    Assertion { kind: AssertionKind, detail: String },

    #[error("swap {swap_index}: oracle witness unavailable: {source}")]
    OracleWitness {
        swap_index: usize,
        #[source]
        source: NodeError,
    },

    #[error("swap {swap_index}: node error: {source}")]
    Node {
        swap_index: usize,
        #[source]
        source: NodeError,
    },

    #[error("{context}: prover error: {source}")]
    Prover {
        /// Which proof was being produced, e.g. `swap 3` or `level 1 pair 0`.
        context: String,
        #[source]
        source: ProverError,
    },

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("run cancelled between swaps")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PnlProofError {
    pub fn assertion(kind: AssertionKind, detail: impl Into<String>) -> Self {
        Self::Assertion {
            kind,
            detail: detail.into(),
        }
    }
}
