//! Host-side orchestration for zero-knowledge realized-PnL proofs over
//! private AMM swaps.
//!
//! The crate sits between a chain-facing node client and an external
//! proving backend. It discovers encrypted swap logs by siloed tag,
//! decrypts them with the holder's viewing secret, mirrors the swap
//! circuit's FIFO lot accounting against a local lot-state Merkle tree,
//! assembles circuit witnesses (including oracle price membership
//! proofs), and folds the per-swap proofs into one final proof through
//! a binary recursive summary combinator.
//!
//! Layout follows ports-and-adapters: `ports` holds the node and prover
//! traits, `adapters` their concrete (and mock) implementations,
//! `domain` the pure state-transition and hashing logic, and the
//! top-level modules (`scanner`, `oracle`, `driver`, `aggregator`) the
//! pipeline itself.

pub mod adapters;
pub mod aggregator;
pub mod crypto;
pub mod domain;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod ports;
pub mod scanner;

pub use aggregator::{CancelFlag, FinalArtifact, PnlProver, RunConfig};
pub use error::{AssertionKind, PnlProofError};
