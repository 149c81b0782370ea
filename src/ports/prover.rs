//! Port for the zero-knowledge proving backend.
//!
//! Implementations:
//! - An out-of-process prover service for the real circuits
//! - `MockProver`, which mirrors both circuits' semantics in host code

use std::future::Future;

use alloy_primitives::{Bytes, B256};

use crate::domain::witness::{SummaryCircuitInputs, SwapCircuitInputs};

/// Which circuit a proof belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitKind {
    Swap,
    Summary,
}

/// Typed input record for either circuit. Serialized to the backend's
/// wire format only at the adapter boundary.
#[derive(Debug, Clone)]
pub enum CircuitInputs {
    Swap(SwapCircuitInputs),
    Summary(SummaryCircuitInputs),
}

impl CircuitInputs {
    pub fn kind(&self) -> CircuitKind {
        match self {
            CircuitInputs::Swap(_) => CircuitKind::Swap,
            CircuitInputs::Summary(_) => CircuitKind::Summary,
        }
    }
}

/// Result of executing a circuit without proving: the witness blob and
/// the declared public outputs.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub witness: Bytes,
    pub return_values: Vec<B256>,
}

/// A proof and the public inputs it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofWithInputs {
    pub proof: Bytes,
    pub public_inputs: Vec<B256>,
}

/// Verifier-key artifacts for recursive verification of a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VkArtifacts {
    pub vk_as_fields: Vec<B256>,
    pub vk_hash: B256,
}

/// Port for witness execution and proof generation.
pub trait ProvingBackend: Send + Sync {
    /// Run the circuit on the inputs and return its public outputs.
    fn execute(
        &self,
        inputs: &CircuitInputs,
    ) -> impl Future<Output = Result<ExecutionResult, ProverError>> + Send;

    /// Generate a proof from an executed witness. `recursive` targets
    /// the in-circuit verifier rather than the final on-chain one.
    fn generate_proof(
        &self,
        inputs: &CircuitInputs,
        witness: &Bytes,
        recursive: bool,
    ) -> impl Future<Output = Result<ProofWithInputs, ProverError>> + Send;

    /// Verify a proof against the named circuit's verifier key.
    fn verify_proof(
        &self,
        kind: CircuitKind,
        proof: &ProofWithInputs,
    ) -> impl Future<Output = Result<bool, ProverError>> + Send;

    /// Extract the verifier-key fields and hash needed to feed this
    /// proof into a recursive verifier.
    fn generate_recursive_proof_artifacts(
        &self,
        kind: CircuitKind,
        proof: &ProofWithInputs,
        num_public_inputs: usize,
    ) -> impl Future<Output = Result<VkArtifacts, ProverError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("witness execution failed: {0}")]
    ExecutionFailed(String),

    #[error("proof generation failed: {0}")]
    ProofFailed(String),

    #[error("proof verification errored: {0}")]
    VerificationFailed(String),

    #[error("vk artifact extraction failed: {0}")]
    ArtifactsFailed(String),

    #[error("witness serialization error: {0}")]
    WitnessSerialization(String),
}
