//! Recursive aggregation of swap proofs.
//!
//! Level-0 artifacts are paired left to right; an odd tail combines
//! with an absent right child whose root contribution is the zero hash
//! at that level. A single swap still gets one summary wrap so the
//! final proof shape never reveals the swap count. Before every
//! combinator call the host re-checks the pairwise invariants the
//! circuit enforces (lot-root chaining, chronological ordering, shared
//! oracle), so violations surface with context instead of as opaque
//! prover failures.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;

use crate::crypto::note_encryption::silo_viewing_secret;
use crate::domain::ciphertext::TaggedLog;
use crate::domain::lot_tree::LotStateTree;
use crate::domain::merkle::{imt_root, ZeroHashes};
use crate::domain::outputs::{SwapPublicOutputs, PUBLIC_OUTPUT_LEN};
use crate::domain::tags::TaggingSecretEntry;
use crate::domain::witness::{ChildProofInput, SummaryCircuitInputs};
use crate::driver::{prove_swap, SwapArtifact, SwapRequest};
use crate::error::{AssertionKind, PnlProofError};
use crate::oracle::derive_price_index;
use crate::ports::node::NodeClient;
use crate::ports::prover::{
    CircuitInputs, CircuitKind, ProofWithInputs, ProverError, ProvingBackend, VkArtifacts,
};
use crate::scanner::{scan_tagged_logs, ScanConfig};

/// Run-level configuration: the oracle binding and the external-call
/// timeouts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Price oracle contract address, shared by every proof in a batch.
    pub oracle: B256,
    /// Storage slot of the oracle's assets map.
    pub assets_map_slot: B256,
    pub scan: ScanConfig,
    pub node_timeout: Duration,
    pub prover_timeout: Duration,
}

impl RunConfig {
    pub fn new(oracle: B256, assets_map_slot: B256) -> Self {
        Self {
            oracle,
            assets_map_slot,
            scan: ScanConfig::default(),
            node_timeout: Duration::from_secs(30),
            prover_timeout: Duration::from_secs(600),
        }
    }
}

/// Cooperative cancellation checked between proofs. Cancellation does
/// not interrupt an in-flight prover call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The run's answer: the six public fields, the final proof, and the
/// auditor-verifiable commitment to the raw ciphertext set.
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    pub outputs: SwapPublicOutputs,
    pub proof: ProofWithInputs,
    /// `imt` root over the processed ciphertext leaves; equals
    /// `outputs.root_or_leaf` by construction.
    pub ciphertext_root: B256,
    pub swap_count: usize,
}

/// Bound an external call with a timeout, surfacing the elapsed case
/// as [`PnlProofError::Timeout`].
pub(crate) async fn with_timeout<T>(
    duration: Duration,
    operation: &'static str,
    future: impl Future<Output = T>,
) -> Result<T, PnlProofError> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| PnlProofError::Timeout { operation })
}

/// One node of the aggregation tree.
struct AggregationNode {
    proof: ProofWithInputs,
    outputs: SwapPublicOutputs,
    vk: VkArtifacts,
}

impl AggregationNode {
    fn child_input(&self) -> ChildProofInput {
        ChildProofInput {
            proof: self.proof.proof.clone(),
            public_inputs: self.proof.public_inputs.clone(),
            vk_as_fields: self.vk.vk_as_fields.clone(),
            vk_hash: self.vk.vk_hash,
        }
    }
}

/// The whole pipeline behind one façade: scan, decrypt, prove each
/// swap, aggregate.
pub struct PnlProver<N, P> {
    node: N,
    prover: P,
    config: RunConfig,
}

impl<N: NodeClient, P: ProvingBackend> PnlProver<N, P> {
    pub fn new(node: N, prover: P, config: RunConfig) -> Self {
        Self {
            node,
            prover,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Derived public-data index for a token under this run's oracle.
    /// Exposed for seeding and diagnostics.
    pub fn price_index(&self, token: B256) -> B256 {
        derive_price_index(self.config.oracle, self.config.assets_map_slot, token)
    }

    /// Run the full pipeline for one tagging-secret entry.
    ///
    /// `lot_tree` is the caller's statement of pre-batch holdings (an
    /// empty tree for a fresh account); it is consumed and mutated in
    /// place across the run.
    pub async fn prove_account(
        &self,
        entry: &TaggingSecretEntry,
        master_viewing_secret: B256,
        mut lot_tree: LotStateTree,
        cancel: &CancelFlag,
    ) -> Result<FinalArtifact, PnlProofError> {
        let viewing_secret = silo_viewing_secret(master_viewing_secret, entry.app);

        let discovered = scan_tagged_logs(&self.node, entry.secret, entry.app, &self.config.scan)
            .await
            .map_err(PnlProofError::TagDiscovery)?;
        tracing::info!(hits = discovered.len(), "tag scan complete");

        // Triage: only logs that open under our viewing secret are
        // swaps of ours; other tag hits belong to other event types
        // and are dropped here, not treated as errors.
        let mut swaps = Vec::new();
        for hit in &discovered {
            let Ok(log) = TaggedLog::from_bytes(&hit.ciphertext) else {
                tracing::warn!(tag_index = hit.tag_index, "skipping malformed log buffer");
                continue;
            };
            if crate::crypto::note_encryption::decrypt_log(&log.body_fields(), viewing_secret)
                .is_none()
            {
                tracing::warn!(tag_index = hit.tag_index, "skipping undecryptable log");
                continue;
            }
            swaps.push((log, hit.block_number));
        }
        if swaps.is_empty() {
            return Err(PnlProofError::InvalidInput(
                "no decryptable swap logs discovered".into(),
            ));
        }

        let mut artifacts = Vec::with_capacity(swaps.len());
        let mut previous_block_number = 0u64;
        for (swap_index, (log, block_number)) in swaps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PnlProofError::Cancelled);
            }
            let artifact = prove_swap(
                &self.node,
                &self.prover,
                &self.config,
                &mut lot_tree,
                SwapRequest {
                    log,
                    block_number: *block_number,
                    previous_block_number,
                    swap_index,
                    viewing_secret,
                },
            )
            .await?;
            previous_block_number = artifact.block_number;
            artifacts.push(artifact);
        }

        self.aggregate(&artifacts, cancel).await
    }

    /// Fold chronologically ordered swap artifacts into the final
    /// proof.
    pub async fn aggregate(
        &self,
        artifacts: &[SwapArtifact],
        cancel: &CancelFlag,
    ) -> Result<FinalArtifact, PnlProofError> {
        if artifacts.is_empty() {
            return Err(PnlProofError::InvalidInput("no swap artifacts to aggregate".into()));
        }

        let leaves: Vec<B256> = artifacts.iter().map(|a| a.leaf).collect();
        let host_pnl_total = artifacts
            .iter()
            .try_fold(0i64, |acc, a| acc.checked_add(a.host_pnl))
            .ok_or_else(|| {
                PnlProofError::InvalidInput("summed host pnl overflows i64".into())
            })?;

        let zeros = ZeroHashes::default();
        let (leaf_vk, summary_vk) = self.bootstrap_vks(&artifacts[0], &zeros).await?;

        let mut current: Vec<AggregationNode> = artifacts
            .iter()
            .map(|artifact| AggregationNode {
                proof: artifact.proof.clone(),
                outputs: artifact.outputs,
                vk: leaf_vk.clone(),
            })
            .collect();

        let mut level = 0u32;
        loop {
            let is_final_level = current.len() <= 2;
            tracing::info!(level, nodes = current.len(), "aggregating level");

            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for (pair_index, pair) in current.chunks(2).enumerate() {
                if cancel.is_cancelled() {
                    return Err(PnlProofError::Cancelled);
                }
                let left = &pair[0];
                let right = pair.get(1);
                if let Some(right) = right {
                    check_pair_invariants(&left.outputs, &right.outputs, level, pair_index)?;
                }

                let node = self
                    .summarize(
                        left,
                        right,
                        level,
                        &zeros,
                        leaf_vk.vk_hash,
                        &summary_vk,
                        !is_final_level,
                    )
                    .await?;
                next.push(node);
            }

            if next.len() == 1 {
                let final_node = next.into_iter().next().expect("one node remains");
                return self.finish(final_node, &leaves, host_pnl_total);
            }
            current = next;
            level += 1;
        }
    }

    /// Extract the admissible verifier keys. The leaf vk comes from the
    /// first swap proof; the summary vk requires one throwaway summary
    /// run, which is sound because the combinator passes the summary vk
    /// hash through unasserted at level 0.
    async fn bootstrap_vks(
        &self,
        first: &SwapArtifact,
        zeros: &ZeroHashes,
    ) -> Result<(VkArtifacts, VkArtifacts), PnlProofError> {
        let leaf_vk = with_timeout(
            self.config.prover_timeout,
            "leaf vk extraction",
            self.prover.generate_recursive_proof_artifacts(
                CircuitKind::Swap,
                &first.proof,
                PUBLIC_OUTPUT_LEN,
            ),
        )
        .await?
        .map_err(|source| PnlProofError::Prover {
            context: "leaf vk bootstrap".into(),
            source,
        })?;

        let throwaway = AggregationNode {
            proof: first.proof.clone(),
            outputs: first.outputs,
            vk: leaf_vk.clone(),
        };
        let placeholder = VkArtifacts {
            vk_as_fields: Vec::new(),
            vk_hash: B256::ZERO,
        };
        let sample = self
            .summarize(&throwaway, None, 0, zeros, leaf_vk.vk_hash, &placeholder, true)
            .await?;

        let summary_vk = with_timeout(
            self.config.prover_timeout,
            "summary vk extraction",
            self.prover.generate_recursive_proof_artifacts(
                CircuitKind::Summary,
                &sample.proof,
                PUBLIC_OUTPUT_LEN,
            ),
        )
        .await?
        .map_err(|source| PnlProofError::Prover {
            context: "summary vk bootstrap".into(),
            source,
        })?;
        tracing::info!("verifier keys bootstrapped");

        Ok((leaf_vk, summary_vk))
    }

    /// Run the summary combinator over one pair (or odd singleton).
    #[allow(clippy::too_many_arguments)]
    async fn summarize(
        &self,
        left: &AggregationNode,
        right: Option<&AggregationNode>,
        level: u32,
        zeros: &ZeroHashes,
        leaf_vk_hash: B256,
        summary_vk: &VkArtifacts,
        recursive: bool,
    ) -> Result<AggregationNode, PnlProofError> {
        let inputs = CircuitInputs::Summary(SummaryCircuitInputs {
            left: left.child_input(),
            right: right.map(AggregationNode::child_input),
            level,
            level_zero_hash: zeros.at(level as usize),
            leaf_vk_hash,
            summary_vk_hash: summary_vk.vk_hash,
        });
        let context = || format!("summary level {level}");

        let execution = with_timeout(
            self.config.prover_timeout,
            "summary witness execution",
            self.prover.execute(&inputs),
        )
        .await?
        .map_err(|source| PnlProofError::Prover {
            context: context(),
            source,
        })?;

        let proof = with_timeout(
            self.config.prover_timeout,
            "summary proof generation",
            self.prover.generate_proof(&inputs, &execution.witness, recursive),
        )
        .await?
        .map_err(|source| PnlProofError::Prover {
            context: context(),
            source,
        })?;

        let verified = with_timeout(
            self.config.prover_timeout,
            "summary proof verification",
            self.prover.verify_proof(CircuitKind::Summary, &proof),
        )
        .await?
        .map_err(|source| PnlProofError::Prover {
            context: context(),
            source,
        })?;
        if !verified {
            return Err(PnlProofError::Prover {
                context: context(),
                source: ProverError::VerificationFailed(
                    "local verification rejected the summary proof".into(),
                ),
            });
        }

        let outputs = SwapPublicOutputs::from_fields(&execution.return_values).map_err(|e| {
            PnlProofError::Prover {
                context: context(),
                source: ProverError::ExecutionFailed(format!("summary outputs: {e}")),
            }
        })?;

        Ok(AggregationNode {
            proof,
            outputs,
            vk: summary_vk.clone(),
        })
    }

    fn finish(
        &self,
        node: AggregationNode,
        leaves: &[B256],
        host_pnl_total: i64,
    ) -> Result<FinalArtifact, PnlProofError> {
        // A single leaf still pairs with the level-0 zero hash (the
        // privacy wrap), so the committed set has width at least two.
        let ciphertext_root = if leaves.len() == 1 {
            imt_root(&[leaves[0], B256::ZERO])
        } else {
            imt_root(leaves)
        };
        if node.outputs.root_or_leaf != ciphertext_root {
            return Err(PnlProofError::assertion(
                AssertionKind::CiphertextRootMismatch,
                "final root does not commit to the processed ciphertext set",
            ));
        }
        if node.outputs.pnl_i64().ok() != Some(host_pnl_total) {
            return Err(PnlProofError::assertion(
                AssertionKind::PnlMirrorMismatch,
                format!("final pnl differs from host mirror total {host_pnl_total}"),
            ));
        }
        tracing::info!(
            swap_count = leaves.len(),
            pnl = host_pnl_total,
            "aggregation complete"
        );

        Ok(FinalArtifact {
            outputs: node.outputs,
            proof: node.proof,
            ciphertext_root,
            swap_count: leaves.len(),
        })
    }
}

/// Host-side mirror of the combinator's pairwise assertions.
fn check_pair_invariants(
    left: &SwapPublicOutputs,
    right: &SwapPublicOutputs,
    level: u32,
    pair_index: usize,
) -> Result<(), PnlProofError> {
    let at = format!("level {level} pair {pair_index}");
    if left.remaining_lot_root != right.initial_lot_root {
        return Err(PnlProofError::assertion(
            AssertionKind::RootChainMismatch,
            format!("{at}: left remaining lot root does not chain into right"),
        ));
    }
    let left_block = left
        .block_u64()
        .map_err(|e| PnlProofError::InvalidInput(format!("{at}: {e}")))?;
    let right_block = right
        .block_u64()
        .map_err(|e| PnlProofError::InvalidInput(format!("{at}: {e}")))?;
    if left_block > right_block {
        return Err(PnlProofError::assertion(
            AssertionKind::Chronology,
            format!("{at}: left block {left_block} exceeds right block {right_block}"),
        ));
    }
    if left.price_feed != right.price_feed {
        return Err(PnlProofError::assertion(
            AssertionKind::OracleMismatch,
            format!("{at}: children reference different price feeds"),
        ));
    }
    Ok(())
}
