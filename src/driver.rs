//! Per-swap proving driver.
//!
//! Drives one decryptable log end to end: plaintext extraction,
//! chronology check, the sell-then-buy lot-state transition (with
//! sibling paths captured around each leaf write, exactly as the
//! circuit consumes them), oracle witness assembly, prover invocation,
//! local verification, and the host-mirror cross-checks.

use alloy_primitives::B256;

use crate::aggregator::{with_timeout, RunConfig};
use crate::crypto::note_encryption::decrypt_log;
use crate::domain::ciphertext::{ciphertext_leaf, SwapPlaintext, TaggedLog};
use crate::domain::lot_tree::LotStateTree;
use crate::domain::lots::{append_lot, consume_fifo, LotError};
use crate::domain::outputs::{SwapPublicOutputs, PUBLIC_OUTPUT_LEN};
use crate::domain::witness::{lot_witnesses, PublicDataWitnessInput, SwapCircuitInputs};
use crate::error::{AssertionKind, PnlProofError};
use crate::oracle::{fetch_price_witness, PriceWitness};
use crate::ports::node::NodeClient;
use crate::ports::prover::{
    CircuitInputs, CircuitKind, ProofWithInputs, ProverError, ProvingBackend,
};

/// One swap to prove.
#[derive(Debug, Clone)]
pub struct SwapRequest<'a> {
    pub log: &'a TaggedLog,
    pub block_number: u64,
    pub previous_block_number: u64,
    /// Position of this swap in the batch, for error context.
    pub swap_index: usize,
    /// App-siloed viewing secret of the holder.
    pub viewing_secret: B256,
}

/// The proved swap: its proof, public outputs, and the host-side
/// mirror values used for cross-checking downstream.
#[derive(Debug, Clone)]
pub struct SwapArtifact {
    pub proof: ProofWithInputs,
    pub outputs: SwapPublicOutputs,
    pub leaf: B256,
    pub host_pnl: i64,
    pub block_number: u64,
}

fn format_price_witness(price: &PriceWitness) -> PublicDataWitnessInput {
    PublicDataWitnessInput {
        leaf_slot: price.witness.leaf_preimage.slot,
        value: price.witness.leaf_preimage.value,
        next_slot: price.witness.leaf_preimage.next_slot,
        next_index: price.witness.leaf_preimage.next_index,
        index: price.witness.index,
        sibling_path: price.witness.sibling_path.clone(),
    }
}

fn map_lot_error(err: LotError, swap_index: usize) -> PnlProofError {
    match err {
        LotError::UnderConsumption { .. } => PnlProofError::assertion(
            AssertionKind::FifoUnderConsumption,
            format!("swap {swap_index}: {err}"),
        ),
        LotError::TooManyLots | LotError::PnlOverflow => {
            PnlProofError::InvalidInput(format!("swap {swap_index}: {err}"))
        }
    }
}

/// Prove one swap, advancing `lot_tree` from its current root to the
/// post-swap root.
pub async fn prove_swap<N: NodeClient, P: ProvingBackend>(
    node: &N,
    prover: &P,
    config: &RunConfig,
    lot_tree: &mut LotStateTree,
    request: SwapRequest<'_>,
) -> Result<SwapArtifact, PnlProofError> {
    let swap_index = request.swap_index;

    // Decrypt. The caller only hands us logs that opened during
    // triage, so failure here is fatal.
    let ciphertext_fields = request.log.body_fields();
    let plaintext = decrypt_log(&ciphertext_fields, request.viewing_secret)
        .ok_or(PnlProofError::Decrypt { swap_index })?;
    let swap = SwapPlaintext::from_fields(&plaintext)
        .map_err(|e| PnlProofError::InvalidInput(format!("swap {swap_index}: {e}")))?;

    // Chronology, mirrored in the circuit.
    if request.block_number < request.previous_block_number {
        return Err(PnlProofError::assertion(
            AssertionKind::Chronology,
            format!(
                "swap {swap_index} at block {} precedes block {}",
                request.block_number, request.previous_block_number
            ),
        ));
    }

    // Token-to-slot binding, fixed on first touch.
    let sell_slot = lot_tree
        .assign(swap.token_in)
        .map_err(|_| PnlProofError::LotTreeFull {
            swap_index,
            token: swap.token_in,
        })?;
    let buy_slot = lot_tree
        .assign(swap.token_out)
        .map_err(|_| PnlProofError::LotTreeFull {
            swap_index,
            token: swap.token_out,
        })?;

    // Block header and the two price witnesses.
    let header = with_timeout(
        config.node_timeout,
        "block header fetch",
        node.get_block_header(request.block_number),
    )
    .await?
    .map_err(|source| PnlProofError::Node { swap_index, source })?;

    let sell_price = with_timeout(
        config.node_timeout,
        "sell price witness fetch",
        fetch_price_witness(
            node,
            request.block_number,
            config.oracle,
            config.assets_map_slot,
            swap.token_in,
            swap_index,
        ),
    )
    .await??;
    let buy_price = with_timeout(
        config.node_timeout,
        "buy price witness fetch",
        fetch_price_witness(
            node,
            request.block_number,
            config.oracle,
            config.assets_map_slot,
            swap.token_out,
            swap_index,
        ),
    )
    .await??;

    tracing::info!(
        swap_index,
        block = request.block_number,
        sell_price = sell_price.price,
        buy_price = buy_price.price,
        "proving swap"
    );

    // Snapshot the pre-state the circuit consumes.
    let initial_root = lot_tree.root();

    // Sell side: capture, consume FIFO, compact, write back.
    let (sell_lots_padded, sell_num_lots, _) = lot_tree.get_lots(swap.token_in);
    let sell_sibling_path = lot_tree.sibling_path(sell_slot);
    let mut sell_lots = sell_lots_padded[..sell_num_lots].to_vec();
    let host_pnl = consume_fifo(&mut sell_lots, swap.amount_in, u128::from(sell_price.price))
        .map_err(|e| map_lot_error(e, swap_index))?;
    lot_tree
        .set_lots(swap.token_in, &sell_lots)
        .map_err(|_| PnlProofError::LotTreeFull {
            swap_index,
            token: swap.token_in,
        })?;

    // Buy side: capture against the post-sell tree, append, write back.
    let (buy_lots_padded, buy_num_lots, _) = lot_tree.get_lots(swap.token_out);
    let buy_sibling_path = lot_tree.sibling_path(buy_slot);
    let mut buy_lots = buy_lots_padded[..buy_num_lots].to_vec();
    append_lot(&mut buy_lots, swap.amount_out, u128::from(buy_price.price))
        .map_err(|e| map_lot_error(e, swap_index))?;
    lot_tree
        .set_lots(swap.token_out, &buy_lots)
        .map_err(|_| PnlProofError::LotTreeFull {
            swap_index,
            token: swap.token_out,
        })?;

    let remaining_root = lot_tree.root();
    let leaf = ciphertext_leaf(&ciphertext_fields);

    let inputs = CircuitInputs::Swap(SwapCircuitInputs {
        plaintext,
        ciphertext: ciphertext_fields,
        viewing_secret: request.viewing_secret,
        block_number: request.block_number,
        previous_block_number: request.previous_block_number,
        initial_lot_state_root: initial_root,
        sell_lots: lot_witnesses(&sell_lots_padded),
        sell_num_lots: sell_num_lots as u64,
        sell_slot: sell_slot as u64,
        sell_sibling_path: sell_sibling_path.to_vec(),
        buy_lots: lot_witnesses(&buy_lots_padded),
        buy_num_lots: buy_num_lots as u64,
        buy_slot: buy_slot as u64,
        buy_sibling_path: buy_sibling_path.to_vec(),
        oracle_address: config.oracle,
        assets_map_slot: config.assets_map_slot,
        public_data_tree_root: header.public_data_tree_root,
        sell_price_witness: format_price_witness(&sell_price),
        buy_price_witness: format_price_witness(&buy_price),
    });

    let prover_context = || format!("swap {swap_index}");

    let execution = with_timeout(
        config.prover_timeout,
        "swap witness execution",
        prover.execute(&inputs),
    )
    .await?
    .map_err(|source| PnlProofError::Prover {
        context: prover_context(),
        source,
    })?;

    let proof = with_timeout(
        config.prover_timeout,
        "swap proof generation",
        prover.generate_proof(&inputs, &execution.witness, true),
    )
    .await?
    .map_err(|source| PnlProofError::Prover {
        context: prover_context(),
        source,
    })?;

    // Local verification self-check; never return an unverified proof.
    let verified = with_timeout(
        config.prover_timeout,
        "swap proof verification",
        prover.verify_proof(CircuitKind::Swap, &proof),
    )
    .await?
    .map_err(|source| PnlProofError::Prover {
        context: prover_context(),
        source,
    })?;
    if !verified {
        return Err(PnlProofError::Prover {
            context: prover_context(),
            source: ProverError::VerificationFailed("local verification rejected the proof".into()),
        });
    }

    let outputs = SwapPublicOutputs::from_fields(&execution.return_values).map_err(|e| {
        PnlProofError::Prover {
            context: prover_context(),
            source: ProverError::ExecutionFailed(format!(
                "expected {PUBLIC_OUTPUT_LEN} public outputs: {e}"
            )),
        }
    })?;

    // The host mirror and the circuit must agree to the last bit.
    if outputs.pnl_i64().ok() != Some(host_pnl) {
        return Err(PnlProofError::assertion(
            AssertionKind::PnlMirrorMismatch,
            format!("swap {swap_index}: circuit pnl differs from host mirror {host_pnl}"),
        ));
    }
    if outputs.remaining_lot_root != remaining_root || outputs.initial_lot_root != initial_root {
        return Err(PnlProofError::assertion(
            AssertionKind::RootChainMismatch,
            format!("swap {swap_index}: circuit lot roots differ from the host tree"),
        ));
    }
    if outputs.root_or_leaf != leaf {
        return Err(PnlProofError::assertion(
            AssertionKind::RootChainMismatch,
            format!("swap {swap_index}: circuit leaf differs from the ciphertext hash"),
        ));
    }

    Ok(SwapArtifact {
        proof,
        outputs,
        leaf,
        host_pnl,
        block_number: request.block_number,
    })
}
