//! Typed circuit input records.
//!
//! The prover consumes dynamically-typed records; here each circuit
//! gets a concrete struct whose serde keys are the wire contract. Lot
//! arrays are always padded to [`MAX_LOTS`], lot-tree paths are
//! [`LOT_TREE_HEIGHT`] long, and public-data paths span the node's
//! full tree depth.

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

use super::lot_tree::LOT_TREE_HEIGHT;
use super::lots::{Lot, MAX_LOTS};
use super::outputs::PUBLIC_OUTPUT_LEN;
use crate::crypto::poseidon::field_from_u128;

/// Depth of the node's public data tree.
pub const PUBLIC_DATA_TREE_DEPTH: usize = 40;

/// A lot as the circuit sees it: both members field-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotWitness {
    pub amount: B256,
    pub cost_per_unit: B256,
}

impl From<Lot> for LotWitness {
    fn from(lot: Lot) -> Self {
        Self {
            amount: field_from_u128(lot.amount),
            cost_per_unit: field_from_u128(lot.cost_per_unit),
        }
    }
}

/// Zero-pad a lot queue to the circuit's fixed width.
pub fn lot_witnesses(lots: &[Lot; MAX_LOTS]) -> Vec<LotWitness> {
    lots.iter().copied().map(LotWitness::from).collect()
}

/// Formatted indexed-tree membership witness for one oracle price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicDataWitnessInput {
    pub leaf_slot: B256,
    pub value: B256,
    pub next_slot: B256,
    pub next_index: u64,
    pub index: u64,
    /// Sibling path of length [`PUBLIC_DATA_TREE_DEPTH`].
    pub sibling_path: Vec<B256>,
}

/// Full input record for the individual swap circuit (§ swap driver,
/// assembly step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapCircuitInputs {
    pub plaintext: Vec<B256>,
    pub ciphertext: Vec<B256>,
    pub viewing_secret: B256,
    pub block_number: u64,
    pub previous_block_number: u64,
    pub initial_lot_state_root: B256,
    pub sell_lots: Vec<LotWitness>,
    pub sell_num_lots: u64,
    pub sell_slot: u64,
    pub sell_sibling_path: Vec<B256>,
    pub buy_lots: Vec<LotWitness>,
    pub buy_num_lots: u64,
    pub buy_slot: u64,
    pub buy_sibling_path: Vec<B256>,
    pub oracle_address: B256,
    pub assets_map_slot: B256,
    pub public_data_tree_root: B256,
    pub sell_price_witness: PublicDataWitnessInput,
    pub buy_price_witness: PublicDataWitnessInput,
}

impl SwapCircuitInputs {
    /// Sanity-check the fixed array widths before crossing the prover
    /// boundary.
    pub fn validate_shape(&self) -> bool {
        self.sell_lots.len() == MAX_LOTS
            && self.buy_lots.len() == MAX_LOTS
            && self.sell_sibling_path.len() == LOT_TREE_HEIGHT
            && self.buy_sibling_path.len() == LOT_TREE_HEIGHT
            && self.sell_price_witness.sibling_path.len() == PUBLIC_DATA_TREE_DEPTH
            && self.buy_price_witness.sibling_path.len() == PUBLIC_DATA_TREE_DEPTH
    }
}

/// One child proof embedded in a summary circuit input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProofInput {
    pub proof: Bytes,
    /// The child's [`PUBLIC_OUTPUT_LEN`] public outputs.
    pub public_inputs: Vec<B256>,
    pub vk_as_fields: Vec<B256>,
    pub vk_hash: B256,
}

/// Input record for the summary combinator.
///
/// `right` is absent for an odd tail; the combinator then substitutes
/// `level_zero_hash` for the missing child's root and skips the
/// pairwise assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCircuitInputs {
    pub left: ChildProofInput,
    pub right: Option<ChildProofInput>,
    pub level: u32,
    pub level_zero_hash: B256,
    pub leaf_vk_hash: B256,
    pub summary_vk_hash: B256,
}

impl SummaryCircuitInputs {
    pub fn validate_shape(&self) -> bool {
        self.left.public_inputs.len() == PUBLIC_OUTPUT_LEN
            && self
                .right
                .as_ref()
                .is_none_or(|r| r.public_inputs.len() == PUBLIC_OUTPUT_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lot_witness_field_encoding() {
        let witness = LotWitness::from(Lot::new(1_000, 42));
        assert_eq!(witness.amount, field_from_u128(1_000));
        assert_eq!(witness.cost_per_unit, field_from_u128(42));
    }

    #[test]
    fn test_summary_inputs_serialize_keys() {
        let child = ChildProofInput {
            proof: Bytes::from(vec![1, 2, 3]),
            public_inputs: vec![B256::ZERO; PUBLIC_OUTPUT_LEN],
            vk_as_fields: vec![B256::ZERO; 4],
            vk_hash: B256::repeat_byte(0x05),
        };
        let inputs = SummaryCircuitInputs {
            left: child.clone(),
            right: None,
            level: 1,
            level_zero_hash: B256::ZERO,
            leaf_vk_hash: B256::repeat_byte(0x06),
            summary_vk_hash: B256::repeat_byte(0x07),
        };

        let json = serde_json::to_value(&inputs).unwrap();
        assert!(json.get("left").is_some());
        assert!(json.get("right").unwrap().is_null());
        assert_eq!(json.get("level").unwrap(), 1);
        assert!(json.get("level_zero_hash").is_some());
        assert!(json.get("leaf_vk_hash").is_some());
        assert!(json.get("summary_vk_hash").is_some());
        assert!(inputs.validate_shape());
    }

    #[test]
    fn test_roundtrip_child_proof() {
        let child = ChildProofInput {
            proof: Bytes::from(vec![9; 16]),
            public_inputs: vec![B256::repeat_byte(1); PUBLIC_OUTPUT_LEN],
            vk_as_fields: vec![B256::repeat_byte(2); 2],
            vk_hash: B256::repeat_byte(3),
        };
        let json = serde_json::to_string(&child).unwrap();
        let parsed: ChildProofInput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, child);
    }
}
