//! The lot-state tree: a height-3 sparse Merkle tree with one leaf per
//! tracked token, each committing to that token's FIFO lot queue.

use alloy_primitives::B256;
use thiserror::Error;

use super::lots::{pad_lots, Lot, MAX_LOTS};
use crate::crypto::poseidon::{field_from_u128, field_from_u64, poseidon2, poseidon_hash_many};

/// Height of the lot-state tree.
pub const LOT_TREE_HEIGHT: usize = 3;

/// Number of token slots (leaves).
pub const NUM_SLOTS: usize = 1 << LOT_TREE_HEIGHT;

/// Fixed leaf-preimage length: token, num_lots, then (amount, cost) for
/// every lot slot regardless of occupancy.
pub const LOT_LEAF_PREIMAGE_LEN: usize = 2 + 2 * MAX_LOTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LotTreeError {
    #[error("lot state tree is full ({NUM_SLOTS} tokens already tracked)")]
    Full,
}

#[derive(Debug, Clone)]
struct SlotState {
    token: B256,
    lots: Vec<Lot>,
}

/// In-memory lot-state tree, mutated in place across a proving run.
///
/// Token-to-slot binding happens on first touch and never changes; an
/// unassigned slot contributes a zero leaf.
#[derive(Debug, Clone, Default)]
pub struct LotStateTree {
    slots: Vec<Option<SlotState>>,
}

impl LotStateTree {
    pub fn new() -> Self {
        Self {
            slots: vec![None; NUM_SLOTS],
        }
    }

    /// Slot index bound to `token`, if any.
    pub fn slot_of(&self, token: B256) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.token == token))
    }

    /// Bind `token` to its slot, claiming the lowest free slot on first
    /// touch. Fails when all slots are taken by other tokens.
    pub fn assign(&mut self, token: B256) -> Result<usize, LotTreeError> {
        if let Some(slot) = self.slot_of(token) {
            return Ok(slot);
        }
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(LotTreeError::Full)?;
        self.slots[free] = Some(SlotState {
            token,
            lots: Vec::new(),
        });
        Ok(free)
    }

    /// Current lots for `token`, zero-padded to [`MAX_LOTS`], with the
    /// live count and the bound slot (`None` when the token has never
    /// been touched — callers must [`assign`](Self::assign) before
    /// mutating).
    pub fn get_lots(&self, token: B256) -> ([Lot; MAX_LOTS], usize, Option<usize>) {
        match self.slot_of(token) {
            Some(slot) => {
                let state = self.slots[slot].as_ref().expect("bound slot is occupied");
                (pad_lots(&state.lots), state.lots.len(), Some(slot))
            }
            None => ([Lot::EMPTY; MAX_LOTS], 0, None),
        }
    }

    /// Replace the lot queue for `token`, assigning a slot if needed.
    pub fn set_lots(&mut self, token: B256, lots: &[Lot]) -> Result<usize, LotTreeError> {
        debug_assert!(lots.len() <= MAX_LOTS);
        let slot = self.assign(token)?;
        self.slots[slot]
            .as_mut()
            .expect("assigned slot is occupied")
            .lots = lots.to_vec();
        Ok(slot)
    }

    /// Leaf hash at `slot`: zero for unassigned slots.
    pub fn leaf(&self, slot: usize) -> B256 {
        match &self.slots[slot] {
            Some(state) => Self::hash_lots(state.token, state.lots.len(), &pad_lots(&state.lots)),
            None => B256::ZERO,
        }
    }

    fn leaves(&self) -> Vec<B256> {
        (0..NUM_SLOTS).map(|slot| self.leaf(slot)).collect()
    }

    /// Merkle root over the current leaves.
    pub fn root(&self) -> B256 {
        let mut level = self.leaves();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| poseidon2(pair[0], pair[1]))
                .collect();
        }
        level[0]
    }

    /// Bottom-up sibling path for `slot` over the current leaves.
    pub fn sibling_path(&self, slot: usize) -> [B256; LOT_TREE_HEIGHT] {
        assert!(slot < NUM_SLOTS);
        let mut level = self.leaves();
        let mut idx = slot;
        let mut path = [B256::ZERO; LOT_TREE_HEIGHT];
        for entry in path.iter_mut() {
            *entry = level[idx ^ 1];
            level = level
                .chunks(2)
                .map(|pair| poseidon2(pair[0], pair[1]))
                .collect();
            idx /= 2;
        }
        path
    }

    /// Leaf hash over the fixed 66-field preimage:
    /// `[token, num_lots, amount_0, cost_0, .., amount_31, cost_31]`.
    pub fn hash_lots(token: B256, num_lots: usize, lots: &[Lot; MAX_LOTS]) -> B256 {
        let mut preimage = Vec::with_capacity(LOT_LEAF_PREIMAGE_LEN);
        preimage.push(token);
        preimage.push(field_from_u64(num_lots as u64));
        for lot in lots {
            preimage.push(field_from_u128(lot.amount));
            preimage.push(field_from_u128(lot.cost_per_unit));
        }
        debug_assert_eq!(preimage.len(), LOT_LEAF_PREIMAGE_LEN);
        poseidon_hash_many(&preimage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merkle::root_from_sibling_path;

    fn token(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    #[test]
    fn test_assign_is_monotonic() {
        let mut tree = LotStateTree::new();
        let a = tree.assign(token(1)).unwrap();
        let b = tree.assign(token(2)).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        // Re-assigning returns the original binding.
        assert_eq!(tree.assign(token(1)).unwrap(), 0);
        assert_eq!(tree.assign(token(2)).unwrap(), 1);
    }

    #[test]
    fn test_full_tree_rejects_ninth_token() {
        let mut tree = LotStateTree::new();
        for byte in 1..=NUM_SLOTS as u8 {
            tree.assign(token(byte)).unwrap();
        }
        assert_eq!(tree.assign(token(0x99)), Err(LotTreeError::Full));
    }

    #[test]
    fn test_get_lots_unassigned() {
        let tree = LotStateTree::new();
        let (lots, num_lots, slot) = tree.get_lots(token(7));
        assert!(lots.iter().all(Lot::is_empty));
        assert_eq!(num_lots, 0);
        assert_eq!(slot, None);
    }

    #[test]
    fn test_set_lots_changes_root() {
        let mut tree = LotStateTree::new();
        let empty_root = tree.root();
        tree.set_lots(token(1), &[Lot::new(100, 10)]).unwrap();
        assert_ne!(tree.root(), empty_root);
    }

    #[test]
    fn test_sibling_path_reproduces_root() {
        let mut tree = LotStateTree::new();
        tree.set_lots(token(1), &[Lot::new(100, 10)]).unwrap();
        tree.set_lots(token(2), &[Lot::new(50, 20), Lot::new(25, 30)])
            .unwrap();
        let root = tree.root();

        for slot in 0..NUM_SLOTS {
            let path = tree.sibling_path(slot);
            assert_eq!(
                root_from_sibling_path(tree.leaf(slot), slot as u64, &path),
                root
            );
        }
    }

    #[test]
    fn test_leaf_hash_fixed_preimage_width() {
        // The preimage always spans all 32 lot slots, so the hash of an
        // explicitly padded queue equals the hash of the short queue.
        let short = pad_lots(&[Lot::new(9, 3)]);
        let long = pad_lots(&[Lot::new(9, 3), Lot::EMPTY, Lot::EMPTY]);
        assert_eq!(
            LotStateTree::hash_lots(token(1), 1, &short),
            LotStateTree::hash_lots(token(1), 1, &long)
        );
        // But num_lots participates in the hash.
        assert_ne!(
            LotStateTree::hash_lots(token(1), 1, &short),
            LotStateTree::hash_lots(token(1), 2, &short)
        );
    }

    #[test]
    fn test_hash_lots_matches_tree_leaf() {
        let mut tree = LotStateTree::new();
        let lots = [Lot::new(100, 10), Lot::new(7, 8)];
        let slot = tree.set_lots(token(4), &lots).unwrap();
        assert_eq!(
            tree.leaf(slot),
            LotStateTree::hash_lots(token(4), 2, &pad_lots(&lots))
        );
    }
}
