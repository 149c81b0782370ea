//! FIFO acquisition lots and the sell/buy state transitions.
//!
//! This is the host mirror of the swap circuit's lot arithmetic. Any
//! divergence from the in-circuit rules (consumption order, compaction,
//! `num_lots` accounting) breaks lot-state-root chaining for the next
//! swap, so the functions here are the single source of truth for both
//! the driver and the mock backend.

use thiserror::Error;

/// Maximum number of open lots per token.
pub const MAX_LOTS: usize = 32;

/// One acquisition record: how much was bought and at what unit cost.
///
/// A present lot has `amount > 0`; an empty lot is all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lot {
    pub amount: u128,
    pub cost_per_unit: u128,
}

impl Lot {
    pub const EMPTY: Lot = Lot {
        amount: 0,
        cost_per_unit: 0,
    };

    pub fn new(amount: u128, cost_per_unit: u128) -> Self {
        Self {
            amount,
            cost_per_unit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LotError {
    #[error("sell of {requested} exceeds tracked balance {available}")]
    UnderConsumption { requested: u128, available: u128 },

    #[error("token already holds {MAX_LOTS} lots")]
    TooManyLots,

    #[error("pnl term exceeds the signed 64-bit range")]
    PnlOverflow,
}

/// Consume `amount` units oldest-first at the given oracle sell price.
///
/// Returns the realized PnL in signed 64-bit units and leaves `lots`
/// compacted: consumed-empty entries removed, survivors left-shifted,
/// relative order preserved.
pub fn consume_fifo(lots: &mut Vec<Lot>, amount: u128, sell_price: u128) -> Result<i64, LotError> {
    let mut remaining = amount;
    let mut pnl: i64 = 0;

    for lot in lots.iter_mut() {
        if remaining == 0 {
            break;
        }
        let consumed = remaining.min(lot.amount);
        let term = i128::try_from(consumed)
            .ok()
            .and_then(|c| {
                let diff = i128::try_from(sell_price).ok()? - i128::try_from(lot.cost_per_unit).ok()?;
                c.checked_mul(diff)
            })
            .and_then(|t| i64::try_from(t).ok())
            .ok_or(LotError::PnlOverflow)?;

        pnl = pnl.checked_add(term).ok_or(LotError::PnlOverflow)?;
        lot.amount -= consumed;
        remaining -= consumed;
    }

    if remaining > 0 {
        return Err(LotError::UnderConsumption {
            requested: amount,
            available: amount - remaining,
        });
    }

    lots.retain(|lot| !lot.is_empty());
    Ok(pnl)
}

/// Append a freshly acquired lot at the end of the FIFO queue.
pub fn append_lot(lots: &mut Vec<Lot>, amount: u128, cost_per_unit: u128) -> Result<(), LotError> {
    if lots.len() >= MAX_LOTS {
        return Err(LotError::TooManyLots);
    }
    lots.push(Lot::new(amount, cost_per_unit));
    Ok(())
}

/// Zero-pad a lot slice to the fixed circuit width.
pub fn pad_lots(lots: &[Lot]) -> [Lot; MAX_LOTS] {
    debug_assert!(lots.len() <= MAX_LOTS);
    let mut padded = [Lot::EMPTY; MAX_LOTS];
    padded[..lots.len()].copy_from_slice(lots);
    padded
}
