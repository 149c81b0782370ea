//! The six-field public output vector shared by the individual swap
//! proof and every summary proof.

use alloy_primitives::B256;
use thiserror::Error;

use super::pnl::decode_pnl;
use crate::crypto::poseidon::field_to_u64;

/// Number of public output fields.
pub const PUBLIC_OUTPUT_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("expected {PUBLIC_OUTPUT_LEN} public outputs, got {actual}")]
    Length { actual: usize },

    #[error("pnl field exceeds the 64-bit range")]
    PnlRange,

    #[error("block number field exceeds u64")]
    BlockRange,
}

/// Ordered public outputs of a swap or summary proof.
///
/// `root_or_leaf` is the ciphertext leaf for an individual swap proof
/// and the Merkle combination of the children for a summary proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPublicOutputs {
    pub root_or_leaf: B256,
    pub pnl: B256,
    pub remaining_lot_root: B256,
    pub initial_lot_root: B256,
    pub price_feed: B256,
    pub block_number: B256,
}

impl SwapPublicOutputs {
    pub fn from_fields(fields: &[B256]) -> Result<Self, OutputError> {
        if fields.len() != PUBLIC_OUTPUT_LEN {
            return Err(OutputError::Length {
                actual: fields.len(),
            });
        }
        Ok(Self {
            root_or_leaf: fields[0],
            pnl: fields[1],
            remaining_lot_root: fields[2],
            initial_lot_root: fields[3],
            price_feed: fields[4],
            block_number: fields[5],
        })
    }

    pub fn to_fields(&self) -> [B256; PUBLIC_OUTPUT_LEN] {
        [
            self.root_or_leaf,
            self.pnl,
            self.remaining_lot_root,
            self.initial_lot_root,
            self.price_feed,
            self.block_number,
        ]
    }

    /// The signed PnL carried by this proof.
    pub fn pnl_i64(&self) -> Result<i64, OutputError> {
        decode_pnl(self.pnl).ok_or(OutputError::PnlRange)
    }

    /// The (maximum) block number carried by this proof.
    pub fn block_u64(&self) -> Result<u64, OutputError> {
        field_to_u64(self.block_number).ok_or(OutputError::BlockRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::field_from_u64;
    use crate::domain::pnl::encode_pnl;

    fn sample() -> SwapPublicOutputs {
        SwapPublicOutputs {
            root_or_leaf: B256::repeat_byte(0x01),
            pnl: encode_pnl(-250),
            remaining_lot_root: B256::repeat_byte(0x02),
            initial_lot_root: B256::repeat_byte(0x03),
            price_feed: B256::repeat_byte(0x04),
            block_number: field_from_u64(99),
        }
    }

    #[test]
    fn test_fields_roundtrip() {
        let outputs = sample();
        let fields = outputs.to_fields();
        assert_eq!(SwapPublicOutputs::from_fields(&fields).unwrap(), outputs);
    }

    #[test]
    fn test_length_checked() {
        assert_eq!(
            SwapPublicOutputs::from_fields(&[B256::ZERO; 5]),
            Err(OutputError::Length { actual: 5 })
        );
    }

    #[test]
    fn test_accessors() {
        let outputs = sample();
        assert_eq!(outputs.pnl_i64().unwrap(), -250);
        assert_eq!(outputs.block_u64().unwrap(), 99);
    }
}
