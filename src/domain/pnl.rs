//! Canonical field encoding of the signed 64-bit PnL.
//!
//! The circuit and the host share one convention: the i64 is cast to
//! its two's-complement u64 bit pattern and embedded as a field
//! element. Decoders treat any field with the high bit set
//! (`value >= 2^63`) as `value - 2^64`.

use alloy_primitives::B256;

use crate::crypto::poseidon::{field_from_u64, field_to_u64};

/// Encode a signed PnL into its canonical field representation.
pub fn encode_pnl(pnl: i64) -> B256 {
    field_from_u64(pnl as u64)
}

/// Decode a canonically encoded PnL field. `None` if the field does not
/// fit the 64-bit range.
pub fn decode_pnl(field: B256) -> Option<i64> {
    field_to_u64(field).map(|bits| bits as i64)
}
