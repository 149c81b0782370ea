//! On-chain encrypted log buffers and their field-level views.
//!
//! A discovered log buffer is `[tag (32 bytes) | body]`. The tag is
//! only meaningful during discovery; the body encodes the
//! [`MESSAGE_CIPHERTEXT_LEN`] ciphertext fields that are both hashed
//! into the per-swap Merkle leaf and handed to the circuit.

use alloy_primitives::B256;
use thiserror::Error;

use crate::crypto::note_encryption::{MESSAGE_CIPHERTEXT_LEN, PLAINTEXT_LOG_LEN};
use crate::crypto::poseidon::{
    field_to_u128, poseidon_hash_with_separator, CIPHERTEXT_LEAF_SEPARATOR,
};

/// Expected byte length of a raw log buffer: tag plus body fields.
pub const TAGGED_LOG_LEN: usize = 32 + MESSAGE_CIPHERTEXT_LEN * 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LogFormatError {
    #[error("log buffer is {actual} bytes, expected {TAGGED_LOG_LEN}")]
    Length { actual: usize },
}

/// A raw encrypted log as returned by the node's tag index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLog {
    pub tag: B256,
    pub body: Vec<u8>,
}

impl TaggedLog {
    /// Split a raw buffer into tag and body.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, LogFormatError> {
        if buffer.len() != TAGGED_LOG_LEN {
            return Err(LogFormatError::Length {
                actual: buffer.len(),
            });
        }
        Ok(Self {
            tag: B256::from_slice(&buffer[..32]),
            body: buffer[32..].to_vec(),
        })
    }

    /// The body as its [`MESSAGE_CIPHERTEXT_LEN`] field elements.
    pub fn body_fields(&self) -> Vec<B256> {
        chunk_fields(&self.body)
    }

    /// The Merkle leaf committing this log into the final proof root.
    pub fn leaf(&self) -> B256 {
        ciphertext_leaf(&self.body_fields())
    }
}

/// Chunk a byte buffer into 32-byte big-endian field elements, zero
/// right-padding the final chunk.
pub fn chunk_fields(buffer: &[u8]) -> Vec<B256> {
    buffer
        .chunks(32)
        .map(|chunk| {
            let mut limb = [0u8; 32];
            limb[..chunk.len()].copy_from_slice(chunk);
            B256::from(limb)
        })
        .collect()
}

/// `H_s(ciphertext_fields, 0)`: the per-swap leaf hash.
pub fn ciphertext_leaf(fields: &[B256]) -> B256 {
    poseidon_hash_with_separator(fields, CIPHERTEXT_LEAF_SEPARATOR)
}

/// Decrypted swap fields the pipeline cares about (plaintext indices
/// 2 through 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlaintext {
    pub token_in: B256,
    pub token_out: B256,
    pub amount_in: u128,
    pub amount_out: u128,
    pub is_exact_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaintextError {
    #[error("plaintext has {actual} fields, expected {PLAINTEXT_LOG_LEN}")]
    Length { actual: usize },

    #[error("amount field at index {index} exceeds u128")]
    AmountRange { index: usize },

    #[error("is_exact_input field is not a boolean")]
    Flag,
}

impl SwapPlaintext {
    pub fn from_fields(fields: &[B256]) -> Result<Self, PlaintextError> {
        if fields.len() != PLAINTEXT_LOG_LEN {
            return Err(PlaintextError::Length {
                actual: fields.len(),
            });
        }
        let amount_in =
            field_to_u128(fields[4]).ok_or(PlaintextError::AmountRange { index: 4 })?;
        let amount_out =
            field_to_u128(fields[5]).ok_or(PlaintextError::AmountRange { index: 5 })?;
        let is_exact_input = match field_to_u128(fields[6]) {
            Some(0) => false,
            Some(1) => true,
            _ => return Err(PlaintextError::Flag),
        };
        Ok(Self {
            token_in: fields[2],
            token_out: fields[3],
            amount_in,
            amount_out,
            is_exact_input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::field_from_u128;

    fn raw_log() -> Vec<u8> {
        let mut buffer = vec![0u8; TAGGED_LOG_LEN];
        buffer[..32].copy_from_slice(B256::repeat_byte(0xAB).as_slice());
        buffer[32] = 0x00;
        buffer[33] = 0x17; // first body field, high byte reserved
        buffer
    }

    #[test]
    fn test_from_bytes_splits_tag_and_body() {
        let log = TaggedLog::from_bytes(&raw_log()).unwrap();
        assert_eq!(log.tag, B256::repeat_byte(0xAB));
        assert_eq!(log.body.len(), MESSAGE_CIPHERTEXT_LEN * 32);
        assert_eq!(log.body_fields().len(), MESSAGE_CIPHERTEXT_LEN);
    }

    #[test]
    fn test_from_bytes_rejects_bad_length() {
        assert_eq!(
            TaggedLog::from_bytes(&[0u8; 40]),
            Err(LogFormatError::Length { actual: 40 })
        );
    }

    #[test]
    fn test_leaf_stable_across_sessions() {
        let log = TaggedLog::from_bytes(&raw_log()).unwrap();
        assert_eq!(log.leaf(), ciphertext_leaf(&log.body_fields()));
        assert_eq!(log.leaf(), TaggedLog::from_bytes(&raw_log()).unwrap().leaf());
    }

    #[test]
    fn test_chunk_fields_right_pads() {
        let fields = chunk_fields(&[0x01, 0x02]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].as_slice()[0], 0x01);
        assert_eq!(fields[0].as_slice()[1], 0x02);
        assert!(fields[0].as_slice()[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_swap_plaintext_extraction() {
        let fields = vec![
            B256::ZERO,
            B256::ZERO,
            B256::repeat_byte(0x0a),
            B256::repeat_byte(0x0b),
            field_from_u128(123),
            field_from_u128(456),
            field_from_u128(1),
        ];
        let swap = SwapPlaintext::from_fields(&fields).unwrap();
        assert_eq!(swap.token_in, B256::repeat_byte(0x0a));
        assert_eq!(swap.token_out, B256::repeat_byte(0x0b));
        assert_eq!(swap.amount_in, 123);
        assert_eq!(swap.amount_out, 456);
        assert!(swap.is_exact_input);
    }

    #[test]
    fn test_swap_plaintext_rejects_bad_flag() {
        let mut fields = vec![B256::ZERO; PLAINTEXT_LOG_LEN];
        fields[6] = field_from_u128(2);
        assert_eq!(
            SwapPlaintext::from_fields(&fields),
            Err(PlaintextError::Flag)
        );
    }
}
