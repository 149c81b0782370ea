//! Encrypted swap-log bodies: Grumpkin ECDH, Poseidon key derivation,
//! AES-128-GCM payload.
//!
//! A log body is [`MESSAGE_CIPHERTEXT_LEN`] field elements. Field 0
//! carries the x-coordinate of the sender's ephemeral Grumpkin point;
//! the remaining fields pack the AEAD blob at 31 useful bytes per field
//! (the high byte of every field is reserved so the value stays below
//! the BN254 modulus). The recipient recovers the ephemeral point from
//! its x-coordinate by trying both y-parity preimages; the AEAD tag
//! rejects the wrong one.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, Key, KeyInit, Nonce};
use alloy_primitives::B256;
use ark_ec::{CurveGroup, PrimeGroup};
use ark_ff::PrimeField;
use ark_grumpkin::{Affine, Fq as GrumpkinBase, Fr as GrumpkinScalar, Projective};
use ark_std::rand::Rng;
use ark_std::UniformRand;

use super::poseidon::{b256_to_fr, domain_tag, fr_to_b256, poseidon2};

/// Number of field elements in an encrypted log body.
pub const MESSAGE_CIPHERTEXT_LEN: usize = 17;

/// Number of plaintext field elements in a swap log.
pub const PLAINTEXT_LOG_LEN: usize = 7;

/// Useful bytes carried per packed field element.
pub const BYTES_PER_FIELD: usize = 31;

/// AEAD blob length: the serialized plaintext plus the 16-byte tag.
const AEAD_BLOB_LEN: usize = PLAINTEXT_LOG_LEN * 32 + 16;

/// Packed data fields following the ephemeral x-coordinate.
const BODY_DATA_FIELDS: usize = MESSAGE_CIPHERTEXT_LEN - 1;

/// Derive the app-siloed viewing secret from the master viewing secret
/// and the emitting contract address.
pub fn silo_viewing_secret(master_secret: B256, app: B256) -> B256 {
    poseidon2(master_secret, app)
}

/// Viewing key pair for a siloed secret: the scalar and its public point.
pub fn viewing_keypair(siloed_secret: B256) -> (GrumpkinScalar, Affine) {
    let sk = GrumpkinScalar::from_be_bytes_mod_order(siloed_secret.as_ref());
    let pk = (Projective::generator() * sk).into_affine();
    (sk, pk)
}

/// Symmetric key and nonce from the ECDH shared point's x-coordinate.
fn derive_key_nonce(shared_x: B256) -> ([u8; 16], [u8; 12]) {
    let key_field = poseidon2(domain_tag("pnl_log.aead_key"), shared_x);
    let nonce_field = poseidon2(domain_tag("pnl_log.aead_nonce"), shared_x);

    let mut key = [0u8; 16];
    key.copy_from_slice(&key_field.as_slice()[16..]);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_field.as_slice()[20..]);
    (key, nonce)
}

/// Pack a byte blob into field elements, 31 bytes per field, high byte
/// zero, zero right-padding in the final field.
fn pack_bytes(bytes: &[u8], num_fields: usize) -> Vec<B256> {
    assert!(
        bytes.len() <= num_fields * BYTES_PER_FIELD,
        "blob of {} bytes does not fit {} fields",
        bytes.len(),
        num_fields
    );
    let mut fields = Vec::with_capacity(num_fields);
    for i in 0..num_fields {
        let start = i * BYTES_PER_FIELD;
        let end = bytes.len().min(start + BYTES_PER_FIELD);
        let mut limb = [0u8; 32];
        if start < bytes.len() {
            limb[1..1 + (end - start)].copy_from_slice(&bytes[start..end]);
        }
        fields.push(B256::from(limb));
    }
    fields
}

/// Inverse of [`pack_bytes`]: skip the high byte of each field.
fn unpack_bytes(fields: &[B256], len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(fields.len() * BYTES_PER_FIELD);
    for field in fields {
        bytes.extend_from_slice(&field.as_slice()[1..]);
    }
    bytes.truncate(len);
    bytes
}

/// Encrypt a swap log to a recipient's siloed viewing public key.
///
/// Returns the [`MESSAGE_CIPHERTEXT_LEN`] body fields. Used by tests
/// and the in-memory node to fabricate on-chain logs; the contract side
/// performs the same construction.
pub fn encrypt_swap_log<R: Rng>(
    plaintext: &[B256],
    recipient: &Affine,
    rng: &mut R,
) -> Vec<B256> {
    assert_eq!(plaintext.len(), PLAINTEXT_LOG_LEN, "plaintext field count");

    let eph_sk = GrumpkinScalar::rand(rng);
    let eph_pk = (Projective::generator() * eph_sk).into_affine();

    let shared = (Projective::from(*recipient) * eph_sk).into_affine();
    let (key, nonce) = derive_key_nonce(fr_to_b256(shared.x));

    let mut blob = Vec::with_capacity(PLAINTEXT_LOG_LEN * 32);
    for field in plaintext {
        blob.extend_from_slice(field.as_slice());
    }

    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&key));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), blob.as_slice())
        .expect("AES-GCM encryption is infallible for in-range lengths");
    debug_assert_eq!(sealed.len(), AEAD_BLOB_LEN);

    let mut body = Vec::with_capacity(MESSAGE_CIPHERTEXT_LEN);
    body.push(fr_to_b256(eph_pk.x));
    body.extend(pack_bytes(&sealed, BODY_DATA_FIELDS));
    body
}

/// Attempt to decrypt a log body with the app-siloed viewing secret.
///
/// Returns the plaintext field elements, or `None` when the body is
/// malformed or does not open under this secret (a log addressed to a
/// different recipient or a different event type).
pub fn decrypt_log(body: &[B256], siloed_viewing_secret: B256) -> Option<Vec<B256>> {
    if body.len() != MESSAGE_CIPHERTEXT_LEN {
        return None;
    }

    let sk = GrumpkinScalar::from_be_bytes_mod_order(siloed_viewing_secret.as_ref());
    let eph_x = GrumpkinBase::from_be_bytes_mod_order(body[0].as_ref());
    let sealed = unpack_bytes(&body[1..], AEAD_BLOB_LEN);

    // The x-coordinate admits two y preimages; the AEAD tag picks the
    // one the sender used.
    for greatest in [false, true] {
        let Some(eph_pk) = Affine::get_point_from_x_unchecked(eph_x, greatest) else {
            continue;
        };
        let shared = (Projective::from(eph_pk) * sk).into_affine();
        let (key, nonce) = derive_key_nonce(fr_to_b256(shared.x));

        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&key));
        if let Ok(blob) = cipher.decrypt(Nonce::from_slice(&nonce), sealed.as_slice()) {
            if blob.len() != PLAINTEXT_LOG_LEN * 32 {
                return None;
            }
            let fields = blob
                .chunks(32)
                .map(B256::from_slice)
                .collect::<Vec<_>>();
            // Plaintext fields must be canonical BN254 elements.
            if fields.iter().any(|f| fr_to_b256(b256_to_fr(*f)) != *f) {
                return None;
            }
            return Some(fields);
        }
    }
    None
}
