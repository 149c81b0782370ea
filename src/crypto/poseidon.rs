use alloy_primitives::{B256, U256};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};

/// Domain separator for public-data-tree leaf index siloing.
pub const LEAF_INDEX_SILO: u32 = 23;

/// Domain separator for the per-swap ciphertext leaf hash.
pub const CIPHERTEXT_LEAF_SEPARATOR: u32 = 0;

/// Inputs absorbed per permutation call in the variable-length hash.
/// The circom parameter set supports up to 12 inputs; one slot is
/// reserved for the running state.
const ABSORB_WIDTH: usize = 11;

/// Reduce a 32-byte big-endian value into the BN254 scalar field.
pub fn b256_to_fr(value: B256) -> Fr {
    Fr::from_be_bytes_mod_order(value.as_ref())
}

/// Serialize a BN254 scalar back to its 32-byte big-endian form.
pub fn fr_to_b256(value: Fr) -> B256 {
    B256::from_slice(&value.into_bigint().to_bytes_be())
}

/// Field element from an unsigned 64-bit integer.
pub fn field_from_u64(value: u64) -> B256 {
    B256::from(U256::from(value))
}

/// Field element from an unsigned 128-bit integer.
pub fn field_from_u128(value: u128) -> B256 {
    B256::from(U256::from(value))
}

/// Interpret a field element as u64. `None` if out of range.
pub fn field_to_u64(value: B256) -> Option<u64> {
    U256::from_be_bytes(value.0).try_into().ok()
}

/// Interpret a field element as u128. `None` if out of range.
pub fn field_to_u128(value: B256) -> Option<u128> {
    U256::from_be_bytes(value.0).try_into().ok()
}

/// Turn an ASCII label into a field element usable as a hash domain.
///
/// The label lands in the low (trailing) bytes of the 32-byte word;
/// keeping it to 31 bytes guarantees the result is below the BN254
/// modulus without a reduction.
pub fn domain_tag(tag: &str) -> B256 {
    let bytes = tag.as_bytes();
    assert!(
        bytes.len() < 32,
        "domain label {:?} needs {} bytes but only 31 fit in a field element",
        tag,
        bytes.len()
    );
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    B256::from(word)
}

fn hash_fr(inputs: &[Fr]) -> Fr {
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .expect("circom parameter set covers this arity");
    hasher
        .hash(inputs)
        .expect("permutation accepts in-range input counts")
}

/// Two-to-one Poseidon hash: Merkle pair combination plus every other
/// fixed two-element use (tags, slot derivation, KDF steps).
pub fn poseidon2(a: B256, b: B256) -> B256 {
    fr_to_b256(hash_fr(&[b256_to_fr(a), b256_to_fr(b)]))
}

/// Variable-length Poseidon hash over field elements.
///
/// The permutation parameters are fixed-arity, so longer inputs are
/// absorbed in blocks of [`ABSORB_WIDTH`] with the running state in the
/// first slot, seeded with the input length.
pub fn poseidon_hash_many(inputs: &[B256]) -> B256 {
    absorb(Fr::from(inputs.len() as u64), inputs)
}

/// Variable-length Poseidon hash with a numeric domain separator.
///
/// The state is seeded with `H(separator, len)` so the same input list
/// hashes differently under different separators.
pub fn poseidon_hash_with_separator(inputs: &[B256], separator: u32) -> B256 {
    let seed = hash_fr(&[Fr::from(separator as u64), Fr::from(inputs.len() as u64)]);
    absorb(seed, inputs)
}

fn absorb(seed: Fr, inputs: &[B256]) -> B256 {
    let mut state = seed;
    for chunk in inputs.chunks(ABSORB_WIDTH) {
        let mut block = Vec::with_capacity(chunk.len() + 1);
        block.push(state);
        block.extend(chunk.iter().map(|v| b256_to_fr(*v)));
        state = hash_fr(&block);
    }
    fr_to_b256(state)
}
