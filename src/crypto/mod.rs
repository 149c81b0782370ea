pub mod note_encryption;
pub mod poseidon;
