pub mod node;
pub mod prover;
