pub mod ciphertext;
pub mod lot_tree;
pub mod lots;
pub mod merkle;
pub mod outputs;
pub mod pnl;
pub mod tags;
pub mod witness;
