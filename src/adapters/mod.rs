pub mod http_node;
pub mod mock_node;
pub mod mock_prover;
