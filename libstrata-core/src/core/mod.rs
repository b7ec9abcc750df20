pub mod cache;
pub mod error;
pub mod fusion;
pub mod gates;
pub mod index;
pub mod interchange;
pub mod layout;
pub mod loops;
pub mod measurement;
pub mod permutation;
pub mod qubit;
pub mod simulator;
pub mod transport;
