use thiserror::Error;

use crate::core::transport::TransportError;

/// Errors surfaced at the simulator boundary.
///
/// Capacity and invariant errors are raised before any state mutation and
/// may be caught per gate; transport errors are fatal for the simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("too many operated qubits for {gate}: {requested} requested, limit {limit}")]
    TooManyOperatedQubits {
        gate: &'static str,
        requested: usize,
        limit: usize,
    },

    #[error("invalid initial state {state:#x} for {num_qubits} qubits")]
    InvalidInitialState { state: u64, num_qubits: u32 },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("permutation invariant violated: {0}")]
    PermutationInvariant(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("operation not permitted while a fused gate sequence is open")]
    FusionOpen,
}

pub type Result<T> = std::result::Result<T, Error>;
