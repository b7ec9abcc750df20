pub mod core;
pub mod maths;

pub use maths::format::{format_amplitude, format_probability};
pub use maths::{exp_i, Amplitude};

pub use crate::core::cache::{regime, Regime, Strategy, Tuning};
pub use crate::core::error::{Error, Result};
pub use crate::core::index::IndexForm;
pub use crate::core::layout::Layout;
pub use crate::core::loops::Policy;
pub use crate::core::permutation::Permutation;
pub use crate::core::qubit::{Control, Qubit};
pub use crate::core::simulator::{Simulator, SimulatorBuilder};
pub use crate::core::transport::{ChannelGroup, SingleProcess, Transport, TransportError};
