//! Cycle-level model of a 4-tap fixed-point FIR filter core.
//!
//! The core consumes one sample per clock and drives an output bus that either carries the
//! full rescaled result every cycle or splits it over two cycles on a narrower bus.

pub mod api;
pub mod bus;
pub mod pipeline;
pub mod snapshot;

pub use api::FirCore;
pub use bus::{BusError, BusPhase, OutputWord, SplitReassembler};
pub use pipeline::{CorePhase, FirState};

pub use fir_common::Sample;
pub use fir_config::{FirConfig, OutputMode};
