//! Registered state of the FIR pipeline and its per-edge transition.
//!
//! Stages, in order:
//! - optional input register
//! - delay line (the newest sample enters tap 0)
//! - product registers, all taps multiplied from the same delay line snapshot
//! - `N_TAPS - 1` adder stages, each folding one more product into the partial sum
//! - output register holding the rescaled sum
//!
//! Every stage is written exactly once per edge from the previous values of the stages before
//! it, so a sample presented on cycle n shows up on the bus on cycle n + latency.

use crate::bus;
use crate::bus::{BusPhase, OutputWord};
use bincode::{Decode, Encode};
use fir_common::Sample;
use fir_common::num::fits_signed;
use fir_config::{ACCUMULATOR_BITS, FRACTION_BITS, FirConfig, N_TAPS, OUTPUT_BITS, OutputMode};
use fir_proc_macros::EnumDisplay;
use std::array;

const ADDER_STAGES: usize = N_TAPS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
struct AdderStage {
    partial_sum: i32,
    // Products travel with the partial sum; entries past this stage are still to be added
    products: [i32; N_TAPS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDisplay)]
pub enum CorePhase {
    /// Reset is asserted, or the core has not been clocked since it was built
    Reset,
    /// Fewer than `N_TAPS` samples have entered since reset was released
    Filling,
    Steady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FirState {
    input_register: Sample,
    delay_line: [Sample; N_TAPS],
    products: [i32; N_TAPS],
    adders: [AdderStage; ADDER_STAGES],
    output: i32,
    bus_phase: BusPhase,
    // Result latched on an MSB cycle so its low half can follow on the next cycle
    held_output: i32,
    in_reset: bool,
    // Saturates at N_TAPS
    cycles_since_reset: u8,
}

impl Default for FirState {
    fn default() -> Self {
        Self {
            input_register: Sample::ZERO,
            delay_line: [Sample::ZERO; N_TAPS],
            products: [0; N_TAPS],
            adders: [AdderStage::default(); ADDER_STAGES],
            output: 0,
            bus_phase: BusPhase::default(),
            held_output: 0,
            in_reset: true,
            cycles_since_reset: 0,
        }
    }
}

impl FirState {
    /// Advance one clock edge.
    ///
    /// Returns the next state and the word driven on the output bus during this cycle, which
    /// comes from the registers as they were before the edge. Reset is synchronous and wins over
    /// everything else: it zeroes every stage.
    ///
    /// Only reachable through `FirCore`, which holds a validated config.
    #[must_use]
    pub(crate) fn step(&self, config: &FirConfig, reset: bool, input: Sample) -> (Self, OutputWord) {
        let word = self.bus_word(config);

        if reset {
            return (Self::default(), word);
        }

        let entering = if config.input_register { self.input_register } else { input };

        let mut delay_line = [Sample::ZERO; N_TAPS];
        delay_line[0] = entering;
        delay_line[1..].copy_from_slice(&self.delay_line[..N_TAPS - 1]);

        let coefficients = config.coefficients.to_i32_array();
        let products: [i32; N_TAPS] =
            array::from_fn(|k| coefficients[k] * i32::from(self.delay_line[k]));

        let mut adders = [AdderStage::default(); ADDER_STAGES];
        adders[0] = AdderStage {
            partial_sum: self.products[0] + self.products[1],
            products: self.products,
        };
        for stage in 1..ADDER_STAGES {
            let prev = self.adders[stage - 1];
            adders[stage] = AdderStage {
                partial_sum: prev.partial_sum + prev.products[stage + 1],
                products: prev.products,
            };
        }

        let accumulator = self.accumulator();
        debug_assert!(fits_signed(accumulator.into(), ACCUMULATOR_BITS));

        // Arithmetic shift, i.e. floor division by 2^FRACTION_BITS
        let output = accumulator >> FRACTION_BITS;
        debug_assert!(fits_signed(output.into(), OUTPUT_BITS));

        let (bus_phase, held_output) = match self.bus_phase {
            BusPhase::Msb => (BusPhase::Lsb, self.output),
            BusPhase::Lsb => (BusPhase::Msb, self.held_output),
        };

        let next = Self {
            input_register: input,
            delay_line,
            products,
            adders,
            output,
            bus_phase,
            held_output,
            in_reset: false,
            cycles_since_reset: self.cycles_since_reset.saturating_add(1).min(N_TAPS as u8),
        };

        (next, word)
    }

    fn bus_word(&self, config: &FirConfig) -> OutputWord {
        match (config.output_mode, self.bus_phase) {
            (OutputMode::Standard, _) => OutputWord::Full(self.output as i16),
            (OutputMode::Split, BusPhase::Msb) => {
                bus::split_halves(self.output as i16, config.split_bus_width).0
            }
            (OutputMode::Split, BusPhase::Lsb) => {
                bus::split_halves(self.held_output as i16, config.split_bus_width).1
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> CorePhase {
        if self.in_reset {
            CorePhase::Reset
        } else if usize::from(self.cycles_since_reset) < N_TAPS {
            CorePhase::Filling
        } else {
            CorePhase::Steady
        }
    }

    /// Delay line contents, newest sample first
    #[must_use]
    pub fn delay_line(&self) -> [Sample; N_TAPS] {
        self.delay_line
    }

    /// Full-precision sum leaving the last adder stage
    #[must_use]
    pub fn accumulator(&self) -> i32 {
        self.adders[ADDER_STAGES - 1].partial_sum
    }

    /// Half of a split result the bus carries on the next cycle
    #[must_use]
    pub fn bus_phase(&self) -> BusPhase {
        self.bus_phase
    }

    /// Contents of the output register
    #[must_use]
    pub fn output(&self) -> i32 {
        self.output
    }
}
