
use crate::bus::OutputWord;
use crate::pipeline::{CorePhase, FirState};
use fir_common::Sample;
use fir_config::{ConfigError, FirConfig};

/// A FIR core with a fixed configuration, clocked one edge at a time.
#[derive(Debug, Clone)]
pub struct FirCore {
    config: FirConfig,
    state: FirState,
    cycles: u64,
}

impl FirCore {
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(config: FirConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        log::debug!("Creating FIR core with {config}, latency {}", config.latency());

        Ok(Self { config, state: FirState::default(), cycles: 0 })
    }

    pub(crate) fn from_parts(config: FirConfig, state: FirState, cycles: u64) -> Self {
        Self { config, state, cycles }
    }

    #[must_use]
    pub fn config(&self) -> &FirConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &FirState {
        &self.state
    }

    #[must_use]
    pub fn latency(&self) -> usize {
        self.config.latency()
    }

    #[must_use]
    pub fn phase(&self) -> CorePhase {
        self.state.phase()
    }

    /// Number of clock edges since the core was built
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one clock edge with the given reset level and input sample, returning the word on the
    /// output bus during this cycle.
    pub fn tick(&mut self, reset: bool, input: Sample) -> OutputWord {
        let prev_phase = self.state.phase();

        let (state, word) = self.state.step(&self.config, reset, input);
        self.state = state;
        self.cycles += 1;

        let phase = self.state.phase();
        if phase != prev_phase {
            log::debug!("FIR core {prev_phase} -> {phase} at cycle {}", self.cycles);
        }

        log::trace!("cycle {}: reset={reset} in={input} out={word}", self.cycles);

        word
    }

    /// Clock one edge with reset deasserted.
    pub fn clock(&mut self, input: Sample) -> OutputWord {
        self.tick(false, input)
    }

    /// Hold reset for `cycles` edges. The pipeline is fully flushed after one edge; holding it
    /// longer mirrors how a host drives the reset line.
    pub fn hold_reset(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick(true, Sample::ZERO);
        }
    }

    /// Clock every input in order, collecting the bus word from each cycle.
    pub fn run<I>(&mut self, inputs: I) -> Vec<OutputWord>
    where
        I: IntoIterator<Item = Sample>,
    {
        inputs.into_iter().map(|input| self.clock(input)).collect()
    }
}
