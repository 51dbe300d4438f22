//! Build-time configuration of the FIR core.
//!
//! A core's coefficients, input register and output bus protocol are chosen when it is
//! constructed and never change afterwards.

use bincode::{Decode, Encode};
use fir_common::{ParseSampleError, Sample};
use fir_proc_macros::{EnumDisplay, EnumFromStr};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

pub const N_TAPS: usize = 4;

/// Coefficients and samples are fixed-point with this many fractional bits (scale 1/32)
pub const FRACTION_BITS: u8 = 5;

// Worst case is 4 * (-32 * -32) = 4096, which needs 14 signed bits
pub const ACCUMULATOR_BITS: u8 = 14;

/// Width of a full output sample after the accumulator is rescaled
pub const OUTPUT_BITS: u8 = ACCUMULATOR_BITS - FRACTION_BITS;

// The narrow bus must be able to carry the upper portion of the result in one cycle
pub const MIN_SPLIT_BUS_WIDTH: u8 = OUTPUT_BITS.div_ceil(2);
pub const MAX_SPLIT_BUS_WIDTH: u8 = OUTPUT_BITS - 1;
pub const DEFAULT_SPLIT_BUS_WIDTH: u8 = 5;

/// Pipeline stages that are always present: delay line, products, output register
const FIXED_STAGES: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "split bus width {width} is unsupported; must be {}..={} bits",
        MIN_SPLIT_BUS_WIDTH,
        MAX_SPLIT_BUS_WIDTH
    )]
    InvalidSplitBusWidth { width: u8 },
    #[error("expected exactly {} coefficients, got {actual}", N_TAPS)]
    CoefficientCount { actual: usize },
    #[error("invalid coefficient {index}: {source}")]
    Coefficient { index: usize, source: ParseSampleError },
    #[cfg(feature = "serde")]
    #[error("error parsing config: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

/// The fixed set of `N_TAPS` coefficients, `coefficient[0]` weighting the newest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CoefficientSet([Sample; N_TAPS]);

impl CoefficientSet {
    #[must_use]
    pub const fn new(coefficients: [Sample; N_TAPS]) -> Self {
        Self(coefficients)
    }

    #[must_use]
    pub const fn uniform(coefficient: Sample) -> Self {
        Self([coefficient; N_TAPS])
    }

    /// # Errors
    ///
    /// Returns an error unless `values` holds exactly `N_TAPS` in-range values.
    pub fn from_values(values: &[i32]) -> Result<Self, ConfigError> {
        if values.len() != N_TAPS {
            return Err(ConfigError::CoefficientCount { actual: values.len() });
        }

        let mut coefficients = [Sample::ZERO; N_TAPS];
        for (index, (&value, coefficient)) in values.iter().zip(&mut coefficients).enumerate() {
            *coefficient = Sample::new(value)
                .map_err(|err| ConfigError::Coefficient { index, source: err.into() })?;
        }

        Ok(Self(coefficients))
    }

    #[inline]
    #[must_use]
    pub fn as_array(&self) -> &[Sample; N_TAPS] {
        &self.0
    }

    /// Coefficients widened for multiplication
    #[inline]
    #[must_use]
    pub fn to_i32_array(&self) -> [i32; N_TAPS] {
        self.0.map(i32::from)
    }
}

impl Default for CoefficientSet {
    // Four taps of 8/32 each: a moving average with unity DC gain
    fn default() -> Self {
        Self::uniform(Sample::saturating(8))
    }
}

impl Display for CoefficientSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, coefficient) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, "{coefficient}")?;
        }

        Ok(())
    }
}

impl FromStr for CoefficientSet {
    type Err = ConfigError;

    /// Parses a comma-separated list such as `8,4,2,1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.split(',').collect();
        if parts.len() != N_TAPS {
            return Err(ConfigError::CoefficientCount { actual: parts.len() });
        }

        let mut coefficients = [Sample::ZERO; N_TAPS];
        for (index, (part, coefficient)) in parts.into_iter().zip(&mut coefficients).enumerate() {
            *coefficient =
                part.parse().map_err(|source| ConfigError::Coefficient { index, source })?;
        }

        Ok(Self(coefficients))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumFromStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputMode {
    /// Full-width result every cycle
    #[default]
    Standard,
    /// Result split over two cycles on a narrow bus, upper bits first
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FirConfig {
    pub coefficients: CoefficientSet,
    /// Register the input sample for one extra cycle before it enters the delay line
    pub input_register: bool,
    pub output_mode: OutputMode,
    /// Only used in split mode
    pub split_bus_width: u8,
}

impl Default for FirConfig {
    fn default() -> Self {
        Self {
            coefficients: CoefficientSet::default(),
            input_register: false,
            output_mode: OutputMode::default(),
            split_bus_width: DEFAULT_SPLIT_BUS_WIDTH,
        }
    }
}

impl FirConfig {
    /// Cycles between an input being presented and its output appearing on the bus.
    #[must_use]
    pub fn latency(&self) -> usize {
        // Adder stages add one product per cycle after the first two are summed
        let adder_stages = N_TAPS - 1;
        FIXED_STAGES + adder_stages + usize::from(self.input_register)
    }

    /// # Errors
    ///
    /// Returns an error if the split bus width cannot carry half of a result.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SPLIT_BUS_WIDTH..=MAX_SPLIT_BUS_WIDTH).contains(&self.split_bus_width) {
            return Err(ConfigError::InvalidSplitBusWidth { width: self.split_bus_width });
        }

        Ok(())
    }

    /// Width of the physical output bus
    #[must_use]
    pub fn output_bus_width(&self) -> u8 {
        match self.output_mode {
            OutputMode::Standard => OUTPUT_BITS,
            OutputMode::Split => self.split_bus_width,
        }
    }

    /// Parse a TOML config; fields that are not present take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, a coefficient is out of range, or the
    /// resulting config fails [`FirConfig::validate`].
    #[cfg(feature = "serde")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;

        log::debug!("Parsed FIR config: {config:?}");

        Ok(config)
    }
}

impl Display for FirConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "coefficients=[{}] input_register={} output_mode={}",
            self.coefficients, self.input_register, self.output_mode
        )?;

        if self.output_mode == OutputMode::Split {
            write!(f, " split_bus_width={}", self.split_bus_width)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn latency_depends_on_input_register() {
        let config = FirConfig::default();
        assert_eq!(config.latency(), N_TAPS + 2);

        let config = FirConfig { input_register: true, ..FirConfig::default() };
        assert_eq!(config.latency(), N_TAPS + 3);
    }

    #[test]
    fn widths_cover_worst_case() {
        let worst_sum = N_TAPS as i64 * i64::from(Sample::MIN.value()).pow(2);
        assert!(fir_common::num::fits_signed(worst_sum, ACCUMULATOR_BITS));
        assert!(fir_common::num::fits_signed(worst_sum >> FRACTION_BITS, OUTPUT_BITS));
        assert_eq!(OUTPUT_BITS, 9);
        assert_eq!(MIN_SPLIT_BUS_WIDTH, 5);
    }

    #[test]
    fn split_bus_width_validation() {
        for width in 0..=16 {
            let config = FirConfig { split_bus_width: width, ..FirConfig::default() };
            assert_eq!(config.validate().is_ok(), (5..=8).contains(&width), "width={width}");
        }
    }

    #[test]
    fn coefficients_from_values() {
        let coefficients = CoefficientSet::from_values(&[8, 4, -2, -32]).unwrap();
        assert_eq!(coefficients.to_i32_array(), [8, 4, -2, -32]);

        assert!(matches!(
            CoefficientSet::from_values(&[1, 2, 3]),
            Err(ConfigError::CoefficientCount { actual: 3 })
        ));
        assert!(matches!(
            CoefficientSet::from_values(&[0, 0, 32, 0]),
            Err(ConfigError::Coefficient { index: 2, .. })
        ));
    }

    #[test]
    fn coefficients_parse_and_display() {
        let coefficients: CoefficientSet = "31, -31,0,-32".parse().unwrap();
        assert_eq!(coefficients.to_i32_array(), [31, -31, 0, -32]);
        assert_eq!(coefficients.to_string(), "31,-31,0,-32");

        assert!(matches!(
            "1,2,3,4,5".parse::<CoefficientSet>(),
            Err(ConfigError::CoefficientCount { actual: 5 })
        ));
        assert!(matches!(
            "1,x,3,4".parse::<CoefficientSet>(),
            Err(ConfigError::Coefficient { index: 1, .. })
        ));
    }

    #[test]
    fn output_mode_from_str() {
        for mode in [OutputMode::Standard, OutputMode::Split] {
            assert_eq!(mode.to_string().parse::<OutputMode>(), Ok(mode));
        }
        assert_eq!("SPLIT".parse::<OutputMode>(), Ok(OutputMode::Split));
        assert!("wide".parse::<OutputMode>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn toml_fields_default() {
        assert_eq!(FirConfig::from_toml_str("").unwrap(), FirConfig::default());

        let config = FirConfig::from_toml_str(
            r#"
            coefficients = [-31, -31, -31, -31]
            output_mode = "Split"
            "#,
        )
        .unwrap();
        assert_eq!(config.coefficients, CoefficientSet::uniform(Sample::saturating(-31)));
        assert_eq!(config.output_mode, OutputMode::Split);
        assert!(!config.input_register);
        assert_eq!(config.split_bus_width, DEFAULT_SPLIT_BUS_WIDTH);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn toml_rejects_invalid_values() {
        assert!(matches!(
            FirConfig::from_toml_str("coefficients = [0, 0, 0, 40]"),
            Err(ConfigError::Toml { .. })
        ));
        assert!(matches!(
            FirConfig::from_toml_str("coefficients = [0, 0, 0]"),
            Err(ConfigError::Toml { .. })
        ));
        assert!(matches!(
            FirConfig::from_toml_str("split_bus_width = 3"),
            Err(ConfigError::InvalidSplitBusWidth { width: 3 })
        ));
    }
}
