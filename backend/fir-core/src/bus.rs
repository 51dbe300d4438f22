//! Output bus words and the consumer side of the split-bus protocol.

use bincode::{Decode, Encode};
use fir_common::num;
use fir_common::num::{BitStringError, GetBit};
use fir_config::OUTPUT_BITS;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Which half of a split result the bus carries on the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum BusPhase {
    #[default]
    Msb,
    Lsb,
}

/// Value driven on the output bus for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputWord {
    /// Complete output sample on an `OUTPUT_BITS`-wide bus
    Full(i16),
    /// Signed upper portion of a result: everything above the low `bus_width` bits
    Msb { value: i16, bus_width: u8 },
    /// Low `bus_width` bits of the result sent on the previous cycle, unsigned
    Lsb { bits: u16, bus_width: u8 },
}

impl OutputWord {
    #[must_use]
    pub fn width(self) -> u8 {
        match self {
            Self::Full(_) => OUTPUT_BITS,
            Self::Msb { bus_width, .. } | Self::Lsb { bus_width, .. } => bus_width,
        }
    }

    /// Bit pattern on the bus wires; signed words are sign-extended to the bus width
    #[must_use]
    pub fn raw_bits(self) -> u16 {
        let raw = match self {
            Self::Full(value) | Self::Msb { value, .. } => value as u16,
            Self::Lsb { bits, .. } => bits,
        };
        raw & num::low_mask(self.width()) as u16
    }

    /// MSB-first bit string as a waveform viewer would print the bus
    #[must_use]
    pub fn bit_string(self) -> String {
        num::raw_bit_string(self.raw_bits().into(), self.width())
    }
}

impl Display for OutputWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(value) => write!(f, "{value}"),
            Self::Msb { value, .. } => write!(f, "msb {value}"),
            Self::Lsb { bits, bus_width } => {
                write!(f, "lsb {bits:0width$b}", width = usize::from(*bus_width))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("received low half of a split result without a preceding high half")]
    LsbWithoutMsb,
    #[error("high half of a split result (value {dropped}) was never completed by a low half")]
    MsbWithoutLsb { dropped: i16 },
}

/// Rebuilds full results from a bus read every cycle.
///
/// In split mode the high half arrives on cycle t and the low half on cycle t+1; the high half
/// is held until its partner arrives. Full-width words pass straight through.
#[derive(Debug, Clone, Default)]
pub struct SplitReassembler {
    pending_msb: Option<i16>,
}

impl SplitReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one bus word; returns a result when one is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the halves arrive out of order, which means the bus was sampled at
    /// the wrong cadence. After an error nothing is pending except a high half that caused it.
    /// A full-width word that arrives while a high half is pending is discarded along with that
    /// high half.
    pub fn push(&mut self, word: OutputWord) -> Result<Option<i16>, BusError> {
        match word {
            OutputWord::Full(value) => match self.pending_msb.take() {
                Some(dropped) => Err(BusError::MsbWithoutLsb { dropped }),
                None => Ok(Some(value)),
            },
            OutputWord::Msb { value, .. } => match self.pending_msb.replace(value) {
                Some(dropped) => Err(BusError::MsbWithoutLsb { dropped }),
                None => Ok(None),
            },
            OutputWord::Lsb { bits, bus_width } => {
                let msb = self.pending_msb.take().ok_or(BusError::LsbWithoutMsb)?;
                Ok(Some(join_halves(msb, bits, bus_width)))
            }
        }
    }

    #[must_use]
    pub fn is_waiting_for_lsb(&self) -> bool {
        self.pending_msb.is_some()
    }
}

fn join_halves(msb: i16, lsb_bits: u16, bus_width: u8) -> i16 {
    (msb << bus_width) | (lsb_bits & num::low_mask(bus_width) as u16) as i16
}

/// Reconstruct a split result from the bus bit strings captured on two consecutive cycles.
///
/// The high-half string is taken whole (it is sign-extended to the bus width) and only the low
/// `lsb_width` characters of the low-half string are appended, then the concatenation is
/// decoded as two's complement.
///
/// # Errors
///
/// Returns an error if either string is not a valid bit string or the low-half string is
/// shorter than `lsb_width`.
pub fn reconstruct_from_bit_strings(
    msb_bits: &str,
    lsb_bits: &str,
    lsb_width: u8,
) -> Result<i64, BitStringError> {
    let lsb_width = usize::from(lsb_width);
    let Some(lsb_tail) =
        lsb_bits.len().checked_sub(lsb_width).and_then(|start| lsb_bits.get(start..))
    else {
        return Err(BitStringError::Empty);
    };

    num::decode_twos_complement(&format!("{msb_bits}{lsb_tail}"))
}

/// Split a full result the way the core drives it over two cycles.
///
/// `bus_width` must already be validated against the split bus width range.
#[must_use]
pub(crate) fn split_halves(value: i16, bus_width: u8) -> (OutputWord, OutputWord) {
    let msb = OutputWord::Msb { value: value >> bus_width, bus_width };
    let lsb = OutputWord::Lsb {
        bits: (value as u16).bits(0..=bus_width - 1),
        bus_width,
    };
    (msb, lsb)
}
