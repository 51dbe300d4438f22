use crate::num::{GetBit, SignExtend};
use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use bincode::{BorrowDecode, Decode, Encode};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Width of a sample on the input bus. The -32..=31 range needs six two's complement bits.
pub const SAMPLE_BITS: u8 = 6;

/// A signed fixed-point value in -32..=31, the unit of both filter input and filter coefficients.
///
/// The only ways to build one are range-checked, clipping, or from raw bits, so anything
/// holding a `Sample` is already in range. Decoding from saved state is range-checked too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i8", into = "i8"))]
pub struct Sample(i8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sample value {value} is outside the sample range -32..=31")]
pub struct SampleRangeError {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSampleError {
    #[error("invalid integer: {source}")]
    Int {
        #[from]
        source: ParseIntError,
    },
    #[error(transparent)]
    Range {
        #[from]
        source: SampleRangeError,
    },
}

impl Sample {
    pub const ZERO: Self = Self(0);
    pub const MIN: Self = Self(-32);
    pub const MAX: Self = Self(31);

    /// # Errors
    ///
    /// Returns an error if `value` is outside -32..=31.
    pub fn new(value: i32) -> Result<Self, SampleRangeError> {
        if (i32::from(Self::MIN.0)..=i32::from(Self::MAX.0)).contains(&value) {
            Ok(Self(value as i8))
        } else {
            Err(SampleRangeError { value: value.into() })
        }
    }

    /// Clip `value` into -32..=31.
    #[must_use]
    pub fn saturating(value: i32) -> Self {
        Self(value.clamp(Self::MIN.0.into(), Self::MAX.0.into()) as i8)
    }

    /// Build a sample from the low [`SAMPLE_BITS`] bits of a raw bus value; higher bits are ignored.
    #[must_use]
    pub fn from_bits(raw: u8) -> Self {
        Self(raw.bits(0..=SAMPLE_BITS - 1).sign_extend(SAMPLE_BITS) as i8)
    }

    /// Raw bit pattern as it appears on the input bus
    #[must_use]
    pub fn to_bits(self) -> u8 {
        (self.0 as u8).bits(0..=SAMPLE_BITS - 1)
    }

    #[inline]
    #[must_use]
    pub fn value(self) -> i8 {
        self.0
    }
}

impl<Context> Decode<Context> for Sample {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let value = i8::decode(decoder)?;
        Self::try_from(value).map_err(|err| DecodeError::OtherString(err.to_string()))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for Sample {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let value = i8::borrow_decode(decoder)?;
        Self::try_from(value).map_err(|err| DecodeError::OtherString(err.to_string()))
    }
}

impl From<Sample> for i8 {
    fn from(value: Sample) -> Self {
        value.0
    }
}

impl From<Sample> for i32 {
    fn from(value: Sample) -> Self {
        value.0.into()
    }
}

impl TryFrom<i8> for Sample {
    type Error = SampleRangeError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::new(value.into())
    }
}

impl TryFrom<i32> for Sample {
    type Error = SampleRangeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Sample {
    type Error = SampleRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        i32::try_from(value).map_err(|_| SampleRangeError { value }).and_then(Self::new)
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Sample {
    type Err = ParseSampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse()?;
        Ok(Self::try_from(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn new_accepts_full_range() {
        for value in -32..=31 {
            assert_eq!(i32::from(Sample::new(value).unwrap()), value);
        }
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert_eq!(Sample::new(32), Err(SampleRangeError { value: 32 }));
        assert_eq!(Sample::new(-33), Err(SampleRangeError { value: -33 }));
        assert_eq!(Sample::try_from(i64::MAX), Err(SampleRangeError { value: i64::MAX }));
    }

    #[test]
    fn saturating_clips() {
        assert_eq!(Sample::saturating(100), Sample::MAX);
        assert_eq!(Sample::saturating(-100), Sample::MIN);
        assert_eq!(Sample::saturating(-7).value(), -7);
    }

    #[test]
    fn raw_bits() {
        assert_eq!(Sample::from_bits(0b10_0000), Sample::MIN);
        assert_eq!(Sample::from_bits(0b01_1111), Sample::MAX);
        assert_eq!(Sample::from_bits(0b11_1111).value(), -1);
        assert_eq!(Sample::from_bits(0b1100_0001).value(), 1);
        assert_eq!(Sample::MIN.to_bits(), 0b10_0000);
        assert_eq!(Sample::saturating(-1).to_bits(), 0b11_1111);
    }

    #[test]
    fn decode_is_range_checked() {
        let config = bincode::config::standard();

        let bytes = bincode::encode_to_vec(Sample::MIN, config).unwrap();
        assert_eq!(bincode::decode_from_slice::<Sample, _>(&bytes, config).unwrap().0, Sample::MIN);

        for value in [100_i8, 32, -33, i8::MIN] {
            let bytes = bincode::encode_to_vec(value, config).unwrap();
            assert!(
                matches!(
                    bincode::decode_from_slice::<Sample, _>(&bytes, config),
                    Err(DecodeError::OtherString(_))
                ),
                "value={value}"
            );
            assert!(bincode::borrow_decode_from_slice::<Sample, _>(&bytes, config).is_err());
        }
    }

    #[test]
    fn parse() {
        assert_eq!(" -31 ".parse::<Sample>().map(i32::from), Ok(-31));
        assert!(matches!("32".parse::<Sample>(), Err(ParseSampleError::Range { .. })));
        assert!(matches!("abc".parse::<Sample>(), Err(ParseSampleError::Int { .. })));
    }
}
