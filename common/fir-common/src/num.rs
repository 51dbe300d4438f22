//! Bit manipulation helpers for fixed-width signed values.
//!
//! Everything that converts between a raw bit pattern (or a bit string as printed by a
//! waveform viewer) and a signed integer goes through this module.

use std::ops::RangeInclusive;
use thiserror::Error;

/// Widest value the bit string helpers accept
pub const MAX_BIT_STRING_LEN: usize = 63;

pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_get_bit {
    ($t:ty) => {
        impl GetBit for $t {
            #[inline]
            fn bit(self, i: u8) -> bool {
                debug_assert!(i < (<$t>::BITS as u8));
                self & (1 << i) != 0
            }

            #[inline]
            fn bits(self, range: RangeInclusive<u8>) -> Self {
                let start = *range.start();
                let end = *range.end();
                debug_assert!(end < (<$t>::BITS as u8));

                (self >> start) & ((1 << (end - start + 1)) - 1)
            }
        }
    };
}

impl_get_bit!(u8);
impl_get_bit!(u16);
impl_get_bit!(u32);
impl_get_bit!(u64);

pub trait SignExtend: Copy {
    /// Interpret the low `width` bits as a two's complement value.
    #[must_use]
    fn sign_extend(self, width: u8) -> i64;
}

macro_rules! impl_sign_extend {
    ($t:ty) => {
        impl SignExtend for $t {
            #[inline]
            fn sign_extend(self, width: u8) -> i64 {
                debug_assert!(width > 0 && width <= (<$t>::BITS as u8));

                let shift = 64 - u32::from(width);
                ((u64::from(self) << shift) as i64) >> shift
            }
        }
    };
}

impl_sign_extend!(u8);
impl_sign_extend!(u16);
impl_sign_extend!(u32);
impl_sign_extend!(u64);

#[inline]
#[must_use]
pub const fn low_mask(width: u8) -> u64 {
    if width >= 64 { u64::MAX } else { (1 << width) - 1 }
}

#[inline]
#[must_use]
pub fn signed_range(width: u8) -> RangeInclusive<i64> {
    debug_assert!(width > 0 && width < 64);

    let half = 1_i64 << (width - 1);
    -half..=half - 1
}

#[inline]
#[must_use]
pub fn fits_signed(value: i64, width: u8) -> bool {
    signed_range(width).contains(&value)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitStringError {
    #[error("bit string is empty")]
    Empty,
    #[error("invalid character {char:?} at position {position} in bit string")]
    InvalidChar { position: usize, char: char },
    #[error("bit string of length {len} is wider than 63 bits")]
    TooWide { len: usize },
    #[error("value {value} does not fit in {width} signed bits")]
    OutOfRange { value: i64, width: u8 },
}

/// Decode an MSB-first two's complement bit string.
///
/// For an n-bit string the value is the unsigned value of the low n-1 bits minus
/// `sign_bit * 2^(n-1)`, so a single bit decodes to 0 or -1.
///
/// # Errors
///
/// Returns an error if the string is empty, longer than [`MAX_BIT_STRING_LEN`], or contains
/// anything other than `0` and `1`.
pub fn decode_twos_complement(bits: &str) -> Result<i64, BitStringError> {
    if bits.is_empty() {
        return Err(BitStringError::Empty);
    }

    let len = bits.chars().count();
    if len > MAX_BIT_STRING_LEN {
        return Err(BitStringError::TooWide { len });
    }

    let mut raw = 0_u64;
    for (position, char) in bits.chars().enumerate() {
        let bit = match char {
            '0' => 0,
            '1' => 1,
            _ => return Err(BitStringError::InvalidChar { position, char }),
        };
        raw = (raw << 1) | bit;
    }

    Ok(raw.sign_extend(len as u8))
}

/// Encode `value` as an MSB-first two's complement bit string of exactly `width` characters.
///
/// # Errors
///
/// Returns an error if `value` does not fit in `width` signed bits.
pub fn encode_twos_complement(value: i64, width: u8) -> Result<String, BitStringError> {
    if width == 0 {
        return Err(BitStringError::Empty);
    }

    if usize::from(width) > MAX_BIT_STRING_LEN {
        return Err(BitStringError::TooWide { len: width.into() });
    }

    if !fits_signed(value, width) {
        return Err(BitStringError::OutOfRange { value, width });
    }

    Ok(raw_bit_string(value as u64, width))
}

/// Render the low `width` bits of `raw` MSB-first, with no sign interpretation.
#[must_use]
pub fn raw_bit_string(raw: u64, width: u8) -> String {
    (0..width).rev().map(|i| if raw.bit(i) { '1' } else { '0' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn decode_matches_twos_complement_rule() {
        assert_eq!(decode_twos_complement("00000"), Ok(0));
        assert_eq!(decode_twos_complement("01111"), Ok(15));
        assert_eq!(decode_twos_complement("10000"), Ok(-16));
        assert_eq!(decode_twos_complement("11111"), Ok(-1));
        assert_eq!(decode_twos_complement("100000"), Ok(-32));
        assert_eq!(decode_twos_complement("011111"), Ok(31));
        assert_eq!(decode_twos_complement("110000001"), Ok(-127));
    }

    #[test]
    fn single_bit_is_zero_or_minus_one() {
        assert_eq!(decode_twos_complement("0"), Ok(0));
        assert_eq!(decode_twos_complement("1"), Ok(-1));
    }

    #[test]
    fn decode_rejects_malformed_strings() {
        assert_eq!(decode_twos_complement(""), Err(BitStringError::Empty));
        assert_eq!(
            decode_twos_complement("01x1"),
            Err(BitStringError::InvalidChar { position: 2, char: 'x' })
        );
        // Simulators print undriven bits as X/Z; those are not values
        assert!(decode_twos_complement("zzzz").is_err());
        assert_eq!(
            decode_twos_complement(&"1".repeat(64)),
            Err(BitStringError::TooWide { len: 64 })
        );
    }

    #[test]
    fn encode_inverts_decode() {
        for width in [1, 5, 9, 14] {
            for value in signed_range(width) {
                let bits = encode_twos_complement(value, width).unwrap();
                assert_eq!(bits.len(), usize::from(width));
                assert_eq!(decode_twos_complement(&bits), Ok(value), "width={width}");
            }
        }
    }

    #[test]
    fn encode_rejects_values_that_do_not_fit() {
        assert_eq!(
            encode_twos_complement(16, 5),
            Err(BitStringError::OutOfRange { value: 16, width: 5 })
        );
        assert_eq!(
            encode_twos_complement(-17, 5),
            Err(BitStringError::OutOfRange { value: -17, width: 5 })
        );
    }

    #[test]
    fn sign_extend_low_bits() {
        assert_eq!(0b1_1111_u8.sign_extend(5), -1);
        assert_eq!(0b1_0000_u8.sign_extend(5), -16);
        assert_eq!(0b0_1111_u8.sign_extend(5), 15);
        // Bits above the width are ignored
        assert_eq!(0b1110_0001_u8.sign_extend(5), 1);
        assert_eq!(0x1F80_u16.sign_extend(13), -128);
    }

    #[test]
    fn get_bits() {
        assert!(0b1000_u8.bit(3));
        assert!(!0b1000_u8.bit(2));
        assert_eq!(0b1011_0110_u8.bits(2..=5), 0b1101);
    }
}
