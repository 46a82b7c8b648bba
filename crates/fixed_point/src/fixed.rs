//! Q4.4 fixed-point scalar type
//!
//! A Q4.4 value carries 4 integer and 4 fractional bits in an `i8`. On the
//! wire it is widened to a 16-bit word by sign extension, so the upper byte
//! of every exported word is a copy of bit 7.

use std::fmt;
use std::str::FromStr;

use crate::error::{FixedPointError, Result};

/// Number of fractional bits
pub const FRAC_BITS: u8 = 4;

/// Scale factor (2^FRAC_BITS)
pub const SCALE: f64 = (1u32 << FRAC_BITS) as f64;

/// Width of an exported word in bits
pub const WORD_BITS: usize = 16;

/// How `value * 16` is rounded to an integer before saturation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundingMode {
    /// Ties go away from zero (0.5 -> 1, -0.5 -> -1)
    #[default]
    HalfAwayFromZero,
    /// Ties go to the even neighbour (0.5 -> 0, 1.5 -> 2)
    HalfToEven,
    /// Fraction is discarded (1.9 -> 1, -1.9 -> -1)
    TowardZero,
}

impl RoundingMode {
    /// Round a scaled value to an integral `f64`
    pub fn apply(self, scaled: f64) -> f64 {
        match self {
            Self::HalfAwayFromZero => scaled.round(),
            Self::HalfToEven => scaled.round_ties_even(),
            Self::TowardZero => scaled.trunc(),
        }
    }

    /// Name used in config files and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HalfAwayFromZero => "half-away-from-zero",
            Self::HalfToEven => "half-to-even",
            Self::TowardZero => "toward-zero",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "half-away-from-zero" | "away" => Ok(Self::HalfAwayFromZero),
            "half-to-even" | "even" => Ok(Self::HalfToEven),
            "toward-zero" | "trunc" => Ok(Self::TowardZero),
            other => Err(format!(
                "unknown rounding mode '{}' \
                 (expected half-away-from-zero, half-to-even or toward-zero)",
                other
            )),
        }
    }
}

/// A saturated Q4.4 fixed-point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Q44(i8);

/// Result of a quantization that also reports saturation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantized {
    pub value: Q44,
    /// True when the rounded value fell outside [-128, 127] and was clamped
    pub clipped: bool,
}

impl Q44 {
    /// Smallest code (-8.0)
    pub const MIN: Self = Self(i8::MIN);
    /// Largest code (7.9375)
    pub const MAX: Self = Self(i8::MAX);

    /// Quantize with the default rounding mode
    pub fn from_f64(value: f64) -> Result<Self> {
        Self::from_f64_with(value, RoundingMode::default())
    }

    /// Quantize with an explicit rounding mode
    pub fn from_f64_with(value: f64, mode: RoundingMode) -> Result<Self> {
        Self::quantize_checked(value, mode).map(|q| q.value)
    }

    /// Quantize and report whether the value saturated
    pub fn quantize_checked(value: f64, mode: RoundingMode) -> Result<Quantized> {
        if !value.is_finite() {
            return Err(FixedPointError::InvalidInput { value });
        }

        let rounded = mode.apply(value * SCALE);
        let lo = i8::MIN as f64;
        let hi = i8::MAX as f64;
        let clipped = rounded < lo || rounded > hi;

        Ok(Quantized {
            value: Self(rounded.clamp(lo, hi) as i8),
            clipped,
        })
    }

    /// Build from a sign-extended 16-bit code
    pub fn from_code(code: i16) -> Result<Self> {
        i8::try_from(code)
            .map(Self)
            .map_err(|_| FixedPointError::CodeOutOfRange { code })
    }

    /// The 8-bit signed value
    pub fn raw(self) -> i8 {
        self.0
    }

    /// The sign-extended 16-bit code
    pub fn code(self) -> i16 {
        self.0 as i16
    }

    /// Convert back to floating-point
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE
    }

    /// Render as a 16-character binary word
    pub fn to_binary16(self) -> String {
        serialize_binary16(self.code())
    }
}

impl fmt::Display for Q44 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}

/// Quantize a scalar to a sign-extended Q4.4 code.
///
/// `value * 16` is rounded half away from zero and clamped to [-128, 127].
/// Saturation is silent; use [`Q44::quantize_checked`] to observe it.
/// Non-finite input fails with [`FixedPointError::InvalidInput`].
pub fn quantize(value: f64) -> Result<i16> {
    Q44::from_f64(value).map(Q44::code)
}

/// Render any 16-bit code as 16 binary digits, most significant bit first
pub fn serialize_binary16(code: i16) -> String {
    format!("{:016b}", code as u16)
}

/// Parse a 16-character binary word back into a two's-complement code
pub fn decode_binary16(word: &str) -> Result<i16> {
    if word.len() != WORD_BITS || !word.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(FixedPointError::MalformedWord(word.to_string()));
    }
    u16::from_str_radix(word, 2)
        .map(|bits| bits as i16)
        .map_err(|_| FixedPointError::MalformedWord(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_scenarios() {
        assert_eq!(quantize(0.5).unwrap(), 8);
        assert_eq!(serialize_binary16(8), "0000000000001000");

        assert_eq!(quantize(-1.0).unwrap(), -16);
        assert_eq!(serialize_binary16(-16), "1111111111110000");

        assert_eq!(quantize(10.0).unwrap(), 127);
        assert_eq!(serialize_binary16(127), "0000000001111111");
    }

    #[test]
    fn test_saturation() {
        assert_eq!(quantize(8.0).unwrap(), 127);
        assert_eq!(quantize(7.9375).unwrap(), 127);
        assert_eq!(quantize(1e300).unwrap(), 127);
        assert_eq!(quantize(f64::MAX).unwrap(), 127);

        assert_eq!(quantize(-8.0).unwrap(), -128);
        assert_eq!(quantize(-8.0625).unwrap(), -128);
        assert_eq!(quantize(-1e300).unwrap(), -128);
        assert_eq!(quantize(f64::MIN).unwrap(), -128);
    }

    #[test]
    fn test_clip_signal() {
        let q = Q44::quantize_checked(7.9375, RoundingMode::default()).unwrap();
        assert!(!q.clipped);
        assert_eq!(q.value, Q44::MAX);

        let q = Q44::quantize_checked(7.97, RoundingMode::default()).unwrap();
        assert!(q.clipped);
        assert_eq!(q.value, Q44::MAX);

        let q = Q44::quantize_checked(-8.0, RoundingMode::default()).unwrap();
        assert!(!q.clipped);

        let q = Q44::quantize_checked(-8.04, RoundingMode::default()).unwrap();
        assert!(q.clipped);
        assert_eq!(q.value, Q44::MIN);
    }

    #[test]
    fn test_non_finite_rejected() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                quantize(v),
                Err(FixedPointError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_half_away_from_zero_ties() {
        // Every half-integer scaled value across the range and just past it
        for k in -130i32..130 {
            let v = (k as f64 + 0.5) / SCALE;
            let expected = if k >= 0 { k + 1 } else { k };
            let expected = expected.clamp(-128, 127) as i16;
            assert_eq!(quantize(v).unwrap(), expected, "tie at {}", v);
        }
        assert_eq!(quantize(0.5 / 16.0).unwrap(), 1);
        assert_eq!(quantize(-0.5 / 16.0).unwrap(), -1);
    }

    #[test]
    fn test_half_to_even_ties() {
        for k in -130i32..130 {
            let v = (k as f64 + 0.5) / SCALE;
            let expected = if k % 2 == 0 { k } else { k + 1 };
            let expected = expected.clamp(-128, 127) as i16;
            let got = Q44::from_f64_with(v, RoundingMode::HalfToEven).unwrap().code();
            assert_eq!(got, expected, "tie at {}", v);
        }
    }

    #[test]
    fn test_toward_zero_ties() {
        for k in -130i32..130 {
            let v = (k as f64 + 0.5) / SCALE;
            let expected = if k >= 0 { k } else { k + 1 };
            let expected = expected.clamp(-128, 127) as i16;
            let got = Q44::from_f64_with(v, RoundingMode::TowardZero).unwrap().code();
            assert_eq!(got, expected, "tie at {}", v);
        }
    }

    #[test]
    fn test_sign_extension() {
        for raw in i8::MIN..=i8::MAX {
            let word = Q44::from_code(raw as i16).unwrap().to_binary16();
            let sign = if raw < 0 { '1' } else { '0' };
            assert!(word[..9].chars().all(|c| c == sign), "word {} for {}", word, raw);
        }
    }

    #[test]
    fn test_serialize_full_range() {
        assert_eq!(serialize_binary16(0), "0000000000000000");
        assert_eq!(serialize_binary16(-1), "1111111111111111");
        assert_eq!(serialize_binary16(i16::MIN), "1000000000000000");
        assert_eq!(serialize_binary16(i16::MAX), "0111111111111111");
        assert_eq!(serialize_binary16(0x1234), "0001001000110100");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode_binary16("1111111111110000").unwrap(), -16);
        assert_eq!(decode_binary16("1000000000000000").unwrap(), i16::MIN);
        assert_eq!(decode_binary16("0000000001111111").unwrap(), 127);

        for bad in ["", "0101", "00000000000000000", "000000000000000x", "+000000000001000"] {
            assert!(matches!(
                decode_binary16(bad),
                Err(FixedPointError::MalformedWord(_))
            ));
        }
    }

    #[test]
    fn test_from_code_range() {
        assert_eq!(Q44::from_code(-128).unwrap(), Q44::MIN);
        assert_eq!(Q44::from_code(127).unwrap(), Q44::MAX);
        assert!(matches!(
            Q44::from_code(128),
            Err(FixedPointError::CodeOutOfRange { code: 128 })
        ));
        assert!(Q44::from_code(-129).is_err());
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(Q44::from_f64(0.5).unwrap().to_f64(), 0.5);
        assert_eq!(Q44::MIN.to_f64(), -8.0);
        assert_eq!(Q44::MAX.to_f64(), 7.9375);
        assert_eq!(Q44::from_f64(-1.0).unwrap().to_string(), "-1.0000");
    }

    #[test]
    fn test_rounding_mode_parse() {
        assert_eq!("half-to-even".parse::<RoundingMode>().unwrap(), RoundingMode::HalfToEven);
        assert_eq!("trunc".parse::<RoundingMode>().unwrap(), RoundingMode::TowardZero);
        assert_eq!(
            RoundingMode::HalfAwayFromZero.to_string().parse::<RoundingMode>().unwrap(),
            RoundingMode::HalfAwayFromZero
        );
        assert!("banker".parse::<RoundingMode>().is_err());
    }
}
