//! Memory formats of the FPU and their conversion to register values.
//!
//! Registers hold host doubles; every conversion here is either an exact bit
//! reinterpretation (single, double, the double-to-extended direction) or a
//! correctly rounded narrowing (extended-to-double, via arpfloat).

use arpfloat::{BigInt, Float, RoundingMode};
use proc_bitfield::bitfield;

use crate::types::Long;

use super::{SEMANTICS_EXTENDED, SEMANTICS_SINGLE};

const EXPONENT_BIAS: i64 = 16383;
const EXPONENT_MAX: u64 = 0x7FFF;

const DOUBLE_EXPONENT_BIAS: i64 = 1023;
/// Smallest binary exponent that can still round to a non-zero double
const DOUBLE_EXPONENT_MIN: i64 = -1075;

/// Packed decimal exponent field value for infinity/NaN
const PACKED_EXPONENT_SPECIAL: u16 = 0xFFF;
/// Significant digits in a packed decimal string
pub const PACKED_DIGITS: i32 = 17;

pub const SINGLE_SIZE: u32 = 4;
pub const DOUBLE_SIZE: u32 = 8;
pub const EXTENDED_SIZE: u32 = 12;
pub const PACKED_SIZE: u32 = 12;

bitfield! {
    /// Raw (storage) bit representation of the extended-precision real format
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct BitsExtReal(pub u128): Debug, FromStorage, IntoStorage, DerefStorage {
        /// f (Mantissa)
        pub f: u64 @ 0..=62,

        /// Explicit integer bit
        pub i: bool @ 63,

        /// Raw mantissa (f + i)
        pub raw_mantissa: u64 @ 0..=63,

        /// Zero
        pub z: u32 [read_only] @ 64..=79,

        /// e (Biased exponent)
        pub e: u64 @ 80..=94,

        /// s (Sign bit)
        pub s: bool @ 95,

        /// Mantissa low long word (third in memory)
        pub low: u32 @ 0..=31,
        /// Mantissa high long word (second in memory)
        pub mid: u32 @ 32..=63,
        /// Sign/exponent long word (first in memory)
        pub high: u32 @ 64..=95,
    }
}

impl BitsExtReal {
    pub fn from_longs(high: Long, mid: Long, low: Long) -> Self {
        Self::default().with_high(high).with_mid(mid).with_low(low)
    }

    pub fn longs(&self) -> [Long; 3] {
        [self.high(), self.mid(), self.low()]
    }

    pub fn nan(s: bool) -> Self {
        // PRM 1.6.5
        Self::default()
            .with_e(u64::MAX)
            .with_f(u64::MAX)
            .with_s(s)
            .with_i(true)
    }

    pub fn is_nan(&self) -> bool {
        // PRM 1.6.5
        self.e() == EXPONENT_MAX && self.f() != 0
    }

    pub fn inf(s: bool) -> Self {
        // PRM 1.6.4
        Self::default().with_e(u64::MAX).with_f(0).with_s(s)
    }

    pub fn is_inf(&self) -> bool {
        // PRM 1.6.4
        self.e() == EXPONENT_MAX && self.f() == 0
    }

    pub fn zero(s: bool) -> Self {
        // PRM 1.6.3
        Self::default().with_e(0).with_f(0).with_s(s)
    }

    pub fn is_zero(&self) -> bool {
        // PRM 1.6.3
        self.raw_mantissa() == 0 && self.e() != EXPONENT_MAX
    }
}

impl From<f64> for BitsExtReal {
    fn from(value: f64) -> Self {
        let s = value.is_sign_negative();
        if value.is_nan() {
            return Self::nan(s);
        }
        if value.is_infinite() {
            return Self::inf(s);
        }
        if value == 0.0 {
            return Self::zero(s);
        }

        let bits = value.to_bits();
        let biased = ((bits >> 52) & 0x7FF) as i64;
        let fraction = bits & ((1 << 52) - 1);
        let (mantissa, exp) = if biased == 0 {
            // Double denormal: normalize, extended range covers it
            let m = fraction << 11;
            let shift = m.leading_zeros();
            (m << shift, 1 - DOUBLE_EXPONENT_BIAS - i64::from(shift))
        } else {
            ((fraction << 11) | (1 << 63), biased - DOUBLE_EXPONENT_BIAS)
        };

        Self::default()
            .with_s(s)
            .with_raw_mantissa(mantissa)
            .with_e((exp + EXPONENT_BIAS) as u64)
    }
}

impl From<BitsExtReal> for f64 {
    fn from(value: BitsExtReal) -> Self {
        let s = value.s();
        let sign = if s { -1.0 } else { 1.0 };

        if value.e() == EXPONENT_MAX {
            // The integer bit is a don't-care for infinities and NaNs
            return if value.f() == 0 {
                sign * Self::INFINITY
            } else {
                Self::NAN.copysign(sign)
            };
        }
        if value.raw_mantissa() == 0 {
            return sign * 0.0;
        }

        // Denormals share the minimum exponent, unnormals have a clear
        // integer bit. Normalize both.
        let exp = if value.e() == 0 {
            1 - EXPONENT_BIAS
        } else {
            value.e() as i64 - EXPONENT_BIAS
        };
        let shift = value.raw_mantissa().leading_zeros();
        let mantissa = value.raw_mantissa() << shift;
        let exp = exp - i64::from(shift);

        if exp > DOUBLE_EXPONENT_BIAS {
            return sign * Self::INFINITY;
        }
        if exp < DOUBLE_EXPONENT_MIN {
            return sign * 0.0;
        }
        Float::from_parts(SEMANTICS_EXTENDED, s, exp, BigInt::from_u64(mantissa)).as_f64()
    }
}

/// Rounds to single precision using the given rounding mode
pub fn round_single(value: f64, rm: RoundingMode) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    Float::from_f64(value)
        .cast_with_rm(SEMANTICS_SINGLE, rm)
        .as_f64()
}

pub fn single_to_f64(raw: Long) -> f64 {
    f64::from(f32::from_bits(raw))
}

pub fn f64_to_single(value: f64) -> Long {
    (value as f32).to_bits()
}

pub fn double_to_f64(hi: Long, lo: Long) -> f64 {
    f64::from_bits((u64::from(hi) << 32) | u64::from(lo))
}

/// Double in memory order (high long word first)
pub fn f64_to_double(value: f64) -> [Long; 2] {
    let bits = value.to_bits();
    [(bits >> 32) as Long, bits as Long]
}

bitfield! {
    /// Raw (storage) bit representation of the packed decimal real format
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct BitsPackedReal(pub u128): Debug, FromStorage, IntoStorage, DerefStorage {
        /// 16 fraction digits, most significant digit first
        pub fraction: u64 @ 0..=63,

        /// Integer digit
        pub integer: u8 @ 64..=67,

        /// 3 exponent digits, most significant digit first
        pub exponent: u16 @ 80..=91,

        /// Infinity/NaN marker bits
        pub yy: u8 @ 92..=93,

        /// Exponent sign
        pub se: bool @ 94,

        /// Mantissa sign
        pub sm: bool @ 95,

        pub low: u32 @ 0..=31,
        pub mid: u32 @ 32..=63,
        pub high: u32 @ 64..=95,
    }
}

impl BitsPackedReal {
    pub fn from_longs(high: Long, mid: Long, low: Long) -> Self {
        Self::default().with_high(high).with_mid(mid).with_low(low)
    }

    pub fn longs(&self) -> [Long; 3] {
        [self.high(), self.mid(), self.low()]
    }

    fn is_special(&self) -> bool {
        self.exponent() == PACKED_EXPONENT_SPECIAL
    }
}

fn bcd_char(digit: u64) -> char {
    char::from_digit((digit & 0xF) as u32, 16).unwrap_or('0')
}

impl From<BitsPackedReal> for f64 {
    fn from(value: BitsPackedReal) -> Self {
        if value.is_special() {
            return if value.fraction() == 0 && value.integer() == 0 {
                if value.sm() {
                    Self::NEG_INFINITY
                } else {
                    Self::INFINITY
                }
            } else {
                Self::NAN
            };
        }

        let mut s = String::with_capacity(32);
        s.push(if value.sm() { '-' } else { '+' });
        s.push(bcd_char(value.integer().into()));
        s.push('.');
        for i in (0..16).rev() {
            s.push(bcd_char(value.fraction() >> (i * 4)));
        }
        s.push('E');
        s.push(if value.se() { '-' } else { '+' });
        for i in (0..3).rev() {
            s.push(bcd_char(u64::from(value.exponent()) >> (i * 4)));
        }

        // Non-decimal digits make the string unparseable
        s.parse().unwrap_or(0.0)
    }
}

/// Number of significant digits for a k-factor, given the decimal exponent
fn kfactor_digits(k: i8, exponent: i32) -> usize {
    let digits = if k > 0 {
        i32::from(k)
    } else {
        // Digits to the right of the decimal point
        exponent + 1 - i32::from(k)
    };
    digits.clamp(1, PACKED_DIGITS) as usize
}

/// Encodes a value as packed decimal with the given k-factor
pub fn f64_to_packed(value: f64, k: i8) -> BitsPackedReal {
    let sm = value.is_sign_negative();
    if value.is_nan() {
        return BitsPackedReal::default()
            .with_exponent(PACKED_EXPONENT_SPECIAL)
            .with_yy(3)
            .with_fraction(u64::MAX);
    }
    if value.is_infinite() {
        return BitsPackedReal::default()
            .with_sm(sm)
            .with_exponent(PACKED_EXPONENT_SPECIAL)
            .with_yy(3);
    }

    let abs = value.abs();
    let magnitude = if abs == 0.0 {
        0
    } else {
        abs.log10().floor() as i32
    };
    let digits = kfactor_digits(k, magnitude);
    let text = format!("{:.*e}", digits - 1, abs);
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return BitsPackedReal::default().with_sm(sm);
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let mut out = BitsPackedReal::default()
        .with_sm(sm)
        .with_se(exponent < 0);

    let mut chars = mantissa.chars().filter(char::is_ascii_digit);
    out.set_integer(chars.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as u8);

    let mut fraction = 0u64;
    for _ in 0..16 {
        let d = chars.next().and_then(|c| c.to_digit(10)).unwrap_or(0);
        fraction = (fraction << 4) | u64::from(d);
    }
    out.set_fraction(fraction);

    let mut bcd = 0u16;
    let e = exponent.unsigned_abs();
    for div in [100, 10, 1] {
        bcd = (bcd << 4) | ((e / div) % 10) as u16;
    }
    out.with_exponent(bcd)
}
