use arpfloat::RoundingMode;

/// Largest scale factor that can still move a value across the whole
/// double range
const SCALE_LIMIT: i32 = 2200;

pub trait FloatMath: Sized {
    /// Splits into a mantissa in [0.5, 1) and a power of two
    fn frexp(self) -> (Self, i32);
    /// Multiplies by 2^exp without intermediate overflow
    fn ldexp(self, exp: i32) -> Self;
    /// Rounds to an integral value in the given mode
    fn round_with(self, rm: RoundingMode) -> Self;
    /// Remainder with the quotient truncated (FMOD)
    fn fmod_quotient(self, divisor: Self) -> (Self, Self);
    /// Remainder with the quotient rounded to nearest even (FREM)
    fn frem_quotient(self, divisor: Self) -> (Self, Self);
}

impl FloatMath for f64 {
    fn frexp(self) -> (Self, i32) {
        if self == 0.0 || !self.is_finite() {
            return (self, 0);
        }
        let (v, adjust) = if self.abs() < Self::MIN_POSITIVE {
            // Subnormal, bring into normal range first
            (self * 2f64.powi(54), -54)
        } else {
            (self, 0)
        };
        let bits = v.to_bits();
        let exp = ((bits >> 52) & 0x7FF) as i32 - 1022;
        let mantissa = Self::from_bits((bits & !(0x7FF << 52)) | (0x3FE << 52));
        (mantissa, exp + adjust)
    }

    fn ldexp(self, exp: i32) -> Self {
        let mut x = self;
        let mut e = exp.clamp(-SCALE_LIMIT, SCALE_LIMIT);
        while e > 1023 {
            x *= 2f64.powi(1023);
            e -= 1023;
        }
        while e < -1022 {
            x *= 2f64.powi(-1022);
            e += 1022;
        }
        x * Self::from_bits(((e + 1023) as u64) << 52)
    }

    fn round_with(self, rm: RoundingMode) -> Self {
        match rm {
            RoundingMode::Zero => self.trunc(),
            RoundingMode::Negative => self.floor(),
            RoundingMode::Positive => self.ceil(),
            _ => self.round_ties_even(),
        }
    }

    fn fmod_quotient(self, divisor: Self) -> (Self, Self) {
        let r = self % divisor;
        let q = (self / divisor).trunc();
        (r, q)
    }

    fn frem_quotient(self, divisor: Self) -> (Self, Self) {
        let (r, q) = self.fmod_quotient(divisor);
        if !r.is_finite() || r == 0.0 {
            return (r, q);
        }
        let half = divisor.abs() * 0.5;
        let odd = q % 2.0 != 0.0;
        let step = if (self < 0.0) != (divisor < 0.0) {
            -1.0
        } else {
            1.0
        };
        if r.abs() > half || (r.abs() == half && odd) {
            (r - divisor.abs().copysign(r), q + step)
        } else {
            (r, q)
        }
    }
}
