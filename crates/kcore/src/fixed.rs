//! Signed 17.14 fixed-point numbers.
//!
//! The MLFQS formulas need fractional values (`load_avg`, `recent_cpu`) but
//! kernel code cannot touch the floating-point unit. A [`Fixed`] stores a
//! real number `x` as the integer `x * 2^14` in an `i32`, leaving 17 bits
//! for the integer part. Products and quotients widen to `i64` before
//! rescaling so intermediate results do not overflow.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Number of fractional bits.
pub const FRACTION_BITS: u32 = 14;

/// Raw representation of `1.0`.
const F: i32 = 1 << FRACTION_BITS;

/// A signed fixed-point number with 14 fractional bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(F);

    /// Converts an integer to fixed point.
    pub const fn from_int(n: i32) -> Self {
        Self(n * F)
    }

    /// Wraps an already scaled raw value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the scaled raw value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Converts to integer, rounding toward zero.
    pub const fn to_int_trunc(self) -> i32 {
        self.0 / F
    }

    /// Converts to integer, rounding to nearest with ties away from zero.
    pub const fn to_int_nearest(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    pub const fn add_int(self, n: i32) -> Self {
        Self(self.0 + n * F)
    }

    pub const fn sub_int(self, n: i32) -> Self {
        Self(self.0 - n * F)
    }

    pub const fn mul_int(self, n: i32) -> Self {
        Self(self.0 * n)
    }

    /// Value times 100, rounded to nearest with ties away from zero.
    ///
    /// Computed in 64 bits: the scaled product outgrows an `i32` once the
    /// value passes about 1310.
    pub const fn hundredths(self) -> i32 {
        let scaled = self.0 as i64 * 100;
        let half = (F / 2) as i64;
        let rounded = if scaled >= 0 {
            (scaled + half) / F as i64
        } else {
            (scaled - half) / F as i64
        };
        rounded as i32
    }

    /// Divides by an integer, truncating the raw quotient.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub const fn div_int(self, n: i32) -> Self {
        Self(self.0 / n)
    }

    /// Multiplies two fixed-point values through a 64-bit intermediate.
    pub const fn mul_fixed(self, other: Self) -> Self {
        Self(((self.0 as i64) * (other.0 as i64) / F as i64) as i32)
    }

    /// Divides two fixed-point values through a 64-bit intermediate.
    ///
    /// # Panics
    ///
    /// Panics if `other` is zero.
    pub const fn div_fixed(self, other: Self) -> Self {
        Self(((self.0 as i64) * (F as i64) / other.0 as i64) as i32)
    }
}

impl Add for Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Fixed {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.mul_fixed(rhs)
    }
}

impl Mul<i32> for Fixed {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        self.mul_int(rhs)
    }
}

impl Div for Fixed {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        self.div_fixed(rhs)
    }
}

impl Div<i32> for Fixed {
    type Output = Self;

    fn div(self, rhs: i32) -> Self {
        self.div_int(rhs)
    }
}

impl Neg for Fixed {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({}/{F})", self.0)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimal places, the precision the reporting API exposes.
        let hundredths = self.hundredths();
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
