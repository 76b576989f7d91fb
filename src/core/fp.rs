//! Fixed-point arithmetic
//!
//! Every quantity that affects game state is an `i64` with [`PRECISION`]
//! fractional bits. Intermediates are widened to `i128` so that products of
//! map-sized coordinates never overflow. Floats only appear when reading
//! scenario files and when presenting values.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Number of fractional bits
pub const PRECISION: u32 = 16;

/// 1.0 in fixed point; also the width of one visibility tile
pub const ONE: i64 = 1 << PRECISION;

/// sqrt(2) in fixed point
pub const SQRT2: i64 = 92_682;

const TRIG_BITS: u32 = 32;
const TRIG_ONE: i128 = 1 << TRIG_BITS;
const TAU_Q32: i128 = 26_986_075_409;
const PI_Q32: i128 = 13_493_037_705;
const TAYLOR_TERMS: i128 = 12;

/// Fixed-point multiply: (a * b) >> PRECISION
#[inline(always)]
pub fn mul(a: i64, b: i64) -> i64 {
    ((a as i128 * b as i128) >> PRECISION) as i64
}

/// Fixed-point divide: (a << PRECISION) / b
///
/// Callers guarantee `b != 0`.
#[inline(always)]
pub fn div(a: i64, b: i64) -> i64 {
    (((a as i128) << PRECISION) / b as i128) as i64
}

#[inline(always)]
pub const fn from_int(v: i64) -> i64 {
    v << PRECISION
}

/// Convert a scenario-file value. Never used on live state.
pub fn from_f64(v: f64) -> i64 {
    (v * ONE as f64).round() as i64
}

pub fn to_f64(v: i64) -> f64 {
    v as f64 / ONE as f64
}

/// Tile coordinate containing a fixed-point coordinate
#[inline(always)]
pub fn to_tile(v: i64) -> i32 {
    (v >> PRECISION) as i32
}

/// Floor of the square root of a non-negative integer
pub fn isqrt(n: i128) -> i128 {
    if n <= 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Smallest integer whose square is at least `n`
pub fn ceil_sqrt(n: i64) -> i64 {
    let root = isqrt(n as i128) as i64;
    if root * root < n {
        root + 1
    } else {
        root
    }
}

/// Value at `x` on the line through `(x1, y1)` and `(x2, y2)`
///
/// Callers guarantee `x1 != x2`.
pub fn line_calc(x1: i64, y1: i64, x2: i64, y2: i64, x: i64) -> i64 {
    (y1 as i128 + (x - x1) as i128 * (y2 - y1) as i128 / (x2 - x1) as i128) as i64
}

/// Cosine and sine of `TAU * num / den`, in fixed point
///
/// Integer Taylor series so that every peer computes identical results.
pub fn cos_sin_turn(num: i64, den: i64) -> (i64, i64) {
    let mut x = TAU_Q32 * num as i128 / den as i128;
    x = x.rem_euclid(TAU_Q32);
    if x > PI_Q32 {
        x -= TAU_Q32;
    }
    let x2 = (x * x) >> TRIG_BITS;

    let mut sin = x;
    let mut term = x;
    for k in 1..=TAYLOR_TERMS {
        term = -((term * x2) >> TRIG_BITS) / ((2 * k) * (2 * k + 1));
        sin += term;
    }

    let mut cos = TRIG_ONE;
    let mut term = TRIG_ONE;
    for k in 1..=TAYLOR_TERMS {
        term = -((term * x2) >> TRIG_BITS) / ((2 * k - 1) * (2 * k));
        cos += term;
    }

    let shift = TRIG_BITS - PRECISION;
    ((cos >> shift) as i64, (sin >> shift) as i64)
}

/// Fixed-point 3D vector; gameplay only uses x and y
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FpVector {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl FpVector {
    pub const ZERO: FpVector = FpVector { x: 0, y: 0, z: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y, z: 0 }
    }

    pub fn new3(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(from_f64(x), from_f64(y))
    }

    /// Squared length in raw units squared
    pub fn length_sq(self) -> i128 {
        self.x as i128 * self.x as i128
            + self.y as i128 * self.y as i128
            + self.z as i128 * self.z as i128
    }

    /// Length in raw units
    pub fn length(self) -> i64 {
        isqrt(self.length_sq()) as i64
    }

    /// Clamp x and y into `[0, max]`
    pub fn clamp_to(self, max: i64) -> Self {
        Self::new3(self.x.clamp(0, max), self.y.clamp(0, max), self.z)
    }
}

impl Add for FpVector {
    type Output = FpVector;
    fn add(self, rhs: FpVector) -> FpVector {
        FpVector::new3(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for FpVector {
    fn add_assign(&mut self, rhs: FpVector) {
        *self = *self + rhs;
    }
}

impl Sub for FpVector {
    type Output = FpVector;
    fn sub(self, rhs: FpVector) -> FpVector {
        FpVector::new3(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for FpVector {
    fn sub_assign(&mut self, rhs: FpVector) {
        *self = *self - rhs;
    }
}

impl Neg for FpVector {
    type Output = FpVector;
    fn neg(self) -> FpVector {
        FpVector::new3(-self.x, -self.y, -self.z)
    }
}

/// Scale by a fixed-point factor
impl Mul<i64> for FpVector {
    type Output = FpVector;
    fn mul(self, rhs: i64) -> FpVector {
        FpVector::new3(mul(self.x, rhs), mul(self.y, rhs), mul(self.z, rhs))
    }
}

/// Divide by a fixed-point divisor
impl Div<i64> for FpVector {
    type Output = FpVector;
    fn div(self, rhs: i64) -> FpVector {
        FpVector::new3(div(self.x, rhs), div(self.y, rhs), div(self.z, rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div() {
        assert_eq!(mul(from_int(3), from_int(4)), from_int(12));
        assert_eq!(div(from_int(1), from_int(2)), ONE / 2);
        assert_eq!(mul(-ONE / 2, from_int(3)), -(3 * ONE) / 2);
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(9), 3);
    }

    #[test]
    fn test_vector_length() {
        let v = FpVector::new(from_int(3), from_int(4));
        assert_eq!(v.length(), from_int(5));
    }

    #[test]
    fn test_cos_sin_quarter_turns() {
        let tolerance = 4;
        let (c, s) = cos_sin_turn(0, 4);
        assert!((c - ONE).abs() <= tolerance && s.abs() <= tolerance);
        let (c, s) = cos_sin_turn(1, 4);
        assert!(c.abs() <= tolerance && (s - ONE).abs() <= tolerance);
        let (c, s) = cos_sin_turn(2, 4);
        assert!((c + ONE).abs() <= tolerance && s.abs() <= tolerance);
        let (c, s) = cos_sin_turn(3, 4);
        assert!(c.abs() <= tolerance && (s + ONE).abs() <= tolerance);
    }

    #[test]
    fn test_line_calc() {
        assert_eq!(line_calc(0, 0, 10, 100, 5), 50);
        assert_eq!(line_calc(10, 100, 0, 0, 5), 50);
    }
}
