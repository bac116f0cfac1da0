//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.
//! The single exception is the wave-size formula, which is evaluated
//! once per round in `f64` through [`portable`] and immediately floored
//! to an integer.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for hand-authored fixed-point values.
///
/// Config files are written by people, so values are read and written as
/// decimals (`2.5`) instead of raw bits. The conversion happens once at load
/// time; the simulation only ever sees the resulting [`Fixed`].
pub mod fixed_decimal_serde {
    use super::Fixed;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} does not fit in a fixed-point value")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Squared length of the vector.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Returns true when the vector is shorter than `epsilon`.
    #[must_use]
    pub fn is_negligible(self, epsilon: Fixed) -> bool {
        self.length_squared() < epsilon * epsilon
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Shorten the vector to `max_length` if it is longer, keeping direction.
    #[must_use]
    pub fn clamp_length(self, max_length: Fixed) -> Self {
        if max_length <= Fixed::ZERO {
            return Self::ZERO;
        }
        if self.length_squared() <= max_length * max_length {
            return self;
        }
        self.normalize().scale(max_length)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Portable transcendental functions on `f64`.
///
/// `f64::sin` and `f64::powf` call the platform libm, whose last-bit results
/// differ between targets. These versions use range reduction plus a
/// truncated series built only from `+ - * /` and rounding, which IEEE 754
/// defines exactly, so every platform computes the same bits.
pub mod portable {
    use std::f64::consts::{LN_2, TAU};

    const SERIES_TERMS: u32 = 40;

    /// Sine of `x` radians.
    #[must_use]
    pub fn sin(x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NAN;
        }
        // Reduce into [-pi, pi].
        let r = x - (x / TAU).round() * TAU;
        let r2 = r * r;
        let mut term = r;
        let mut sum = r;
        for k in 1..SERIES_TERMS {
            let n = f64::from(2 * k);
            term *= -r2 / (n * (n + 1.0));
            sum += term;
        }
        sum
    }

    /// Natural logarithm of `x`. Non-positive input yields NaN.
    #[must_use]
    pub fn ln(x: f64) -> f64 {
        if x.is_nan() || x <= 0.0 {
            return f64::NAN;
        }
        if x.is_infinite() {
            return f64::INFINITY;
        }
        let mut m = x;
        let mut exponent = 0i32;
        while m >= 2.0 {
            m /= 2.0;
            exponent += 1;
        }
        while m < 1.0 {
            m *= 2.0;
            exponent -= 1;
        }
        // ln(m) = 2 atanh(s) with s in [0, 1/3).
        let s = (m - 1.0) / (m + 1.0);
        let s2 = s * s;
        let mut power = s;
        let mut sum = 0.0;
        for k in 0..SERIES_TERMS {
            sum += power / f64::from(2 * k + 1);
            power *= s2;
        }
        2.0 * sum + f64::from(exponent) * LN_2
    }

    /// `e` raised to `x`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn exp(x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        if x > 709.0 {
            return f64::INFINITY;
        }
        if x < -745.0 {
            return 0.0;
        }
        // x = k ln2 + r with |r| <= ln2 / 2.
        let k = (x / LN_2).round();
        let r = x - k * LN_2;
        let mut term = 1.0;
        let mut sum = 1.0;
        for n in 1..SERIES_TERMS {
            term *= r / f64::from(n);
            sum += term;
        }
        let mut scale = k as i32;
        while scale > 0 {
            sum *= 2.0;
            scale -= 1;
        }
        while scale < 0 {
            sum /= 2.0;
            scale += 1;
        }
        sum
    }

    /// `base` raised to `exponent`, for positive `base`.
    #[must_use]
    pub fn powf(base: f64, exponent: f64) -> f64 {
        if exponent == 0.0 {
            return 1.0;
        }
        exp(exponent * ln(base))
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        let dist_sq = a.distance_squared(b);
        // 3² + 4² = 25
        assert_eq!(dist_sq, Fixed::from_num(25));
    }

    #[test]
    fn test_fixed_sqrt_of_perfect_squares() {
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        for n in [1, 4, 9, 25, 144] {
            let root = fixed_sqrt(Fixed::from_num(n));
            let expected = Fixed::from_num((n as f64).sqrt());
            assert!((root - expected).abs() < epsilon, "sqrt({n}) = {root}");
        }
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::ONE;
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        // Direction preserved: norm.x * 4 == norm.y * 3
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon, "direction not preserved: {:?}", ratio_diff);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_clamp_length() {
        let v = Vec2Fixed::new(Fixed::from_num(6), Fixed::from_num(8));
        let clamped = v.clamp_length(Fixed::from_num(5));
        let epsilon = Fixed::ONE / Fixed::from_num(1000);
        assert!((clamped.length() - Fixed::from_num(5)).abs() < epsilon);

        let short = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        assert_eq!(short.clamp_length(Fixed::from_num(5)), short);
        assert_eq!(short.clamp_length(Fixed::ZERO), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_is_negligible() {
        let eps = Fixed::ONE / Fixed::from_num(100);
        assert!(Vec2Fixed::ZERO.is_negligible(eps));
        assert!(Vec2Fixed::new(eps / Fixed::from_num(2), Fixed::ZERO).is_negligible(eps));
        assert!(!Vec2Fixed::new(Fixed::ONE, Fixed::ZERO).is_negligible(eps));
    }

    #[test]
    fn test_decimal_serde_reads_human_values() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(with = "fixed_decimal_serde")]
            value: Fixed,
        }
        let holder: Holder = ron::from_str("(value: 2.5)").unwrap();
        assert_eq!(holder.value, Fixed::from_num(2.5));
    }

    fn assert_near(actual: f64, expected: f64) {
        let tolerance = 1e-12 * expected.abs().max(1.0);
        assert!((actual - expected).abs() < tolerance, "{actual} != {expected}");
    }

    #[test]
    fn test_portable_sin_matches_std() {
        for i in -200..200 {
            let x = f64::from(i) * 0.37;
            assert_near(portable::sin(x), x.sin());
        }
        assert!(portable::sin(f64::INFINITY).is_nan());
    }

    #[test]
    fn test_portable_ln_and_exp_match_std() {
        for x in [1e-9, 0.5, 1.0, 1.1, 2.0, 3.75, 1000.0, 1.5e12] {
            assert_near(portable::ln(x), x.ln());
        }
        for x in [-30.0, -1.0, 0.0, 0.25, 1.0, 7.5, 40.0] {
            assert_near(portable::exp(x), x.exp());
        }
        assert!(portable::ln(0.0).is_nan());
        assert_eq!(portable::exp(1000.0), f64::INFINITY);
    }

    #[test]
    fn test_portable_powf_matches_std() {
        for (base, exponent) in [(1.18, 1.0), (1.18, 13.0), (2.0, 10.0), (1.5, 0.0), (0.5, 3.0)] {
            assert_near(portable::powf(base, exponent), base.powf(exponent));
        }
    }
}
