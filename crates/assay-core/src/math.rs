//! Fixed-scale decimal arithmetic for metric values.
//!
//! Every metric value in the evaluation tree is materialized through this
//! engine so that repeated aggregation is deterministic and bit-exact across
//! runs on the same inputs, regardless of operation order or thread
//! interleaving. Values carry [`config::DECIMAL_SCALE`](crate::config::DECIMAL_SCALE)
//! fractional digits, and every inexact operation rounds toward the larger
//! value (ceiling), trading a small consistent upward bias for exact
//! reproducibility.
//!
//! Division by zero is a caller error; metric code guards every zero
//! denominator explicitly and returns [`Decimal::ZERO`] for empty windows.

use crate::config::DECIMAL_SCALE;
use serde::{Serialize, Serializer};
use std::fmt;

/// Number of raw units per whole unit (10 ^ scale).
const SCALE_FACTOR: i64 = 10_i64.pow(DECIMAL_SCALE);

/// A decimal number with a fixed number of fractional digits.
///
/// Internally a scaled 64-bit integer (raw value = logical value × 10⁴),
/// so equality, hashing, and ordering are exact.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(i64);

impl Decimal {
    /// The neutral element for [`Decimal::sum`].
    pub const ZERO: Decimal = Decimal(0);
    /// The value 1.0000.
    pub const ONE: Decimal = Decimal(SCALE_FACTOR);

    /// Converts an integer count (rank, window size, judgment total) into
    /// an exact decimal.
    pub fn from_count(count: u64) -> Self {
        Decimal((count as i64).saturating_mul(SCALE_FACTOR))
    }

    /// Converts a float into a decimal, rounding to the nearest
    /// representable value. Returns `None` for non-finite input or values
    /// outside the representable range.
    ///
    /// This is an ingestion-boundary conversion (e.g. replaying persisted
    /// metric values); all in-engine arithmetic stays in fixed scale.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * SCALE_FACTOR as f64).round();
        if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return None;
        }
        Some(Decimal(scaled as i64))
    }

    /// Returns true if this is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Exact addition. Addition of same-scale values never rounds.
    pub fn sum(self, other: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(other.0))
    }

    /// Quotient of `self / divisor`, rounded toward the larger value
    /// (ceiling) at the fixed scale.
    ///
    /// A zero divisor is a caller error and yields [`Decimal::ZERO`];
    /// metric code guards every zero denominator before dividing, so the
    /// clamp can never silently shape a legitimate value.
    pub fn divide(self, divisor: Decimal) -> Decimal {
        if divisor.is_zero() {
            debug_assert!(false, "division by zero must be guarded by the caller");
            return Decimal::ZERO;
        }
        let numerator = self.0 as i128 * SCALE_FACTOR as i128;
        Decimal(ceiling_div(numerator, divisor.0 as i128))
    }

    /// Product of `self * other`, rounded toward the larger value at the
    /// fixed scale.
    pub fn multiply(self, other: Decimal) -> Decimal {
        let product = self.0 as i128 * other.0 as i128;
        Decimal(ceiling_div(product, SCALE_FACTOR as i128))
    }

    /// Lossy conversion for display, report serialization, and test
    /// tolerance checks. Never used as an arithmetic input.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE_FACTOR as f64
    }
}

/// Integer division rounding toward positive infinity.
fn ceiling_div(numerator: i128, denominator: i128) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = if remainder != 0 && (numerator < 0) == (denominator < 0) {
        quotient + 1
    } else {
        quotient
    };
    rounded as i64
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = SCALE_FACTOR as u64;
        write!(f, "{}{}.{:04}", sign, abs / unit, abs % unit)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(n: u64, d: u64) -> Decimal {
        Decimal::from_count(n).divide(Decimal::from_count(d))
    }

    #[test]
    fn test_exact_division_does_not_round() {
        assert_eq!(ratio(1, 2).to_f64(), 0.5);
        assert_eq!(ratio(3, 4).to_f64(), 0.75);
        assert_eq!(ratio(10, 10), Decimal::ONE);
    }

    #[test]
    fn test_inexact_division_rounds_up() {
        // One third at scale 4 under ceiling rounding is 0.3334, not 0.3333.
        assert_eq!(ratio(1, 3).to_f64(), 0.3334);
        assert_eq!(ratio(2, 3).to_f64(), 0.6667);
        assert_eq!(ratio(1, 7).to_f64(), 0.1429);
    }

    #[test]
    fn test_sum_is_exact() {
        let third = ratio(1, 3);
        let sum = third.sum(third).sum(third);
        // 3 * 0.3334 = 1.0002 exactly: the upward bias is visible but stable.
        assert_eq!(sum.to_f64(), 1.0002);
    }

    #[test]
    fn test_multiply_rounds_at_fixed_scale() {
        let two_thirds = ratio(2, 3);
        // 0.6667 * 0.6667 = 0.44448889 -> 0.4445 under ceiling.
        assert_eq!(two_thirds.multiply(two_thirds).to_f64(), 0.4445);
        assert_eq!(Decimal::ONE.multiply(two_thirds), two_thirds);
    }

    #[test]
    fn test_division_by_zero_is_clamped() {
        // Callers guard this path; the clamp exists so a contract violation
        // cannot corrupt aggregate state.
        let result = std::panic::catch_unwind(|| Decimal::ONE.divide(Decimal::ZERO));
        if let Ok(value) = result {
            assert_eq!(value, Decimal::ZERO);
        }
    }

    #[test]
    fn test_sum_order_independence() {
        let values = [ratio(1, 3), ratio(1, 7), ratio(5, 9), ratio(2, 11)];
        let forward = values.iter().fold(Decimal::ZERO, |acc, v| acc.sum(*v));
        let reverse = values.iter().rev().fold(Decimal::ZERO, |acc, v| acc.sum(*v));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_from_f64_boundaries() {
        assert_eq!(Decimal::from_f64(0.3334), Some(ratio(1, 3)));
        assert_eq!(Decimal::from_f64(1.0), Some(Decimal::ONE));
        assert_eq!(Decimal::from_f64(f64::NAN), None);
        assert_eq!(Decimal::from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_display_renders_fixed_digits() {
        assert_eq!(ratio(1, 3).to_string(), "0.3334");
        assert_eq!(Decimal::ONE.to_string(), "1.0000");
        assert_eq!(Decimal::ZERO.to_string(), "0.0000");
    }
}
