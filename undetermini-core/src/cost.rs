//! Exact monetary amounts and per-call cost bookkeeping.
//!
//! [`Cost`] is a signed fixed-point decimal with ten fractional digits, so
//! summing thousands of sub-cent token prices never drifts the way `f64`
//! accumulation does. [`CostLedger`] keeps one bucket per [`CallTag`], which
//! lets the same implementation run many times concurrently without runs
//! seeing each other's spend.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Number of fractional decimal digits kept by [`Cost`].
pub const COST_PRECISION: u32 = 10;
const SCALE: i128 = 10_i128.pow(COST_PRECISION);

/// An exact decimal amount (cents, by convention).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(i128);

impl Cost {
    pub const ZERO: Cost = Cost(0);

    /// Build from a raw count of 10^-10 units.
    pub const fn from_scaled(scaled: i128) -> Self {
        Self(scaled)
    }

    /// Raw count of 10^-10 units.
    pub const fn scaled(self) -> i128 {
        self.0
    }

    /// Round an `f64` to ten fractional digits (half away from zero).
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self((value * SCALE as f64).round() as i128)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Divide by a count, rounding half away from zero. Division by zero
    /// yields zero, which is what an empty average should read as.
    pub fn div_round(self, divisor: usize) -> Self {
        if divisor == 0 {
            return Self::ZERO;
        }
        let divisor = divisor as i128;
        let quotient = self.0 / divisor;
        let remainder = self.0 % divisor;
        if remainder.abs() * 2 >= divisor {
            Self(quotient + self.0.signum())
        } else {
            Self(quotient)
        }
    }

    /// Arithmetic mean of a slice of amounts.
    pub fn mean(values: &[Cost]) -> Self {
        values.iter().copied().sum::<Cost>().div_round(values.len())
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost(self.0 + rhs.0)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.0 += rhs.0;
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        Cost(self.0 - rhs.0)
    }
}

impl Mul<u64> for Cost {
    type Output = Cost;

    fn mul(self, rhs: u64) -> Cost {
        Cost(self.0 * rhs as i128)
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Cost> for Cost {
    fn sum<I: Iterator<Item = &'a Cost>>(iter: I) -> Cost {
        iter.copied().sum()
    }
}

impl From<f64> for Cost {
    fn from(value: f64) -> Self {
        Cost::from_f64(value)
    }
}

impl From<u64> for Cost {
    fn from(value: u64) -> Self {
        Cost(value as i128 * SCALE)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u128;
        let whole = abs / scale;
        let frac = abs % scale;
        if frac == 0 {
            return write!(f, "{sign}{whole}");
        }
        let digits = format!("{:0width$}", frac, width = COST_PRECISION as usize);
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Error returned when a string is not a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cost amount: {0}")]
pub struct ParseCostError(String);

impl FromStr for Cost {
    type Err = ParseCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.contains(['e', 'E']) {
            return text
                .parse::<f64>()
                .map(Cost::from_f64)
                .map_err(|_| ParseCostError(s.to_string()));
        }

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(ParseCostError(s.to_string()));
        }

        let invalid = || ParseCostError(s.to_string());
        let whole_value: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };

        let precision = COST_PRECISION as usize;
        let kept: String = frac.chars().take(precision).collect();
        let mut frac_value: i128 = if kept.is_empty() {
            0
        } else {
            format!("{kept:0<precision$}").parse().map_err(|_| invalid())?
        };
        if let Some(next) = frac.chars().nth(precision) {
            if next >= '5' {
                frac_value += 1;
            }
        }

        let scaled = whole_value
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_value))
            .ok_or_else(invalid)?;
        Ok(Cost(if negative { -scaled } else { scaled }))
    }
}

impl Serialize for Cost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CostVisitor;

        impl Visitor<'_> for CostVisitor {
            type Value = Cost;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or a number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Cost, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Cost, E> {
                Ok(Cost::from_f64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Cost, E> {
                Ok(Cost(v as i128 * SCALE))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Cost, E> {
                Ok(Cost::from(v))
            }
        }

        deserializer.deserialize_any(CostVisitor)
    }
}

/// Identifies one invocation of an implementation in the cost ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallTag(String);

impl CallTag {
    const DEFAULT: &'static str = "default";

    /// A fresh, unique tag for a new run.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The shared bucket used when a caller does not name a tag.
    pub fn default_tag() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call cost buckets shared by every run of one implementation.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    buckets: Arc<Mutex<HashMap<CallTag, Cost>>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buckets<R>(&self, f: impl FnOnce(&mut HashMap<CallTag, Cost>) -> R) -> R {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut buckets)
    }

    /// Start a zeroed bucket for `tag`.
    pub fn open(&self, tag: &CallTag) {
        self.with_buckets(|b| {
            b.insert(tag.clone(), Cost::ZERO);
        });
    }

    /// Add `amount` to the bucket for `tag`, creating it if needed.
    pub fn add(&self, tag: &CallTag, amount: Cost) {
        self.with_buckets(|b| *b.entry(tag.clone()).or_default() += amount);
    }

    /// Current total for `tag` (zero when the bucket does not exist).
    pub fn current(&self, tag: &CallTag) -> Cost {
        self.with_buckets(|b| b.get(tag).copied().unwrap_or_default())
    }

    /// Remove the bucket for `tag` and return its total.
    pub fn take(&self, tag: &CallTag) -> Cost {
        self.with_buckets(|b| b.remove(tag).unwrap_or_default())
    }

    /// Number of buckets currently held.
    pub fn open_buckets(&self) -> usize {
        self.with_buckets(|b| b.len())
    }
}
