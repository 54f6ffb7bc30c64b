//! Accuracy scoring for run outputs.
//!
//! Scores are percentages in `[0, 100]`. Failed runs do not reach the scorer:
//! their score comes from an [`ErrorAccuracyPolicy`], and failures are
//! reported separately through the error rate.

use crate::error::ConfigError;
use crate::store::RunRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Score assigned to a run that produced an error instead of a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAccuracyPolicy {
    /// Accuracy measures correctness given a result; errors count as 100.
    #[default]
    CountAsPerfect,
    /// Errors count as 0.
    CountAsZero,
}

impl ErrorAccuracyPolicy {
    pub fn score(self) -> f64 {
        match self {
            Self::CountAsPerfect => 100.0,
            Self::CountAsZero => 0.0,
        }
    }
}

/// User-supplied scorer: actual output to a percentage.
pub type AccuracyFn = dyn Fn(&Value) -> f64 + Send + Sync;

/// How outputs are scored: against an expected value, or by a custom function.
#[derive(Clone)]
pub enum AccuracySpec {
    Expected(Value),
    Custom(Arc<AccuracyFn>),
}

impl AccuracySpec {
    /// Exactly one of `expected` or `evaluator` must be given.
    pub fn resolve(
        expected: Option<Value>,
        evaluator: Option<Arc<AccuracyFn>>,
    ) -> Result<Self, ConfigError> {
        match (expected, evaluator) {
            (Some(expected), None) => Ok(Self::Expected(expected)),
            (None, Some(evaluator)) => Ok(Self::Custom(evaluator)),
            (None, None) => Err(ConfigError::MissingAccuracySpec),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingAccuracySpec),
        }
    }

    /// Score a successful output. Custom scores are clamped to `[0, 100]`.
    pub fn score(&self, actual: &Value) -> f64 {
        match self {
            Self::Expected(expected) => default_accuracy(expected, actual),
            Self::Custom(evaluator) => {
                let score = evaluator(actual);
                if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) }
            }
        }
    }

    /// Score a stored record, deferring to `policy` for failed runs.
    pub fn score_record(&self, record: &RunRecord, policy: ErrorAccuracyPolicy) -> f64 {
        if record.is_error() {
            return policy.score();
        }
        match &record.result {
            Some(result) => self.score(result),
            None => self.score(&Value::Null),
        }
    }
}

impl fmt::Debug for AccuracySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected(value) => f.debug_tuple("Expected").field(value).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Default scorer.
///
/// Two objects score the share of keys (union of both sides) whose values are
/// equal. Anything else scores 100 when equal and 0 otherwise.
pub fn default_accuracy(expected: &Value, actual: &Value) -> f64 {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            let keys: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
            if keys.is_empty() {
                return 100.0;
            }
            let matching = keys
                .iter()
                .filter(|key| match (expected.get(key.as_str()), actual.get(key.as_str())) {
                    (Some(e), Some(a)) => e == a,
                    _ => false,
                })
                .count();
            matching as f64 / keys.len() as f64 * 100.0
        }
        _ if expected == actual => 100.0,
        _ => 0.0,
    }
}
