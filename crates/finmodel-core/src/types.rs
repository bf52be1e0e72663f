use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples and dimensionless ratios (e.g. 1.5x current ratio)
pub type Multiple = Decimal;

/// Why a metric could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneracyReason {
    /// The denominator of a ratio was zero.
    ZeroDenominator,
    /// An input the metric depends on was not supplied.
    MissingInput,
    /// The computation produced a non-finite value.
    NonFinite,
}

impl std::fmt::Display for DegeneracyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDenominator => write!(f, "zero denominator"),
            Self::MissingInput => write!(f, "missing input"),
            Self::NonFinite => write!(f, "non-finite value"),
        }
    }
}

/// A non-fatal numeric degeneracy: the named metric is unavailable and is
/// reported as `None` wherever it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degeneracy {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<i32>,
    pub reason: DegeneracyReason,
}

impl Degeneracy {
    pub fn new(metric: &str, period: Option<i32>, reason: DegeneracyReason) -> Self {
        Self {
            metric: metric.to_string(),
            period,
            reason,
        }
    }
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.period {
            Some(p) => write!(f, "{} unavailable in period {p}: {}", self.metric, self.reason),
            None => write!(f, "{} unavailable: {}", self.metric, self.reason),
        }
    }
}

/// Divide, recording a degeneracy instead of failing when the denominator is zero.
pub(crate) fn guarded_ratio(
    numerator: Decimal,
    denominator: Decimal,
    metric: &str,
    period: Option<i32>,
    degeneracies: &mut Vec<Degeneracy>,
) -> Option<Decimal> {
    if denominator.is_zero() {
        degeneracies.push(Degeneracy::new(
            metric,
            period,
            DegeneracyReason::ZeroDenominator,
        ));
        return None;
    }
    numerator.checked_div(denominator).or_else(|| {
        degeneracies.push(Degeneracy::new(metric, period, DegeneracyReason::NonFinite));
        None
    })
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    envelope(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        "rust_decimal_128bit",
        result,
    )
}

/// Same as [`with_metadata`] for computations carried out in f64.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    envelope(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        "ieee754_f64",
        result,
    )
}

fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: &str,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_guarded_ratio_zero_denominator() {
        let mut degeneracies = Vec::new();
        let r = guarded_ratio(dec!(10), Decimal::ZERO, "margin", Some(2), &mut degeneracies);
        assert!(r.is_none());
        assert_eq!(degeneracies.len(), 1);
        assert_eq!(degeneracies[0].reason, DegeneracyReason::ZeroDenominator);
        assert_eq!(degeneracies[0].period, Some(2));
    }

    #[test]
    fn test_guarded_ratio_ok() {
        let mut degeneracies = Vec::new();
        let r = guarded_ratio(dec!(1), dec!(4), "x", None, &mut degeneracies);
        assert_eq!(r, Some(dec!(0.25)));
        assert!(degeneracies.is_empty());
    }

    #[test]
    fn test_metadata_precision() {
        let out = with_metadata("m", &serde_json::json!({}), vec![], 0, 1u8);
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
        let out = with_metadata_f64("m", &serde_json::json!({}), vec![], 0, 1u8);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }
}
