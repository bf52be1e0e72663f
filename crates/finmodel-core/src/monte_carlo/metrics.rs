use serde::{Deserialize, Serialize};

use crate::error::FinModelError;
use crate::FinModelResult;

use super::simulation::RiskDistributionSample;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Simulated scalar outcome of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMetric {
    Revenue,
    Profit,
    FreeCashFlow,
    Npv,
}

impl OutcomeMetric {
    pub fn all() -> [OutcomeMetric; 4] {
        [Self::Revenue, Self::Profit, Self::FreeCashFlow, Self::Npv]
    }

    pub fn value(self, sample: &RiskDistributionSample) -> f64 {
        match self {
            Self::Revenue => sample.revenue,
            Self::Profit => sample.profit,
            Self::FreeCashFlow => sample.free_cash_flow,
            Self::Npv => sample.npv,
        }
    }
}

impl std::fmt::Display for OutcomeMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Revenue => "revenue",
            Self::Profit => "profit",
            Self::FreeCashFlow => "free_cash_flow",
            Self::Npv => "npv",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

/// Value at risk and expected shortfall at one confidence level, measured
/// as shortfall below the sample mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    pub confidence: f64,
    /// The (1 - confidence) empirical quantile of the outcome
    pub threshold: f64,
    pub var: f64,
    pub cvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub metric: OutcomeMetric,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Normal-approximation 95% interval for the mean. Widens as the sample shrinks.
    pub confidence_interval_95: (f64, f64),
    pub percentiles: Percentiles,
    pub skewness: f64,
    pub kurtosis: f64,
    pub tail_risk: Vec<TailRisk>,
    pub histogram: Vec<HistogramBin>,
}

impl OutcomeSummary {
    pub fn var(&self, confidence: f64) -> Option<f64> {
        self.tail(confidence).map(|t| t.var)
    }

    pub fn cvar(&self, confidence: f64) -> Option<f64> {
        self.tail(confidence).map(|t| t.cvar)
    }

    fn tail(&self, confidence: f64) -> Option<&TailRisk> {
        self.tail_risk
            .iter()
            .find(|t| (t.confidence - confidence).abs() < 1e-12)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub sample_size: usize,
    pub confidence_levels: Vec<f64>,
    pub revenue: OutcomeSummary,
    pub profit: OutcomeSummary,
    pub free_cash_flow: OutcomeSummary,
    pub npv: OutcomeSummary,
    pub probability_of_profit: f64,
    pub probability_of_positive_npv: f64,
}

impl RiskMetrics {
    pub fn summary(&self, metric: OutcomeMetric) -> &OutcomeSummary {
        match metric {
            OutcomeMetric::Revenue => &self.revenue,
            OutcomeMetric::Profit => &self.profit,
            OutcomeMetric::FreeCashFlow => &self.free_cash_flow,
            OutcomeMetric::Npv => &self.npv,
        }
    }
}

/// Share of trials reaching a fixed outcome target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAchievement {
    pub metric: OutcomeMetric,
    pub target: f64,
    pub probability: f64,
}

/// Trials outside the [p1, p99] band of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeEvents {
    pub metric: OutcomeMetric,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    /// Trial indices below the 1st percentile, worst first
    pub downside: Vec<u64>,
    /// Trial indices above the 99th percentile, best first
    pub upside: Vec<u64>,
}

/// Pearson correlation between one risk factor's draws and each outcome.
/// `None` where either series has no variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorCorrelation {
    pub factor: String,
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub npv: Option<f64>,
}

impl FactorCorrelation {
    pub fn with(&self, metric: OutcomeMetric) -> Option<f64> {
        match metric {
            OutcomeMetric::Revenue => self.revenue,
            OutcomeMetric::Profit => self.profit,
            OutcomeMetric::FreeCashFlow => self.free_cash_flow,
            OutcomeMetric::Npv => self.npv,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn validate_confidence_levels(levels: &[f64]) -> FinModelResult<()> {
    if levels.is_empty() {
        return Err(FinModelError::configuration(
            "confidence_levels",
            "At least one confidence level is required",
        ));
    }
    if let Some(c) = levels.iter().find(|c| !(**c > 0.0 && **c < 1.0)) {
        return Err(FinModelError::configuration(
            "confidence_levels",
            format!("Confidence level {c} must lie strictly between 0 and 1"),
        ));
    }
    Ok(())
}

/// Aggregate metrics over completed trials.
pub fn compute_metrics(
    samples: &[RiskDistributionSample],
    confidence_levels: &[f64],
) -> FinModelResult<RiskMetrics> {
    validate_confidence_levels(confidence_levels)?;
    if samples.is_empty() {
        return Err(FinModelError::InsufficientData(
            "No completed trials to aggregate".into(),
        ));
    }

    let summarize = |metric: OutcomeMetric| {
        let mut values: Vec<f64> = samples.iter().map(|s| metric.value(s)).collect();
        summarize_outcome(metric, &mut values, confidence_levels)
    };

    Ok(RiskMetrics {
        sample_size: samples.len(),
        confidence_levels: confidence_levels.to_vec(),
        revenue: summarize(OutcomeMetric::Revenue),
        profit: summarize(OutcomeMetric::Profit),
        free_cash_flow: summarize(OutcomeMetric::FreeCashFlow),
        npv: summarize(OutcomeMetric::Npv),
        probability_of_profit: probability_above(samples, OutcomeMetric::Profit, 0.0),
        probability_of_positive_npv: probability_above(samples, OutcomeMetric::Npv, 0.0),
    })
}

/// Empirical P(metric > threshold).
pub fn probability_above(
    samples: &[RiskDistributionSample],
    metric: OutcomeMetric,
    threshold: f64,
) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let hits = samples
        .iter()
        .filter(|s| metric.value(s) > threshold)
        .count();
    hits as f64 / samples.len() as f64
}

pub fn target_achievement(
    samples: &[RiskDistributionSample],
    metric: OutcomeMetric,
    target: f64,
) -> TargetAchievement {
    TargetAchievement {
        metric,
        target,
        probability: probability_above(samples, metric, target),
    }
}

/// Tail trials of `metric`. `None` without samples.
pub fn identify_extreme_events(
    samples: &[RiskDistributionSample],
    metric: OutcomeMetric,
) -> Option<ExtremeEvents> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = samples.iter().map(|s| metric.value(s)).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let lower_threshold = percentile_sorted(&sorted, 1.0);
    let upper_threshold = percentile_sorted(&sorted, 99.0);

    let mut downside: Vec<&RiskDistributionSample> = samples
        .iter()
        .filter(|s| metric.value(s) < lower_threshold)
        .collect();
    let mut upside: Vec<&RiskDistributionSample> = samples
        .iter()
        .filter(|s| metric.value(s) > upper_threshold)
        .collect();
    let by_value = |a: &&RiskDistributionSample, b: &&RiskDistributionSample| {
        metric
            .value(a)
            .partial_cmp(&metric.value(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    downside.sort_by(by_value);
    upside.sort_by(|a, b| by_value(b, a));

    Some(ExtremeEvents {
        metric,
        lower_threshold,
        upper_threshold,
        downside: downside.iter().map(|s| s.trial).collect(),
        upside: upside.iter().map(|s| s.trial).collect(),
    })
}

/// Correlate each factor's per-trial draw with every outcome.
/// `factor_names` is in the order draws were recorded.
pub fn factor_correlations(
    samples: &[RiskDistributionSample],
    factor_names: &[String],
) -> Vec<FactorCorrelation> {
    factor_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let draws: Vec<f64> = samples
                .iter()
                .map(|s| s.factor_draws.get(i).copied().unwrap_or(f64::NAN))
                .collect();
            let against = |metric: OutcomeMetric| {
                let outcomes: Vec<f64> = samples.iter().map(|s| metric.value(s)).collect();
                pearson(&draws, &outcomes)
            };
            FactorCorrelation {
                factor: name.clone(),
                revenue: against(OutcomeMetric::Revenue),
                profit: against(OutcomeMetric::Profit),
                free_cash_flow: against(OutcomeMetric::FreeCashFlow),
                npv: against(OutcomeMetric::Npv),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Percentile of a sorted slice by linear interpolation, `p` in [0, 100].
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let frac = rank - lower as f64;
                sorted[lower] * (1.0 - frac) + sorted[upper] * frac
            }
        }
    }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    let r = cov / denom;
    (denom > f64::EPSILON && r.is_finite()).then(|| r.clamp(-1.0, 1.0))
}

fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let (Some(&min_val), Some(&max_val)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };

    if (max_val - min_val).abs() < f64::EPSILON {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| HistogramBin {
            lower: min_val + i as f64 * bin_width,
            upper: if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            },
            count: 0,
            frequency: 0.0,
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }
    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }
    bins
}

fn tail_risk(sorted: &[f64], mean: f64, confidence: f64) -> TailRisk {
    let threshold = percentile_sorted(sorted, (1.0 - confidence) * 100.0);
    let tail: Vec<f64> = sorted
        .iter()
        .copied()
        .take_while(|v| *v <= threshold)
        .collect();
    // The first sorted value is always at or below any interpolated quantile.
    let tail_mean = if tail.is_empty() {
        threshold
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    TailRisk {
        confidence,
        threshold,
        var: mean - threshold,
        cvar: mean - tail_mean,
    }
}

/// Descriptive statistics. Sorts `values` in place.
fn summarize_outcome(
    metric: OutcomeMetric,
    values: &mut [f64],
    confidence_levels: &[f64],
) -> OutcomeSummary {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    let n = count as f64;

    let mean = values.iter().sum::<f64>() / n;
    let median = percentile_sorted(values, 50.0);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let half_width = 1.96 * std_dev / n.sqrt();

    let percentiles = Percentiles {
        p1: percentile_sorted(values, 1.0),
        p5: percentile_sorted(values, 5.0),
        p10: percentile_sorted(values, 10.0),
        p25: percentile_sorted(values, 25.0),
        p50: median,
        p75: percentile_sorted(values, 75.0),
        p90: percentile_sorted(values, 90.0),
        p95: percentile_sorted(values, 95.0),
        p99: percentile_sorted(values, 99.0),
    };

    // Population skewness and excess kurtosis
    let (skewness, kurtosis) = if std_dev > f64::EPSILON {
        let z = |v: &f64| (v - mean) / std_dev;
        (
            values.iter().map(|v| z(v).powi(3)).sum::<f64>() / n,
            values.iter().map(|v| z(v).powi(4)).sum::<f64>() / n - 3.0,
        )
    } else {
        (0.0, 0.0)
    };

    let tail_risk = confidence_levels
        .iter()
        .map(|&c| tail_risk(values, mean, c))
        .collect();

    OutcomeSummary {
        metric,
        count,
        mean,
        median,
        std_dev,
        min: values[0],
        max: values[count - 1],
        confidence_interval_95: (mean - half_width, mean + half_width),
        percentiles,
        skewness,
        kurtosis,
        tail_risk,
        histogram: build_histogram(values, 20),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_from(values: &[f64]) -> Vec<RiskDistributionSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| RiskDistributionSample {
                trial: i as u64,
                revenue: v * 10.0,
                profit: v,
                free_cash_flow: v,
                npv: v,
                factor_draws: vec![v, 1.0],
            })
            .collect()
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert_eq!(percentile_sorted(&sorted, 25.0), 2.0);
        assert!((percentile_sorted(&sorted, 10.0) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_var_and_cvar_on_uniform_grid() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let m = compute_metrics(&samples_from(&values), &[0.95, 0.99]).unwrap();
        let profit = &m.profit;
        assert!((profit.mean - 50.0).abs() < 1e-12);
        assert!((profit.var(0.95).unwrap() - 45.0).abs() < 1e-9);
        assert!((profit.var(0.99).unwrap() - 49.0).abs() < 1e-9);
        // tail {0..=5}: mean 2.5
        assert!((profit.cvar(0.95).unwrap() - 47.5).abs() < 1e-9);
        assert!(profit.var(0.99).unwrap() >= profit.var(0.95).unwrap());
        assert!(profit.cvar(0.95).unwrap() >= profit.var(0.95).unwrap());
    }

    #[test]
    fn test_probability_above() {
        let samples = samples_from(&[-2.0, -1.0, 1.0, 2.0]);
        assert_eq!(probability_above(&samples, OutcomeMetric::Profit, 0.0), 0.5);
        assert_eq!(probability_above(&samples, OutcomeMetric::Revenue, 15.0), 0.25);
        let m = compute_metrics(&samples, &[0.95]).unwrap();
        assert_eq!(m.probability_of_profit, 0.5);
    }

    #[test]
    fn test_target_achievement() {
        let samples = samples_from(&[1.0, 2.0, 3.0, 4.0]);
        let t = target_achievement(&samples, OutcomeMetric::Revenue, 24.0);
        assert_eq!(t.probability, 0.5);
        assert_eq!(t.target, 24.0);
    }

    #[test]
    fn test_extreme_events_outside_percentile_band() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let e = identify_extreme_events(&samples_from(&values), OutcomeMetric::Npv).unwrap();
        assert!((e.lower_threshold - 1.0).abs() < 1e-9);
        assert!((e.upper_threshold - 99.0).abs() < 1e-9);
        assert_eq!(e.downside, vec![0]);
        assert_eq!(e.upside, vec![100]);
        assert!(identify_extreme_events(&[], OutcomeMetric::Npv).is_none());
    }

    #[test]
    fn test_factor_correlations() {
        let samples = samples_from(&[1.0, 2.0, 3.0, 5.0]);
        let names = vec!["linear".to_string(), "constant".to_string()];
        let c = factor_correlations(&samples, &names);
        assert_eq!(c.len(), 2);
        assert!((c[0].npv.unwrap() - 1.0).abs() < 1e-12);
        assert!((c[0].with(OutcomeMetric::Revenue).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(c[1].npv, None);
    }

    #[test]
    fn test_histogram_counts_sum_to_sample_size() {
        let values: Vec<f64> = (0..1000).map(|i| (i as f64).sqrt()).collect();
        let m = compute_metrics(&samples_from(&values), &[0.95]).unwrap();
        let total: u32 = m.npv.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 1000);
        assert_eq!(m.npv.histogram.len(), 20);
    }

    #[test]
    fn test_interval_widens_with_fewer_samples() {
        let small: Vec<f64> = (0..50).map(|i| (i % 10) as f64).collect();
        let large: Vec<f64> = (0..5000).map(|i| (i % 10) as f64).collect();
        let width = |v: &[f64]| {
            let m = compute_metrics(&samples_from(v), &[0.95]).unwrap();
            m.profit.confidence_interval_95.1 - m.profit.confidence_interval_95.0
        };
        assert!(width(&small) > width(&large));
    }

    #[test]
    fn test_invalid_confidence_level() {
        let err = compute_metrics(&samples_from(&[1.0]), &[1.0]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_samples_insufficient() {
        assert!(matches!(
            compute_metrics(&[], &[0.95]),
            Err(FinModelError::InsufficientData(_))
        ));
    }
}
