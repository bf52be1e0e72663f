use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FinModelError;
use crate::financials::statements::prior_period;
use crate::financials::{baseline, indicators, FinancialIndicators, FinancialPeriod};
use crate::types::{with_metadata, ComputationOutput, Degeneracy, Rate};
use crate::FinModelResult;

use super::classifiers::{
    altman_z, ohlson_o, springate_s, zmijewski_x, ClassifierScore, ALTMAN_DISTRESS, ALTMAN_SAFE,
};

/// Ensemble probability bands, used when the Altman score is undefined.
const ENSEMBLE_SAFE_BELOW: Rate = dec!(0.25);
const ENSEMBLE_DISTRESS_FROM: Rate = dec!(0.50);

/// Year-over-year ensemble probability moves within this band count as stable.
pub const TREND_TOLERANCE: Rate = dec!(0.02);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistressTier {
    Safe,
    GreyZone,
    Distress,
}

impl std::fmt::Display for DistressTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Safe => "safe",
            Self::GreyZone => "grey zone",
            Self::Distress => "distress",
        };
        write!(f, "{s}")
    }
}

/// Which figure the tier was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    AltmanZ,
    EnsembleProbability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressScore {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<Decimal>,
    pub classifiers: Vec<ClassifierScore>,
    /// Simple average of the defined classifiers' probabilities
    pub ensemble_probability: Rate,
    pub classifiers_included: usize,
    pub tier: DistressTier,
    pub tier_basis: TierBasis,
    pub indicators: FinancialIndicators,
    pub degeneracies: Vec<Degeneracy>,
}

impl DistressScore {
    pub fn classifier(&self, model: super::DistressModel) -> Option<&ClassifierScore> {
        self.classifiers.iter().find(|c| c.model == model)
    }
}

/// Direction of the ensemble distress probability between the two latest periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistressTrend {
    Improving,
    Stable,
    Deteriorating,
}

impl DistressTrend {
    pub fn from_change(change: Rate) -> Self {
        if change > TREND_TOLERANCE {
            Self::Deteriorating
        } else if change < -TREND_TOLERANCE {
            Self::Improving
        } else {
            Self::Stable
        }
    }
}

impl std::fmt::Display for DistressTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Deteriorating => "deteriorating",
        };
        write!(f, "{s}")
    }
}

/// One score per supplied period, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressHistory {
    pub scores: Vec<DistressScore>,
    /// Latest minus previous ensemble probability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_change: Option<Rate>,
    /// `None` with a single period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<DistressTrend>,
}

impl DistressHistory {
    pub fn latest(&self) -> Option<&DistressScore> {
        self.scores.last()
    }

    /// Every score before the latest, oldest first.
    pub fn earlier(&self) -> &[DistressScore] {
        match self.scores.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

pub fn altman_tier(z: Decimal) -> DistressTier {
    if z > ALTMAN_SAFE {
        DistressTier::Safe
    } else if z >= ALTMAN_DISTRESS {
        DistressTier::GreyZone
    } else {
        DistressTier::Distress
    }
}

fn ensemble_tier(p: Rate) -> DistressTier {
    if p < ENSEMBLE_SAFE_BELOW {
        DistressTier::Safe
    } else if p < ENSEMBLE_DISTRESS_FROM {
        DistressTier::GreyZone
    } else {
        DistressTier::Distress
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Score one period. `prior` feeds the O-score trend terms.
pub fn score(
    period: &FinancialPeriod,
    prior: Option<&FinancialPeriod>,
) -> FinModelResult<ComputationOutput<DistressScore>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    period.validate()?;

    let mut degeneracies = Vec::new();
    let classifiers = vec![
        altman_z(period, &mut degeneracies),
        ohlson_o(period, prior, &mut degeneracies),
        zmijewski_x(period, &mut degeneracies),
        springate_s(period, &mut degeneracies),
    ];

    let probabilities: Vec<Rate> = classifiers.iter().filter_map(|c| c.probability).collect();
    if probabilities.is_empty() {
        return Err(FinModelError::InsufficientData(format!(
            "No distress classifier is defined for period {}",
            period.year
        )));
    }
    let ensemble_probability =
        probabilities.iter().copied().sum::<Decimal>() / Decimal::from(probabilities.len());

    for c in classifiers.iter().filter(|c| !c.included) {
        warnings.push(format!("{} excluded from the ensemble: undefined ratio", c.model));
    }
    if prior.is_none() {
        warnings.push("No prior period; Ohlson trend terms set to zero".into());
    }

    let z_score = classifiers[0].score;
    let (tier, tier_basis) = match z_score {
        Some(z) => (altman_tier(z), TierBasis::AltmanZ),
        None => (
            ensemble_tier(ensemble_probability),
            TierBasis::EnsembleProbability,
        ),
    };

    let indicators = indicators(period);
    degeneracies.extend(indicators.degeneracies.iter().cloned());

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(year = period.year, %tier, included = probabilities.len(), "distress scored");

    Ok(with_metadata(
        "Altman Z tiering with Altman/Ohlson/Zmijewski/Springate probability ensemble",
        &serde_json::json!({
            "year": period.year,
            "altman_thresholds": { "safe_above": ALTMAN_SAFE.to_string(), "distress_below": ALTMAN_DISTRESS.to_string() },
            "prior_period": prior.map(|p| p.year),
        }),
        warnings,
        elapsed,
        DistressScore {
            year: period.year,
            z_score,
            classifiers,
            ensemble_probability,
            classifiers_included: probabilities.len(),
            tier,
            tier_basis,
            indicators,
            degeneracies,
        },
    ))
}

/// Score the latest period, using the year before it when present.
pub fn score_latest(periods: &[FinancialPeriod]) -> FinModelResult<ComputationOutput<DistressScore>> {
    let latest = baseline(periods)?;
    score(latest, prior_period(periods, latest.year))
}

/// Score every period against the year before it and report the trend.
pub fn score_periods(
    periods: &[FinancialPeriod],
) -> FinModelResult<ComputationOutput<DistressHistory>> {
    let start = Instant::now();
    baseline(periods)?;

    let mut ordered: Vec<&FinancialPeriod> = periods.iter().collect();
    ordered.sort_by_key(|p| p.year);

    let mut warnings: Vec<String> = Vec::new();
    let mut scores = Vec::with_capacity(ordered.len());
    for period in ordered {
        let out = score(period, prior_period(periods, period.year))?;
        warnings.extend(out.warnings.into_iter().map(|w| format!("{}: {w}", period.year)));
        scores.push(out.result);
    }

    let probability_change = match scores.as_slice() {
        [.., previous, latest] => {
            Some(latest.ensemble_probability - previous.ensemble_probability)
        }
        _ => None,
    };
    let trend = probability_change.map(DistressTrend::from_change);
    if trend == Some(DistressTrend::Deteriorating) {
        warnings.push("Ensemble distress probability rose in the latest period".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(periods = scores.len(), trend = ?trend, elapsed_us = elapsed, "distress history scored");

    Ok(with_metadata(
        "Per-period distress scoring against the preceding period",
        &serde_json::json!({
            "years": scores.iter().map(|s| s.year).collect::<Vec<_>>(),
            "trend_tolerance": TREND_TOLERANCE.to_string(),
        }),
        warnings,
        elapsed,
        DistressHistory {
            scores,
            probability_change,
            trend,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distress::DistressModel;
    use crate::financials::statements::tests::sample_period;

    #[test]
    fn test_altman_tier_thresholds() {
        assert_eq!(altman_tier(dec!(3.0)), DistressTier::Safe);
        assert_eq!(altman_tier(dec!(2.99)), DistressTier::GreyZone);
        assert_eq!(altman_tier(dec!(1.81)), DistressTier::GreyZone);
        assert_eq!(altman_tier(dec!(1.80)), DistressTier::Distress);
    }

    #[test]
    fn test_sample_company_is_grey_zone() {
        let out = score(&sample_period(2024), None).unwrap().result;
        assert_eq!(out.tier, DistressTier::GreyZone);
        assert_eq!(out.tier_basis, TierBasis::AltmanZ);
        assert_eq!(out.classifiers_included, 4);
        assert!(out.ensemble_probability > Decimal::ZERO);
        assert!(out.ensemble_probability < Decimal::ONE);
    }

    #[test]
    fn test_ensemble_excludes_undefined_classifier() {
        let mut p = sample_period(2024);
        p.balance_sheet.shareholders_equity = Decimal::ZERO;
        let out = score(&p, None).unwrap();
        let r = &out.result;
        assert_eq!(r.classifiers_included, 3);
        assert!(r.z_score.is_none());
        assert_eq!(r.tier_basis, TierBasis::EnsembleProbability);
        assert!(!r.classifier(DistressModel::AltmanZ).unwrap().included);
        assert!(out.warnings.iter().any(|w| w.contains("Altman Z")));
    }

    #[test]
    fn test_score_latest_uses_prior_year() {
        let periods = vec![sample_period(2023), sample_period(2024)];
        let out = score_latest(&periods).unwrap();
        assert_eq!(out.result.year, 2024);
        assert!(!out.warnings.iter().any(|w| w.contains("prior period")));
    }

    #[test]
    fn test_score_periods_one_record_per_period() {
        let periods = vec![sample_period(2024), sample_period(2022), sample_period(2023)];
        let out = score_periods(&periods).unwrap().result;
        let years: Vec<i32> = out.scores.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2022, 2023, 2024]);
        assert_eq!(out.latest().map(|s| s.year), Some(2024));
        assert_eq!(out.earlier().len(), 2);
    }

    #[test]
    fn test_single_period_has_no_trend() {
        let out = score_periods(&[sample_period(2024)]).unwrap().result;
        assert_eq!(out.scores.len(), 1);
        assert!(out.trend.is_none());
        assert!(out.probability_change.is_none());
    }

    #[test]
    fn test_trend_from_change() {
        assert_eq!(DistressTrend::from_change(dec!(0.05)), DistressTrend::Deteriorating);
        assert_eq!(DistressTrend::from_change(dec!(-0.05)), DistressTrend::Improving);
        assert_eq!(DistressTrend::from_change(dec!(0.02)), DistressTrend::Stable);
    }

    #[test]
    fn test_missing_revenue_is_validation_error() {
        let mut p = sample_period(2024);
        p.income_statement.revenue = None;
        assert!(score(&p, None).unwrap_err().is_validation());
    }
}
