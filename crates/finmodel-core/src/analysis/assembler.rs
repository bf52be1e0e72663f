use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assumptions::AssumptionSet;
use crate::distress::{DistressHistory, DistressScore, DistressTrend};
use crate::financials::FinancialPeriod;
use crate::monte_carlo::{OutcomeMetric, SimulationResult};
use crate::projection::Projection;
use crate::scenarios::{ScenarioBundle, SensitivityReport};
use crate::stress::StressReport;
use crate::types::{ComputationOutput, Degeneracy, Money};
use crate::valuation::{DcfValuation, RealOptionValuation};
use crate::FinModelResult;

use super::narrative::{self, NarrativeThresholds, Recommendation};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sub-analyses a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Projection,
    Valuation,
    Scenarios,
    Sensitivity,
    MonteCarlo,
    Distress,
    Stress,
    RealOptions,
}

impl AnalysisKind {
    pub fn all() -> Vec<AnalysisKind> {
        vec![
            Self::Projection,
            Self::Valuation,
            Self::Scenarios,
            Self::Sensitivity,
            Self::MonteCarlo,
            Self::Distress,
            Self::Stress,
            Self::RealOptions,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::Valuation => "valuation",
            Self::Scenarios => "scenarios",
            Self::Sensitivity => "sensitivity",
            Self::MonteCarlo => "monte_carlo",
            Self::Distress => "distress",
            Self::Stress => "stress",
            Self::RealOptions => "real_options",
        }
    }
}

/// Reported figures of the period projections start from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub year: i32,
    pub revenue: Money,
    pub net_income: Money,
    pub operating_cash_flow: Money,
}

impl BaselineSummary {
    pub fn from_period(period: &FinancialPeriod) -> Self {
        Self {
            year: period.year,
            revenue: period.revenue(),
            net_income: period.income_statement.net_income,
            operating_cash_flow: period.cash_flow_statement.operating_cash_flow,
        }
    }
}

/// Simulated 95% interval for the mean of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub metric: OutcomeMetric,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub timestamp: DateTime<Utc>,
    /// "full" when every sub-analysis was requested, else the run kinds joined with '+'
    pub label: String,
    pub analyses_run: Vec<AnalysisKind>,
    pub baseline: BaselineSummary,
    pub assumptions: AssumptionSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<DcfValuation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<ScenarioBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationResult>,
    /// Score of the latest period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distress: Option<DistressScore>,
    /// Scores of the periods before the latest, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distress_history: Vec<DistressScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distress_trend: Option<DistressTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress: Option<StressReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub real_options: Vec<RealOptionValuation>,
    /// Only present when a simulation produced samples
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_bands: Vec<ConfidenceBand>,
    pub interpretation: Vec<String>,
    /// Highest priority first
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<String>,
    pub degeneracies: Vec<Degeneracy>,
}

impl AnalysisResult {
    pub fn ran(&self, kind: AnalysisKind) -> bool {
        self.analyses_run.contains(&kind)
    }

    pub fn is_full(&self) -> bool {
        self.label == "full"
    }

    pub fn to_json(&self) -> FinModelResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Collects sub-analysis outputs into one [`AnalysisResult`].
///
/// Warnings from each sub-result are kept, prefixed with the analysis that
/// raised them. The narrative is built last, from the assembled numbers.
#[derive(Debug)]
pub struct ResultAssembler {
    result: AnalysisResult,
    thresholds: NarrativeThresholds,
    requested: Vec<AnalysisKind>,
}

impl ResultAssembler {
    pub fn new(
        baseline: &FinancialPeriod,
        assumptions: AssumptionSet,
        thresholds: NarrativeThresholds,
    ) -> Self {
        Self {
            result: AnalysisResult {
                timestamp: Utc::now(),
                label: String::new(),
                analyses_run: Vec::new(),
                baseline: BaselineSummary::from_period(baseline),
                assumptions,
                projection: None,
                valuation: None,
                scenarios: None,
                sensitivity: None,
                simulation: None,
                distress: None,
                distress_history: Vec::new(),
                distress_trend: None,
                stress: None,
                real_options: Vec::new(),
                confidence_bands: Vec::new(),
                interpretation: Vec::new(),
                recommendations: Vec::new(),
                warnings: Vec::new(),
                degeneracies: Vec::new(),
            },
            thresholds,
            requested: Vec::new(),
        }
    }

    /// Record the kinds the caller asked for; a request naming every kind is labelled "full"
    /// even when a sub-analysis had no input to run on.
    pub fn requested(&mut self, kinds: &[AnalysisKind]) {
        self.requested = kinds.to_vec();
        self.requested.sort();
        self.requested.dedup();
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.result.warnings.push(warning.into());
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.result.warnings.extend(warnings);
    }

    fn mark(&mut self, kind: AnalysisKind) {
        if !self.result.analyses_run.contains(&kind) {
            self.result.analyses_run.push(kind);
        }
    }

    fn absorb<T: Serialize>(&mut self, kind: AnalysisKind, output: ComputationOutput<T>) -> T {
        self.mark(kind);
        let prefix = kind.as_str();
        self.result
            .warnings
            .extend(output.warnings.into_iter().map(|w| format!("{prefix}: {w}")));
        output.result
    }

    pub fn projection(&mut self, projection: Projection) {
        self.mark(AnalysisKind::Projection);
        self.result
            .degeneracies
            .extend(projection.degeneracies.iter().cloned());
        self.result.projection = Some(projection);
    }

    pub fn valuation(&mut self, output: ComputationOutput<DcfValuation>) {
        self.result.valuation = Some(self.absorb(AnalysisKind::Valuation, output));
    }

    pub fn scenarios(&mut self, output: ComputationOutput<ScenarioBundle>) {
        self.result.scenarios = Some(self.absorb(AnalysisKind::Scenarios, output));
    }

    pub fn sensitivity(&mut self, output: ComputationOutput<SensitivityReport>) {
        self.result.sensitivity = Some(self.absorb(AnalysisKind::Sensitivity, output));
    }

    pub fn simulation(&mut self, output: ComputationOutput<SimulationResult>) {
        let sim = self.absorb(AnalysisKind::MonteCarlo, output);
        if let Some(m) = &sim.metrics {
            self.result.confidence_bands = OutcomeMetric::all()
                .into_iter()
                .map(|metric| {
                    let s = m.summary(metric);
                    ConfidenceBand {
                        metric,
                        mean: s.mean,
                        lower: s.confidence_interval_95.0,
                        upper: s.confidence_interval_95.1,
                        sample_size: s.count,
                    }
                })
                .collect();
        }
        self.result.simulation = Some(sim);
    }

    pub fn distress(&mut self, output: ComputationOutput<DistressHistory>) {
        let history = self.absorb(AnalysisKind::Distress, output);
        self.result.distress_trend = history.trend;
        let mut scores = history.scores;
        let latest = scores.pop();
        if let Some(score) = &latest {
            self.result
                .degeneracies
                .extend(score.degeneracies.iter().cloned());
        }
        self.result.distress = latest;
        self.result.distress_history = scores;
    }

    pub fn stress(&mut self, output: ComputationOutput<StressReport>) {
        self.result.stress = Some(self.absorb(AnalysisKind::Stress, output));
    }

    pub fn real_option(&mut self, output: ComputationOutput<RealOptionValuation>) {
        let valuation = self.absorb(AnalysisKind::RealOptions, output);
        self.result.real_options.push(valuation);
    }

    /// Label the run, then derive the interpretation and ranked recommendations.
    pub fn finish(mut self) -> AnalysisResult {
        self.result.analyses_run.sort();
        let all = AnalysisKind::all();
        self.result.label = if self.requested == all || self.result.analyses_run == all {
            "full".to_string()
        } else {
            self.result
                .analyses_run
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join("+")
        };
        self.result.interpretation = narrative::interpret(&self.result, &self.thresholds);
        self.result.recommendations = narrative::recommend(&self.result, &self.thresholds);
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::statements::tests::sample_period;
    use crate::projection::project;

    #[test]
    fn test_partial_run_label() {
        let p = sample_period(2024);
        let a = AssumptionSet::default();
        let mut asm = ResultAssembler::new(&p, a.clone(), NarrativeThresholds::default());
        asm.projection(project(&p, &a, 3).unwrap());
        let out = asm.finish();
        assert_eq!(out.label, "projection");
        assert!(out.ran(AnalysisKind::Projection));
        assert!(!out.ran(AnalysisKind::Distress));
        assert!(!out.is_full());
        assert!(out.confidence_bands.is_empty());
        let json = out.to_json().unwrap();
        assert_eq!(json["label"], "projection");
        assert!(json.get("distress").is_none());
    }

    #[test]
    fn test_full_request_is_labelled_full_without_every_output() {
        let p = sample_period(2024);
        let a = AssumptionSet::default();
        let mut asm = ResultAssembler::new(&p, a.clone(), NarrativeThresholds::default());
        asm.requested(&AnalysisKind::all());
        asm.projection(project(&p, &a, 3).unwrap());
        let out = asm.finish();
        assert_eq!(out.label, "full");
        assert!(!out.ran(AnalysisKind::RealOptions));
    }

    #[test]
    fn test_kind_order_is_canonical() {
        let mut kinds = vec![AnalysisKind::Stress, AnalysisKind::Projection];
        kinds.sort();
        assert_eq!(kinds, vec![AnalysisKind::Projection, AnalysisKind::Stress]);
    }
}
