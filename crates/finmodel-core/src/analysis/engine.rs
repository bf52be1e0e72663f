use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::assumptions::{build, AssumptionSet, PartialAssumptionSet};
use crate::distress::{self, DistressHistory};
use crate::error::FinModelError;
use crate::financials::{baseline, validate_periods, FinancialPeriod};
use crate::monte_carlo::{
    simulate, standard_risk_factors, CancellationToken, RiskFactor, SimulationConfig,
    SimulationResult,
};
use crate::projection::projector::validate_horizon;
use crate::projection::{project, Projection};
use crate::scenarios::{
    analyze_sensitivity, default_deltas, run_scenarios, ScenarioBundle, ScenarioKind,
    SensitivityReport, SensitivityVariable,
};
use crate::stress::{run_stress_tests, standard_catalog, CrisisShock, StressReport};
use crate::types::{ComputationOutput, Rate};
use crate::valuation::{
    value_projection, value_real_option, DcfInput, DcfValuation, RealOptionInput,
    RealOptionValuation,
};
use crate::FinModelResult;

use super::assembler::{AnalysisKind, AnalysisResult, ResultAssembler};
use super::narrative::NarrativeThresholds;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine-wide settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub wacc: Rate,
    pub horizon: u32,
    pub iterations: u64,
    /// `None` draws a fresh base seed per simulation and reports it
    pub seed: Option<u64>,
    pub batch_size: u64,
    pub sensitivity_deltas: Vec<Decimal>,
    /// Gordon growth rate for a terminal value; none when absent
    pub terminal_growth: Option<Rate>,
    /// Outflow at t = 0 used for the valuation NPV and IRR
    pub initial_investment: Option<Decimal>,
    pub confidence_levels: Vec<f64>,
    pub high_sensitivity_threshold: Rate,
    /// Relative gap allowed in assets = liabilities + equity
    pub accounting_tolerance: Rate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wacc: dec!(0.10),
            horizon: 5,
            iterations: 10_000,
            seed: None,
            batch_size: 500,
            sensitivity_deltas: default_deltas(),
            terminal_growth: None,
            initial_investment: None,
            confidence_levels: vec![0.95, 0.99],
            high_sensitivity_threshold: dec!(0.20),
            accounting_tolerance: dec!(0.01),
        }
    }
}

/// Upper bound on the engine discount rate.
pub const MAX_WACC: Rate = dec!(1);

impl EngineConfig {
    pub fn validate(&self) -> FinModelResult<()> {
        if self.wacc <= dec!(-1) || self.wacc > MAX_WACC {
            return Err(FinModelError::configuration(
                "wacc",
                "WACC must be greater than -100% and at most 100%",
            ));
        }
        validate_horizon(self.horizon)?;
        if self.iterations == 0 {
            return Err(FinModelError::configuration(
                "iterations",
                "At least one iteration is required",
            ));
        }
        if self.batch_size == 0 {
            return Err(FinModelError::configuration(
                "batch_size",
                "Batch size must be positive",
            ));
        }
        if self.sensitivity_deltas.is_empty() {
            return Err(FinModelError::configuration(
                "sensitivity_deltas",
                "At least one delta is required",
            ));
        }
        if self.high_sensitivity_threshold < Decimal::ZERO {
            return Err(FinModelError::configuration(
                "high_sensitivity_threshold",
                "Threshold cannot be negative",
            ));
        }
        if self.accounting_tolerance < Decimal::ZERO {
            return Err(FinModelError::configuration(
                "accounting_tolerance",
                "Tolerance cannot be negative",
            ));
        }
        crate::monte_carlo::metrics::validate_confidence_levels(&self.confidence_levels)
    }

    fn simulation_config(&self, correlation: Option<Vec<Vec<f64>>>) -> SimulationConfig {
        SimulationConfig {
            iterations: self.iterations,
            seed: self.seed,
            batch_size: self.batch_size,
            horizon: self.horizon,
            wacc: self.wacc,
            confidence_levels: self.confidence_levels.clone(),
            correlation,
            ..SimulationConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One analysis invocation. Empty lists fall back to the standard sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub periods: Vec<FinancialPeriod>,
    #[serde(default)]
    pub assumptions: PartialAssumptionSet,
    /// Empty runs every analysis
    #[serde(default)]
    pub analyses: Vec<AnalysisKind>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioKind>,
    #[serde(default)]
    pub sensitivity_variables: Vec<SensitivityVariable>,
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub shock_catalog: Vec<CrisisShock>,
    #[serde(default)]
    pub real_options: Vec<RealOptionInput>,
}

impl AnalysisRequest {
    pub fn new(periods: Vec<FinancialPeriod>) -> Self {
        Self {
            periods,
            assumptions: PartialAssumptionSet::default(),
            analyses: Vec::new(),
            scenarios: Vec::new(),
            sensitivity_variables: Vec::new(),
            risk_factors: Vec::new(),
            correlation: None,
            shock_catalog: Vec::new(),
            real_options: Vec::new(),
        }
    }

    pub fn only(mut self, analyses: &[AnalysisKind]) -> Self {
        self.analyses = analyses.to_vec();
        self
    }

    fn wants(&self, kind: AnalysisKind) -> bool {
        self.analyses.is_empty() || self.analyses.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Modelling engine bound to one configuration.
///
/// Holds no mutable state, so one engine can serve concurrent analyses.
#[derive(Debug, Clone)]
pub struct ModelingEngine {
    config: EngineConfig,
}

impl ModelingEngine {
    pub fn new(config: EngineConfig) -> FinModelResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn thresholds(&self) -> NarrativeThresholds {
        NarrativeThresholds {
            high_sensitivity: self.config.high_sensitivity_threshold,
            ..NarrativeThresholds::default()
        }
    }

    pub fn project(
        &self,
        baseline: &FinancialPeriod,
        assumptions: &AssumptionSet,
    ) -> FinModelResult<Projection> {
        baseline.validate()?;
        project(baseline, assumptions, self.config.horizon)
    }

    pub fn value(&self, projection: &Projection) -> FinModelResult<ComputationOutput<DcfValuation>> {
        value_projection(
            projection,
            &DcfInput {
                wacc: self.config.wacc,
                terminal_growth: self.config.terminal_growth,
                initial_investment: self.config.initial_investment,
            },
        )
    }

    pub fn scenarios(
        &self,
        baseline: &FinancialPeriod,
        assumptions: &AssumptionSet,
        kinds: &[ScenarioKind],
    ) -> FinModelResult<ComputationOutput<ScenarioBundle>> {
        baseline.validate()?;
        let standard;
        let kinds = if kinds.is_empty() {
            standard = ScenarioKind::standard();
            &standard
        } else {
            kinds
        };
        run_scenarios(baseline, assumptions, self.config.horizon, kinds, self.config.wacc)
    }

    pub fn sensitivity(
        &self,
        baseline: &FinancialPeriod,
        assumptions: &AssumptionSet,
        variables: &[SensitivityVariable],
    ) -> FinModelResult<ComputationOutput<SensitivityReport>> {
        baseline.validate()?;
        let all;
        let variables = if variables.is_empty() {
            all = SensitivityVariable::all();
            &all
        } else {
            variables
        };
        analyze_sensitivity(
            baseline,
            assumptions,
            self.config.horizon,
            variables,
            &self.config.sensitivity_deltas,
            self.config.wacc,
            self.config.high_sensitivity_threshold,
        )
    }

    pub fn simulate(
        &self,
        baseline: &FinancialPeriod,
        assumptions: &AssumptionSet,
        factors: &[RiskFactor],
        correlation: Option<Vec<Vec<f64>>>,
        cancel: Option<&CancellationToken>,
    ) -> FinModelResult<ComputationOutput<SimulationResult>> {
        let standard;
        let factors = if factors.is_empty() {
            if correlation.is_some() {
                return Err(FinModelError::configuration(
                    "correlation",
                    "A correlation matrix needs explicitly declared risk factors",
                ));
            }
            standard = standard_risk_factors();
            &standard
        } else {
            factors
        };
        simulate(
            baseline,
            assumptions,
            factors,
            &self.config.simulation_config(correlation),
            cancel,
        )
    }

    /// Score every period against the year before it.
    pub fn score_distress(
        &self,
        periods: &[FinancialPeriod],
    ) -> FinModelResult<ComputationOutput<DistressHistory>> {
        distress::score_periods(periods)
    }

    pub fn stress_test(
        &self,
        baseline: &FinancialPeriod,
        assumptions: &AssumptionSet,
        catalog: &[CrisisShock],
    ) -> FinModelResult<ComputationOutput<StressReport>> {
        baseline.validate()?;
        let standard;
        let catalog = if catalog.is_empty() {
            standard = standard_catalog();
            &standard
        } else {
            catalog
        };
        run_stress_tests(baseline, assumptions, self.config.horizon, catalog, self.config.wacc)
    }

    pub fn value_option(
        &self,
        input: &RealOptionInput,
    ) -> FinModelResult<ComputationOutput<RealOptionValuation>> {
        let mut input = input.clone();
        if input.seed.is_none() {
            input.seed = self.config.seed;
        }
        value_real_option(&input)
    }

    /// Run the requested sub-analyses and assemble one result.
    ///
    /// Periods are validated and assumptions resolved before anything runs.
    /// The first failing sub-analysis aborts the whole request.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: Option<&CancellationToken>,
    ) -> FinModelResult<AnalysisResult> {
        let span = info_span!("analyze", periods = request.periods.len());
        let _guard = span.enter();

        let check = validate_periods(&request.periods, self.config.accounting_tolerance)?;
        let base = baseline(&request.periods)?;
        let built = build(&request.assumptions);
        let assumptions = built.assumptions;

        let mut asm = ResultAssembler::new(base, assumptions.clone(), self.thresholds());
        if request.analyses.is_empty() {
            asm.requested(&AnalysisKind::all());
        } else {
            asm.requested(&request.analyses);
        }
        asm.extend_warnings(check.warnings);
        asm.extend_warnings(built.warnings.into_iter().map(|w| format!("assumptions: {w}")));

        if request.wants(AnalysisKind::Projection) || request.wants(AnalysisKind::Valuation) {
            let projection = project(base, &assumptions, self.config.horizon)?;
            if request.wants(AnalysisKind::Valuation) {
                asm.valuation(self.value(&projection)?);
            }
            if request.wants(AnalysisKind::Projection) {
                asm.projection(projection);
            }
        }
        if request.wants(AnalysisKind::Scenarios) {
            asm.scenarios(self.scenarios(base, &assumptions, &request.scenarios)?);
        }
        if request.wants(AnalysisKind::Sensitivity) {
            asm.sensitivity(self.sensitivity(base, &assumptions, &request.sensitivity_variables)?);
        }
        if request.wants(AnalysisKind::MonteCarlo) {
            asm.simulation(self.simulate(
                base,
                &assumptions,
                &request.risk_factors,
                request.correlation.clone(),
                cancel,
            )?);
        }
        if request.wants(AnalysisKind::Distress) {
            asm.distress(self.score_distress(&request.periods)?);
        }
        if request.wants(AnalysisKind::Stress) {
            asm.stress(self.stress_test(base, &assumptions, &request.shock_catalog)?);
        }
        if request.wants(AnalysisKind::RealOptions) {
            if request.real_options.is_empty() {
                if request.analyses.contains(&AnalysisKind::RealOptions) {
                    asm.warn("real_options: requested but no option inputs supplied");
                } else {
                    debug!("no real option inputs; skipping");
                }
            }
            for input in &request.real_options {
                asm.real_option(self.value_option(input)?);
            }
        }

        let result = asm.finish();
        info!(
            label = %result.label,
            warnings = result.warnings.len(),
            recommendations = result.recommendations.len(),
            "analysis assembled"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::statements::tests::sample_period;

    fn engine() -> ModelingEngine {
        ModelingEngine::new(EngineConfig {
            iterations: 300,
            seed: Some(7),
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.horizon, 5);
        assert_eq!(cfg.wacc, dec!(0.10));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let err = ModelingEngine::new(EngineConfig {
            iterations: 0,
            ..EngineConfig::default()
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_wacc_outside_bounds_rejected() {
        for wacc in [dec!(-1), dec!(10)] {
            let config = EngineConfig {
                wacc,
                ..EngineConfig::default()
            };
            assert!(config.validate().unwrap_err().is_configuration());
        }
    }

    #[test]
    fn test_distress_only_request() {
        let request = AnalysisRequest::new(vec![sample_period(2023), sample_period(2024)])
            .only(&[AnalysisKind::Distress]);
        let result = engine().analyze(&request, None).unwrap();
        assert_eq!(result.label, "distress");
        assert!(result.distress.is_some());
        assert_eq!(result.distress_history.len(), 1);
        assert!(result.distress_trend.is_some());
        assert!(result.projection.is_none());
        assert!(result.simulation.is_none());
    }

    #[test]
    fn test_missing_revenue_fails_whole_request() {
        let mut p = sample_period(2024);
        p.income_statement.revenue = None;
        let err = engine()
            .analyze(&AnalysisRequest::new(vec![p]), None)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_engine_seed_applies_to_simulation() {
        let e = engine();
        let p = sample_period(2024);
        let a = AssumptionSet::default();
        let first = e.simulate(&p, &a, &[], None, None).unwrap().result;
        let second = e.simulate(&p, &a, &[], None, None).unwrap().result;
        assert_eq!(first.seed, 7);
        assert_eq!(first.samples, second.samples);
    }

    #[test]
    fn test_real_options_request_without_inputs_warns() {
        let request = AnalysisRequest::new(vec![sample_period(2024)])
            .only(&[AnalysisKind::RealOptions]);
        let result = engine().analyze(&request, None).unwrap();
        assert!(result.analyses_run.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("no option inputs")));
    }
}
