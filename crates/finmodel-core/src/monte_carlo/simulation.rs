use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::projection::projector::validate_horizon;
use crate::projection::{project_with_shock, DriverShock};
use crate::types::{with_metadata_f64, ComputationOutput, Rate};
use crate::valuation::projection_npv;
use crate::FinModelResult;

use super::distributions::{CholeskyFactor, RiskDistribution, Sampler};
use super::metrics::{
    compute_metrics, factor_correlations, identify_extreme_events, target_achievement,
    validate_confidence_levels, ExtremeEvents, FactorCorrelation, OutcomeMetric, RiskMetrics,
    TargetAchievement,
};

/// Draws beyond this magnitude cannot be represented safely in the driver equations.
const MAX_DRAW_MAGNITUDE: f64 = 1e9;

/// Keeps copula quantiles away from 0 and 1 where inverse CDFs are infinite.
const QUANTILE_CLAMP: f64 = 1e-12;

/// Odd 64-bit golden-ratio constant used to spread base seeds apart.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of trial `trial` under base seed `base`.
fn trial_seed(base: u64, trial: u64) -> u64 {
    base.wrapping_mul(SEED_MIX) ^ trial
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a risk factor's draw enters the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTarget {
    /// Revenue multiplied by (1 + x) in every period
    RevenueLevel,
    /// Costs multiplied by (1 + x) in every period
    CostLevel,
    /// Added to market growth
    MarketGrowth,
    /// Added to inflation
    Inflation,
    /// Added to the efficiency improvement rate
    EfficiencyImprovement,
    /// Added to the discount rate
    DiscountRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub distribution: RiskDistribution,
    pub target: RiskTarget,
    /// Added to every draw, e.g. -1 to apply a draw near 1 as a revenue level
    #[serde(default)]
    pub offset: f64,
}

impl RiskFactor {
    pub fn new(name: &str, distribution: RiskDistribution, target: RiskTarget) -> Self {
        Self {
            name: name.into(),
            distribution,
            target,
            offset: 0.0,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

/// Default operational, market and financial risk factors.
pub fn standard_risk_factors() -> Vec<RiskFactor> {
    use RiskDistribution as D;
    use RiskTarget as T;
    let normal = |std_dev| D::Normal {
        mean: 0.0,
        std_dev,
    };
    let event = |probability, impact| D::Event {
        probability,
        impact,
    };
    vec![
        RiskFactor::new("demand_volatility", normal(0.15), T::RevenueLevel),
        RiskFactor::new("price_volatility", normal(0.10), T::RevenueLevel),
        RiskFactor::new("competitor_actions", event(0.3, -0.05), T::RevenueLevel),
        RiskFactor::new(
            "production_inefficiency",
            D::Uniform {
                min: -0.05,
                max: 0.15,
            },
            T::CostLevel,
        ),
        RiskFactor::new(
            "supplier_reliability",
            D::BetaMoments {
                mean: 0.95,
                std_dev: 0.05,
            },
            T::RevenueLevel,
        )
        .with_offset(-1.0),
        RiskFactor::new("quality_issues", event(0.05, -0.10), T::RevenueLevel),
        RiskFactor::new("exchange_rate", normal(0.08), T::RevenueLevel),
        RiskFactor::new("interest_rate", normal(0.01), T::DiscountRate),
        RiskFactor::new("credit_risk", event(0.02, -0.03), T::RevenueLevel),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Base seed. Each trial draws from its own generator seeded from the
    /// base seed and the trial index.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Trials per batch; cancellation is checked between batches
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    #[serde(default = "default_wacc")]
    pub wacc: Rate,
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    /// Correlation across risk factors, in declaration order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Vec<Vec<f64>>>,
    /// Final-year revenue target as a multiple of baseline revenue
    #[serde(default = "default_revenue_target_multiple")]
    pub revenue_target_multiple: f64,
}

fn default_iterations() -> u64 {
    10_000
}
fn default_batch_size() -> u64 {
    500
}
fn default_horizon() -> u32 {
    5
}
fn default_wacc() -> Rate {
    dec!(0.10)
}
fn default_revenue_target_multiple() -> f64 {
    1.2
}
pub(crate) fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: None,
            batch_size: default_batch_size(),
            horizon: default_horizon(),
            wacc: default_wacc(),
            confidence_levels: default_confidence_levels(),
            correlation: None,
            revenue_target_multiple: default_revenue_target_multiple(),
        }
    }
}

/// Final-year outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDistributionSample {
    pub trial: u64,
    pub revenue: f64,
    /// Final-year net income
    pub profit: f64,
    pub free_cash_flow: f64,
    pub npv: f64,
    /// Applied draw of each risk factor, in declaration order
    #[serde(default)]
    pub factor_draws: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub requested_iterations: u64,
    /// Trials attempted before completion or cancellation
    pub completed_iterations: u64,
    /// Trials discarded as financially impossible or numerically unusable
    pub skipped_trials: u64,
    /// Cancelled before all requested trials ran
    pub partial: bool,
    pub samples: Vec<RiskDistributionSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RiskMetrics>,
    /// P(final-year revenue > target multiple x baseline revenue)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_achievement: Option<TargetAchievement>,
    /// NPV trials beyond the 1st and 99th percentiles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extreme_events: Option<ExtremeEvents>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factor_correlations: Vec<FactorCorrelation>,
}

/// Cooperative cancellation flag shared with a running simulation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Trial evaluation
// ---------------------------------------------------------------------------

struct TrialContext<'a> {
    baseline: &'a FinancialPeriod,
    assumptions: &'a AssumptionSet,
    factors: &'a [RiskFactor],
    samplers: Vec<Sampler>,
    cholesky: Option<CholeskyFactor>,
    standard_normal: Normal,
    horizon: u32,
    wacc: Rate,
}

impl TrialContext<'_> {
    fn draw(&self, rng: &mut StdRng) -> Vec<f64> {
        match &self.cholesky {
            None => self.samplers.iter().map(|s| s.sample(rng)).collect(),
            Some(chol) => {
                let z: Vec<f64> = (0..self.samplers.len())
                    .map(|_| rng.sample(self.standard_normal))
                    .collect();
                chol.transform(&z)
                    .into_iter()
                    .zip(&self.samplers)
                    .map(|(w, s)| {
                        let u = self
                            .standard_normal
                            .cdf(w)
                            .clamp(QUANTILE_CLAMP, 1.0 - QUANTILE_CLAMP);
                        s.quantile(u)
                    })
                    .collect()
            }
        }
    }

    /// `None` marks a trial to skip.
    fn run(&self, base_seed: u64, trial: u64) -> Option<RiskDistributionSample> {
        let mut rng = StdRng::seed_from_u64(trial_seed(base_seed, trial));
        let draws = self.draw(&mut rng);
        let mut factor_draws = Vec::with_capacity(draws.len());

        let mut assumptions = self.assumptions.clone();
        let mut shock = DriverShock::default();
        let mut wacc = self.wacc;

        for (factor, x) in self.factors.iter().zip(draws) {
            let x = x + factor.offset;
            if !x.is_finite() || x.abs() > MAX_DRAW_MAGNITUDE {
                return None;
            }
            factor_draws.push(x);
            let x = Decimal::from_f64(x)?;
            match factor.target {
                RiskTarget::RevenueLevel => {
                    shock.revenue_factor = shock.revenue_factor.checked_mul(Decimal::ONE + x)?
                }
                RiskTarget::CostLevel => {
                    shock.cost_factor = shock.cost_factor.checked_mul(Decimal::ONE + x)?
                }
                RiskTarget::MarketGrowth => assumptions.industry.market_growth += x,
                RiskTarget::Inflation => assumptions.macroeconomic.inflation += x,
                RiskTarget::EfficiencyImprovement => {
                    assumptions.company.efficiency_improvement_rate += x
                }
                RiskTarget::DiscountRate => wacc += x,
            }
        }

        // Negative revenue or costs are not a business outcome.
        if shock.revenue_factor < Decimal::ZERO || shock.cost_factor < Decimal::ZERO {
            return None;
        }

        let projection = project_with_shock(self.baseline, &assumptions, self.horizon, &shock).ok()?;
        let npv = projection_npv(&projection, wacc).ok()?;
        let last = projection.last()?;

        let sample = RiskDistributionSample {
            trial,
            revenue: last.revenue.to_f64()?,
            profit: last.net_income.to_f64()?,
            free_cash_flow: last.free_cash_flow.to_f64()?,
            npv: npv.to_f64()?,
            factor_draws,
        };
        let finite = [sample.revenue, sample.profit, sample.free_cash_flow, sample.npv]
            .iter()
            .all(|v| v.is_finite());
        finite.then_some(sample)
    }
}

fn validate_config(config: &SimulationConfig, factors: &[RiskFactor]) -> FinModelResult<()> {
    if config.iterations == 0 {
        return Err(FinModelError::configuration(
            "iterations",
            "At least one iteration is required",
        ));
    }
    if config.batch_size == 0 {
        return Err(FinModelError::configuration(
            "batch_size",
            "Batch size must be positive",
        ));
    }
    if config.wacc <= dec!(-1) {
        return Err(FinModelError::configuration(
            "wacc",
            "WACC must be greater than -100%",
        ));
    }
    if factors.is_empty() {
        return Err(FinModelError::configuration(
            "risk_factors",
            "At least one risk factor is required",
        ));
    }
    let mut names = HashSet::new();
    for f in factors {
        if !f.offset.is_finite() {
            return Err(FinModelError::configuration(
                format!("risk_factors.{}.offset", f.name),
                "Offset must be a finite number",
            ));
        }
        if !names.insert(f.name.as_str()) {
            return Err(FinModelError::configuration(
                "risk_factors",
                format!("Duplicate risk factor '{}'", f.name),
            ));
        }
    }
    if !(config.revenue_target_multiple.is_finite() && config.revenue_target_multiple > 0.0) {
        return Err(FinModelError::configuration(
            "revenue_target_multiple",
            "Target multiple must be a positive finite number",
        ));
    }
    validate_confidence_levels(&config.confidence_levels)?;
    validate_horizon(config.horizon)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a Monte Carlo simulation of the projection under stochastic risk factors.
///
/// Every parameter is validated before the first draw. Trials run in batches
/// across the rayon pool; results are identical for a given seed whatever the
/// batch size or thread count. A cancelled run returns the trials completed so
/// far with `partial` set.
pub fn simulate(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    factors: &[RiskFactor],
    config: &SimulationConfig,
    cancel: Option<&CancellationToken>,
) -> FinModelResult<ComputationOutput<SimulationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    baseline.validate()?;
    validate_config(config, factors)?;

    let samplers = factors
        .iter()
        .map(|f| f.distribution.prepare(&f.name))
        .collect::<FinModelResult<Vec<_>>>()?;
    let cholesky = config
        .correlation
        .as_deref()
        .map(|m| CholeskyFactor::new(m, factors.len()))
        .transpose()?;
    let standard_normal = Normal::new(0.0, 1.0)
        .map_err(|e| FinModelError::configuration("standard_normal", e.to_string()))?;

    let ctx = TrialContext {
        baseline,
        assumptions,
        factors,
        samplers,
        cholesky,
        standard_normal,
        horizon: config.horizon,
        wacc: config.wacc,
    };

    let base_seed = config.seed.unwrap_or_else(rand::random::<u64>);
    if config.seed.is_none() {
        warnings.push(format!("No seed supplied; generated base seed {base_seed}"));
    }

    let mut samples = Vec::with_capacity(config.iterations.min(1_000_000) as usize);
    let mut skipped_trials = 0u64;
    let mut completed = 0u64;
    let mut partial = false;

    while completed < config.iterations {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            partial = true;
            break;
        }
        let batch_end = completed.saturating_add(config.batch_size).min(config.iterations);
        let batch_start = completed;
        let batch: Vec<Option<RiskDistributionSample>> = (0..(batch_end - batch_start) as usize)
            .into_par_iter()
            .map(|i| ctx.run(base_seed, batch_start + i as u64))
            .collect();
        for outcome in batch {
            match outcome {
                Some(s) => samples.push(s),
                None => skipped_trials += 1,
            }
        }
        completed = batch_end;
    }

    if partial {
        warn!(
            completed,
            requested = config.iterations,
            "simulation cancelled; returning partial result"
        );
        warnings.push(format!(
            "Simulation cancelled after {completed} of {} trials; intervals reflect the reduced sample",
            config.iterations
        ));
    }
    if skipped_trials > 0 {
        warnings.push(format!(
            "{skipped_trials} trial(s) skipped as financially impossible or numerically unusable"
        ));
    }

    let metrics = if samples.is_empty() {
        if !partial {
            return Err(FinModelError::InsufficientData(
                "Every simulated trial was skipped".into(),
            ));
        }
        None
    } else {
        Some(compute_metrics(&samples, &config.confidence_levels)?)
    };

    let (target_achievement, extreme_events, factor_correlations) = if samples.is_empty() {
        (None, None, Vec::new())
    } else {
        let baseline_revenue = baseline.revenue().to_f64().unwrap_or(0.0);
        let names: Vec<String> = factors.iter().map(|f| f.name.clone()).collect();
        (
            Some(target_achievement(
                &samples,
                OutcomeMetric::Revenue,
                baseline_revenue * config.revenue_target_multiple,
            )),
            identify_extreme_events(&samples, OutcomeMetric::Npv),
            factor_correlations(&samples, &names),
        )
    };

    if samples.len() < 1000 {
        warnings.push(format!(
            "Only {} valid samples; tail metrics are imprecise",
            samples.len()
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(
        trials = completed,
        valid = samples.len(),
        skipped = skipped_trials,
        elapsed_us = elapsed,
        "monte carlo simulation finished"
    );

    let result = SimulationResult {
        seed: base_seed,
        requested_iterations: config.iterations,
        completed_iterations: completed,
        skipped_trials,
        partial,
        samples,
        metrics,
        target_achievement,
        extreme_events,
        factor_correlations,
    };

    Ok(with_metadata_f64(
        "Monte Carlo projection simulation (per-trial seeded, batched)",
        &serde_json::json!({
            "iterations": config.iterations,
            "seed": base_seed,
            "batch_size": config.batch_size,
            "horizon": config.horizon,
            "wacc": config.wacc.to_string(),
            "risk_factors": factors,
            "correlated": config.correlation.is_some(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
