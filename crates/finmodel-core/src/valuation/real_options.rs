use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::time::Instant;
use tracing::debug;

use crate::error::FinModelError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FinModelResult;

/// Maximum relative gap between estimators before they are reported as diverging.
pub const CONVERGENCE_TOLERANCE: Decimal = dec!(0.02);

const MAX_VOLATILITY: Decimal = dec!(5);
const MAX_RATE: Decimal = dec!(1);
const MAX_TIME_TO_EXPIRY: Decimal = dec!(100);
/// Upper bound on paths x exercise dates held in the LSM price matrix.
const MAX_LSM_CELLS: u64 = 10_000_000;

/// Beyond this many standard deviations the normal CDF is taken as 0 or 1.
const NORMAL_TAIL: Decimal = dec!(8);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealOptionKind {
    /// Pay `exercise_price` to scale up and receive `underlying_value`.
    Expansion,
    /// Wait before committing `exercise_price` to a project worth `underlying_value`.
    Deferral,
    /// Walk away for salvage `exercise_price` from a project worth `underlying_value`.
    Abandonment,
}

impl RealOptionKind {
    fn is_call(self) -> bool {
        !matches!(self, Self::Abandonment)
    }

    fn payoff(self, s: Decimal, k: Decimal) -> Decimal {
        if self.is_call() {
            (s - k).max(Decimal::ZERO)
        } else {
            (k - s).max(Decimal::ZERO)
        }
    }

    fn payoff_f64(self, s: f64, k: f64) -> f64 {
        if self.is_call() {
            (s - k).max(0.0)
        } else {
            (k - s).max(0.0)
        }
    }
}

impl std::fmt::Display for RealOptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Expansion => "expansion",
            Self::Deferral => "deferral",
            Self::Abandonment => "abandonment",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMethod {
    ClosedForm,
    Binomial,
    LeastSquaresMonteCarlo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealOptionInput {
    pub kind: RealOptionKind,
    /// Present value of the cash flows the option controls
    pub underlying_value: Money,
    /// Investment cost, or salvage value for abandonment
    pub exercise_price: Money,
    pub volatility: Rate,
    pub risk_free_rate: Rate,
    /// Years until the option lapses
    pub time_to_expiry: Decimal,
    /// Continuous value leakage / cost of waiting
    #[serde(default)]
    pub dividend_yield: Rate,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Simulated paths for LSM, rounded up to an even count for antithetic pairs
    #[serde(default = "default_paths")]
    pub paths: u32,
    #[serde(default = "default_exercise_dates")]
    pub exercise_dates: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Estimators to run. Empty means all three.
    #[serde(default)]
    pub methods: Vec<PricingMethod>,
}

fn default_steps() -> u32 {
    200
}

fn default_paths() -> u32 {
    100_000
}

fn default_exercise_dates() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsmEstimate {
    pub value: f64,
    pub standard_error: f64,
    pub paths: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealOptionValuation {
    pub kind: RealOptionKind,
    /// European value (Black-Scholes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_form: Option<Money>,
    /// American value (CRR binomial tree)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binomial: Option<Money>,
    /// American value (Longstaff-Schwartz)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub least_squares_mc: Option<LsmEstimate>,
    /// Value of exercising immediately
    pub intrinsic_value: Money,
    /// Binomial minus closed-form, when both ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_exercise_premium: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vega: Option<Decimal>,
    /// Largest pairwise relative gap between the estimators that ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_relative_divergence: Option<Decimal>,
    pub converged: bool,
    pub tolerance: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a real option with closed-form, binomial and least-squares Monte Carlo estimators.
pub fn value_real_option(
    input: &RealOptionInput,
) -> FinModelResult<ComputationOutput<RealOptionValuation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    validate_input(input)?;

    let wants = |m: PricingMethod| input.methods.is_empty() || input.methods.contains(&m);

    let params = if wants(PricingMethod::ClosedForm) {
        Some(compute_bs_params(input)?)
    } else {
        None
    };
    let closed_form = params.as_ref().map(|p| bs_price(input, p)).transpose()?;
    let binomial = if wants(PricingMethod::Binomial) {
        Some(binomial_price(input)?)
    } else {
        None
    };
    let least_squares_mc = if wants(PricingMethod::LeastSquaresMonteCarlo) {
        Some(lsm_price(input, &mut warnings)?)
    } else {
        None
    };

    let mut estimates: Vec<Decimal> = Vec::new();
    estimates.extend(closed_form);
    estimates.extend(binomial);
    if let Some(lsm) = &least_squares_mc {
        estimates.extend(Decimal::from_f64(lsm.value));
    }
    let max_relative_divergence = relative_divergence(&estimates);
    let converged = max_relative_divergence.map_or(true, |d| d <= CONVERGENCE_TOLERANCE);

    let early_exercise_premium = match (binomial, closed_form) {
        (Some(b), Some(c)) => Some(b - c),
        _ => None,
    };
    if !converged {
        if early_exercise_premium.is_some_and(|p| p > Decimal::ZERO) && !input.kind.is_call() {
            warnings.push(
                "Estimators diverge because early exercise has value; the closed form is a European lower bound"
                    .into(),
            );
        } else {
            warnings.push("Option estimators diverge beyond tolerance".into());
        }
    }

    let output = RealOptionValuation {
        kind: input.kind,
        closed_form,
        binomial,
        least_squares_mc,
        intrinsic_value: input.kind.payoff(input.underlying_value, input.exercise_price),
        early_exercise_premium,
        delta: params.as_ref().map(|p| bs_delta(input, p)),
        vega: params.as_ref().and_then(|p| bs_vega(input, p)),
        max_relative_divergence,
        converged,
        tolerance: CONVERGENCE_TOLERANCE,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(kind = %input.kind, elapsed_us = elapsed, "real option valued");

    let assumptions = serde_json::json!({
        "kind": input.kind,
        "steps": input.steps,
        "paths": input.paths,
        "exercise_dates": input.exercise_dates,
        "regression_basis": "1, S/K, (S/K)^2",
    });
    Ok(with_metadata(
        "Black-Scholes, CRR binomial tree, Longstaff-Schwartz",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &RealOptionInput) -> FinModelResult<()> {
    let positive = [
        ("underlying_value", input.underlying_value),
        ("exercise_price", input.exercise_price),
        ("volatility", input.volatility),
        ("time_to_expiry", input.time_to_expiry),
    ];
    for (field, value) in positive {
        if value <= Decimal::ZERO {
            return Err(FinModelError::configuration(field, "must be positive"));
        }
    }
    let bounded = [
        ("volatility", input.volatility, MAX_VOLATILITY),
        ("time_to_expiry", input.time_to_expiry, MAX_TIME_TO_EXPIRY),
        ("risk_free_rate", input.risk_free_rate, MAX_RATE),
        ("dividend_yield", input.dividend_yield, MAX_RATE),
    ];
    for (field, value, max) in bounded {
        if value > max {
            return Err(FinModelError::configuration(
                field,
                format!("must not exceed {max}"),
            ));
        }
    }
    if input.dividend_yield < Decimal::ZERO {
        return Err(FinModelError::configuration("dividend_yield", "must be non-negative"));
    }
    if input.risk_free_rate <= dec!(-1) {
        return Err(FinModelError::configuration(
            "risk_free_rate",
            "must be greater than -100%",
        ));
    }
    if input.steps == 0 || input.steps > 5_000 {
        return Err(FinModelError::configuration("steps", "must be between 1 and 5000"));
    }
    if input.paths < 100 {
        return Err(FinModelError::configuration("paths", "at least 100 paths required"));
    }
    if input.exercise_dates == 0 {
        return Err(FinModelError::configuration("exercise_dates", "must be at least 1"));
    }
    if u64::from(input.paths) * u64::from(input.exercise_dates) > MAX_LSM_CELLS {
        return Err(FinModelError::configuration(
            "paths",
            format!("paths x exercise_dates must not exceed {MAX_LSM_CELLS}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Closed form
// ---------------------------------------------------------------------------

struct BsParams {
    d1: Decimal,
    d2: Decimal,
    sqrt_t: Decimal,
    exp_neg_qt: Decimal,
    exp_neg_rt: Decimal,
}

fn compute_bs_params(input: &RealOptionInput) -> FinModelResult<BsParams> {
    let s = input.underlying_value;
    let k = input.exercise_price;
    let t = input.time_to_expiry;
    let r = input.risk_free_rate;
    let q = input.dividend_yield;
    let sigma = input.volatility;

    let sqrt_t = t
        .sqrt()
        .ok_or_else(|| FinModelError::configuration("time_to_expiry", "square root undefined"))?;
    let sigma_sqrt_t = sigma * sqrt_t;
    let log_moneyness = s
        .checked_div(k)
        .and_then(|ratio| ratio.checked_ln())
        .ok_or_else(|| out_of_range("underlying_value"))?;
    let d1 = (log_moneyness + (r - q + sigma * sigma / dec!(2)) * t)
        .checked_div(sigma_sqrt_t)
        .ok_or_else(|| out_of_range("volatility"))?;
    let d2 = d1 - sigma_sqrt_t;
    Ok(BsParams {
        d1,
        d2,
        sqrt_t,
        exp_neg_qt: checked_exp(-q * t, "dividend_yield")?,
        exp_neg_rt: checked_exp(-r * t, "risk_free_rate")?,
    })
}

fn out_of_range(field: &str) -> FinModelError {
    FinModelError::configuration(field, "option value exceeds the representable range")
}

fn checked_exp(x: Decimal, field: &str) -> FinModelResult<Decimal> {
    x.checked_exp().ok_or_else(|| out_of_range(field))
}

/// Standard normal CDF, flat beyond the tails where the series approximation overflows.
fn cdf(x: Decimal) -> Decimal {
    if x > NORMAL_TAIL {
        Decimal::ONE
    } else if x < -NORMAL_TAIL {
        Decimal::ZERO
    } else {
        x.norm_cdf()
    }
}

fn pdf(x: Decimal) -> Decimal {
    if x.abs() > NORMAL_TAIL {
        Decimal::ZERO
    } else {
        x.checked_norm_pdf().unwrap_or(Decimal::ZERO)
    }
}

fn bs_price(input: &RealOptionInput, p: &BsParams) -> FinModelResult<Decimal> {
    let s = input.underlying_value;
    let k = input.exercise_price;
    let (asset_leg, strike_leg) = if input.kind.is_call() {
        (cdf(p.d1), cdf(p.d2))
    } else {
        (cdf(-p.d1), cdf(-p.d2))
    };
    let asset = s
        .checked_mul(p.exp_neg_qt)
        .and_then(|v| v.checked_mul(asset_leg))
        .ok_or_else(|| out_of_range("underlying_value"))?;
    let strike = k
        .checked_mul(p.exp_neg_rt)
        .and_then(|v| v.checked_mul(strike_leg))
        .ok_or_else(|| out_of_range("exercise_price"))?;
    Ok(if input.kind.is_call() {
        asset - strike
    } else {
        strike - asset
    })
}

fn bs_delta(input: &RealOptionInput, p: &BsParams) -> Decimal {
    if input.kind.is_call() {
        p.exp_neg_qt * cdf(p.d1)
    } else {
        -p.exp_neg_qt * cdf(-p.d1)
    }
}

/// Value change per 1.00 of volatility.
fn bs_vega(input: &RealOptionInput, p: &BsParams) -> Option<Decimal> {
    input
        .underlying_value
        .checked_mul(p.exp_neg_qt)?
        .checked_mul(pdf(p.d1))?
        .checked_mul(p.sqrt_t)
}

// ---------------------------------------------------------------------------
// Binomial tree
// ---------------------------------------------------------------------------

/// Cox-Ross-Rubinstein tree with early exercise at every node.
fn binomial_price(input: &RealOptionInput) -> FinModelResult<Decimal> {
    let s = input.underlying_value;
    let k = input.exercise_price;
    let n = input.steps;
    let dt = input.time_to_expiry / Decimal::from(n);
    let sqrt_dt = dt
        .sqrt()
        .ok_or_else(|| FinModelError::configuration("steps", "time step square root undefined"))?;

    let u = checked_exp(input.volatility * sqrt_dt, "volatility")?;
    let d = Decimal::ONE / u;
    let growth = checked_exp((input.risk_free_rate - input.dividend_yield) * dt, "risk_free_rate")?;
    let disc = checked_exp(-input.risk_free_rate * dt, "risk_free_rate")?;
    let p_up = (growth - d) / (u - d);
    if p_up <= Decimal::ZERO || p_up >= Decimal::ONE {
        return Err(FinModelError::configuration(
            "steps",
            "risk-neutral probability outside (0, 1); increase the number of steps",
        ));
    }
    let p_down = Decimal::ONE - p_up;

    // powers[j] = u^j; d^j = 1 / u^j
    let mut powers = Vec::with_capacity(n as usize + 1);
    let mut acc = Decimal::ONE;
    for _ in 0..=n {
        powers.push(acc);
        acc = acc.checked_mul(u).ok_or_else(|| {
            FinModelError::configuration("volatility", "binomial tree exceeds numeric range")
        })?;
    }
    let node_price = |ups: u32, step: u32| -> FinModelResult<Decimal> {
        let downs = step - ups;
        let price = if ups >= downs {
            s.checked_mul(powers[(ups - downs) as usize])
        } else {
            s.checked_div(powers[(downs - ups) as usize])
        };
        price.ok_or_else(|| out_of_range("volatility"))
    };

    let mut values: Vec<Decimal> = (0..=n)
        .map(|i| Ok(input.kind.payoff(node_price(i, n)?, k)))
        .collect::<FinModelResult<_>>()?;

    for step in (0..n).rev() {
        for i in 0..=step {
            let expected = p_up
                .checked_mul(values[i as usize + 1])
                .zip(p_down.checked_mul(values[i as usize]))
                .and_then(|(up, down)| up.checked_add(down))
                .and_then(|v| v.checked_mul(disc))
                .ok_or_else(|| out_of_range("risk_free_rate"))?;
            let exercise = input.kind.payoff(node_price(i, step)?, k);
            values[i as usize] = expected.max(exercise);
        }
    }

    Ok(values[0])
}

// ---------------------------------------------------------------------------
// Least-squares Monte Carlo
// ---------------------------------------------------------------------------

/// Longstaff-Schwartz with antithetic paths and a quadratic regression basis.
fn lsm_price(input: &RealOptionInput, warnings: &mut Vec<String>) -> FinModelResult<LsmEstimate> {
    let to_f64 = |field: &str, v: Decimal| {
        v.to_f64()
            .ok_or_else(|| FinModelError::configuration(field, "not representable as f64"))
    };
    let s0 = to_f64("underlying_value", input.underlying_value)?;
    let k = to_f64("exercise_price", input.exercise_price)?;
    let sigma = to_f64("volatility", input.volatility)?;
    let r = to_f64("risk_free_rate", input.risk_free_rate)?;
    let q = to_f64("dividend_yield", input.dividend_yield)?;
    let t = to_f64("time_to_expiry", input.time_to_expiry)?;

    let m = input.exercise_dates as usize;
    let pairs = input.paths.div_ceil(2) as usize;
    let n_paths = pairs * 2;
    let dt = t / m as f64;
    let drift = (r - q - 0.5 * sigma * sigma) * dt;
    let vol = sigma * dt.sqrt();
    let disc = (-r * dt).exp();

    let seed = input.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| FinModelError::configuration("volatility", e.to_string()))?;

    // prices[k][j]: price on path j at exercise date k+1; paths 2i and 2i+1 are antithetic
    let mut prices = vec![vec![0.0_f64; n_paths]; m];
    let mut current = vec![s0; n_paths];
    for step in prices.iter_mut() {
        for pair in 0..pairs {
            let z: f64 = rng.sample(normal);
            current[2 * pair] *= (drift + vol * z).exp();
            current[2 * pair + 1] *= (drift - vol * z).exp();
        }
        step.copy_from_slice(&current);
    }

    // Cash flow per path, valued at the current induction date
    let kind = input.kind;
    let mut cash: Vec<f64> = prices[m - 1].iter().map(|&s| kind.payoff_f64(s, k)).collect();
    let mut regressions = 0usize;

    for date in (0..m - 1).rev() {
        for c in cash.iter_mut() {
            *c *= disc;
        }
        let itm: Vec<usize> = (0..n_paths)
            .filter(|&j| kind.payoff_f64(prices[date][j], k) > 0.0)
            .collect();
        if itm.len() < 3 {
            continue;
        }
        let xs: Vec<f64> = itm.iter().map(|&j| prices[date][j] / k).collect();
        let ys: Vec<f64> = itm.iter().map(|&j| cash[j]).collect();
        let Some(beta) = quadratic_fit(&xs, &ys) else {
            continue;
        };
        regressions += 1;
        for (idx, &j) in itm.iter().enumerate() {
            let x = xs[idx];
            let continuation = beta[0] + beta[1] * x + beta[2] * x * x;
            let exercise = kind.payoff_f64(prices[date][j], k);
            if exercise > continuation {
                cash[j] = exercise;
            }
        }
    }
    for c in cash.iter_mut() {
        *c *= disc;
    }
    if regressions == 0 && m > 1 {
        warnings.push("LSM regression never well-posed; early exercise ignored".into());
    }

    let pair_means: Vec<f64> = (0..pairs).map(|i| 0.5 * (cash[2 * i] + cash[2 * i + 1])).collect();
    let mean = pair_means.iter().sum::<f64>() / pairs as f64;
    let var = if pairs > 1 {
        pair_means.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (pairs - 1) as f64
    } else {
        0.0
    };
    let value = mean.max(kind.payoff_f64(s0, k));

    Ok(LsmEstimate {
        value,
        standard_error: (var / pairs as f64).sqrt(),
        paths: n_paths as u32,
        seed,
    })
}

/// Least-squares fit of y on [1, x, x^2] via the normal equations.
fn quadratic_fit(xs: &[f64], ys: &[f64]) -> Option<[f64; 3]> {
    let mut a = [[0.0_f64; 4]; 3];
    for (&x, &y) in xs.iter().zip(ys) {
        let basis = [1.0, x, x * x];
        for row in 0..3 {
            for col in 0..3 {
                a[row][col] += basis[row] * basis[col];
            }
            a[row][3] += basis[row] * y;
        }
    }

    // Gaussian elimination with partial pivoting
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for c in col..4 {
                a[row][c] -= factor * a[col][c];
            }
        }
    }
    let mut beta = [0.0_f64; 3];
    for row in (0..3).rev() {
        let mut sum = a[row][3];
        for c in (row + 1)..3 {
            sum -= a[row][c] * beta[c];
        }
        beta[row] = sum / a[row][row];
    }
    beta.iter().all(|b| b.is_finite()).then_some(beta)
}

fn relative_divergence(estimates: &[Decimal]) -> Option<Decimal> {
    if estimates.len() < 2 {
        return None;
    }
    let mut worst = Decimal::ZERO;
    for (i, a) in estimates.iter().enumerate() {
        for b in &estimates[i + 1..] {
            let scale = a.abs().max(b.abs());
            if scale.is_zero() {
                continue;
            }
            worst = worst.max((a - b).abs() / scale);
        }
    }
    Some(worst)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
