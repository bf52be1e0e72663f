use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::projection::{project, project_with_shock, DriverShock, Projection, ShockWindow};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::valuation::projection_npv;
use crate::FinModelResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A one-time multiplicative shock applied in the first projected year only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisShock {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "unit")]
    pub revenue_factor: Decimal,
    #[serde(default = "unit")]
    pub cost_factor: Decimal,
    /// Applied to the opening current-asset position
    #[serde(default = "unit")]
    pub current_assets_factor: Decimal,
}

fn unit() -> Decimal {
    Decimal::ONE
}

impl CrisisShock {
    fn driver_shock(&self) -> DriverShock {
        DriverShock {
            revenue_factor: self.revenue_factor,
            cost_factor: self.cost_factor,
            current_assets_factor: self.current_assets_factor,
            window: ShockWindow::FirstPeriod,
        }
    }
}

/// Default shock catalog.
pub fn standard_catalog() -> Vec<CrisisShock> {
    let shock = |name: &str, description: &str, revenue: Decimal, cost: Decimal, ca: Decimal| {
        CrisisShock {
            name: name.into(),
            description: description.into(),
            revenue_factor: revenue,
            cost_factor: cost,
            current_assets_factor: ca,
        }
    };
    vec![
        shock(
            "liquidity_crunch",
            "Current assets cut by 40%",
            Decimal::ONE,
            Decimal::ONE,
            dec!(0.6),
        ),
        shock(
            "demand_shock",
            "Revenue down 30%",
            dec!(0.7),
            Decimal::ONE,
            Decimal::ONE,
        ),
        shock(
            "cost_shock",
            "Costs up 20%",
            Decimal::ONE,
            dec!(1.2),
            Decimal::ONE,
        ),
        shock(
            "combined_macro_shock",
            "Revenue down 30%, costs up 20%, current assets cut by 40%",
            dec!(0.7),
            dec!(1.2),
            dec!(0.6),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricImpact<T> {
    pub base: T,
    pub shocked: T,
    pub delta: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_pct: Option<Rate>,
}

impl MetricImpact<Decimal> {
    fn new(base: Decimal, shocked: Decimal) -> Self {
        let delta = shocked - base;
        Self {
            base,
            shocked,
            delta,
            delta_pct: (!base.is_zero()).then(|| delta / base.abs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockImpact {
    pub shock_name: String,
    pub revenue_t1: MetricImpact<Money>,
    pub free_cash_flow_t1: MetricImpact<Money>,
    pub cumulative_free_cash_flow: MetricImpact<Money>,
    pub npv: MetricImpact<Money>,
    /// Undefined when current liabilities are zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity_ratio_t1: Option<MetricImpact<Multiple>>,
    /// Shocked first-year liquidity ratio below 1
    pub liquidity_breach: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub horizon: u32,
    pub wacc: Rate,
    pub impacts: Vec<ShockImpact>,
    /// Shock with the largest NPV loss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_shock: Option<String>,
}

impl StressReport {
    pub fn impact(&self, name: &str) -> Option<&ShockImpact> {
        self.impacts.iter().find(|i| i.shock_name == name)
    }

    pub fn breaches(&self) -> impl Iterator<Item = &ShockImpact> {
        self.impacts.iter().filter(|i| i.liquidity_breach)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn first(projection: &Projection) -> FinModelResult<&crate::projection::ProjectionPeriod> {
    projection
        .periods
        .first()
        .ok_or_else(|| FinModelError::InsufficientData("Projection contains no periods".into()))
}

/// Apply each shock to the first projected year and report deltas against the unshocked case.
pub fn run_stress_tests(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
    catalog: &[CrisisShock],
    wacc: Rate,
) -> FinModelResult<ComputationOutput<StressReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if catalog.is_empty() {
        return Err(FinModelError::configuration(
            "shock_catalog",
            "At least one shock is required",
        ));
    }
    let mut names = HashSet::new();
    for s in catalog {
        if !names.insert(s.name.as_str()) {
            return Err(FinModelError::configuration(
                "shock_catalog",
                format!("Duplicate shock name '{}'", s.name),
            ));
        }
        if s.revenue_factor < Decimal::ZERO
            || s.cost_factor < Decimal::ZERO
            || s.current_assets_factor < Decimal::ZERO
        {
            return Err(FinModelError::configuration(
                format!("shock_catalog.{}", s.name),
                "Shock factors must be non-negative",
            ));
        }
    }

    let base = project(baseline, assumptions, horizon)?;
    let base_t1 = first(&base)?;
    let base_npv = projection_npv(&base, wacc)?;
    if base_t1.liquidity_ratio.is_none() {
        warnings.push("Current liabilities are zero; liquidity ratio unavailable".into());
    }

    let mut impacts = Vec::with_capacity(catalog.len());
    for s in catalog {
        let shocked = project_with_shock(baseline, assumptions, horizon, &s.driver_shock())?;
        let t1 = first(&shocked)?;
        let npv = projection_npv(&shocked, wacc)?;

        let liquidity_ratio_t1 = match (base_t1.liquidity_ratio, t1.liquidity_ratio) {
            (Some(b), Some(x)) => Some(MetricImpact::new(b, x)),
            _ => None,
        };
        let liquidity_breach = t1.liquidity_ratio.is_some_and(|r| r < Decimal::ONE);
        if liquidity_breach {
            warnings.push(format!(
                "{}: first-year liquidity ratio falls below 1.0",
                s.name
            ));
        }

        impacts.push(ShockImpact {
            shock_name: s.name.clone(),
            revenue_t1: MetricImpact::new(base_t1.revenue, t1.revenue),
            free_cash_flow_t1: MetricImpact::new(base_t1.free_cash_flow, t1.free_cash_flow),
            cumulative_free_cash_flow: MetricImpact::new(
                base.cumulative_free_cash_flow(),
                shocked.cumulative_free_cash_flow(),
            ),
            npv: MetricImpact::new(base_npv, npv),
            liquidity_ratio_t1,
            liquidity_breach,
        });
    }

    let worst_shock = impacts
        .iter()
        .min_by_key(|i| i.npv.delta)
        .filter(|i| i.npv.delta < Decimal::ZERO)
        .map(|i| i.shock_name.clone());

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(shocks = catalog.len(), horizon, elapsed_us = elapsed, "stress tests run");

    Ok(with_metadata(
        "One-time first-year multiplicative shocks against the unshocked projection",
        &serde_json::json!({
            "horizon": horizon,
            "wacc": wacc.to_string(),
            "catalog": catalog,
        }),
        warnings,
        elapsed,
        StressReport {
            horizon,
            wacc,
            impacts,
            worst_shock,
        },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::statements::tests::sample_period;
    use pretty_assertions::assert_eq;

    fn run_standard(horizon: u32) -> StressReport {
        run_stress_tests(
            &sample_period(2024),
            &AssumptionSet::default(),
            horizon,
            &standard_catalog(),
            dec!(0.10),
        )
        .unwrap()
        .result
    }

    #[test]
    fn test_demand_shock_hits_first_year_only() {
        let r = run_standard(3);
        let demand = r.impact("demand_shock").unwrap();
        assert_eq!(demand.revenue_t1.base, dec!(1_050_000));
        assert_eq!(demand.revenue_t1.shocked, dec!(735_000));
        assert_eq!(demand.revenue_t1.delta_pct, Some(dec!(-0.3)));
        assert!(demand.free_cash_flow_t1.delta < Decimal::ZERO);
    }

    #[test]
    fn test_liquidity_crunch_moves_ratio_by_opening_cut() {
        let r = run_standard(3);
        let crunch = r.impact("liquidity_crunch").unwrap();
        let liquidity = crunch.liquidity_ratio_t1.as_ref().unwrap();
        // 200,000 less opening current assets over 250,000 of current liabilities
        assert_eq!(liquidity.delta, dec!(-0.8));
        assert_eq!(crunch.revenue_t1.delta, Decimal::ZERO);
        assert!(!crunch.liquidity_breach);
    }

    #[test]
    fn test_combined_shock_is_worst() {
        let r = run_standard(5);
        assert_eq!(r.worst_shock.as_deref(), Some("combined_macro_shock"));
        let combined = r.impact("combined_macro_shock").unwrap();
        let demand = r.impact("demand_shock").unwrap();
        assert!(combined.npv.delta < demand.npv.delta);
    }

    #[test]
    fn test_later_years_unshocked() {
        let p = sample_period(2024);
        let a = AssumptionSet::default();
        let base = project(&p, &a, 3).unwrap();
        let shock = standard_catalog()[1].driver_shock();
        let shocked = project_with_shock(&p, &a, 3, &shock).unwrap();
        assert_eq!(base.periods[1].revenue, shocked.periods[1].revenue);
        assert_eq!(base.periods[2].free_cash_flow, shocked.periods[2].free_cash_flow);
    }

    #[test]
    fn test_negative_factor_rejected() {
        let bad = CrisisShock {
            name: "bad".into(),
            description: String::new(),
            revenue_factor: dec!(-0.5),
            cost_factor: Decimal::ONE,
            current_assets_factor: Decimal::ONE,
        };
        let err = run_stress_tests(
            &sample_period(2024),
            &AssumptionSet::default(),
            2,
            &[bad],
            dec!(0.10),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
