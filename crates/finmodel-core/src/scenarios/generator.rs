use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::projection::{project, ProjectionPeriod};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::valuation::projection_npv;
use crate::FinModelResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Multipliers applied to the growth, cost and efficiency assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFactors {
    pub growth: Decimal,
    pub cost: Decimal,
    pub efficiency: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    Base,
    Optimistic,
    Pessimistic,
    Stressed,
    Custom {
        name: String,
        factors: ScenarioFactors,
    },
}

impl ScenarioKind {
    /// The standard four-scenario set.
    pub fn standard() -> Vec<ScenarioKind> {
        vec![
            ScenarioKind::Base,
            ScenarioKind::Optimistic,
            ScenarioKind::Pessimistic,
            ScenarioKind::Stressed,
        ]
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Base => "base",
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
            Self::Stressed => "stressed",
            Self::Custom { name, .. } => name,
        }
    }

    pub fn factors(&self) -> ScenarioFactors {
        let (growth, cost, efficiency) = match self {
            Self::Base => (Decimal::ONE, Decimal::ONE, Decimal::ONE),
            Self::Optimistic => (dec!(1.2), dec!(0.9), dec!(1.1)),
            Self::Pessimistic => (dec!(0.8), dec!(1.1), dec!(0.9)),
            Self::Stressed => (dec!(0.6), dec!(1.3), dec!(0.7)),
            Self::Custom { factors, .. } => return *factors,
        };
        ScenarioFactors {
            growth,
            cost,
            efficiency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub final_revenue: Money,
    pub final_free_cash_flow: Money,
    pub cumulative_free_cash_flow: Money,
    pub npv: Money,
}

/// Named projections sharing one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBundle {
    pub horizon: u32,
    pub wacc: Rate,
    pub scenarios: BTreeMap<String, Vec<ProjectionPeriod>>,
    /// In request order
    pub summaries: Vec<ScenarioSummary>,
}

impl ScenarioBundle {
    pub fn get(&self, name: &str) -> Option<&[ProjectionPeriod]> {
        self.scenarios.get(name).map(Vec::as_slice)
    }

    pub fn summary(&self, name: &str) -> Option<&ScenarioSummary> {
        self.summaries.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Derive the assumption set for one scenario. `Base` returns the input unchanged.
pub fn generate(assumptions: &AssumptionSet, kind: &ScenarioKind) -> AssumptionSet {
    if matches!(kind, ScenarioKind::Base) {
        return assumptions.clone();
    }
    let f = kind.factors();
    let mut out = assumptions.clone();
    out.industry.market_growth *= f.growth;
    out.company.cost_level_factor *= f.cost;
    out.company.efficiency_improvement_rate *= f.efficiency;
    out
}

/// Project every requested scenario over the same horizon.
pub fn run_scenarios(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
    kinds: &[ScenarioKind],
    wacc: Rate,
) -> FinModelResult<ComputationOutput<ScenarioBundle>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if kinds.is_empty() {
        return Err(FinModelError::configuration(
            "scenarios",
            "At least one scenario is required",
        ));
    }

    let mut scenarios = BTreeMap::new();
    let mut summaries = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let name = kind.name().to_string();
        if scenarios.contains_key(&name) {
            return Err(FinModelError::configuration(
                "scenarios",
                format!("Duplicate scenario name '{name}'"),
            ));
        }
        let f = kind.factors();
        if f.growth < Decimal::ZERO || f.cost < Decimal::ZERO || f.efficiency < Decimal::ZERO {
            return Err(FinModelError::configuration(
                format!("scenarios.{name}.factors"),
                "Scenario factors must be non-negative",
            ));
        }

        let scenario_assumptions = generate(assumptions, kind);
        let projection = project(baseline, &scenario_assumptions, horizon)?;
        for d in &projection.degeneracies {
            warnings.push(format!("{name}: {d}"));
        }
        let npv = projection_npv(&projection, wacc)?;
        let last = projection.last().ok_or_else(|| {
            FinModelError::InsufficientData("Projection contains no periods".into())
        })?;

        summaries.push(ScenarioSummary {
            name: name.clone(),
            final_revenue: last.revenue,
            final_free_cash_flow: last.free_cash_flow,
            cumulative_free_cash_flow: projection.cumulative_free_cash_flow(),
            npv,
        });
        scenarios.insert(name, projection.periods);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    debug!(count = kinds.len(), horizon, elapsed_us = elapsed, "scenarios projected");

    let factor_table: Vec<_> = kinds
        .iter()
        .map(|k| serde_json::json!({ "name": k.name(), "factors": k.factors() }))
        .collect();
    Ok(with_metadata(
        "Deterministic scenario projection (multiplicative factor table)",
        &serde_json::json!({
            "horizon": horizon,
            "wacc": wacc.to_string(),
            "factors": factor_table,
        }),
        warnings,
        elapsed,
        ScenarioBundle {
            horizon,
            wacc,
            scenarios,
            summaries,
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

    #[test]
    fn test_base_is_unmodified() {
        let a = AssumptionSet::default();
        assert_eq!(generate(&a, &ScenarioKind::Base), a);
    }

    #[test]
    fn test_stressed_factors_applied() {
        let a = AssumptionSet::default();
        let s = generate(&a, &ScenarioKind::Stressed);
        assert_eq!(s.industry.market_growth, dec!(0.03));
        assert_eq!(s.company.cost_level_factor, dec!(1.3));
        assert_eq!(s.company.efficiency_improvement_rate, dec!(0.035));
        assert_eq!(s.macroeconomic, a.macroeconomic);
    }

    #[test]
    fn test_bundle_shares_horizon() {
        let bundle = run_scenarios(
            &sample_period(2024),
            &AssumptionSet::default(),
            4,
            &ScenarioKind::standard(),
            dec!(0.10),
        )
        .unwrap()
        .result;
        assert_eq!(bundle.scenarios.len(), 4);
        assert!(bundle.scenarios.values().all(|p| p.len() == 4));
        assert_eq!(bundle.summaries[0].name, "base");
    }

    #[test]
    fn test_scenario_ordering() {
        let bundle = run_scenarios(
            &sample_period(2024),
            &AssumptionSet::default(),
            5,
            &ScenarioKind::standard(),
            dec!(0.10),
        )
        .unwrap()
        .result;
        let base = bundle.get("base").unwrap();
        let opt = bundle.get("optimistic").unwrap();
        let pess = bundle.get("pessimistic").unwrap();
        let stressed = bundle.get("stressed").unwrap();
        for t in 0..5 {
            assert!(pess[t].free_cash_flow <= base[t].free_cash_flow);
            assert!(base[t].free_cash_flow <= opt[t].free_cash_flow);
            assert!(stressed[t].free_cash_flow <= pess[t].free_cash_flow);
        }
    }

    #[test]
    fn test_custom_scenario() {
        let custom = ScenarioKind::Custom {
            name: "flat".into(),
            factors: ScenarioFactors {
                growth: Decimal::ZERO,
                cost: Decimal::ONE,
                efficiency: Decimal::ONE,
            },
        };
        let bundle = run_scenarios(
            &sample_period(2024),
            &AssumptionSet::default(),
            2,
            &[custom],
            dec!(0.10),
        )
        .unwrap()
        .result;
        let flat = bundle.get("flat").unwrap();
        assert_eq!(flat[0].revenue, dec!(1_000_000));
        assert_eq!(flat[1].revenue, dec!(1_000_000));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = run_scenarios(
            &sample_period(2024),
            &AssumptionSet::default(),
            2,
            &[ScenarioKind::Base, ScenarioKind::Base],
            dec!(0.10),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
