use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::projection::project;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::valuation::projection_npv;
use crate::FinModelResult;

/// Default symmetric sweep: -2%, -1%, 0, +1%, +2%.
pub fn default_deltas() -> Vec<Decimal> {
    vec![dec!(-0.02), dec!(-0.01), Decimal::ZERO, dec!(0.01), dec!(0.02)]
}

/// Assumption a sensitivity sweep perturbs. Deltas are additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityVariable {
    MarketGrowth,
    Inflation,
    EfficiencyImprovement,
    CapacityExpansion,
    CostLevel,
    Wacc,
}

impl SensitivityVariable {
    pub fn all() -> Vec<SensitivityVariable> {
        vec![
            Self::MarketGrowth,
            Self::Inflation,
            Self::EfficiencyImprovement,
            Self::CapacityExpansion,
            Self::CostLevel,
            Self::Wacc,
        ]
    }

    fn perturb(self, assumptions: &mut AssumptionSet, wacc: &mut Rate, delta: Decimal) {
        match self {
            Self::MarketGrowth => assumptions.industry.market_growth += delta,
            Self::Inflation => assumptions.macroeconomic.inflation += delta,
            Self::EfficiencyImprovement => assumptions.company.efficiency_improvement_rate += delta,
            Self::CapacityExpansion => assumptions.company.capacity_expansion_rate += delta,
            Self::CostLevel => assumptions.company.cost_level_factor += delta,
            Self::Wacc => *wacc += delta,
        }
    }
}

impl std::fmt::Display for SensitivityVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MarketGrowth => "market growth",
            Self::Inflation => "inflation",
            Self::EfficiencyImprovement => "efficiency improvement",
            Self::CapacityExpansion => "capacity expansion",
            Self::CostLevel => "cost level",
            Self::Wacc => "WACC",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub delta: Decimal,
    pub npv: Money,
    pub change_from_base: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySweep {
    pub variable: SensitivityVariable,
    pub base_npv: Money,
    pub points: Vec<SensitivityPoint>,
    /// (max NPV - min NPV) / |base NPV| across the sweep
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npv_swing_pct: Option<Rate>,
    pub high_sensitivity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub wacc: Rate,
    pub horizon: u32,
    pub threshold: Rate,
    pub sweeps: Vec<SensitivitySweep>,
}

impl SensitivityReport {
    /// Variables whose sweep moves NPV by more than the threshold, largest swing first.
    pub fn high_sensitivity_variables(&self) -> Vec<&SensitivitySweep> {
        let mut high: Vec<_> = self.sweeps.iter().filter(|s| s.high_sensitivity).collect();
        high.sort_by(|a, b| b.npv_swing_pct.cmp(&a.npv_swing_pct));
        high
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Sweep one variable. A zero delta reuses the unperturbed inputs, so its NPV
/// equals the base NPV exactly.
pub fn sweep(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
    variable: SensitivityVariable,
    deltas: &[Decimal],
    wacc: Rate,
    threshold: Rate,
) -> FinModelResult<SensitivitySweep> {
    if deltas.is_empty() {
        return Err(FinModelError::configuration(
            "sensitivity_deltas",
            "At least one delta is required",
        ));
    }

    let base_npv = projection_npv(&project(baseline, assumptions, horizon)?, wacc)?;

    let mut points = Vec::with_capacity(deltas.len());
    for &delta in deltas {
        let npv = if delta.is_zero() {
            base_npv
        } else {
            let mut perturbed = assumptions.clone();
            let mut perturbed_wacc = wacc;
            variable.perturb(&mut perturbed, &mut perturbed_wacc, delta);
            projection_npv(&project(baseline, &perturbed, horizon)?, perturbed_wacc)?
        };
        let change = npv - base_npv;
        points.push(SensitivityPoint {
            delta,
            npv,
            change_from_base: change,
            change_pct: (!base_npv.is_zero()).then(|| change / base_npv.abs()),
        });
    }

    let max = points.iter().map(|p| p.npv).max().unwrap_or(base_npv);
    let min = points.iter().map(|p| p.npv).min().unwrap_or(base_npv);
    let npv_swing_pct = (!base_npv.is_zero()).then(|| (max - min) / base_npv.abs());

    Ok(SensitivitySweep {
        variable,
        base_npv,
        points,
        npv_swing_pct,
        high_sensitivity: npv_swing_pct.is_some_and(|s| s > threshold),
    })
}

/// Sweep several variables with the same delta set.
pub fn analyze_sensitivity(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
    variables: &[SensitivityVariable],
    deltas: &[Decimal],
    wacc: Rate,
    threshold: Rate,
) -> FinModelResult<ComputationOutput<SensitivityReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if variables.is_empty() {
        return Err(FinModelError::configuration(
            "sensitivity_variables",
            "At least one variable is required",
        ));
    }
    if !deltas.iter().any(|d| d.is_zero()) {
        warnings.push("Delta set does not include 0; base case not in the sweep".into());
    }

    let sweeps = variables
        .iter()
        .map(|&v| sweep(baseline, assumptions, horizon, v, deltas, wacc, threshold))
        .collect::<FinModelResult<Vec<_>>>()?;

    if sweeps.iter().any(|s| s.npv_swing_pct.is_none()) {
        warnings.push("Base NPV is zero; relative sensitivity unavailable".into());
    }

    let report = SensitivityReport {
        wacc,
        horizon,
        threshold,
        sweeps,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-at-a-time finite-difference NPV sensitivity",
        &serde_json::json!({
            "deltas": deltas.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            "wacc": wacc.to_string(),
            "horizon": horizon,
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::statements::tests::sample_period;

    #[test]
    fn test_zero_delta_reproduces_base_exactly() {
        let a = AssumptionSet::default();
        let p = sample_period(2024);
        let s = sweep(
            &p,
            &a,
            5,
            SensitivityVariable::MarketGrowth,
            &default_deltas(),
            dec!(0.10),
            dec!(0.20),
        )
        .unwrap();
        let direct = projection_npv(&project(&p, &a, 5).unwrap(), dec!(0.10)).unwrap();
        let zero = s.points.iter().find(|pt| pt.delta.is_zero()).unwrap();
        assert_eq!(zero.npv, direct);
        assert_eq!(zero.change_from_base, Decimal::ZERO);
    }

    #[test]
    fn test_growth_raises_npv_monotonically() {
        let s = sweep(
            &sample_period(2024),
            &AssumptionSet::default(),
            5,
            SensitivityVariable::MarketGrowth,
            &default_deltas(),
            dec!(0.10),
            dec!(0.20),
        )
        .unwrap();
        for w in s.points.windows(2) {
            assert!(w[0].npv < w[1].npv);
        }
    }

    #[test]
    fn test_wacc_raises_lower_npv() {
        let s = sweep(
            &sample_period(2024),
            &AssumptionSet::default(),
            5,
            SensitivityVariable::Wacc,
            &[dec!(-0.01), dec!(0.01)],
            dec!(0.10),
            dec!(0.20),
        )
        .unwrap();
        assert!(s.points[0].npv > s.base_npv);
        assert!(s.points[1].npv < s.base_npv);
    }

    #[test]
    fn test_high_sensitivity_flag() {
        let s = sweep(
            &sample_period(2024),
            &AssumptionSet::default(),
            5,
            SensitivityVariable::CostLevel,
            &[dec!(-0.5), dec!(0.5)],
            dec!(0.10),
            dec!(0.20),
        )
        .unwrap();
        assert!(s.high_sensitivity);
    }

    #[test]
    fn test_empty_deltas_rejected() {
        let err = sweep(
            &sample_period(2024),
            &AssumptionSet::default(),
            5,
            SensitivityVariable::Inflation,
            &[],
            dec!(0.10),
            dec!(0.20),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
