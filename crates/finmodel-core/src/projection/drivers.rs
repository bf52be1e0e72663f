//! Revenue, cost and capital drivers.
//!
//! Each driver maps (baseline, assumptions, t) to one projected line item.
//! At t = 0 every driver returns the reported baseline figure.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::types::Money;
use crate::FinModelResult;

/// Share of operating expenses treated as fixed when fixed costs are not reported.
pub const DEFAULT_FIXED_COST_SHARE: Decimal = dec!(0.60);

/// Growth capex as a share of PP&E per unit of capacity expansion.
pub const CAPEX_INTENSITY: Decimal = dec!(0.10);

/// Baseline figures the drivers project from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverBase {
    pub base_revenue: Money,
    pub fixed_cost: Money,
    pub variable_cost: Money,
    /// Reported COGS plus operating expenses.
    pub reported_costs: Money,
    pub depreciation: Money,
    pub property_plant_equipment: Money,
    pub reported_capex: Money,
}

impl DriverBase {
    pub fn from_period(period: &FinancialPeriod) -> Self {
        let is = &period.income_statement;
        Self {
            base_revenue: period.revenue(),
            fixed_cost: is
                .fixed_costs
                .unwrap_or(is.operating_expenses * DEFAULT_FIXED_COST_SHARE),
            variable_cost: is.variable_costs.unwrap_or(is.cost_of_goods_sold),
            reported_costs: period.total_costs(),
            depreciation: is.depreciation,
            property_plant_equipment: period.balance_sheet.property_plant_equipment,
            reported_capex: period.cash_flow_statement.capital_expenditures,
        }
    }
}

/// base revenue x (1 + market growth)^t x pricing factor
pub fn revenue(base: &DriverBase, assumptions: &AssumptionSet, t: u32) -> FinModelResult<Money> {
    if t == 0 {
        return Ok(base.base_revenue);
    }
    let growth = compound(Decimal::ONE + assumptions.industry.market_growth, t)?;
    mul(
        mul(base.base_revenue, growth)?,
        assumptions.company.pricing_strategy.factor(),
    )
}

/// Fixed cost grows with inflation; variable cost scales with revenue,
/// improves with efficiency and grows with inflation.
pub fn cost(
    base: &DriverBase,
    assumptions: &AssumptionSet,
    revenue: Money,
    t: u32,
) -> FinModelResult<Money> {
    if t == 0 {
        return Ok(base.reported_costs);
    }
    if base.base_revenue.is_zero() {
        return Err(FinModelError::validation(
            "income_statement.revenue",
            "Base revenue must be positive to scale variable costs",
        ));
    }
    let inflation = compound(Decimal::ONE + assumptions.macroeconomic.inflation, t)?;
    let efficiency = compound(
        Decimal::ONE - assumptions.company.efficiency_improvement_rate,
        t,
    )?;

    let fixed = mul(base.fixed_cost, inflation)?;
    let volume = revenue / base.base_revenue;
    let variable = mul(mul(mul(base.variable_cost, volume)?, efficiency)?, inflation)?;

    mul(fixed + variable, assumptions.company.cost_level_factor)
}

/// Maintenance capex (depreciation) plus growth capex driven by capacity expansion.
pub fn capital(base: &DriverBase, assumptions: &AssumptionSet, t: u32) -> FinModelResult<Money> {
    if t == 0 {
        return Ok(base.reported_capex);
    }
    let growth_capex_rate = assumptions.company.capacity_expansion_rate * CAPEX_INTENSITY;
    Ok(base.depreciation + mul(growth_capex_rate, base.property_plant_equipment)?)
}

fn compound(factor: Decimal, t: u32) -> FinModelResult<Decimal> {
    factor
        .checked_powu(u64::from(t))
        .ok_or_else(|| overflow("compounding factor"))
}

fn mul(a: Decimal, b: Decimal) -> FinModelResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow("projected value"))
}

fn overflow(what: &str) -> FinModelError {
    FinModelError::configuration("horizon", format!("{what} exceeds the representable range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::PricingStrategy;
    use crate::financials::statements::tests::sample_period;

    fn base() -> DriverBase {
        DriverBase::from_period(&sample_period(2024))
    }

    #[test]
    fn test_t0_returns_baseline() {
        let a = AssumptionSet::default();
        let b = base();
        assert_eq!(revenue(&b, &a, 0).unwrap(), dec!(1_000_000));
        assert_eq!(cost(&b, &a, dec!(1_000_000), 0).unwrap(), dec!(700_000));
        assert_eq!(capital(&b, &a, 0).unwrap(), dec!(80_000));
    }

    #[test]
    fn test_default_fixed_and_variable_split() {
        let b = base();
        assert_eq!(b.fixed_cost, dec!(180_000));
        assert_eq!(b.variable_cost, dec!(400_000));
    }

    #[test]
    fn test_revenue_growth_and_premium() {
        let mut a = AssumptionSet::default();
        let b = base();
        assert_eq!(revenue(&b, &a, 1).unwrap(), dec!(1_050_000));
        assert_eq!(revenue(&b, &a, 2).unwrap(), dec!(1_102_500));
        a.company.pricing_strategy = PricingStrategy::Premium;
        assert_eq!(revenue(&b, &a, 1).unwrap(), dec!(1_155_000));
    }

    #[test]
    fn test_cost_year_one() {
        let a = AssumptionSet::default();
        let b = base();
        // 180,000 x 1.02 + 400,000 x 1.05 x 0.95 x 1.02
        let c = cost(&b, &a, dec!(1_050_000), 1).unwrap();
        assert_eq!(c, dec!(590_580));
    }

    #[test]
    fn test_capital_year_one() {
        let a = AssumptionSet::default();
        // 50,000 + 0.10 x 0.10 x 1,000,000
        assert_eq!(capital(&base(), &a, 1).unwrap(), dec!(60_000));
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut a = AssumptionSet::default();
        a.industry.market_growth = dec!(10);
        let err = revenue(&base(), &a, 40).unwrap_err();
        assert!(err.is_configuration());
    }
}
