use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::assumptions::AssumptionSet;
use crate::error::FinModelError;
use crate::financials::FinancialPeriod;
use crate::projection::drivers::{self, DriverBase};
use crate::types::{guarded_ratio, Degeneracy, Money, Multiple, Rate};
use crate::FinModelResult;

/// Maximum number of forecast years.
pub const MAX_HORIZON: u32 = 50;

/// Annual growth applied to dividends when projecting financing cash flow.
const DIVIDEND_GROWTH: Decimal = dec!(1.05);

const MAX_REASONABLE_GROWTH: Decimal = dec!(0.50);

/// Largest revenue or cost magnitude a period may carry, leaving headroom for
/// the sums accumulated across the horizon.
const MAX_LINE_ITEM: Decimal = dec!(100_000_000_000_000_000_000);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPeriod {
    /// Forecast index, 1..=horizon.
    pub t: u32,
    pub year: i32,
    pub revenue: Money,
    pub costs: Money,
    pub ebitda: Money,
    pub ebit: Money,
    pub net_income: Money,
    pub operating_cash_flow: Money,
    pub capex: Money,
    pub free_cash_flow: Money,
    pub financing_cash_flow: Money,
    /// EBIT / revenue. `None` when revenue is zero.
    pub margin: Option<Rate>,
    /// Zero at t = 1. `None` when the prior revenue is zero.
    pub year_over_year_growth: Option<Rate>,
    pub roic: Option<Rate>,
    /// (current assets + cumulative retained cash) / current liabilities
    pub liquidity_ratio: Option<Multiple>,
}

/// Which forecast periods a [`DriverShock`] touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockWindow {
    /// Only t = 1; later periods follow the unshocked drivers.
    FirstPeriod,
    #[default]
    AllPeriods,
}

/// Multiplicative adjustment to driver outputs.
///
/// The current-assets factor is a one-off change to the opening position
/// and is applied regardless of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverShock {
    #[serde(default = "default_factor")]
    pub revenue_factor: Decimal,
    #[serde(default = "default_factor")]
    pub cost_factor: Decimal,
    #[serde(default = "default_factor")]
    pub current_assets_factor: Decimal,
    #[serde(default)]
    pub window: ShockWindow,
}

fn default_factor() -> Decimal {
    Decimal::ONE
}

impl Default for DriverShock {
    fn default() -> Self {
        Self {
            revenue_factor: Decimal::ONE,
            cost_factor: Decimal::ONE,
            current_assets_factor: Decimal::ONE,
            window: ShockWindow::AllPeriods,
        }
    }
}

impl DriverShock {
    fn applies_to(&self, t: u32) -> bool {
        match self.window {
            ShockWindow::FirstPeriod => t == 1,
            ShockWindow::AllPeriods => true,
        }
    }
}

/// Forecast sanity checks over a whole projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonabilityCheck {
    /// Every year-over-year growth below 50%.
    pub growth_reasonable: bool,
    /// Every margin strictly between 0 and 100%.
    pub margins_reasonable: bool,
    /// Operating cash flow positive in every period.
    pub cash_flow_positive: bool,
    pub issues: Vec<String>,
}

impl ReasonabilityCheck {
    pub fn passed(&self) -> bool {
        self.growth_reasonable && self.margins_reasonable && self.cash_flow_positive
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub periods: Vec<ProjectionPeriod>,
    pub degeneracies: Vec<Degeneracy>,
    pub reasonability: ReasonabilityCheck,
}

impl Projection {
    pub fn free_cash_flows(&self) -> Vec<Money> {
        self.periods.iter().map(|p| p.free_cash_flow).collect()
    }

    pub fn last(&self) -> Option<&ProjectionPeriod> {
        self.periods.last()
    }

    pub fn cumulative_free_cash_flow(&self) -> Money {
        self.periods.iter().map(|p| p.free_cash_flow).sum()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project `horizon` years of cash flows from the baseline period.
pub fn project(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
) -> FinModelResult<Projection> {
    project_with_shock(baseline, assumptions, horizon, &DriverShock::default())
}

/// Project with multiplicative shocks applied to the driver outputs.
pub fn project_with_shock(
    baseline: &FinancialPeriod,
    assumptions: &AssumptionSet,
    horizon: u32,
    shock: &DriverShock,
) -> FinModelResult<Projection> {
    validate_horizon(horizon)?;

    let base = DriverBase::from_period(baseline);
    let tax_rate = baseline.income_statement.tax_rate;
    let bs = &baseline.balance_sheet;
    let dividends = baseline.cash_flow_statement.dividends_paid;

    let mut periods: Vec<ProjectionPeriod> = Vec::with_capacity(horizon as usize);
    let mut degeneracies = Vec::new();
    let mut net_investment = Decimal::ZERO;
    let mut cash_position =
        apply_factor(bs.current_assets, shock.current_assets_factor, "current assets")?;

    for t in 1..=horizon {
        let year = baseline.year + t as i32;
        let period_key = Some(year);

        let mut revenue = drivers::revenue(&base, assumptions, t)?;
        if shock.applies_to(t) {
            revenue = apply_factor(revenue, shock.revenue_factor, "revenue")?;
        }
        let mut costs = drivers::cost(&base, assumptions, revenue, t)?;
        if shock.applies_to(t) {
            costs = apply_factor(costs, shock.cost_factor, "costs")?;
        }
        let revenue = within_range(revenue, "revenue")?;
        let costs = within_range(costs, "costs")?;
        let capex = drivers::capital(&base, assumptions, t)?;

        let ebit = revenue - costs;
        let net_income = ebit * (Decimal::ONE - tax_rate);
        let operating_cash_flow = net_income + base.depreciation;
        let free_cash_flow = operating_cash_flow - capex;
        let ebitda = ebit + base.depreciation;
        let financing_cash_flow = -(dividends * DIVIDEND_GROWTH.powu(u64::from(t)));

        let margin = guarded_ratio(ebit, revenue, "margin", period_key, &mut degeneracies);
        let year_over_year_growth = match periods.last() {
            None => Some(Decimal::ZERO),
            Some(prev) => guarded_ratio(
                revenue - prev.revenue,
                prev.revenue,
                "year_over_year_growth",
                period_key,
                &mut degeneracies,
            ),
        };

        net_investment += capex - base.depreciation;
        let invested_capital = bs.total_assets + net_investment;
        let roic = guarded_ratio(net_income, invested_capital, "roic", period_key, &mut degeneracies);

        cash_position += free_cash_flow + financing_cash_flow;
        let liquidity_ratio = guarded_ratio(
            cash_position,
            bs.current_liabilities,
            "liquidity_ratio",
            period_key,
            &mut degeneracies,
        );

        periods.push(ProjectionPeriod {
            t,
            year,
            revenue,
            costs,
            ebitda,
            ebit,
            net_income,
            operating_cash_flow,
            capex,
            free_cash_flow,
            financing_cash_flow,
            margin,
            year_over_year_growth,
            roic,
            liquidity_ratio,
        });
    }

    let reasonability = check_reasonability(&periods);
    Ok(Projection {
        periods,
        degeneracies,
        reasonability,
    })
}

fn apply_factor(value: Money, factor: Decimal, what: &str) -> FinModelResult<Money> {
    value.checked_mul(factor).ok_or_else(|| {
        FinModelError::configuration(
            "shock",
            format!("shocked {what} exceeds the representable range"),
        )
    })
}

fn within_range(value: Money, what: &str) -> FinModelResult<Money> {
    if value.abs() > MAX_LINE_ITEM {
        return Err(FinModelError::configuration(
            "projection",
            format!("{what} exceeds the representable range"),
        ));
    }
    Ok(value)
}

pub fn validate_horizon(horizon: u32) -> FinModelResult<()> {
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(FinModelError::validation(
            "horizon",
            format!("Horizon must be between 1 and {MAX_HORIZON} years"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_reasonability(periods: &[ProjectionPeriod]) -> ReasonabilityCheck {
    let mut issues = Vec::new();

    let mut growth_reasonable = true;
    let mut margins_reasonable = true;
    let mut cash_flow_positive = true;

    for p in periods {
        if let Some(g) = p.year_over_year_growth {
            if g >= MAX_REASONABLE_GROWTH {
                growth_reasonable = false;
                issues.push(format!("Year {}: revenue growth of {g} exceeds 50%", p.year));
            }
        }
        match p.margin {
            Some(m) if m > Decimal::ZERO && m < Decimal::ONE => {}
            Some(m) => {
                margins_reasonable = false;
                issues.push(format!("Year {}: EBIT margin {m} outside (0, 1)", p.year));
            }
            None => {
                margins_reasonable = false;
                issues.push(format!("Year {}: EBIT margin unavailable", p.year));
            }
        }
        if p.operating_cash_flow <= Decimal::ZERO {
            cash_flow_positive = false;
            issues.push(format!("Year {}: operating cash flow is not positive", p.year));
        }
    }

    ReasonabilityCheck {
        growth_reasonable,
        margins_reasonable,
        cash_flow_positive,
        issues,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
