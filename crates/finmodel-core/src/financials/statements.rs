use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FinModelError;
use crate::types::{Money, Rate};
use crate::FinModelResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    /// Required. Kept optional at the serde layer so a missing figure is
    /// reported as a validation error instead of a parse failure.
    #[serde(default)]
    pub revenue: Option<Money>,
    pub cost_of_goods_sold: Money,
    /// Includes depreciation and amortisation.
    pub operating_expenses: Money,
    pub depreciation: Money,
    pub interest_expense: Money,
    pub tax_rate: Rate,
    pub net_income: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_costs: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_costs: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub current_assets: Money,
    pub total_assets: Money,
    pub current_liabilities: Money,
    pub total_liabilities: Money,
    pub shareholders_equity: Money,
    pub property_plant_equipment: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained_earnings: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_value_equity: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub operating_cash_flow: Money,
    pub investing_cash_flow: Money,
    pub financing_cash_flow: Money,
    pub capital_expenditures: Money,
    pub dividends_paid: Money,
}

/// One fiscal year of reported statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub year: i32,
    pub income_statement: IncomeStatement,
    pub balance_sheet: BalanceSheet,
    pub cash_flow_statement: CashFlowStatement,
}

impl FinancialPeriod {
    /// Reported revenue. Zero only for a period that has not been validated.
    pub fn revenue(&self) -> Money {
        self.income_statement.revenue.unwrap_or(Decimal::ZERO)
    }

    /// Revenue less cost of goods sold and operating expenses.
    pub fn ebit(&self) -> Money {
        let is = &self.income_statement;
        self.revenue() - is.cost_of_goods_sold - is.operating_expenses
    }

    pub fn working_capital(&self) -> Money {
        self.balance_sheet.current_assets - self.balance_sheet.current_liabilities
    }

    /// Total operating cost base: COGS plus operating expenses.
    pub fn total_costs(&self) -> Money {
        self.income_statement.cost_of_goods_sold + self.income_statement.operating_expenses
    }

    /// Absolute gap in the identity assets = liabilities + equity.
    pub fn accounting_gap(&self) -> Money {
        let bs = &self.balance_sheet;
        (bs.total_assets - (bs.total_liabilities + bs.shareholders_equity)).abs()
    }

    /// Whether the accounting identity holds within `tolerance`, relative to total assets.
    pub fn is_consistent(&self, tolerance: Rate) -> bool {
        self.accounting_gap() <= tolerance * self.balance_sheet.total_assets.abs()
    }

    /// Check the period for values that make it unusable.
    pub fn validate(&self) -> FinModelResult<()> {
        let is = &self.income_statement;
        let prefix = format!("periods[{}]", self.year);

        match is.revenue {
            None => {
                return Err(FinModelError::validation(
                    format!("{prefix}.income_statement.revenue"),
                    "Revenue is required",
                ))
            }
            Some(r) if r <= Decimal::ZERO => {
                return Err(FinModelError::validation(
                    format!("{prefix}.income_statement.revenue"),
                    "Revenue must be positive",
                ))
            }
            Some(_) => {}
        }

        if is.tax_rate < Decimal::ZERO || is.tax_rate > Decimal::ONE {
            return Err(FinModelError::validation(
                format!("{prefix}.income_statement.tax_rate"),
                "Tax rate must be between 0 and 1",
            ));
        }

        let bs = &self.balance_sheet;
        let cf = &self.cash_flow_statement;
        let non_negative: [(&str, Money); 13] = [
            ("income_statement.cost_of_goods_sold", is.cost_of_goods_sold),
            ("income_statement.operating_expenses", is.operating_expenses),
            ("income_statement.depreciation", is.depreciation),
            ("income_statement.interest_expense", is.interest_expense),
            ("income_statement.fixed_costs", is.fixed_costs.unwrap_or_default()),
            ("income_statement.variable_costs", is.variable_costs.unwrap_or_default()),
            ("balance_sheet.current_assets", bs.current_assets),
            ("balance_sheet.total_assets", bs.total_assets),
            ("balance_sheet.current_liabilities", bs.current_liabilities),
            ("balance_sheet.total_liabilities", bs.total_liabilities),
            ("balance_sheet.property_plant_equipment", bs.property_plant_equipment),
            ("cash_flow_statement.capital_expenditures", cf.capital_expenditures),
            ("cash_flow_statement.dividends_paid", cf.dividends_paid),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(FinModelError::validation(
                    format!("{prefix}.{field}"),
                    "Value cannot be negative",
                ));
            }
        }
        if bs.inventory.is_some_and(|v| v < Decimal::ZERO) {
            return Err(FinModelError::validation(
                format!("{prefix}.balance_sheet.inventory"),
                "Value cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Outcome of checking a set of periods before analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodCheck {
    /// Years whose balance sheet fails the accounting identity.
    pub inconsistent_years: Vec<i32>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate every period and flag accounting inconsistencies.
///
/// Inconsistent periods stay usable; they are reported, not rejected.
pub fn validate_periods(periods: &[FinancialPeriod], tolerance: Rate) -> FinModelResult<PeriodCheck> {
    if periods.is_empty() {
        return Err(FinModelError::validation(
            "periods",
            "At least one financial period is required",
        ));
    }

    let mut check = PeriodCheck::default();
    for (i, period) in periods.iter().enumerate() {
        period.validate()?;
        if periods[..i].iter().any(|p| p.year == period.year) {
            return Err(FinModelError::validation(
                "periods",
                format!("Duplicate fiscal year {}", period.year),
            ));
        }
        if !period.is_consistent(tolerance) {
            warn!(year = period.year, gap = %period.accounting_gap(), "balance sheet does not balance");
            check.inconsistent_years.push(period.year);
            check.warnings.push(format!(
                "Period {}: total assets differ from liabilities plus equity by {}",
                period.year,
                period.accounting_gap()
            ));
        }
        if period.balance_sheet.retained_earnings.is_none() {
            check.warnings.push(format!(
                "Period {}: retained earnings not reported, shareholders' equity used as proxy",
                period.year
            ));
        }
    }
    Ok(check)
}

/// The most recent period, used as the projection baseline.
pub fn baseline(periods: &[FinancialPeriod]) -> FinModelResult<&FinancialPeriod> {
    periods.iter().max_by_key(|p| p.year).ok_or_else(|| {
        FinModelError::validation("periods", "At least one financial period is required")
    })
}

/// The period immediately before `year`, if supplied.
pub fn prior_period(periods: &[FinancialPeriod], year: i32) -> Option<&FinancialPeriod> {
    periods
        .iter()
        .filter(|p| p.year < year)
        .max_by_key(|p| p.year)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_period(year: i32) -> FinancialPeriod {
        FinancialPeriod {
            year,
            income_statement: IncomeStatement {
                revenue: Some(dec!(1_000_000)),
                cost_of_goods_sold: dec!(400_000),
                operating_expenses: dec!(300_000),
                depreciation: dec!(50_000),
                interest_expense: dec!(20_000),
                tax_rate: dec!(0.25),
                net_income: dec!(210_000),
                fixed_costs: None,
                variable_costs: None,
            },
            balance_sheet: BalanceSheet {
                current_assets: dec!(500_000),
                total_assets: dec!(2_000_000),
                current_liabilities: dec!(250_000),
                total_liabilities: dec!(800_000),
                shareholders_equity: dec!(1_200_000),
                property_plant_equipment: dec!(1_000_000),
                retained_earnings: Some(dec!(600_000)),
                inventory: Some(dec!(100_000)),
                market_value_equity: None,
            },
            cash_flow_statement: CashFlowStatement {
                operating_cash_flow: dec!(260_000),
                investing_cash_flow: dec!(-80_000),
                financing_cash_flow: dec!(-40_000),
                capital_expenditures: dec!(80_000),
                dividends_paid: dec!(40_000),
            },
        }
    }

    #[test]
    fn test_valid_period_passes() {
        let check = validate_periods(&[sample_period(2024)], dec!(0.01)).unwrap();
        assert!(check.inconsistent_years.is_empty());
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn test_missing_revenue_is_validation_error() {
        let mut p = sample_period(2024);
        p.income_statement.revenue = None;
        let err = validate_periods(&[p], dec!(0.01)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_negative_cogs_rejected() {
        let mut p = sample_period(2024);
        p.income_statement.cost_of_goods_sold = dec!(-1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_negative_net_income_allowed() {
        let mut p = sample_period(2024);
        p.income_statement.net_income = dec!(-50_000);
        p.cash_flow_statement.financing_cash_flow = dec!(-10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_tax_rate_out_of_range() {
        let mut p = sample_period(2024);
        p.income_statement.tax_rate = dec!(1.5);
        assert!(p.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_inconsistent_period_flagged_not_rejected() {
        let mut p = sample_period(2024);
        p.balance_sheet.total_assets = dec!(2_500_000);
        let check = validate_periods(&[p], dec!(0.01)).unwrap();
        assert_eq!(check.inconsistent_years, vec![2024]);
        assert_eq!(check.warnings.len(), 1);
    }

    #[test]
    fn test_empty_periods_rejected() {
        assert!(validate_periods(&[], dec!(0.01)).is_err());
        assert!(baseline(&[]).is_err());
    }

    #[test]
    fn test_duplicate_years_rejected() {
        let periods = vec![sample_period(2024), sample_period(2024)];
        assert!(validate_periods(&periods, dec!(0.01)).is_err());
    }

    #[test]
    fn test_baseline_is_latest_year() {
        let periods = vec![sample_period(2024), sample_period(2022), sample_period(2023)];
        assert_eq!(baseline(&periods).unwrap().year, 2024);
        assert_eq!(prior_period(&periods, 2024).unwrap().year, 2023);
        assert!(prior_period(&periods, 2022).is_none());
    }

    #[test]
    fn test_ebit() {
        assert_eq!(sample_period(2024).ebit(), dec!(300_000));
    }
}
