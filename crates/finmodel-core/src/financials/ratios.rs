use serde::{Deserialize, Serialize};

use crate::financials::statements::FinancialPeriod;
use crate::types::{guarded_ratio, Degeneracy, DegeneracyReason, Money, Multiple, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityIndicators {
    pub current_ratio: Option<Multiple>,
    /// (current assets - inventory) / current liabilities
    pub quick_ratio: Option<Multiple>,
    pub working_capital: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageIndicators {
    pub debt_ratio: Option<Rate>,
    pub debt_to_equity: Option<Multiple>,
    pub interest_coverage: Option<Multiple>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityIndicators {
    pub net_margin: Option<Rate>,
    pub operating_margin: Option<Rate>,
    pub return_on_equity: Option<Rate>,
    pub return_on_assets: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyIndicators {
    pub asset_turnover: Option<Multiple>,
}

/// Reported-statement ratios for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialIndicators {
    pub year: i32,
    pub liquidity: LiquidityIndicators,
    pub leverage: LeverageIndicators,
    pub profitability: ProfitabilityIndicators,
    pub efficiency: EfficiencyIndicators,
    pub degeneracies: Vec<Degeneracy>,
}

/// Compute liquidity, leverage, profitability and efficiency ratios.
///
/// Ratios with a zero denominator are `None` and listed in `degeneracies`.
pub fn indicators(period: &FinancialPeriod) -> FinancialIndicators {
    let is = &period.income_statement;
    let bs = &period.balance_sheet;
    let year = Some(period.year);
    let mut d = Vec::new();

    let current_ratio = guarded_ratio(
        bs.current_assets,
        bs.current_liabilities,
        "current_ratio",
        year,
        &mut d,
    );
    let quick_ratio = match bs.inventory {
        Some(inv) => guarded_ratio(
            bs.current_assets - inv,
            bs.current_liabilities,
            "quick_ratio",
            year,
            &mut d,
        ),
        None => {
            d.push(Degeneracy::new(
                "quick_ratio",
                year,
                DegeneracyReason::MissingInput,
            ));
            None
        }
    };

    let revenue = period.revenue();
    let ebit = period.ebit();

    FinancialIndicators {
        year: period.year,
        liquidity: LiquidityIndicators {
            current_ratio,
            quick_ratio,
            working_capital: period.working_capital(),
        },
        leverage: LeverageIndicators {
            debt_ratio: guarded_ratio(bs.total_liabilities, bs.total_assets, "debt_ratio", year, &mut d),
            debt_to_equity: guarded_ratio(
                bs.total_liabilities,
                bs.shareholders_equity,
                "debt_to_equity",
                year,
                &mut d,
            ),
            interest_coverage: guarded_ratio(
                ebit,
                is.interest_expense,
                "interest_coverage",
                year,
                &mut d,
            ),
        },
        profitability: ProfitabilityIndicators {
            net_margin: guarded_ratio(is.net_income, revenue, "net_margin", year, &mut d),
            operating_margin: guarded_ratio(ebit, revenue, "operating_margin", year, &mut d),
            return_on_equity: guarded_ratio(
                is.net_income,
                bs.shareholders_equity,
                "return_on_equity",
                year,
                &mut d,
            ),
            return_on_assets: guarded_ratio(
                is.net_income,
                bs.total_assets,
                "return_on_assets",
                year,
                &mut d,
            ),
        },
        efficiency: EfficiencyIndicators {
            asset_turnover: guarded_ratio(revenue, bs.total_assets, "asset_turnover", year, &mut d),
        },
        degeneracies: d,
    }
}
