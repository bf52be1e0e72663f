#![allow(dead_code)]

use finmodel_core::financials::{BalanceSheet, CashFlowStatement, FinancialPeriod, IncomeStatement};
use rust_decimal_macros::dec;

/// Mid-sized manufacturer: 1M revenue, 30% EBIT margin, 2M of assets.
pub fn manufacturer(year: i32) -> FinancialPeriod {
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
