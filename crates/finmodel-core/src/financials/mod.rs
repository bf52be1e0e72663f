pub mod ratios;
pub mod statements;

pub use ratios::{indicators, FinancialIndicators};
pub use statements::{
    baseline, validate_periods, BalanceSheet, CashFlowStatement, FinancialPeriod, IncomeStatement,
    PeriodCheck,
};
