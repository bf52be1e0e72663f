use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use finmodel_core::analysis::ModelingEngine;
use finmodel_core::valuation::{cash_flow_npv, CashFlowSeriesInput, RealOptionInput};

use crate::input;

/// Arguments for real option valuation
#[derive(Args)]
pub struct RealOptionArgs {
    /// Path to a JSON or YAML option description
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a raw cash flow NPV
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct NpvArgs {
    /// Discount rate (e.g. 0.08 for 8%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Comma-separated cash flows, the first at t = 0 (e.g. "-1000,300,400,500")
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_real_option(engine: &ModelingEngine, args: RealOptionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let option: RealOptionInput = input::read_input(args.input.as_deref())?;
    Ok(serde_json::to_value(engine.value_option(&option)?)?)
}

pub fn run_npv(args: NpvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let series: CashFlowSeriesInput = if args.input.is_some() || args.cash_flows.is_empty() {
        input::read_input(args.input.as_deref())?
    } else {
        CashFlowSeriesInput {
            rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            cash_flows: args.cash_flows,
            irr_guess: None,
        }
    };
    Ok(serde_json::to_value(cash_flow_npv(&series)?)?)
}
