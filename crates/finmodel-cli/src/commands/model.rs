use clap::Args;
use serde_json::Value;
use tracing::warn;

use finmodel_core::analysis::{AnalysisRequest, ModelingEngine};
use finmodel_core::assumptions::{build, AssumptionSet};
use finmodel_core::financials::{baseline, validate_periods, FinancialPeriod};

use crate::input;

/// Arguments shared by the single-analysis commands
#[derive(Args)]
pub struct ModelArgs {
    /// Path to a JSON or YAML request: periods, assumptions and optional
    /// scenario, risk factor and shock lists
    #[arg(long)]
    pub input: Option<String>,
}

struct Resolved<'a> {
    request: &'a AnalysisRequest,
    baseline: &'a FinancialPeriod,
    assumptions: AssumptionSet,
}

fn resolve<'a>(
    engine: &ModelingEngine,
    request: &'a AnalysisRequest,
) -> Result<Resolved<'a>, Box<dyn std::error::Error>> {
    let check = validate_periods(&request.periods, engine.config().accounting_tolerance)?;
    for w in &check.warnings {
        warn!("{w}");
    }
    let built = build(&request.assumptions);
    for w in &built.warnings {
        warn!("assumptions: {w}");
    }
    Ok(Resolved {
        request,
        baseline: baseline(&request.periods)?,
        assumptions: built.assumptions,
    })
}

fn load(args: &ModelArgs) -> Result<AnalysisRequest, Box<dyn std::error::Error>> {
    input::read_input(args.input.as_deref())
}

pub fn run_project(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    let r = resolve(engine, &request)?;
    let projection = engine.project(r.baseline, &r.assumptions)?;
    Ok(serde_json::to_value(projection)?)
}

pub fn run_scenarios(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    let r = resolve(engine, &request)?;
    let out = engine.scenarios(r.baseline, &r.assumptions, &r.request.scenarios)?;
    Ok(serde_json::to_value(out)?)
}

pub fn run_sensitivity(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    let r = resolve(engine, &request)?;
    let out = engine.sensitivity(r.baseline, &r.assumptions, &r.request.sensitivity_variables)?;
    Ok(serde_json::to_value(out)?)
}

pub fn run_simulate(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    let r = resolve(engine, &request)?;
    let out = engine.simulate(
        r.baseline,
        &r.assumptions,
        &r.request.risk_factors,
        r.request.correlation.clone(),
        None,
    )?;
    Ok(serde_json::to_value(out)?)
}

pub fn run_distress(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    validate_periods(&request.periods, engine.config().accounting_tolerance)?;
    Ok(serde_json::to_value(engine.score_distress(&request.periods)?)?)
}

pub fn run_stress(engine: &ModelingEngine, args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = load(&args)?;
    let r = resolve(engine, &request)?;
    let out = engine.stress_test(r.baseline, &r.assumptions, &r.request.shock_catalog)?;
    Ok(serde_json::to_value(out)?)
}
