use clap::Args;
use serde_json::Value;

use finmodel_core::analysis::{AnalysisKind, AnalysisRequest, ModelingEngine};

use crate::input;

/// Arguments for the combined analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to a JSON or YAML analysis request
    #[arg(long)]
    pub input: Option<String>,

    /// Restrict to these analyses (e.g. "projection,distress,monte_carlo")
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

fn parse_kind(name: &str) -> Result<AnalysisKind, Box<dyn std::error::Error>> {
    serde_json::from_value(Value::String(name.trim().to_string())).map_err(|_| {
        let known: Vec<&str> = AnalysisKind::all().into_iter().map(|k| k.as_str()).collect();
        format!("Unknown analysis '{}'; expected one of {}", name, known.join(", ")).into()
    })
}

pub fn run_analyze(engine: &ModelingEngine, args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: AnalysisRequest = input::read_input(args.input.as_deref())?;
    if !args.only.is_empty() {
        request.analyses = args
            .only
            .iter()
            .map(|s| parse_kind(s))
            .collect::<Result<_, _>>()?;
    }
    Ok(engine.analyze(&request, None)?.to_json()?)
}
