use clap::Args;
use rust_decimal::Decimal;
use tracing::debug;

use finmodel_core::analysis::{EngineConfig, ModelingEngine};

use crate::input;

/// Flags that override the configuration file.
#[derive(Args, Debug, Default)]
pub struct EngineOverrides {
    /// Discount rate (e.g. 0.10 for 10%)
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub wacc: Option<Decimal>,

    /// Projection years (1-50)
    #[arg(long, global = true)]
    pub horizon: Option<u32>,

    /// Monte Carlo trials
    #[arg(long, global = true)]
    pub iterations: Option<u64>,

    /// Base seed for reproducible simulations
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

pub fn load_engine(
    path: Option<&str>,
    overrides: &EngineOverrides,
) -> Result<ModelingEngine, Box<dyn std::error::Error>> {
    let mut config: EngineConfig = match path {
        Some(path) => input::file::read_structured(path)?,
        None => EngineConfig::default(),
    };
    if let Some(wacc) = overrides.wacc {
        config.wacc = wacc;
    }
    if let Some(horizon) = overrides.horizon {
        config.horizon = horizon;
    }
    if let Some(iterations) = overrides.iterations {
        config.iterations = iterations;
    }
    if overrides.seed.is_some() {
        config.seed = overrides.seed;
    }
    debug!(?config, "engine configuration");
    Ok(ModelingEngine::new(config)?)
}
