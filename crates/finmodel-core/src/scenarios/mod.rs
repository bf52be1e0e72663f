pub mod generator;
pub mod sensitivity;

pub use generator::{generate, run_scenarios, ScenarioBundle, ScenarioFactors, ScenarioKind};
pub use sensitivity::{
    analyze_sensitivity, default_deltas, sweep, SensitivityReport, SensitivitySweep,
    SensitivityVariable,
};
