pub mod crisis;

pub use crisis::{
    run_stress_tests, standard_catalog, CrisisShock, MetricImpact, ShockImpact, StressReport,
};
