pub mod distributions;
pub mod metrics;
pub mod simulation;

pub use distributions::{beta_from_moments, CholeskyFactor, RiskDistribution};
pub use metrics::{
    compute_metrics, factor_correlations, identify_extreme_events, probability_above,
    target_achievement, ExtremeEvents, FactorCorrelation, OutcomeMetric, OutcomeSummary,
    Percentiles, RiskMetrics, TailRisk, TargetAchievement,
};
pub use simulation::{
    simulate, standard_risk_factors, CancellationToken, RiskDistributionSample, RiskFactor,
    RiskTarget, SimulationConfig, SimulationResult,
};
