pub mod assembler;
pub mod engine;
pub mod narrative;

pub use assembler::{
    AnalysisKind, AnalysisResult, BaselineSummary, ConfidenceBand, ResultAssembler,
};
pub use engine::{AnalysisRequest, EngineConfig, ModelingEngine};
pub use narrative::{NarrativeThresholds, Priority, Recommendation, RecommendationCategory};
