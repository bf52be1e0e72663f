mod common;

use finmodel_core::analysis::{
    AnalysisKind, AnalysisRequest, EngineConfig, ModelingEngine, Priority,
};
use finmodel_core::valuation::{PricingMethod, RealOptionInput, RealOptionKind};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use common::manufacturer;

fn engine() -> ModelingEngine {
    ModelingEngine::new(EngineConfig {
        iterations: 500,
        seed: Some(42),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn expansion_option() -> RealOptionInput {
    RealOptionInput {
        kind: RealOptionKind::Expansion,
        underlying_value: dec!(1_000_000),
        exercise_price: dec!(1_100_000),
        volatility: dec!(0.30),
        risk_free_rate: dec!(0.04),
        time_to_expiry: dec!(2),
        dividend_yield: dec!(0),
        steps: 100,
        paths: 2_000,
        exercise_dates: 10,
        seed: None,
        methods: vec![PricingMethod::ClosedForm, PricingMethod::Binomial],
    }
}

fn full_request() -> AnalysisRequest {
    let mut request = AnalysisRequest::new(vec![manufacturer(2023), manufacturer(2024)]);
    request.real_options = vec![expansion_option()];
    request
}

#[test]
fn test_full_analysis_runs_every_section() {
    let result = engine().analyze(&full_request(), None).unwrap();
    assert_eq!(result.label, "full");
    assert!(result.is_full());
    assert_eq!(result.analyses_run, AnalysisKind::all());
    assert_eq!(result.baseline.year, 2024);
    assert!(result.projection.is_some());
    assert!(result.valuation.is_some());
    assert!(result.scenarios.is_some());
    assert!(result.sensitivity.is_some());
    assert!(result.simulation.is_some());
    assert!(result.distress.is_some());
    assert!(result.stress.is_some());
    assert_eq!(result.real_options.len(), 1);
    assert_eq!(result.confidence_bands.len(), 4);
    assert!(!result.interpretation.is_empty());
    assert_eq!(result.distress_history.len(), 1);
    assert_eq!(result.distress_history[0].year, 2023);
    assert!(result.distress_trend.is_some());
}

#[test]
fn test_default_request_without_options_is_full() {
    let request = AnalysisRequest::new(vec![manufacturer(2023), manufacturer(2024)]);
    let result = engine().analyze(&request, None).unwrap();
    assert_eq!(result.label, "full");
    assert!(result.real_options.is_empty());
    assert!(!result.ran(AnalysisKind::RealOptions));
}

#[test]
fn test_recommendations_sorted_by_priority() {
    let result = engine().analyze(&full_request(), None).unwrap();
    let priorities: Vec<Priority> = result.recommendations.iter().map(|r| r.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);
}

#[test]
fn test_seeded_analysis_is_reproducible() {
    let e = engine();
    let first = e.analyze(&full_request(), None).unwrap();
    let second = e.analyze(&full_request(), None).unwrap();
    assert_eq!(first.interpretation, second.interpretation);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(
        first.simulation.unwrap().samples,
        second.simulation.unwrap().samples
    );
}

#[test]
fn test_subset_label_joins_kinds() {
    let request = AnalysisRequest::new(vec![manufacturer(2024)])
        .only(&[AnalysisKind::Stress, AnalysisKind::Projection]);
    let result = engine().analyze(&request, None).unwrap();
    assert_eq!(result.label, "projection+stress");
    assert!(result.valuation.is_none());
}

#[test]
fn test_request_deserializes_with_defaults() {
    let json = serde_json::json!({
        "periods": [manufacturer(2024)],
        "analyses": ["distress", "valuation"],
    });
    let request: AnalysisRequest = serde_json::from_value(json).unwrap();
    let result = engine().analyze(&request, None).unwrap();
    assert_eq!(result.label, "valuation+distress");
}

#[test]
fn test_duplicate_years_rejected() {
    let request = AnalysisRequest::new(vec![manufacturer(2024), manufacturer(2024)]);
    assert!(engine().analyze(&request, None).unwrap_err().is_validation());
}
