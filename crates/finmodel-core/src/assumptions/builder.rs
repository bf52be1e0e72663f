use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Rate;

// ---------------------------------------------------------------------------
// Resolved assumption set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    #[default]
    Standard,
    Premium,
}

impl PricingStrategy {
    /// Revenue multiplier applied by the revenue driver.
    pub fn factor(self) -> Decimal {
        match self {
            Self::Standard => Decimal::ONE,
            Self::Premium => dec!(1.10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroeconomicAssumptions {
    pub gdp_growth: Rate,
    pub inflation: Rate,
    pub interest_rate: Rate,
    pub exchange_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryAssumptions {
    pub market_growth: Rate,
    pub competitive_intensity: Rate,
    pub regulatory_impact: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAssumptions {
    pub market_share_target: Rate,
    pub pricing_strategy: PricingStrategy,
    pub capacity_expansion_rate: Rate,
    pub efficiency_improvement_rate: Rate,
    /// Multiplier on the whole cost base. Scenarios scale it.
    pub cost_level_factor: Decimal,
}

/// Fully resolved assumptions. Every field carries a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    pub macroeconomic: MacroeconomicAssumptions,
    pub industry: IndustryAssumptions,
    pub company: CompanyAssumptions,
}

impl Default for AssumptionSet {
    fn default() -> Self {
        Self {
            macroeconomic: MacroeconomicAssumptions {
                gdp_growth: GDP_GROWTH.default,
                inflation: INFLATION.default,
                interest_rate: INTEREST_RATE.default,
                exchange_rate: EXCHANGE_RATE.default,
            },
            industry: IndustryAssumptions {
                market_growth: MARKET_GROWTH.default,
                competitive_intensity: COMPETITIVE_INTENSITY.default,
                regulatory_impact: REGULATORY_IMPACT.default,
            },
            company: CompanyAssumptions {
                market_share_target: MARKET_SHARE_TARGET.default,
                pricing_strategy: PricingStrategy::Standard,
                capacity_expansion_rate: CAPACITY_EXPANSION.default,
                efficiency_improvement_rate: EFFICIENCY_IMPROVEMENT.default,
                cost_level_factor: COST_LEVEL.default,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Raw, possibly incomplete input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialMacroeconomic {
    pub gdp_growth: Option<f64>,
    pub inflation: Option<f64>,
    pub interest_rate: Option<f64>,
    pub exchange_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialIndustry {
    pub market_growth: Option<f64>,
    pub competitive_intensity: Option<f64>,
    pub regulatory_impact: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialCompany {
    pub market_share_target: Option<f64>,
    pub pricing_strategy: Option<String>,
    pub capacity_expansion_rate: Option<f64>,
    pub efficiency_improvement_rate: Option<f64>,
    pub cost_level_factor: Option<f64>,
}

/// Caller-supplied assumptions. Any field may be absent or garbage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialAssumptionSet {
    pub macroeconomic: PartialMacroeconomic,
    pub industry: PartialIndustry,
    pub company: PartialCompany,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltAssumptions {
    pub assumptions: AssumptionSet,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Field defaults and valid ranges
// ---------------------------------------------------------------------------

struct FieldBounds {
    name: &'static str,
    default: Decimal,
    min: Decimal,
    max: Decimal,
}

const GDP_GROWTH: FieldBounds = FieldBounds {
    name: "macroeconomic.gdp_growth",
    default: dec!(0.03),
    min: dec!(-1),
    max: dec!(1),
};
const INFLATION: FieldBounds = FieldBounds {
    name: "macroeconomic.inflation",
    default: dec!(0.02),
    min: dec!(-1),
    max: dec!(10),
};
const INTEREST_RATE: FieldBounds = FieldBounds {
    name: "macroeconomic.interest_rate",
    default: dec!(0.04),
    min: dec!(-0.1),
    max: dec!(1),
};
const EXCHANGE_RATE: FieldBounds = FieldBounds {
    name: "macroeconomic.exchange_rate",
    default: dec!(1.0),
    min: dec!(0.0001),
    max: dec!(1_000_000),
};
const MARKET_GROWTH: FieldBounds = FieldBounds {
    name: "industry.market_growth",
    default: dec!(0.05),
    min: dec!(-1),
    max: dec!(10),
};
const COMPETITIVE_INTENSITY: FieldBounds = FieldBounds {
    name: "industry.competitive_intensity",
    default: dec!(0.7),
    min: dec!(0),
    max: dec!(1),
};
const REGULATORY_IMPACT: FieldBounds = FieldBounds {
    name: "industry.regulatory_impact",
    default: dec!(0),
    min: dec!(-1),
    max: dec!(1),
};
const MARKET_SHARE_TARGET: FieldBounds = FieldBounds {
    name: "company.market_share_target",
    default: dec!(0.15),
    min: dec!(0),
    max: dec!(1),
};
const CAPACITY_EXPANSION: FieldBounds = FieldBounds {
    name: "company.capacity_expansion_rate",
    default: dec!(0.10),
    min: dec!(0),
    max: dec!(10),
};
const EFFICIENCY_IMPROVEMENT: FieldBounds = FieldBounds {
    name: "company.efficiency_improvement_rate",
    default: dec!(0.05),
    min: dec!(-1),
    max: dec!(0.95),
};
const COST_LEVEL: FieldBounds = FieldBounds {
    name: "company.cost_level_factor",
    default: dec!(1.0),
    min: dec!(0),
    max: dec!(10),
};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve a partial assumption set.
///
/// Absent fields take their default. Non-finite values fall back to the
/// default and out-of-range values are clamped; both add a warning.
pub fn build(raw: &PartialAssumptionSet) -> BuiltAssumptions {
    let mut warnings = Vec::new();
    let m = &raw.macroeconomic;
    let i = &raw.industry;
    let c = &raw.company;

    let assumptions = AssumptionSet {
        macroeconomic: MacroeconomicAssumptions {
            gdp_growth: resolve(m.gdp_growth, &GDP_GROWTH, &mut warnings),
            inflation: resolve(m.inflation, &INFLATION, &mut warnings),
            interest_rate: resolve(m.interest_rate, &INTEREST_RATE, &mut warnings),
            exchange_rate: resolve(m.exchange_rate, &EXCHANGE_RATE, &mut warnings),
        },
        industry: IndustryAssumptions {
            market_growth: resolve(i.market_growth, &MARKET_GROWTH, &mut warnings),
            competitive_intensity: resolve(
                i.competitive_intensity,
                &COMPETITIVE_INTENSITY,
                &mut warnings,
            ),
            regulatory_impact: resolve(i.regulatory_impact, &REGULATORY_IMPACT, &mut warnings),
        },
        company: CompanyAssumptions {
            market_share_target: resolve(c.market_share_target, &MARKET_SHARE_TARGET, &mut warnings),
            pricing_strategy: resolve_pricing(c.pricing_strategy.as_deref(), &mut warnings),
            capacity_expansion_rate: resolve(
                c.capacity_expansion_rate,
                &CAPACITY_EXPANSION,
                &mut warnings,
            ),
            efficiency_improvement_rate: resolve(
                c.efficiency_improvement_rate,
                &EFFICIENCY_IMPROVEMENT,
                &mut warnings,
            ),
            cost_level_factor: resolve(c.cost_level_factor, &COST_LEVEL, &mut warnings),
        },
    };

    BuiltAssumptions {
        assumptions,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn resolve(value: Option<f64>, bounds: &FieldBounds, warnings: &mut Vec<String>) -> Decimal {
    let Some(raw) = value else {
        return bounds.default;
    };

    let Some(v) = Decimal::from_f64(raw).filter(|_| raw.is_finite()) else {
        warn!(field = bounds.name, value = raw, "non-numeric assumption replaced by default");
        warnings.push(format!(
            "{}: value {raw} is not a finite number; default {} used",
            bounds.name, bounds.default
        ));
        return bounds.default;
    };
    // Drop binary noise from the f64 conversion.
    let v = v.round_dp(12);

    if v < bounds.min || v > bounds.max {
        let clamped = v.clamp(bounds.min, bounds.max);
        warn!(field = bounds.name, value = %v, clamped = %clamped, "assumption clamped");
        warnings.push(format!(
            "{}: value {v} outside [{}, {}]; clamped to {clamped}",
            bounds.name, bounds.min, bounds.max
        ));
        return clamped;
    }
    v
}

fn resolve_pricing(value: Option<&str>, warnings: &mut Vec<String>) -> PricingStrategy {
    match value.map(|s| s.trim().to_ascii_lowercase()) {
        None => PricingStrategy::Standard,
        Some(s) if s == "standard" => PricingStrategy::Standard,
        Some(s) if s == "premium" => PricingStrategy::Premium,
        Some(other) => {
            warnings.push(format!(
                "company.pricing_strategy: unknown strategy '{other}'; standard used"
            ));
            PricingStrategy::Standard
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input_yields_defaults() {
        let built = build(&PartialAssumptionSet::default());
        assert_eq!(built.assumptions, AssumptionSet::default());
        assert!(built.warnings.is_empty());
        assert_eq!(built.assumptions.macroeconomic.gdp_growth, dec!(0.03));
        assert_eq!(built.assumptions.industry.market_growth, dec!(0.05));
        assert_eq!(built.assumptions.company.efficiency_improvement_rate, dec!(0.05));
    }

    #[test]
    fn test_supplied_value_used() {
        let mut raw = PartialAssumptionSet::default();
        raw.industry.market_growth = Some(0.08);
        let built = build(&raw);
        assert_eq!(built.assumptions.industry.market_growth, dec!(0.08));
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn test_nan_replaced_with_default() {
        let mut raw = PartialAssumptionSet::default();
        raw.macroeconomic.inflation = Some(f64::NAN);
        let built = build(&raw);
        assert_eq!(built.assumptions.macroeconomic.inflation, dec!(0.02));
        assert_eq!(built.warnings.len(), 1);
    }

    #[test]
    fn test_inflation_below_minus_one_clamped() {
        let mut raw = PartialAssumptionSet::default();
        raw.macroeconomic.inflation = Some(-3.0);
        let built = build(&raw);
        assert_eq!(built.assumptions.macroeconomic.inflation, dec!(-1));
        assert!(built.warnings[0].contains("clamped"));
    }

    #[test]
    fn test_pricing_strategy_parsing() {
        let mut raw = PartialAssumptionSet::default();
        raw.company.pricing_strategy = Some("Premium".into());
        assert_eq!(
            build(&raw).assumptions.company.pricing_strategy,
            PricingStrategy::Premium
        );

        raw.company.pricing_strategy = Some("luxury".into());
        let built = build(&raw);
        assert_eq!(built.assumptions.company.pricing_strategy, PricingStrategy::Standard);
        assert_eq!(built.warnings.len(), 1);
    }

    #[test]
    fn test_partial_json_deserializes() {
        let raw: PartialAssumptionSet =
            serde_json::from_str(r#"{"company": {"pricing_strategy": "premium"}}"#).unwrap();
        let built = build(&raw);
        assert_eq!(built.assumptions.company.pricing_strategy.factor(), dec!(1.10));
        assert_eq!(built.assumptions.macroeconomic.interest_rate, dec!(0.04));
    }
}
