//! Rule-based interpretation and recommendations.
//!
//! Every sentence comes from a fixed template filled with numbers from the
//! assembled result, so identical inputs always produce identical text.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::distress::{DistressTier, DistressTrend};
use crate::scenarios::ScenarioBundle;
use crate::types::Rate;

use super::assembler::AnalysisResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeThresholds {
    /// NPV swing across a sensitivity sweep, as a share of base NPV
    pub high_sensitivity: Rate,
    /// (optimistic - pessimistic) final-year revenue, as a share of base
    pub scenario_spread: Rate,
    /// 95% VaR of final-year profit, as a share of baseline net income
    pub profit_var_share: f64,
}

impl Default for NarrativeThresholds {
    fn default() -> Self {
        Self {
            high_sensitivity: dec!(0.20),
            scenario_spread: dec!(0.50),
            profit_var_share: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Liquidity,
    Solvency,
    RiskManagement,
    Planning,
    Forecasting,
    Valuation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub message: String,
}

impl Recommendation {
    fn new(priority: Priority, category: RecommendationCategory, message: String) -> Self {
        Self {
            priority,
            category,
            message,
        }
    }
}

fn pct(rate: Decimal) -> String {
    format!("{:.1}%", (rate * dec!(100)).round_dp(1))
}

fn money(value: Decimal) -> String {
    format!("{}", value.round())
}

/// (optimistic - pessimistic) final-year revenue over base.
pub fn scenario_revenue_spread(bundle: &ScenarioBundle) -> Option<Rate> {
    let base = bundle.summary("base")?.final_revenue;
    let high = bundle.summary("optimistic")?.final_revenue;
    let low = bundle.summary("pessimistic")?.final_revenue;
    (!base.is_zero()).then(|| (high - low) / base)
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

pub fn interpret(result: &AnalysisResult, thresholds: &NarrativeThresholds) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(p) = &result.projection {
        if let Some(last) = p.last() {
            lines.push(format!(
                "Revenue is projected to move from {} in {} to {} in {}, with final-year free cash flow of {}.",
                money(result.baseline.revenue),
                result.baseline.year,
                money(last.revenue),
                last.year,
                money(last.free_cash_flow),
            ));
        }
        if p.reasonability.passed() {
            lines.push("The projection passes the growth, margin and cash flow reasonability checks.".into());
        } else {
            lines.push(format!(
                "The projection fails {} reasonability check(s).",
                p.reasonability.issues.len()
            ));
        }
    }

    if let Some(v) = &result.valuation {
        lines.push(format!(
            "Discounted at a WACC of {}, the projected cash flows are worth {}.",
            pct(v.wacc),
            money(v.enterprise_value)
        ));
        if let Some(irr) = v.irr {
            lines.push(format!("The implied IRR on the initial investment is {}.", pct(irr)));
        }
    }

    if let Some(bundle) = &result.scenarios {
        if let (Some(low), Some(high)) = (bundle.summary("pessimistic"), bundle.summary("optimistic")) {
            lines.push(format!(
                "Final-year revenue ranges from {} (pessimistic) to {} (optimistic).",
                money(low.final_revenue),
                money(high.final_revenue)
            ));
        }
        if let Some(spread) = scenario_revenue_spread(bundle) {
            if spread > thresholds.scenario_spread {
                lines.push(format!(
                    "Scenario outcomes are highly uncertain: the revenue range spans {} of the base case.",
                    pct(spread)
                ));
            }
        }
    }

    if let Some(report) = &result.sensitivity {
        match report.high_sensitivity_variables().first() {
            Some(top) => lines.push(format!(
                "NPV is most sensitive to {}, moving {} across the tested range.",
                top.variable,
                top.npv_swing_pct.map(pct).unwrap_or_default()
            )),
            None => lines.push(format!(
                "No tested variable moves NPV by more than {}.",
                pct(report.threshold)
            )),
        }
    }

    if let Some(sim) = &result.simulation {
        match &sim.metrics {
            Some(m) => {
                let var95 = m.profit.var(0.95);
                lines.push(format!(
                    "Across {} simulated trials the probability of a final-year profit is {:.1}%{}.",
                    m.sample_size,
                    m.probability_of_profit * 100.0,
                    var95
                        .map(|v| format!(" and the 95% profit VaR is {v:.0}"))
                        .unwrap_or_default()
                ));
            }
            None => lines.push("The simulation produced no samples.".into()),
        }
        if sim.partial {
            lines.push(format!(
                "The simulation was cancelled after {} of {} trials; its intervals are correspondingly wider.",
                sim.completed_iterations, sim.requested_iterations
            ));
        }
    }

    if let Some(d) = &result.distress {
        let probability = pct(d.ensemble_probability);
        match d.z_score {
            Some(z) => lines.push(format!(
                "An Altman Z of {} places the company in the {} tier (ensemble distress probability {}).",
                z.round_dp(2),
                d.tier,
                probability
            )),
            None => lines.push(format!(
                "The Altman Z is undefined; the ensemble distress probability of {} places the company in the {} tier.",
                probability, d.tier
            )),
        }
        if let (Some(trend), Some(previous)) = (result.distress_trend, result.distress_history.last()) {
            lines.push(format!(
                "Against {}, distress risk is {trend} (ensemble probability {} then, {} now).",
                previous.year,
                pct(previous.ensemble_probability),
                probability
            ));
        }
    }

    if let Some(s) = &result.stress {
        if let Some(worst) = s.worst_shock.as_deref().and_then(|n| s.impact(n)) {
            lines.push(format!(
                "The most damaging shock is {}, changing NPV by {}.",
                worst.shock_name,
                money(worst.npv.delta)
            ));
        }
        let breaches: Vec<&str> = s.breaches().map(|i| i.shock_name.as_str()).collect();
        if !breaches.is_empty() {
            lines.push(format!(
                "First-year liquidity falls below 1.0 under: {}.",
                breaches.join(", ")
            ));
        }
    }

    for option in &result.real_options {
        if let Some(value) = option.binomial.or(option.closed_form) {
            lines.push(format!(
                "The {} option is worth {}.",
                option.kind,
                money(value)
            ));
        }
    }

    lines
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Threshold rules over the assembled numbers, highest priority first.
pub fn recommend(result: &AnalysisResult, thresholds: &NarrativeThresholds) -> Vec<Recommendation> {
    use Priority::*;
    use RecommendationCategory as C;
    let mut out = Vec::new();

    if let Some(d) = &result.distress {
        match d.tier {
            DistressTier::Distress => out.push(Recommendation::new(
                High,
                C::Solvency,
                "Distress indicators are elevated: reduce leverage and rebuild working capital before new commitments.".into(),
            )),
            DistressTier::GreyZone => out.push(Recommendation::new(
                Medium,
                C::Solvency,
                "The distress score sits in the grey zone: monitor leverage and working capital each quarter.".into(),
            )),
            DistressTier::Safe => {}
        }
        if result.distress_trend == Some(DistressTrend::Deteriorating) {
            if let Some(previous) = result.distress_history.last() {
                out.push(Recommendation::new(
                    Medium,
                    C::Solvency,
                    format!(
                        "Investigate the rise in distress risk: the ensemble probability moved from {} in {} to {}.",
                        pct(previous.ensemble_probability),
                        previous.year,
                        pct(d.ensemble_probability)
                    ),
                ));
            }
        }
    }

    if let Some(s) = &result.stress {
        for breach in s.breaches() {
            out.push(Recommendation::new(
                High,
                C::Liquidity,
                format!(
                    "Secure a liquidity buffer: the {} shock drives the first-year liquidity ratio below 1.0.",
                    breach.shock_name
                ),
            ));
        }
    }

    if let Some(bundle) = &result.scenarios {
        if let Some(stressed) = bundle.summary("stressed") {
            if stressed.final_free_cash_flow < Decimal::ZERO {
                out.push(Recommendation::new(
                    High,
                    C::Planning,
                    format!(
                        "Prepare contingency plans: the stressed scenario ends with free cash flow of {}.",
                        money(stressed.final_free_cash_flow)
                    ),
                ));
            }
        }
        if scenario_revenue_spread(bundle).is_some_and(|s| s > thresholds.scenario_spread) {
            out.push(Recommendation::new(
                Medium,
                C::Planning,
                "Plan against ranges rather than point forecasts: scenario revenue outcomes diverge widely.".into(),
            ));
        }
    }

    if let Some(m) = result.simulation.as_ref().and_then(|s| s.metrics.as_ref()) {
        let baseline_income = result.baseline.net_income.to_f64().unwrap_or(0.0);
        if let Some(var95) = m.profit.var(0.95) {
            if baseline_income > 0.0 && var95 > thresholds.profit_var_share * baseline_income {
                out.push(Recommendation::new(
                    High,
                    C::RiskManagement,
                    format!(
                        "Consider hedging revenue and cost exposures: the 95% profit VaR of {var95:.0} exceeds {:.0}% of baseline net income.",
                        thresholds.profit_var_share * 100.0
                    ),
                ));
            }
        }
    }

    if let Some(report) = &result.sensitivity {
        for sweep in report.high_sensitivity_variables() {
            out.push(Recommendation::new(
                Medium,
                C::RiskManagement,
                format!(
                    "Monitor {} closely: NPV moves {} across the tested range.",
                    sweep.variable,
                    sweep.npv_swing_pct.map(pct).unwrap_or_default()
                ),
            ));
        }
    }

    if let Some(p) = &result.projection {
        for issue in &p.reasonability.issues {
            out.push(Recommendation::new(
                Low,
                C::Forecasting,
                format!("Review forecast assumptions: {issue}."),
            ));
        }
    }

    for option in result.real_options.iter().filter(|o| !o.converged) {
        out.push(Recommendation::new(
            Low,
            C::Valuation,
            format!(
                "Treat the {} option value with caution: pricing methods disagree by more than {}.",
                option.kind,
                pct(option.tolerance)
            ),
        ));
    }

    // Stable sort keeps rule order within a priority.
    out.sort_by_key(|r| r.priority);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::assembler::ResultAssembler;
    use crate::assumptions::AssumptionSet;
    use crate::distress::score_periods;
    use crate::financials::statements::tests::sample_period;
    use crate::scenarios::{run_scenarios, ScenarioKind};

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn test_grey_zone_recommendation() {
        let p = sample_period(2024);
        let mut asm =
            ResultAssembler::new(&p, AssumptionSet::default(), NarrativeThresholds::default());
        asm.distress(score_periods(std::slice::from_ref(&p)).unwrap());
        let result = asm.finish();
        assert_eq!(result.label, "distress");
        assert!(result.interpretation[0].contains("grey zone"));
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].priority, Priority::Medium);
        assert_eq!(result.recommendations[0].category, RecommendationCategory::Solvency);
    }

    #[test]
    fn test_deteriorating_trend_adds_recommendation() {
        let earlier = sample_period(2023);
        let mut latest = sample_period(2024);
        latest.income_statement.net_income = dec!(-400_000);
        latest.balance_sheet.retained_earnings = Some(dec!(-500_000));
        let history = score_periods(&[earlier, latest.clone()]).unwrap();
        assert_eq!(history.result.trend, Some(DistressTrend::Deteriorating));

        let mut asm =
            ResultAssembler::new(&latest, AssumptionSet::default(), NarrativeThresholds::default());
        asm.distress(history);
        let result = asm.finish();
        assert_eq!(result.distress_history.len(), 1);
        assert_eq!(result.distress.as_ref().map(|d| d.year), Some(2024));
        assert!(result.interpretation.iter().any(|l| l.contains("deteriorating")));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.message.contains("rise in distress risk")));
    }

    #[test]
    fn test_narrative_is_deterministic() {
        let p = sample_period(2024);
        let a = AssumptionSet::default();
        let build = || {
            let mut asm = ResultAssembler::new(&p, a.clone(), NarrativeThresholds::default());
            asm.scenarios(run_scenarios(&p, &a, 5, &ScenarioKind::standard(), dec!(0.10)).unwrap());
            asm.finish()
        };
        let first = build();
        let second = build();
        assert_eq!(first.interpretation, second.interpretation);
        assert_eq!(first.recommendations, second.recommendations);
    }

    #[test]
    fn test_pct_format() {
        assert_eq!(pct(dec!(0.1234)), "12.3%");
        assert_eq!(pct(dec!(0.10)), "10.0%");
    }
}
