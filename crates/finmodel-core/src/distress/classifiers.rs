//! Closed-form bankruptcy classifiers over reported statements.
//!
//! Each classifier reports its raw index and a probability of distress on a
//! common [0, 1] scale so the predictor can average them:
//!
//! - **Altman Z** (1968, public manufacturing): discriminant score mapped
//!   through a logistic centred on the grey zone.
//! - **Ohlson O-score** (1980): logit model.
//! - **Zmijewski X-score** (1984): probit model.
//! - **Springate S-score** (1978): discriminant score mapped through a
//!   logistic centred on its 0.862 cutoff.
//!
//! A ratio with a zero denominator leaves its classifier undefined. The
//! classifier is then reported with `included = false` and a degeneracy,
//! never with a fabricated score.

use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::financials::FinancialPeriod;
use crate::types::{guarded_ratio, Degeneracy, DegeneracyReason, Rate};

/// Altman grey zone boundaries.
pub const ALTMAN_SAFE: Decimal = dec!(2.99);
pub const ALTMAN_DISTRESS: Decimal = dec!(1.81);

/// Slope placing p = 0.25 at the safe boundary and p = 0.75 at the distress
/// boundary: ln(3) / ((2.99 - 1.81) / 2).
const DISCRIMINANT_SLOPE: Decimal = dec!(1.862);
const ALTMAN_MIDPOINT: Decimal = dec!(2.40);
const SPRINGATE_CUTOFF: Decimal = dec!(0.862);

/// Ohlson SIZE is ln(total assets in millions).
const OHLSON_SIZE_UNIT: Decimal = dec!(1_000_000);

/// exp() argument bound; probabilities are already 0 or 1 to 17 places beyond it.
const EXP_BOUND: Decimal = dec!(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistressModel {
    AltmanZ,
    OhlsonO,
    ZmijewskiX,
    SpringateS,
}

impl std::fmt::Display for DistressModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AltmanZ => "Altman Z",
            Self::OhlsonO => "Ohlson O",
            Self::ZmijewskiX => "Zmijewski X",
            Self::SpringateS => "Springate S",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierScore {
    pub model: DistressModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Decimal>,
    /// Probability of distress on [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    /// Whether this classifier enters the ensemble average
    pub included: bool,
    /// Input ratios by name
    pub components: BTreeMap<String, Decimal>,
}

impl ClassifierScore {
    fn undefined(model: DistressModel, components: BTreeMap<String, Decimal>) -> Self {
        Self {
            model,
            score: None,
            probability: None,
            included: false,
            components,
        }
    }

    fn defined(
        model: DistressModel,
        score: Decimal,
        probability: Rate,
        components: BTreeMap<String, Decimal>,
    ) -> Self {
        Self {
            model,
            score: Some(score),
            probability: Some(probability),
            included: true,
            components,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 1 / (1 + e^-x)
pub(crate) fn logistic(x: Decimal) -> Decimal {
    let x = x.clamp(-EXP_BOUND, EXP_BOUND);
    Decimal::ONE / (Decimal::ONE + (-x).exp())
}

/// Collects ratios for one classifier; `None` once any ratio is undefined.
struct Ratios<'a> {
    model: &'static str,
    year: Option<i32>,
    degeneracies: &'a mut Vec<Degeneracy>,
    components: BTreeMap<String, Decimal>,
    complete: bool,
}

impl<'a> Ratios<'a> {
    fn new(model: &'static str, year: i32, degeneracies: &'a mut Vec<Degeneracy>) -> Self {
        Self {
            model,
            year: Some(year),
            degeneracies,
            components: BTreeMap::new(),
            complete: true,
        }
    }

    fn ratio(&mut self, name: &str, num: Decimal, den: Decimal) -> Decimal {
        let metric = format!("{}.{name}", self.model);
        match guarded_ratio(num, den, &metric, self.year, self.degeneracies) {
            Some(v) => {
                self.components.insert(name.to_string(), v);
                v
            }
            None => {
                self.complete = false;
                Decimal::ZERO
            }
        }
    }

    fn value(&mut self, name: &str, v: Decimal) -> Decimal {
        self.components.insert(name.to_string(), v);
        v
    }

    fn missing(&mut self, name: &str) {
        self.degeneracies.push(Degeneracy::new(
            &format!("{}.{name}", self.model),
            self.year,
            DegeneracyReason::MissingInput,
        ));
    }

    fn undefined(&mut self, name: &str) {
        self.degeneracies.push(Degeneracy::new(
            &format!("{}.{name}", self.model),
            self.year,
            DegeneracyReason::ZeroDenominator,
        ));
        self.complete = false;
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// Altman Z = 1.2 X1 + 1.4 X2 + 3.3 X3 + 0.6 X4 + 1.0 X5.
///
/// X4 uses market value of equity when reported, else book equity. Missing
/// retained earnings fall back to book equity.
pub fn altman_z(period: &FinancialPeriod, degeneracies: &mut Vec<Degeneracy>) -> ClassifierScore {
    let bs = &period.balance_sheet;
    let mut r = Ratios::new("altman_z", period.year, degeneracies);
    let ta = bs.total_assets;

    let retained = match bs.retained_earnings {
        Some(re) => re,
        None => {
            r.missing("retained_earnings");
            bs.shareholders_equity
        }
    };
    let equity = match bs.market_value_equity {
        Some(mve) => mve,
        None if bs.shareholders_equity.is_zero() => {
            r.undefined("x4_equity_to_liabilities");
            Decimal::ZERO
        }
        None => bs.shareholders_equity,
    };

    let x1 = r.ratio("x1_working_capital_to_assets", period.working_capital(), ta);
    let x2 = r.ratio("x2_retained_earnings_to_assets", retained, ta);
    let x3 = r.ratio("x3_ebit_to_assets", period.ebit(), ta);
    let x4 = r.ratio("x4_equity_to_liabilities", equity, bs.total_liabilities);
    let x5 = r.ratio("x5_sales_to_assets", period.revenue(), ta);

    if !r.complete {
        return ClassifierScore::undefined(DistressModel::AltmanZ, r.components);
    }
    let z = dec!(1.2) * x1 + dec!(1.4) * x2 + dec!(3.3) * x3 + dec!(0.6) * x4 + x5;
    let p = logistic(DISCRIMINANT_SLOPE * (ALTMAN_MIDPOINT - z));
    ClassifierScore::defined(DistressModel::AltmanZ, z, p, r.components)
}

/// Ohlson O-score. The two trend terms need the prior year and are zero
/// (with a degeneracy) without it.
pub fn ohlson_o(
    period: &FinancialPeriod,
    prior: Option<&FinancialPeriod>,
    degeneracies: &mut Vec<Degeneracy>,
) -> ClassifierScore {
    let bs = &period.balance_sheet;
    let ni = period.income_statement.net_income;
    let mut r = Ratios::new("ohlson_o", period.year, degeneracies);
    let ta = bs.total_assets;

    let size = if ta > Decimal::ZERO {
        r.value("size", (ta / OHLSON_SIZE_UNIT).ln())
    } else {
        r.undefined("size");
        Decimal::ZERO
    };
    let tlta = r.ratio("tl_to_assets", bs.total_liabilities, ta);
    let wcta = r.ratio("wc_to_assets", period.working_capital(), ta);
    let clca = r.ratio("cl_to_ca", bs.current_liabilities, bs.current_assets);
    let nita = r.ratio("ni_to_assets", ni, ta);
    let futl = r.ratio(
        "ffo_to_liabilities",
        period.cash_flow_statement.operating_cash_flow,
        bs.total_liabilities,
    );
    let oeneg = r.value(
        "oeneg",
        if bs.total_liabilities > ta {
            Decimal::ONE
        } else {
            Decimal::ZERO
        },
    );

    let (intwo, chin) = match prior {
        Some(prev) => {
            let prev_ni = prev.income_statement.net_income;
            let intwo = if ni < Decimal::ZERO && prev_ni < Decimal::ZERO {
                Decimal::ONE
            } else {
                Decimal::ZERO
            };
            let scale = ni.abs() + prev_ni.abs();
            let chin = if scale.is_zero() {
                Decimal::ZERO
            } else {
                (ni - prev_ni) / scale
            };
            (intwo, chin)
        }
        None => {
            r.missing("intwo");
            r.missing("chin");
            (Decimal::ZERO, Decimal::ZERO)
        }
    };
    r.value("intwo", intwo);
    r.value("chin", chin);

    if !r.complete {
        return ClassifierScore::undefined(DistressModel::OhlsonO, r.components);
    }
    let o = dec!(-1.32) - dec!(0.407) * size + dec!(6.03) * tlta - dec!(1.43) * wcta
        + dec!(0.0757) * clca
        - dec!(1.72) * oeneg
        - dec!(2.37) * nita
        - dec!(1.83) * futl
        + dec!(0.285) * intwo
        - dec!(0.521) * chin;
    ClassifierScore::defined(DistressModel::OhlsonO, o, logistic(o), r.components)
}

/// Zmijewski X = -4.336 - 4.513 NI/TA + 5.679 TL/TA + 0.004 CA/CL, P = Phi(X).
pub fn zmijewski_x(
    period: &FinancialPeriod,
    degeneracies: &mut Vec<Degeneracy>,
) -> ClassifierScore {
    let bs = &period.balance_sheet;
    let mut r = Ratios::new("zmijewski_x", period.year, degeneracies);
    let ta = bs.total_assets;

    let nita = r.ratio("ni_to_assets", period.income_statement.net_income, ta);
    let tlta = r.ratio("tl_to_assets", bs.total_liabilities, ta);
    let cacl = r.ratio("ca_to_cl", bs.current_assets, bs.current_liabilities);

    if !r.complete {
        return ClassifierScore::undefined(DistressModel::ZmijewskiX, r.components);
    }
    let x = dec!(-4.336) - dec!(4.513) * nita + dec!(5.679) * tlta + dec!(0.004) * cacl;
    let p = x.clamp(-EXP_BOUND, EXP_BOUND).norm_cdf();
    ClassifierScore::defined(DistressModel::ZmijewskiX, x, p, r.components)
}

/// Springate S = 1.03 A + 3.07 B + 0.66 C + 0.4 D, distressed below 0.862.
pub fn springate_s(
    period: &FinancialPeriod,
    degeneracies: &mut Vec<Degeneracy>,
) -> ClassifierScore {
    let bs = &period.balance_sheet;
    let is = &period.income_statement;
    let mut r = Ratios::new("springate_s", period.year, degeneracies);
    let ta = bs.total_assets;
    let ebit = period.ebit();

    let a = r.ratio("a_working_capital_to_assets", period.working_capital(), ta);
    let b = r.ratio("b_ebit_to_assets", ebit, ta);
    let c = r.ratio(
        "c_ebt_to_current_liabilities",
        ebit - is.interest_expense,
        bs.current_liabilities,
    );
    let d = r.ratio("d_sales_to_assets", period.revenue(), ta);

    if !r.complete {
        return ClassifierScore::undefined(DistressModel::SpringateS, r.components);
    }
    let s = dec!(1.03) * a + dec!(3.07) * b + dec!(0.66) * c + dec!(0.4) * d;
    let p = logistic(DISCRIMINANT_SLOPE * (SPRINGATE_CUTOFF - s));
    ClassifierScore::defined(DistressModel::SpringateS, s, p, r.components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::statements::tests::sample_period;

    #[test]
    fn test_logistic_midpoint_and_bounds() {
        assert!((logistic(Decimal::ZERO) - dec!(0.5)).abs() < dec!(0.000000001));
        assert!(logistic(dec!(1000)) > dec!(0.999999));
        assert!(logistic(dec!(-1000)) < dec!(0.000001));
    }

    #[test]
    fn test_altman_grey_zone_boundaries_map_to_quartiles() {
        let at_safe = logistic(DISCRIMINANT_SLOPE * (ALTMAN_MIDPOINT - ALTMAN_SAFE));
        let at_distress = logistic(DISCRIMINANT_SLOPE * (ALTMAN_MIDPOINT - ALTMAN_DISTRESS));
        assert!((at_safe - dec!(0.25)).abs() < dec!(0.001));
        assert!((at_distress - dec!(0.75)).abs() < dec!(0.001));
    }

    #[test]
    fn test_altman_on_sample_company() {
        let mut d = Vec::new();
        let s = altman_z(&sample_period(2024), &mut d);
        // x1 .125, x2 .3, x3 .15, x4 1.5, x5 .5
        assert_eq!(s.score, Some(dec!(2.465)));
        assert!(s.included);
        assert!(d.is_empty());
    }

    #[test]
    fn test_zero_assets_leaves_classifiers_undefined() {
        let mut p = sample_period(2024);
        p.balance_sheet.total_assets = Decimal::ZERO;
        let mut d = Vec::new();
        let altman = altman_z(&p, &mut d);
        let zmij = zmijewski_x(&p, &mut d);
        assert!(!altman.included && altman.score.is_none());
        assert!(!zmij.included);
        assert!(d
            .iter()
            .any(|x| x.reason == DegeneracyReason::ZeroDenominator));
    }

    #[test]
    fn test_zero_equity_excludes_altman_only() {
        let mut p = sample_period(2024);
        p.balance_sheet.shareholders_equity = Decimal::ZERO;
        let mut d = Vec::new();
        assert!(!altman_z(&p, &mut d).included);
        assert!(zmijewski_x(&p, &mut d).included);
        assert!(springate_s(&p, &mut d).included);
    }

    #[test]
    fn test_ohlson_without_prior_records_missing_trend() {
        let mut d = Vec::new();
        let o = ohlson_o(&sample_period(2024), None, &mut d);
        assert!(o.included);
        assert_eq!(
            d.iter()
                .filter(|x| x.reason == DegeneracyReason::MissingInput)
                .count(),
            2
        );
    }

    #[test]
    fn test_ohlson_two_loss_years_raise_probability() {
        let mut current = sample_period(2024);
        let mut prior = sample_period(2023);
        let mut d = Vec::new();
        let healthy = ohlson_o(&current, Some(&prior), &mut d).probability.unwrap();
        current.income_statement.net_income = dec!(-100_000);
        prior.income_statement.net_income = dec!(-50_000);
        let losses = ohlson_o(&current, Some(&prior), &mut d);
        assert_eq!(losses.components["intwo"], Decimal::ONE);
        assert!(losses.probability.unwrap() > healthy);
    }

    #[test]
    fn test_zmijewski_healthy_company_low_probability() {
        let mut d = Vec::new();
        let z = zmijewski_x(&sample_period(2024), &mut d);
        // -4.336 - 4.513 * 0.105 + 5.679 * 0.4 + 0.004 * 2
        assert_eq!(z.score, Some(dec!(-2.530265)));
        assert!(z.probability.unwrap() < dec!(0.01));
    }
}
