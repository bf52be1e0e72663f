use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FinModelError;
use crate::projection::Projection;
use crate::time_value::{self, discount_factor};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FinModelResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Discounting parameters for a projected free cash flow stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfInput {
    pub wacc: Rate,
    /// Perpetual growth for a Gordon terminal value. No terminal value when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_growth: Option<Rate>,
    /// Outflow at t = 0. Enables an IRR figure when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_investment: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedFlow {
    pub t: u32,
    pub year: i32,
    pub free_cash_flow: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfValuation {
    pub wacc: Rate,
    pub flows: Vec<DiscountedFlow>,
    /// Sum of discounted explicit-period free cash flows
    pub pv_of_fcf: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_of_terminal: Option<Money>,
    pub enterprise_value: Money,
    /// PV of terminal value / enterprise value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_value_pct: Option<Rate>,
    /// Enterprise value less the initial investment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_present_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
}

/// A raw cash flow series, the first flow at t = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowSeriesInput {
    pub rate: Rate,
    pub cash_flows: Vec<Money>,
    #[serde(default)]
    pub irr_guess: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowSeriesOutput {
    pub npv: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Gordon growth terminal value: FCF_N x (1 + g) / (wacc - g).
pub fn gordon_terminal_value(final_fcf: Money, wacc: Rate, growth: Rate) -> FinModelResult<Money> {
    if wacc == growth {
        return Err(FinModelError::configuration(
            "terminal_growth",
            "Terminal growth equals WACC; Gordon growth value is undefined",
        ));
    }
    if growth > wacc {
        return Err(FinModelError::configuration(
            "terminal_growth",
            "Terminal growth must be below WACC",
        ));
    }
    final_fcf
        .checked_mul(Decimal::ONE + growth)
        .and_then(|grown| grown.checked_div(wacc - growth))
        .ok_or_else(|| {
            FinModelError::configuration(
                "terminal_growth",
                "Terminal value exceeds the representable range; growth is too close to WACC",
            )
        })
}

fn out_of_range(what: &str) -> FinModelError {
    FinModelError::configuration("wacc", format!("{what} exceeds the representable range"))
}

/// PV of projected free cash flows, discounted from t = 1 at `wacc`.
pub fn projection_npv(projection: &Projection, wacc: Rate) -> FinModelResult<Money> {
    time_value::present_value_from_period_one(wacc, &projection.free_cash_flows())
}

/// Value a projection: discounted free cash flows plus an optional terminal value.
pub fn value_projection(
    projection: &Projection,
    input: &DcfInput,
) -> FinModelResult<ComputationOutput<DcfValuation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.wacc <= dec!(-1) {
        return Err(FinModelError::configuration(
            "wacc",
            "WACC must be greater than -100%",
        ));
    }
    if input.wacc <= Decimal::ZERO {
        warnings.push("Non-positive WACC; present values exceed nominal values".into());
    }
    let last = projection.last().ok_or_else(|| {
        FinModelError::InsufficientData("Projection contains no periods".into())
    })?;

    let mut flows = Vec::with_capacity(projection.periods.len());
    let mut pv_of_fcf = Decimal::ZERO;
    for p in &projection.periods {
        let df = discount_factor(input.wacc, p.t)?;
        let pv = p
            .free_cash_flow
            .checked_mul(df)
            .ok_or_else(|| out_of_range("present value"))?;
        pv_of_fcf = pv_of_fcf
            .checked_add(pv)
            .ok_or_else(|| out_of_range("present value"))?;
        flows.push(DiscountedFlow {
            t: p.t,
            year: p.year,
            free_cash_flow: p.free_cash_flow,
            discount_factor: df,
            present_value: pv,
        });
    }

    let (terminal_value, pv_of_terminal) = match input.terminal_growth {
        Some(g) => {
            let tv = gordon_terminal_value(last.free_cash_flow, input.wacc, g)?;
            let pv = tv
                .checked_mul(discount_factor(input.wacc, last.t)?)
                .ok_or_else(|| out_of_range("terminal present value"))?;
            (Some(tv), Some(pv))
        }
        None => (None, None),
    };

    let enterprise_value = pv_of_fcf
        .checked_add(pv_of_terminal.unwrap_or(Decimal::ZERO))
        .ok_or_else(|| out_of_range("enterprise value"))?;
    let terminal_value_pct = match pv_of_terminal {
        Some(pv) => pv.checked_div(enterprise_value),
        _ => None,
    };
    if terminal_value_pct.is_some_and(|pct| pct > dec!(0.75)) {
        warnings.push("Terminal value exceeds 75% of enterprise value".into());
    }

    let (net_present_value, irr) = match input.initial_investment {
        Some(investment) => {
            let mut series = Vec::with_capacity(flows.len() + 1);
            series.push(-investment);
            series.extend(flows.iter().map(|f| f.free_cash_flow));
            if let (Some(tv), Some(final_flow)) = (terminal_value, series.last_mut()) {
                *final_flow = final_flow
                    .checked_add(tv)
                    .ok_or_else(|| out_of_range("terminal cash flow"))?;
            }
            let irr = match time_value::irr(&series, input.wacc.max(dec!(0.01))) {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warnings.push(format!("IRR unavailable: {e}"));
                    None
                }
            };
            let net = enterprise_value
                .checked_sub(investment)
                .ok_or_else(|| out_of_range("net present value"))?;
            (Some(net), irr)
        }
        None => (None, None),
    };

    let output = DcfValuation {
        wacc: input.wacc,
        flows,
        pv_of_fcf,
        terminal_value,
        pv_of_terminal,
        enterprise_value,
        terminal_value_pct,
        net_present_value,
        irr,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted free cash flow (end-of-year discounting)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// NPV and IRR of an explicit cash flow series.
pub fn cash_flow_npv(
    input: &CashFlowSeriesInput,
) -> FinModelResult<ComputationOutput<CashFlowSeriesOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if input.cash_flows.is_empty() {
        return Err(FinModelError::validation(
            "cash_flows",
            "At least one cash flow is required",
        ));
    }
    let npv = time_value::npv(input.rate, &input.cash_flows)?;
    let irr = match time_value::irr(&input.cash_flows, input.irr_guess.unwrap_or(dec!(0.10))) {
        Ok(r) => Some(r),
        Err(e) => {
            warnings.push(format!("IRR unavailable: {e}"));
            None
        }
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "NPV / IRR (first flow at t=0)",
        input,
        warnings,
        elapsed,
        CashFlowSeriesOutput { npv, irr },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
