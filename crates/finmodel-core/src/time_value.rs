use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::FinModelError;
use crate::types::{Money, Rate};
use crate::FinModelResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

fn check_rate(rate: Rate) -> FinModelResult<()> {
    if rate <= dec!(-1) {
        return Err(FinModelError::configuration(
            "discount_rate",
            "Discount rate must be greater than -100%",
        ));
    }
    Ok(())
}

fn out_of_range() -> FinModelError {
    FinModelError::configuration(
        "discount_rate",
        "Discounting exceeds the representable range at this rate and horizon",
    )
}

/// `cf / discount`, rejecting a discount that has underflowed to zero.
fn discounted(cf: Money, discount: Decimal) -> FinModelResult<Money> {
    cf.checked_div(discount).ok_or_else(out_of_range)
}

fn accumulate(total: Money, value: Money) -> FinModelResult<Money> {
    total.checked_add(value).ok_or_else(out_of_range)
}

/// Net Present Value of a series of cash flows, the first at t=0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> FinModelResult<Money> {
    check_rate(rate)?;

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r).ok_or_else(out_of_range)?;
        }
        result = accumulate(result, discounted(*cf, discount)?)?;
    }

    Ok(result)
}

/// Present value of flows received at the end of periods 1..=n.
pub fn present_value_from_period_one(rate: Rate, cash_flows: &[Money]) -> FinModelResult<Money> {
    check_rate(rate)?;

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;
    for cf in cash_flows {
        discount = discount.checked_mul(one_plus_r).ok_or_else(out_of_range)?;
        result = accumulate(result, discounted(*cf, discount)?)?;
    }
    Ok(result)
}

/// 1 / (1 + rate)^t
pub fn discount_factor(rate: Rate, t: u32) -> FinModelResult<Decimal> {
    check_rate(rate)?;
    let growth = (Decimal::ONE + rate)
        .checked_powu(u64::from(t))
        .ok_or_else(out_of_range)?;
    discounted(Decimal::ONE, growth)
}

/// Internal Rate of Return using Newton-Raphson
pub fn irr(cash_flows: &[Money], guess: Rate) -> FinModelResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(FinModelError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    if !(has_positive && has_negative) {
        return Err(FinModelError::InsufficientData(
            "IRR requires at least one positive and one negative cash flow".into(),
        ));
    }

    let mut rate = guess;

    for i in 0..MAX_IRR_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;
        let mut discount = Decimal::ONE;
        let diverged = || FinModelError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: i,
            last_delta: Decimal::MAX,
        };

        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                discount = discount.checked_mul(one_plus_r).ok_or_else(diverged)?;
            }
            if discount.is_zero() {
                continue;
            }
            npv_val = cf
                .checked_div(discount)
                .and_then(|pv| npv_val.checked_add(pv))
                .ok_or_else(diverged)?;
            if t > 0 {
                dnpv = discount
                    .checked_mul(one_plus_r)
                    .and_then(|d| Decimal::from(t as i64).checked_mul(*cf)?.checked_div(d))
                    .and_then(|term| dnpv.checked_sub(term))
                    .ok_or_else(diverged)?;
            }
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(FinModelError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        rate = npv_val
            .checked_div(dnpv)
            .and_then(|step| rate.checked_sub(step))
            .ok_or_else(diverged)?;

        // Guard against divergence
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(FinModelError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: npv(rate, cash_flows).unwrap_or(Decimal::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npv_first_flow_undiscounted() {
        let flows = vec![dec!(-1000), dec!(1100)];
        let value = npv(dec!(0.10), &flows).unwrap();
        assert_eq!(value, Decimal::ZERO);
    }

    #[test]
    fn test_present_value_from_period_one() {
        let value = present_value_from_period_one(dec!(0.10), &[dec!(110), dec!(121)]).unwrap();
        assert_eq!(value, dec!(200));
    }

    #[test]
    fn test_rate_at_minus_one_rejected() {
        let err = npv(dec!(-1), &[dec!(1)]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_discount_factor() {
        let df = discount_factor(dec!(0.25), 2).unwrap();
        assert_eq!(df, dec!(0.64));
    }

    #[test]
    fn test_deep_negative_rate_over_long_horizon_is_an_error() {
        let flows = vec![dec!(100_000); 30];
        let err = present_value_from_period_one(dec!(-0.95), &flows).unwrap_err();
        assert!(err.is_configuration());
        assert!(npv(dec!(-0.95), &flows).unwrap_err().is_configuration());
    }

    #[test]
    fn test_large_rate_over_long_horizon_is_an_error() {
        let flows = vec![dec!(100_000); 40];
        assert!(present_value_from_period_one(dec!(10), &flows)
            .unwrap_err()
            .is_configuration());
        assert!(discount_factor(dec!(10), 40).unwrap_err().is_configuration());
    }

    #[test]
    fn test_irr_simple() {
        let flows = vec![dec!(-1000), dec!(600), dec!(600)];
        let rate = irr(&flows, dec!(0.1)).unwrap();
        // 13.07% solves -1000 + 600/(1+r) + 600/(1+r)^2 = 0
        assert!((rate - dec!(0.1307)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_needs_sign_change() {
        let flows = vec![dec!(100), dec!(100)];
        assert!(matches!(
            irr(&flows, dec!(0.1)),
            Err(FinModelError::InsufficientData(_))
        ));
    }
}
