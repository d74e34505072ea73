use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::error::DealAnalysisError;
use crate::types::{Money, Rate};
use crate::DealResult;

const STEP_TOLERANCE: Decimal = dec!(0.0000000001);
const MAX_NEWTON_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const IRR_DECIMAL_PLACES: u32 = 10;

/// Lower edge of the bracket searched by the bisection fallback.
pub const IRR_LOWER_BOUND: Rate = dec!(-0.99);
/// Upper edge of the bracket searched by the bisection fallback.
pub const IRR_UPPER_BOUND: Rate = dec!(1.0);

/// Default starting point for Newton-Raphson.
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

/// Net Present Value of a series of annual cash flows (index 0 undiscounted).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> DealResult<Money> {
    if rate <= dec!(-1) {
        return Err(DealAnalysisError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(DealAnalysisError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Horizon value Σ CFₜ·(1+r)^(n−t) and its derivative with respect to r,
/// evaluated by Horner's rule. Shares its roots with NPV for r > −1 but
/// never divides, so small (1+r) cannot underflow. `None` on overflow.
fn horizon_value(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let x = Decimal::ONE.checked_add(rate)?;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;
    for cf in cash_flows {
        slope = slope.checked_mul(x)?.checked_add(value)?;
        value = value.checked_mul(x)?.checked_add(*cf)?;
    }
    Some((value, slope))
}

/// Internal Rate of Return on annual cash flows.
///
/// Newton-Raphson from `guess`, falling back to bisection over
/// [`IRR_LOWER_BOUND`, `IRR_UPPER_BOUND`] when the derivative vanishes, an
/// iterate leaves the band, or the iteration budget runs out. The result is
/// rounded to 10 decimal places so identical inputs always produce the
/// identical rate.
pub fn irr(cash_flows: &[Money], guess: Rate) -> DealResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(DealAnalysisError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let has_outflow = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_inflow = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    if !has_outflow || !has_inflow {
        return Err(DealAnalysisError::FinancialImpossibility(
            "IRR undefined: cash flows never change sign".into(),
        ));
    }

    if let Some(rate) = newton_raphson(cash_flows, guess) {
        return Ok(rate.round_dp(IRR_DECIMAL_PLACES));
    }

    debug!(guess = %guess, flows = cash_flows.len(), "IRR Newton-Raphson stalled, bisecting");
    bisect(cash_flows).map(|r| r.round_dp(IRR_DECIMAL_PLACES))
}

/// IRR that reports failure as `None` and records why in `warnings`.
pub fn irr_or_none(cash_flows: &[Money], label: &str, warnings: &mut Vec<String>) -> Option<Rate> {
    match irr(cash_flows, DEFAULT_IRR_GUESS) {
        Ok(r) => Some(r),
        Err(e) => {
            warnings.push(format!("{label} IRR undefined: {e}"));
            None
        }
    }
}

fn newton_raphson(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    if guess < IRR_LOWER_BOUND || guess > IRR_UPPER_BOUND {
        return None;
    }

    let mut rate = guess;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (value, slope) = horizon_value(cash_flows, rate)?;
        if value.is_zero() {
            return Some(rate);
        }
        if slope.is_zero() {
            return None;
        }

        let next = rate.checked_sub(value.checked_div(slope)?)?;
        if next < IRR_LOWER_BOUND || next > IRR_UPPER_BOUND {
            return None;
        }
        if (next - rate).abs() < STEP_TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    None
}

fn bisect(cash_flows: &[Money]) -> DealResult<Rate> {
    let eval = |rate: Rate| {
        horizon_value(cash_flows, rate)
            .map(|(v, _)| v)
            .ok_or_else(|| {
                DealAnalysisError::FinancialImpossibility(format!(
                    "IRR undefined: cash flows overflow at rate {rate}"
                ))
            })
    };

    let mut lo = IRR_LOWER_BOUND;
    let mut hi = IRR_UPPER_BOUND;
    let mut f_lo = eval(lo)?;
    let f_hi = eval(hi)?;

    if f_lo.is_zero() {
        return Ok(lo);
    }
    if f_hi.is_zero() {
        return Ok(hi);
    }
    if f_lo.is_sign_positive() == f_hi.is_sign_positive() {
        return Err(DealAnalysisError::FinancialImpossibility(format!(
            "IRR undefined: no root between {IRR_LOWER_BOUND} and {IRR_UPPER_BOUND}"
        )));
    }

    let mut last_delta = f_lo;
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let f_mid = eval(mid)?;
        last_delta = f_mid;
        if f_mid.is_zero() || (hi - lo) / dec!(2) < STEP_TOLERANCE {
            return Ok(mid);
        }
        if f_mid.is_sign_positive() == f_lo.is_sign_positive() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(DealAnalysisError::ConvergenceFailure {
        function: "IRR bisection".into(),
        iterations: MAX_BISECTION_ITERATIONS,
        last_delta,
    })
}
