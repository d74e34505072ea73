use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use crate::error::DealAnalysisError;
use crate::types::{Money, Rate};
use crate::DealResult;

const MONTHS_PER_YEAR: u32 = 12;

fn compound_factor(monthly_rate: Rate, months: u32) -> DealResult<Decimal> {
    (Decimal::ONE + monthly_rate)
        .checked_powu(u64::from(months))
        .ok_or_else(|| DealAnalysisError::invalid("interest_rate", "Compounding overflowed"))
}

fn validate_loan(principal: Money, annual_rate: Rate) -> DealResult<()> {
    if principal < Decimal::ZERO {
        return Err(DealAnalysisError::invalid("principal", "Loan principal cannot be negative"));
    }
    if annual_rate < Decimal::ZERO {
        return Err(DealAnalysisError::invalid("interest_rate", "Interest rate cannot be negative"));
    }
    Ok(())
}

/// Level monthly payment: P * i(1+i)^n / ((1+i)^n - 1).
///
/// An amortization term of zero years is an interest-only loan
/// (P * rate / 12). A zero rate amortizes principal straight-line.
pub fn monthly_payment(
    principal: Money,
    annual_rate: Rate,
    amortization_years: u32,
) -> DealResult<Money> {
    validate_loan(principal, annual_rate)?;

    if amortization_years == 0 {
        return Ok(principal * annual_rate / Decimal::from(MONTHS_PER_YEAR));
    }

    let months = amortization_years * MONTHS_PER_YEAR;
    let monthly_rate = annual_rate / Decimal::from(MONTHS_PER_YEAR);

    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(months));
    }

    let compound = compound_factor(monthly_rate, months)?;
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(DealAnalysisError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    Ok(principal * monthly_rate * compound / denominator)
}

/// Outstanding balance after `payments_made` monthly payments.
pub fn remaining_balance(
    principal: Money,
    annual_rate: Rate,
    amortization_years: u32,
    payments_made: u32,
) -> DealResult<Money> {
    validate_loan(principal, annual_rate)?;

    if amortization_years == 0 {
        return Ok(principal);
    }

    let months = amortization_years * MONTHS_PER_YEAR;
    if payments_made >= months {
        return Ok(Decimal::ZERO);
    }

    let monthly_rate = annual_rate / Decimal::from(MONTHS_PER_YEAR);
    if monthly_rate.is_zero() {
        let paid = principal * Decimal::from(payments_made) / Decimal::from(months);
        return Ok(principal - paid);
    }

    let payment = monthly_payment(principal, annual_rate, amortization_years)?;
    let grown = compound_factor(monthly_rate, payments_made)?;
    let balance = principal * grown - payment * (grown - Decimal::ONE) / monthly_rate;

    Ok(balance.max(Decimal::ZERO))
}

/// A fixed-rate, level-payment loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub principal: Money,
    pub annual_rate: Rate,
    /// Zero means interest-only.
    pub amortization_years: u32,
}

impl Loan {
    pub fn new(principal: Money, annual_rate: Rate, amortization_years: u32) -> Self {
        Self {
            principal,
            annual_rate,
            amortization_years,
        }
    }

    pub fn interest_only(principal: Money, annual_rate: Rate) -> Self {
        Self::new(principal, annual_rate, 0)
    }

    pub fn monthly_payment(&self) -> DealResult<Money> {
        monthly_payment(self.principal, self.annual_rate, self.amortization_years)
    }

    /// Twelve monthly payments.
    pub fn annual_debt_service(&self) -> DealResult<Money> {
        if self.principal.is_zero() {
            return Ok(Decimal::ZERO);
        }
        Ok(self.monthly_payment()? * Decimal::from(MONTHS_PER_YEAR))
    }

    /// Debt service paid in loan year `year` (1-based); zero once the loan
    /// has fully amortized.
    pub fn debt_service_in_year(&self, year: u32) -> DealResult<Money> {
        if self.amortization_years > 0 && year > self.amortization_years {
            return Ok(Decimal::ZERO);
        }
        self.annual_debt_service()
    }

    pub fn balance_after_years(&self, years: u32) -> DealResult<Money> {
        remaining_balance(
            self.principal,
            self.annual_rate,
            self.amortization_years,
            years * MONTHS_PER_YEAR,
        )
    }

    /// Annual debt service as a fraction of principal.
    pub fn mortgage_constant(&self) -> DealResult<Rate> {
        if self.principal.is_zero() {
            return Ok(Decimal::ZERO);
        }
        Ok(self.annual_debt_service()? / self.principal)
    }
}

/// Balance-weighted average rate across a set of loans.
pub fn blended_rate(loans: &[&Loan]) -> Rate {
    let total: Money = loans.iter().map(|l| l.principal).sum();
    if total.is_zero() {
        return Decimal::ZERO;
    }
    loans
        .iter()
        .map(|l| l.principal * l.annual_rate)
        .sum::<Decimal>()
        / total
}
