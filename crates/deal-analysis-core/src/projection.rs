use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DealAnalysisError;
use crate::types::{Money, Rate, Ratio};
use crate::DealResult;

/// Longest hold period the engine will project.
pub const MAX_HOLD_PERIOD_YEARS: u32 = 50;

/// Largest projected income, expense or sale figure. Leaves headroom for
/// summing a full hold period of flows without leaving `Decimal` range.
pub const MAX_PROJECTED_AMOUNT: Decimal = dec!(100000000000000000000);

/// Growth above this is almost certainly a percentage typed as a whole number.
const MAX_PLAUSIBLE_GROWTH: Rate = dec!(0.20);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Live data supplied by the caller (rates desk, comps provider, agency
/// eligibility check). The engine never fetches these itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSignals {
    /// Current market mortgage rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mortgage_rate: Option<Rate>,
    /// Comparable-sales value estimate for the property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparable_value: Option<Money>,
    /// Whether the deal qualifies for government-agency financing
    #[serde(default)]
    pub agency_eligible: bool,
}

/// Property-level assumptions shared by every financing structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealInputsBase {
    /// Acquisition price
    pub purchase_price: Money,
    /// Number of rentable units
    pub units: u32,
    /// Annual gross potential rent (year 1)
    pub gross_rental_income: Money,
    /// Parking, laundry, fees (year 1)
    #[serde(default)]
    pub other_income: Money,
    /// Vacancy and collection loss (0.05 = 5%)
    pub vacancy_rate: Rate,
    /// Operating expenses excluding taxes, insurance and reserve (year 1)
    pub operating_expenses: Money,
    /// Annual capital-expenditure reserve
    #[serde(default)]
    pub capex_reserve: Money,
    #[serde(default)]
    pub property_taxes: Money,
    #[serde(default)]
    pub insurance: Money,
    /// Whole years between acquisition and sale
    pub hold_period_years: u32,
    /// Cap rate applied to forward NOI at sale
    pub exit_cap_rate: Rate,
    #[serde(default)]
    pub rent_growth: Rate,
    #[serde(default)]
    pub expense_growth: Rate,
    /// Capital budgeted for renovation at acquisition
    #[serde(default)]
    pub renovation_budget: Money,
    /// Acquisition closing costs as a fraction of price
    #[serde(default)]
    pub closing_cost_pct: Rate,
    #[serde(default)]
    pub market: MarketSignals,
}

impl DealInputsBase {
    pub fn closing_costs(&self) -> Money {
        self.purchase_price * self.closing_cost_pct
    }

    /// Price + closing costs + renovation budget.
    pub fn all_in_cost(&self) -> Money {
        self.purchase_price + self.closing_costs() + self.renovation_budget
    }

    /// Year-1 gross potential income (rent + other income).
    pub fn gross_potential_income(&self) -> Money {
        self.gross_rental_income + self.other_income
    }

    /// Year-1 total operating expenses including taxes, insurance and reserve.
    pub fn total_operating_expenses(&self) -> Money {
        self.operating_expenses + self.property_taxes + self.insurance + self.capex_reserve
    }

    pub fn year1_noi(&self) -> Money {
        let gpi = self.gross_potential_income();
        gpi - gpi * self.vacancy_rate - self.total_operating_expenses()
    }

    /// Reject inputs the models cannot price; push warnings for unusual ones.
    pub fn validate(&self, warnings: &mut Vec<String>) -> DealResult<()> {
        if self.purchase_price <= Decimal::ZERO {
            return Err(DealAnalysisError::invalid(
                "purchase_price",
                "Purchase price must be positive",
            ));
        }
        if self.units == 0 {
            return Err(DealAnalysisError::invalid("units", "Unit count must be at least 1"));
        }
        for (field, value) in [
            ("gross_rental_income", self.gross_rental_income),
            ("other_income", self.other_income),
            ("operating_expenses", self.operating_expenses),
            ("capex_reserve", self.capex_reserve),
            ("property_taxes", self.property_taxes),
            ("insurance", self.insurance),
            ("renovation_budget", self.renovation_budget),
        ] {
            if value < Decimal::ZERO {
                return Err(DealAnalysisError::invalid(field, "Value cannot be negative"));
            }
        }
        if self.vacancy_rate < Decimal::ZERO || self.vacancy_rate >= Decimal::ONE {
            return Err(DealAnalysisError::invalid(
                "vacancy_rate",
                "Vacancy rate must be between 0 and 1 (exclusive upper)",
            ));
        }
        if self.hold_period_years < 1 || self.hold_period_years > MAX_HOLD_PERIOD_YEARS {
            return Err(DealAnalysisError::invalid(
                "hold_period_years",
                format!("Hold period must be between 1 and {MAX_HOLD_PERIOD_YEARS} years"),
            ));
        }
        if self.exit_cap_rate <= Decimal::ZERO {
            return Err(DealAnalysisError::invalid(
                "exit_cap_rate",
                "Exit cap rate must be positive",
            ));
        }
        if self.rent_growth <= dec!(-1) || self.expense_growth <= dec!(-1) {
            return Err(DealAnalysisError::invalid(
                "growth",
                "Growth rates must be greater than -100%",
            ));
        }
        if self.closing_cost_pct < Decimal::ZERO || self.closing_cost_pct >= Decimal::ONE {
            return Err(DealAnalysisError::invalid(
                "closing_cost_pct",
                "Closing cost percentage must be between 0 and 1",
            ));
        }
        if let Some(rate) = self.market.current_mortgage_rate {
            if rate < Decimal::ZERO {
                return Err(DealAnalysisError::invalid(
                    "market.current_mortgage_rate",
                    "Market mortgage rate cannot be negative",
                ));
            }
        }
        if let Some(value) = self.market.comparable_value {
            if value <= Decimal::ZERO {
                return Err(DealAnalysisError::invalid(
                    "market.comparable_value",
                    "Comparable value must be positive",
                ));
            }
        }

        if self.vacancy_rate > dec!(0.15) {
            warnings.push(format!(
                "Vacancy rate {:.1}% exceeds 15%, above typical market norms",
                self.vacancy_rate * dec!(100)
            ));
        }
        if self.exit_cap_rate < dec!(0.03) {
            warnings.push(format!(
                "Exit cap rate {} is below 3%, unusually low; verify market data",
                self.exit_cap_rate
            ));
        }
        if self.exit_cap_rate > dec!(0.12) {
            warnings.push(format!(
                "Exit cap rate {} exceeds 12%, unusually high; may indicate elevated risk",
                self.exit_cap_rate
            ));
        }
        for (field, growth) in [("rent_growth", self.rent_growth), ("expense_growth", self.expense_growth)] {
            if growth > MAX_PLAUSIBLE_GROWTH {
                warnings.push(format!(
                    "{field} of {growth} exceeds 20% a year, looks like a percentage; rates are decimals (0.03 = 3%)"
                ));
            }
        }
        if self.year1_noi() <= Decimal::ZERO {
            warnings.push("Year-1 NOI is not positive: expenses exceed effective income".into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One row of the operating projection, before financing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingYear {
    pub year: u32,
    pub gross_potential_income: Money,
    pub vacancy_loss: Money,
    pub effective_gross_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
}

/// One hold-period year of a financed projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyProjection {
    pub year: u32,
    pub gross_potential_income: Money,
    pub vacancy_loss: Money,
    pub effective_gross_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    pub cash_flow: Money,
    pub cumulative_cash_flow: Money,
}

/// Post-renovation rent increase applied from `from_year` onward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RentStepUp {
    pub from_year: u32,
    pub increase: Rate,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project `hold_period_years + 1` operating years. The extra year is the
/// forward year whose NOI is capitalized at exit.
///
/// Income and expenses compound annually from their year-1 values; vacancy
/// is taken off gross potential income each year.
pub fn project_operations(
    base: &DealInputsBase,
    step_up: Option<RentStepUp>,
) -> DealResult<Vec<OperatingYear>> {
    let years = base.hold_period_years + 1;
    let mut out = Vec::with_capacity(years as usize);

    let mut income = base.gross_potential_income();
    let mut expenses = base.total_operating_expenses();

    for year in 1..=years {
        if year > 1 {
            income = grow(income, base.rent_growth, "rent_growth", year)?;
            expenses = grow(expenses, base.expense_growth, "expense_growth", year)?;
        }

        let gross_potential_income = match step_up {
            Some(step) if year >= step.from_year => grow(income, step.increase, "rent_increase_pct", year)?,
            _ => income,
        };
        let vacancy_loss = gross_potential_income * base.vacancy_rate;
        let effective_gross_income = gross_potential_income - vacancy_loss;

        out.push(OperatingYear {
            year,
            gross_potential_income,
            vacancy_loss,
            effective_gross_income,
            operating_expenses: expenses,
            noi: effective_gross_income - expenses,
        });
    }

    Ok(out)
}

/// `amount × (1 + rate)`, rejected once it leaves the projectable range.
fn grow(amount: Money, rate: Rate, field: &str, year: u32) -> DealResult<Money> {
    (Decimal::ONE + rate)
        .checked_mul(amount)
        .filter(|v| v.abs() <= MAX_PROJECTED_AMOUNT)
        .ok_or_else(|| {
            DealAnalysisError::FinancialImpossibility(format!(
                "Projection overflows in year {year}: {field} of {rate} compounds past {MAX_PROJECTED_AMOUNT}"
            ))
        })
}

/// Combine operating years with debt service and any other cash deductions
/// (e.g. sponsor fees) into the financed projection. Only the first
/// `debt_service.len()` operating years are used.
pub fn build_projections(
    operations: &[OperatingYear],
    debt_service: &[Money],
    deductions: &[Money],
) -> Vec<YearlyProjection> {
    let mut cumulative = Decimal::ZERO;
    operations
        .iter()
        .zip(debt_service)
        .enumerate()
        .map(|(i, (op, ds))| {
            let deduction = deductions.get(i).copied().unwrap_or(Decimal::ZERO);
            let cash_flow = op.noi - *ds - deduction;
            cumulative += cash_flow;
            YearlyProjection {
                year: op.year,
                gross_potential_income: op.gross_potential_income,
                vacancy_loss: op.vacancy_loss,
                effective_gross_income: op.effective_gross_income,
                operating_expenses: op.operating_expenses,
                noi: op.noi,
                debt_service: *ds,
                cash_flow,
                cumulative_cash_flow: cumulative,
            }
        })
        .collect()
}

/// Sale price: forward-year NOI capitalized at the exit cap rate.
pub fn sale_price(operations: &[OperatingYear], base: &DealInputsBase) -> DealResult<Money> {
    let forward = operations
        .get(base.hold_period_years as usize)
        .ok_or_else(|| {
            DealAnalysisError::InsufficientData("Projection is missing the forward exit year".into())
        })?;
    if base.exit_cap_rate.is_zero() {
        return Err(DealAnalysisError::DivisionByZero {
            context: "exit valuation (NOI / exit_cap_rate)".into(),
        });
    }
    forward
        .noi
        .checked_div(base.exit_cap_rate)
        .filter(|v| v.abs() <= MAX_PROJECTED_AMOUNT)
        .ok_or_else(|| {
            DealAnalysisError::FinancialImpossibility(format!(
                "Sale price of forward NOI {} at exit cap rate {} is out of range",
                forward.noi, base.exit_cap_rate
            ))
        })
}

/// Occupancy at which effective income covers expenses plus debt service.
pub fn break_even_occupancy(year: &OperatingYear, debt_service: Money) -> Ratio {
    Ratio::of(year.operating_expenses + debt_service, year.gross_potential_income)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> DealInputsBase {
        DealInputsBase {
            purchase_price: dec!(1000000),
            units: 10,
            gross_rental_income: dec!(150000),
            other_income: Decimal::ZERO,
            vacancy_rate: dec!(0.05),
            operating_expenses: dec!(40000),
            capex_reserve: Decimal::ZERO,
            property_taxes: dec!(15000),
            insurance: dec!(8000),
            hold_period_years: 5,
            exit_cap_rate: dec!(0.06),
            rent_growth: dec!(0.03),
            expense_growth: dec!(0.02),
            renovation_budget: Decimal::ZERO,
            closing_cost_pct: Decimal::ZERO,
            market: MarketSignals::default(),
        }
    }

    #[test]
    fn test_year_one_noi() {
        let ops = project_operations(&base(), None).unwrap();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0].vacancy_loss, dec!(7500));
        assert_eq!(ops[0].effective_gross_income, dec!(142500));
        assert_eq!(ops[0].operating_expenses, dec!(63000));
        assert_eq!(ops[0].noi, dec!(79500));
    }

    #[test]
    fn test_growth_compounds_annually() {
        let ops = project_operations(&base(), None).unwrap();
        assert_eq!(ops[2].gross_potential_income, dec!(150000) * dec!(1.03) * dec!(1.03));
        assert_eq!(ops[2].operating_expenses, dec!(63000) * dec!(1.02) * dec!(1.02));
    }

    #[test]
    fn test_rent_step_up_applies_from_year() {
        let step = RentStepUp {
            from_year: 2,
            increase: dec!(0.10),
        };
        let ops = project_operations(&base(), Some(step)).unwrap();
        assert_eq!(ops[0].gross_potential_income, dec!(150000));
        assert_eq!(ops[1].gross_potential_income, dec!(150000) * dec!(1.03) * dec!(1.10));
    }

    #[test]
    fn test_build_projections_cumulates() {
        let ops = project_operations(&base(), None).unwrap();
        let ds = vec![dec!(50000); 5];
        let rows = build_projections(&ops, &ds, &[]);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].cash_flow, dec!(29500));
        let total: Money = rows.iter().map(|r| r.cash_flow).sum();
        assert_eq!(rows[4].cumulative_cash_flow, total);
    }

    #[test]
    fn test_sale_price_uses_forward_noi() {
        let mut b = base();
        b.rent_growth = Decimal::ZERO;
        b.expense_growth = Decimal::ZERO;
        let ops = project_operations(&b, None).unwrap();
        assert_eq!(sale_price(&ops, &b).unwrap(), dec!(1325000));
    }

    #[test]
    fn test_runaway_growth_is_an_error_not_a_panic() {
        let mut b = base();
        b.hold_period_years = 50;
        b.rent_growth = dec!(3);
        let mut warnings = Vec::new();
        b.validate(&mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("rent_growth")));

        let err = project_operations(&b, None).unwrap_err();
        assert!(matches!(err, DealAnalysisError::FinancialImpossibility(_)));
    }

    #[test]
    fn test_sale_price_out_of_range_rejected() {
        let mut b = base();
        b.exit_cap_rate = dec!(0.0000000000000000000000001);
        let ops = project_operations(&b, None).unwrap();
        assert!(sale_price(&ops, &b).is_err());
    }

    #[test]
    fn test_break_even_occupancy() {
        let ops = project_operations(&base(), None).unwrap();
        let be = break_even_occupancy(&ops[0], dec!(57000));
        assert_eq!(be, Ratio::Finite(dec!(0.8)));
    }

    #[test]
    fn test_validation_rejects_bad_inputs() {
        let mut warnings = Vec::new();
        let mut b = base();
        b.hold_period_years = 0;
        assert!(b.validate(&mut warnings).is_err());

        let mut b = base();
        b.purchase_price = dec!(-1);
        assert!(b.validate(&mut warnings).is_err());

        let mut b = base();
        b.vacancy_rate = dec!(1);
        assert!(b.validate(&mut warnings).is_err());

        assert!(base().validate(&mut warnings).is_ok());
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let json = serde_json::json!({
            "purchase_price": "1000000",
            "units": 10,
            "gross_rental_income": "150000",
            "vacancy_rate": "0.05",
            "operating_expenses": "40000",
            "hold_period_years": 5,
            "exit_cap_rate": "0.06"
        });
        let b: DealInputsBase = serde_json::from_value(json).unwrap();
        assert_eq!(b.property_taxes, Decimal::ZERO);
        assert!(!b.market.agency_eligible);
    }
}
