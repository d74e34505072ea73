use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::ConventionalParams;
use super::{combined_balance, debt_service_schedule, dscr_warning, equity_cash_flows, ModelOutcome, StructureDetails};
use crate::amortization::Loan;
use crate::projection::{break_even_occupancy, build_projections, project_operations, sale_price, DealInputsBase};
use crate::types::{Money, Ratio};
use crate::DealResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionalDetails {
    pub loan_amount: Money,
    pub annual_debt_service: Money,
    pub loan_fees: Money,
    /// Remaining principal repaid from sale proceeds
    pub balance_at_exit: Money,
}

/// Amortizing first mortgage sized on purchase price.
pub(crate) fn model(
    base: &DealInputsBase,
    params: &ConventionalParams,
    warnings: &mut Vec<String>,
) -> DealResult<ModelOutcome> {
    let hold = base.hold_period_years;
    let loan = Loan::new(
        base.purchase_price * params.ltv,
        params.interest_rate,
        params.amortization_years,
    );
    let loan_fees = loan.principal * params.loan_fee_pct;
    let total_equity = base.all_in_cost() + loan_fees - loan.principal;

    let operations = project_operations(base, None)?;
    let debt_service = debt_service_schedule(&[&loan], hold)?;
    let projections = build_projections(&operations, &debt_service, &[]);

    let sale = sale_price(&operations, base)?;
    let balance_at_exit = combined_balance(&[&loan], hold)?;
    let net_sale_proceeds = sale - balance_at_exit;
    let flows = equity_cash_flows(total_equity, &projections, net_sale_proceeds);

    let dscr = Ratio::of(operations[0].noi, debt_service[0]);
    dscr_warning(dscr, warnings);
    if net_sale_proceeds < Decimal::ZERO {
        warnings.push("Sale proceeds do not cover the loan balance at exit".into());
    }

    Ok(ModelOutcome {
        cash_on_cash: Ratio::of(projections[0].cash_flow, total_equity),
        break_even_occupancy: break_even_occupancy(&operations[0], debt_service[0]),
        projections,
        equity_cash_flows: flows,
        total_equity,
        total_debt: loan.principal,
        sale_price: sale,
        net_sale_proceeds,
        dscr,
        details: StructureDetails::Conventional(ConventionalDetails {
            loan_amount: loan.principal,
            annual_debt_service: debt_service[0],
            loan_fees,
            balance_at_exit,
        }),
        waterfall: None,
    })
}
