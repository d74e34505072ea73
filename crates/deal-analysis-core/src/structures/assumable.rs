use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::AssumableParams;
use super::{combined_balance, debt_service_schedule, dscr_warning, equity_cash_flows, ModelOutcome, StructureDetails};
use crate::amortization::{blended_rate, Loan};
use crate::error::DealAnalysisError;
use crate::projection::{break_even_occupancy, build_projections, project_operations, sale_price, DealInputsBase};
use crate::types::{Money, Rate, Ratio};
use crate::DealResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumableDetails {
    pub assumed_balance: Money,
    pub supplemental_loan_amount: Money,
    pub assumption_fee: Money,
    /// Balance-weighted rate across assumed and supplemental loans
    pub blended_rate: Rate,
    pub market_rate: Rate,
    /// Year-1 debt service the same total debt would cost at market
    pub market_debt_service: Money,
    pub annual_rate_savings: Money,
    pub total_rate_savings: Money,
    pub balance_at_exit: Money,
}

/// Take over the seller's existing loan, optionally topped up with a
/// supplemental second, and compare its cost to new money at market.
pub(crate) fn model(
    base: &DealInputsBase,
    params: &AssumableParams,
    warnings: &mut Vec<String>,
) -> DealResult<ModelOutcome> {
    let hold = base.hold_period_years;
    let assumed = Loan::new(
        params.assumed_balance,
        params.assumed_rate,
        params.assumed_remaining_years,
    );
    let supplemental = Loan::new(
        params.supplemental_amount,
        params.supplemental_rate,
        params.supplemental_amortization_years,
    );
    let loans = [&assumed, &supplemental];

    let assumption_fee = assumed.principal * params.assumption_fee_pct;
    let total_debt = assumed.principal + supplemental.principal;
    let total_equity = base.all_in_cost() + assumption_fee - total_debt;
    if total_equity < Decimal::ZERO {
        return Err(DealAnalysisError::invalid(
            "assumed_balance",
            "Assumed and supplemental debt exceed the total acquisition cost",
        ));
    }

    let operations = project_operations(base, None)?;
    let debt_service = debt_service_schedule(&loans, hold)?;
    let projections = build_projections(&operations, &debt_service, &[]);

    let market_loan = Loan::new(total_debt, params.market_rate, params.market_amortization_years);
    let market_debt_service = debt_service_schedule(&[&market_loan], hold)?;
    let annual_rate_savings = market_debt_service[0] - debt_service[0];
    let total_rate_savings: Money = market_debt_service
        .iter()
        .zip(&debt_service)
        .map(|(m, a)| m - a)
        .sum();

    let rate = blended_rate(&loans);
    if params.market_rate <= rate {
        warnings.push(format!(
            "Blended assumed rate {rate} is not below the market rate {}",
            params.market_rate
        ));
    }
    if params.assumed_remaining_years > 0 && params.assumed_remaining_years < hold {
        warnings.push("Assumed loan pays off before exit; debt service drops to the supplemental loan".into());
    }

    let sale = sale_price(&operations, base)?;
    let balance_at_exit = combined_balance(&loans, hold)?;
    let net_sale_proceeds = sale - balance_at_exit;
    let flows = equity_cash_flows(total_equity, &projections, net_sale_proceeds);

    let dscr = Ratio::of(operations[0].noi, debt_service[0]);
    dscr_warning(dscr, warnings);

    Ok(ModelOutcome {
        cash_on_cash: Ratio::of(projections[0].cash_flow, total_equity),
        break_even_occupancy: break_even_occupancy(&operations[0], debt_service[0]),
        projections,
        equity_cash_flows: flows,
        total_equity,
        total_debt,
        sale_price: sale,
        net_sale_proceeds,
        dscr,
        details: StructureDetails::Assumable(AssumableDetails {
            assumed_balance: assumed.principal,
            supplemental_loan_amount: supplemental.principal,
            assumption_fee,
            blended_rate: rate,
            market_rate: params.market_rate,
            market_debt_service: market_debt_service[0],
            annual_rate_savings,
            total_rate_savings,
            balance_at_exit,
        }),
        waterfall: None,
    })
}
