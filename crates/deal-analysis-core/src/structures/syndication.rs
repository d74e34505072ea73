use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::SyndicationParams;
use super::{combined_balance, debt_service_schedule, dscr_warning, equity_cash_flows, ModelOutcome, StructureDetails};
use crate::amortization::Loan;
use crate::error::DealAnalysisError;
use crate::projection::{break_even_occupancy, build_projections, project_operations, sale_price, DealInputsBase};
use crate::types::{Money, Rate, Ratio};
use crate::waterfall::{run_waterfall, PromoteConfig};
use crate::DealResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyndicationDetails {
    pub loan_amount: Money,
    pub gp_equity: Money,
    pub lp_equity: Money,
    pub gp_irr: Option<Rate>,
    pub lp_irr: Option<Rate>,
    pub gp_equity_multiple: Ratio,
    pub lp_equity_multiple: Ratio,
    pub gp_total_return: Money,
    pub lp_total_return: Money,
    pub total_promote: Money,
    pub acquisition_fee: Money,
    pub asset_management_fees: Money,
    pub disposition_fee: Money,
    pub construction_management_fee: Money,
    pub total_sponsor_fees: Money,
}

/// Sponsor-led raise: senior loan plus GP/LP equity, sponsor fees, and the
/// investor cash flows split through the promote waterfall.
pub(crate) fn model(
    base: &DealInputsBase,
    params: &SyndicationParams,
    warnings: &mut Vec<String>,
) -> DealResult<ModelOutcome> {
    let hold = base.hold_period_years;
    let loan = Loan::new(
        base.purchase_price * params.ltv,
        params.interest_rate,
        params.amortization_years,
    );

    let acquisition_fee = base.purchase_price * params.acquisition_fee_pct;
    let construction_management_fee = base.renovation_budget * params.construction_management_fee_pct;
    let total_equity =
        base.all_in_cost() + acquisition_fee + construction_management_fee - loan.principal;
    if total_equity <= Decimal::ZERO {
        return Err(DealAnalysisError::invalid(
            "ltv",
            "Senior loan covers the entire capital stack; no equity to syndicate",
        ));
    }

    let operations = project_operations(base, None)?;
    let debt_service = debt_service_schedule(&[&loan], hold)?;
    let asset_management: Vec<Money> = operations
        .iter()
        .take(hold as usize)
        .map(|op| op.effective_gross_income * params.asset_management_fee_pct)
        .collect();
    let projections = build_projections(&operations, &debt_service, &asset_management);

    let sale = sale_price(&operations, base)?;
    let disposition_fee = sale * params.disposition_fee_pct;
    let balance_at_exit = combined_balance(&[&loan], hold)?;
    let net_sale_proceeds = sale - balance_at_exit - disposition_fee;
    let flows = equity_cash_flows(total_equity, &projections, net_sale_proceeds);

    let config = PromoteConfig {
        gp_equity_pct: params.gp_equity_pct,
        lp_equity_pct: params.lp_equity_pct,
        tiers: params.tiers.clone(),
    };
    let promote = run_waterfall(&flows[1..], total_equity, &config, warnings)?;

    let dscr = Ratio::of(operations[0].noi, debt_service[0]);
    dscr_warning(dscr, warnings);

    let asset_management_fees: Money = asset_management.iter().copied().sum();
    let total_sponsor_fees =
        acquisition_fee + asset_management_fees + disposition_fee + construction_management_fee;

    let details = SyndicationDetails {
        loan_amount: loan.principal,
        gp_equity: promote.gp_capital,
        lp_equity: promote.lp_capital,
        gp_irr: promote.gp_irr,
        lp_irr: promote.lp_irr,
        gp_equity_multiple: promote.gp_equity_multiple,
        lp_equity_multiple: promote.lp_equity_multiple,
        gp_total_return: promote.gp_total_return,
        lp_total_return: promote.lp_total_return,
        total_promote: promote.total_promote,
        acquisition_fee,
        asset_management_fees,
        disposition_fee,
        construction_management_fee,
        total_sponsor_fees,
    };

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
        details: StructureDetails::Syndication(details),
        waterfall: Some(promote),
    })
}
