use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::BridgeRefiParams;
use super::{dscr_warning, ModelOutcome, StructureDetails};
use crate::amortization::Loan;
use crate::error::DealAnalysisError;
use crate::projection::{
    break_even_occupancy, build_projections, project_operations, sale_price, DealInputsBase,
    RentStepUp,
};
use crate::types::{Money, Ratio};
use crate::DealResult;

/// Where the after-repair value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArvSource {
    Override,
    CapitalizedNoi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRefiDetails {
    pub bridge_loan_amount: Money,
    /// Points plus interest paid over the bridge period
    pub total_bridge_cost: Money,
    pub after_repair_value: Money,
    pub arv_source: ArvSource,
    pub refinance_loan_amount: Money,
    pub refinance_closing_costs: Money,
    /// Refinance proceeds left after paying off the bridge and closing costs
    pub cash_returned_at_refinance: Money,
    /// Invested cash not recovered at refinance; zero or less means all of it came back
    pub cash_left_in_deal: Money,
    pub infinite_return: bool,
    /// Hold year at whose end the refinance closes
    pub refinance_year: u32,
    pub balance_at_exit: Money,
}

/// Buy with an interest-only bridge loan, renovate, refinance into a
/// long-term amortizing loan sized on after-repair value, hold to exit.
///
/// Refinance proceeds net of the bridge payoff are returned to equity in
/// the refinance year. When they cover everything invested the remaining
/// return on cash is unbounded and cash-on-cash is reported as infinite.
pub(crate) fn model(
    base: &DealInputsBase,
    params: &BridgeRefiParams,
    warnings: &mut Vec<String>,
) -> DealResult<ModelOutcome> {
    let hold = base.hold_period_years;
    let refi_year = params.bridge_years;
    let stabilized_idx = refi_year as usize;

    let operations = project_operations(
        base,
        Some(RentStepUp {
            from_year: refi_year + 1,
            increase: params.rent_increase_pct,
        }),
    )?;

    let bridge = Loan::interest_only(base.purchase_price * params.bridge_ltv, params.bridge_rate);
    let points = bridge.principal * params.bridge_points_pct;
    let total_cash_invested = base.all_in_cost() + points - bridge.principal;
    if total_cash_invested <= Decimal::ZERO {
        return Err(DealAnalysisError::invalid(
            "bridge_ltv",
            "Bridge loan exceeds the total acquisition cost",
        ));
    }

    let stabilized = operations.get(stabilized_idx).ok_or_else(|| {
        DealAnalysisError::InsufficientData("Projection is missing the stabilized year".into())
    })?;
    let (after_repair_value, arv_source) = match params.arv_override {
        Some(v) => (v, ArvSource::Override),
        None => (stabilized.noi / base.exit_cap_rate, ArvSource::CapitalizedNoi),
    };

    let refi = Loan::new(
        after_repair_value * params.refinance_ltv,
        params.refinance_rate,
        params.refinance_amortization_years,
    );
    let refinance_closing_costs = refi.principal * params.refinance_closing_cost_pct;
    let bridge_payoff = bridge.balance_after_years(refi_year)?;
    let cash_returned = refi.principal - bridge_payoff - refinance_closing_costs;
    let cash_left_in_deal = total_cash_invested - cash_returned;
    let infinite_return = cash_left_in_deal <= Decimal::ZERO;

    let bridge_debt_service = bridge.annual_debt_service()?;
    let debt_service = (1..=hold)
        .map(|t| {
            if t <= refi_year {
                Ok(bridge_debt_service)
            } else {
                refi.debt_service_in_year(t - refi_year)
            }
        })
        .collect::<DealResult<Vec<Money>>>()?;
    let projections = build_projections(&operations, &debt_service, &[]);

    let sale = sale_price(&operations, base)?;
    let balance_at_exit = refi.balance_after_years(hold - refi_year)?;
    let net_sale_proceeds = sale - balance_at_exit;

    let mut flows = Vec::with_capacity(projections.len() + 1);
    flows.push(-total_cash_invested);
    flows.extend(projections.iter().map(|p| p.cash_flow));
    flows[stabilized_idx] += cash_returned;
    if let Some(last) = flows.last_mut() {
        *last += net_sale_proceeds;
    }

    // First post-refinance year, or the final year when the refinance closes at exit.
    let stabilized_row = &projections[stabilized_idx.min(projections.len() - 1)];
    let cash_on_cash = if infinite_return {
        Ratio::Infinite
    } else {
        Ratio::of(stabilized_row.cash_flow, cash_left_in_deal)
    };
    let dscr = Ratio::of(stabilized_row.noi, stabilized_row.debt_service);
    dscr_warning(dscr, warnings);

    if refi_year + params.refinance_term_years < hold {
        warnings.push(format!(
            "Refinance loan matures in year {} before the year-{hold} exit; a second refinance is not modeled",
            refi_year + params.refinance_term_years
        ));
    }
    if cash_returned < Decimal::ZERO {
        warnings.push(format!(
            "Refinance proceeds fall {} short of the bridge payoff; additional equity is required at refinance",
            (-cash_returned).round_dp(2)
        ));
    }

    let total_bridge_cost = points + bridge_debt_service * Decimal::from(refi_year);

    Ok(ModelOutcome {
        break_even_occupancy: break_even_occupancy(&operations[0], debt_service[0]),
        projections,
        equity_cash_flows: flows,
        total_equity: total_cash_invested,
        total_debt: bridge.principal,
        sale_price: sale,
        net_sale_proceeds,
        dscr,
        cash_on_cash,
        details: StructureDetails::BridgeRefi(BridgeRefiDetails {
            bridge_loan_amount: bridge.principal,
            total_bridge_cost,
            after_repair_value,
            arv_source,
            refinance_loan_amount: refi.principal,
            refinance_closing_costs,
            cash_returned_at_refinance: cash_returned,
            cash_left_in_deal,
            infinite_return,
            refinance_year: refi_year,
            balance_at_exit,
        }),
        waterfall: None,
    })
}
