use rust_decimal::Decimal;

use super::{equity_cash_flows, ModelOutcome, StructureDetails};
use crate::projection::{break_even_occupancy, build_projections, project_operations, sale_price, DealInputsBase};
use crate::types::Ratio;
use crate::DealResult;

/// Unlevered purchase: equity funds price, closing costs and renovation.
pub(crate) fn model(base: &DealInputsBase) -> DealResult<ModelOutcome> {
    let operations = project_operations(base, None)?;
    let no_debt = vec![Decimal::ZERO; base.hold_period_years as usize];
    let projections = build_projections(&operations, &no_debt, &[]);

    let sale = sale_price(&operations, base)?;
    let total_equity = base.all_in_cost();
    let flows = equity_cash_flows(total_equity, &projections, sale);

    Ok(ModelOutcome {
        cash_on_cash: Ratio::of(projections[0].cash_flow, total_equity),
        break_even_occupancy: break_even_occupancy(&operations[0], Decimal::ZERO),
        projections,
        equity_cash_flows: flows,
        total_equity,
        total_debt: Decimal::ZERO,
        sale_price: sale,
        net_sale_proceeds: sale,
        dscr: Ratio::Undefined,
        details: StructureDetails::AllCash,
        waterfall: None,
    })
}
