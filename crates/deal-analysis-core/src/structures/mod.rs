//! Financing structure models.
//!
//! Every structure shares the same operating projection and the same
//! equity-return metrics; each kind contributes its own debt schedule,
//! equity requirement and exit payoff. `analyze_structure` dispatches on
//! the tagged [`StructureParameters`] with an exhaustive `match`.

pub mod all_cash;
pub mod assumable;
pub mod bridge_refi;
pub mod conventional;
pub mod params;
pub mod syndication;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::Loan;
use crate::error::DealAnalysisError;
use crate::projection::{DealInputsBase, YearlyProjection};
use crate::time_value::irr_or_none;
use crate::types::*;
use crate::waterfall::PromoteOutput;
use crate::DealResult;

pub use assumable::AssumableDetails;
pub use bridge_refi::{ArvSource, BridgeRefiDetails};
pub use conventional::ConventionalDetails;
pub use params::{
    default_structure_parameters, StructureKind, StructureParameters, StructurePatch,
};
pub use syndication::SyndicationDetails;

/// DSCR below which lenders typically decline or resize the loan.
const MIN_LENDER_DSCR: Decimal = dec!(1.20);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Structure-specific figures, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureDetails {
    AllCash,
    Conventional(ConventionalDetails),
    BridgeRefi(BridgeRefiDetails),
    Assumable(AssumableDetails),
    Syndication(SyndicationDetails),
}

/// Headline metrics for one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealAnalysisResult {
    pub kind: StructureKind,
    pub label: String,
    pub cash_on_cash: Ratio,
    /// `None` when the equity cash flows have no IRR in the solver band
    pub irr: Option<Rate>,
    pub equity_multiple: Ratio,
    pub dscr: Ratio,
    pub total_equity: Money,
    pub total_debt: Money,
    pub year1_noi: Money,
    pub year1_cash_flow: Money,
    pub break_even_occupancy: Ratio,
    pub projected_sale_price: Money,
    pub net_sale_proceeds: Money,
    pub total_profit: Money,
    pub details: StructureDetails,
}

/// Full result of modeling one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub result: DealAnalysisResult,
    pub projections: Vec<YearlyProjection>,
    /// Year 0 equity outflow, then one flow per hold year (exit in the last)
    pub equity_cash_flows: Vec<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waterfall: Option<PromoteOutput>,
}

/// What a structure model hands back before the shared metrics are computed.
pub(crate) struct ModelOutcome {
    pub projections: Vec<YearlyProjection>,
    pub equity_cash_flows: Vec<Money>,
    pub total_equity: Money,
    pub total_debt: Money,
    pub sale_price: Money,
    pub net_sale_proceeds: Money,
    pub dscr: Ratio,
    pub cash_on_cash: Ratio,
    pub break_even_occupancy: Ratio,
    pub details: StructureDetails,
    pub waterfall: Option<PromoteOutput>,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// `[-equity, CF1, ..., CFn + net sale]`
pub(crate) fn equity_cash_flows(
    total_equity: Money,
    projections: &[YearlyProjection],
    net_sale_proceeds: Money,
) -> Vec<Money> {
    let mut flows = Vec::with_capacity(projections.len() + 1);
    flows.push(-total_equity);
    flows.extend(projections.iter().map(|p| p.cash_flow));
    if let Some(last) = flows.last_mut() {
        *last += net_sale_proceeds;
    }
    flows
}

/// Combined debt service for each hold year.
pub(crate) fn debt_service_schedule(loans: &[&Loan], years: u32) -> DealResult<Vec<Money>> {
    (1..=years)
        .map(|t| {
            loans
                .iter()
                .map(|l| l.debt_service_in_year(t))
                .sum::<DealResult<Money>>()
        })
        .collect()
}

pub(crate) fn combined_balance(loans: &[&Loan], years: u32) -> DealResult<Money> {
    loans.iter().map(|l| l.balance_after_years(years)).sum()
}

pub(crate) fn dscr_warning(dscr: Ratio, warnings: &mut Vec<String>) {
    if let Some(v) = dscr.finite() {
        if v < MIN_LENDER_DSCR {
            warnings.push(format!(
                "DSCR of {:.2}x is below the {MIN_LENDER_DSCR}x most lenders require",
                v
            ));
        }
    }
}

fn finish(kind: StructureKind, base: &DealInputsBase, outcome: ModelOutcome, warnings: &mut Vec<String>) -> StructureAnalysis {
    let irr = irr_or_none(&outcome.equity_cash_flows, kind.label(), warnings);
    let distributions: Money = outcome.equity_cash_flows.iter().skip(1).copied().sum();
    let year1_cash_flow = outcome
        .projections
        .first()
        .map(|p| p.cash_flow)
        .unwrap_or(Decimal::ZERO);

    let result = DealAnalysisResult {
        kind,
        label: kind.label().to_string(),
        cash_on_cash: outcome.cash_on_cash,
        irr,
        equity_multiple: Ratio::of(distributions, outcome.total_equity),
        dscr: outcome.dscr,
        total_equity: outcome.total_equity,
        total_debt: outcome.total_debt,
        year1_noi: base.year1_noi(),
        year1_cash_flow,
        break_even_occupancy: outcome.break_even_occupancy,
        projected_sale_price: outcome.sale_price,
        net_sale_proceeds: outcome.net_sale_proceeds,
        total_profit: distributions - outcome.total_equity,
        details: outcome.details,
    };

    StructureAnalysis {
        result,
        projections: outcome.projections,
        equity_cash_flows: outcome.equity_cash_flows,
        waterfall: outcome.waterfall,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate and model one structure without the computation envelope.
/// Used directly by batch callers (comparison, sensitivity).
pub fn model_structure(
    base: &DealInputsBase,
    params: &StructureParameters,
    warnings: &mut Vec<String>,
) -> DealResult<StructureAnalysis> {
    base.validate(warnings)?;
    params.validate(base, warnings)?;

    let outcome = match params {
        StructureParameters::AllCash => all_cash::model(base)?,
        StructureParameters::Conventional(p) => conventional::model(base, p, warnings)?,
        StructureParameters::BridgeRefi(p) => bridge_refi::model(base, p, warnings)?,
        StructureParameters::Assumable(p) => assumable::model(base, p, warnings)?,
        StructureParameters::Syndication(p) => syndication::model(base, p, warnings)?,
    };

    Ok(finish(params.kind(), base, outcome, warnings))
}

/// Serialized request shape used by the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeInput {
    pub base: DealInputsBase,
    /// Explicit parameters; defaults for `kind` are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<StructureParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StructureKind>,
}

impl AnalyzeInput {
    /// The parameters to model: explicit ones if given (their kind must
    /// agree with `kind`), otherwise the defaults for `kind`.
    pub fn resolve_parameters(&self) -> DealResult<StructureParameters> {
        match (&self.parameters, self.kind) {
            (Some(params), Some(kind)) if params.kind() != kind => Err(DealAnalysisError::invalid(
                "kind",
                format!("{kind} does not match the supplied {} parameters", params.kind()),
            )),
            (Some(params), _) => Ok(params.clone()),
            (None, Some(kind)) => Ok(default_structure_parameters(kind, &self.base)),
            (None, None) => Err(DealAnalysisError::invalid(
                "parameters",
                "Either parameters or a structure kind is required",
            )),
        }
    }
}

/// Analyze a deal under one financing structure.
///
/// Projects `hold_period_years` of operations (plus the forward year used
/// for the exit valuation), applies the structure's debt schedule and
/// equity requirement, and reports cash-on-cash, IRR, equity multiple,
/// DSCR and break-even occupancy alongside the structure-specific details.
pub fn analyze_structure(
    base: &DealInputsBase,
    params: &StructureParameters,
) -> DealResult<ComputationOutput<StructureAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let analysis = model_structure(base, params, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Deal Structure Analysis ({})", params.kind().label()),
        &serde_json::json!({
            "base": base,
            "parameters": params,
            "debt_service": "monthly payments, 12 per year",
            "exit_valuation": "forward-year NOI / exit cap rate",
        }),
        warnings,
        elapsed,
        analysis,
    ))
}


#[cfg(test)]
mod tests {
    use super::test_support::base;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_every_kind_runs_on_defaults() {
        let b = base();
        for kind in StructureKind::ALL {
            let params = default_structure_parameters(kind, &b);
            let out = analyze_structure(&b, &params).unwrap();
            let r = &out.result.result;
            assert_eq!(r.kind, kind);
            assert_eq!(out.result.projections.len(), 5);
            assert_eq!(out.result.equity_cash_flows.len(), 6);
            assert_eq!(r.year1_noi, dec!(79500));
            assert!(r.total_equity > Decimal::ZERO, "{kind}");
            assert_eq!(out.result.waterfall.is_some(), kind == StructureKind::Syndication);
        }
    }

    #[test]
    fn test_total_profit_matches_cash_flows() {
        let b = base();
        let params = default_structure_parameters(StructureKind::Conventional, &b);
        let out = analyze_structure(&b, &params).unwrap().result;
        let sum: Money = out.equity_cash_flows.iter().copied().sum();
        assert_eq!(out.result.total_profit, sum);
    }

    #[test]
    fn test_invalid_base_rejected() {
        let mut b = base();
        b.hold_period_years = 0;
        assert!(analyze_structure(&b, &StructureParameters::AllCash).is_err());
    }

    #[test]
    fn test_equity_cash_flows_layout() {
        let b = base();
        let analysis = analyze_structure(&b, &StructureParameters::AllCash)
            .unwrap()
            .result;
        let flows = &analysis.equity_cash_flows;
        assert_eq!(flows[0], dec!(-1000000));
        assert_eq!(flows[1], dec!(79500));
        assert_eq!(flows[5], dec!(79500) + analysis.result.net_sale_proceeds);
    }

    #[test]
    fn test_analyze_input_resolves_parameters() {
        let input = AnalyzeInput {
            base: base(),
            parameters: None,
            kind: Some(StructureKind::Assumable),
        };
        assert_eq!(input.resolve_parameters().unwrap().kind(), StructureKind::Assumable);

        let mismatched = AnalyzeInput {
            parameters: Some(StructureParameters::AllCash),
            ..input.clone()
        };
        assert!(mismatched.resolve_parameters().is_err());

        let neither = AnalyzeInput {
            parameters: None,
            kind: None,
            ..input
        };
        assert!(neither.resolve_parameters().is_err());
    }
}
