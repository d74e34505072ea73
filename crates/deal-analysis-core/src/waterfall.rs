use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::DealAnalysisError;
use crate::projection::{DealInputsBase, MAX_HOLD_PERIOD_YEARS};
use crate::structures::{
    analyze_structure, default_structure_parameters, StructureAnalysis, StructureKind,
    StructureParameters,
};
use crate::time_value::irr_or_none;
use crate::types::*;
use crate::DealResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A single tier of the GP/LP promote waterfall, as entered by the caller.
///
/// The tier's role is derived from which fields are set: `catch_up_pct`
/// makes it a GP catch-up, `pref_rate` a preferred return,
/// `return_of_capital` a capital tier, anything else a profit split.
/// `irr_hurdle` gates a split tier until the LP's running IRR reaches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallTier {
    pub name: String,
    /// Preferred return accrued on unreturned LP capital
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pref_rate: Option<Rate>,
    /// GP share of cash while catching up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_up_pct: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gp_split: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lp_split: Option<Rate>,
    /// LP IRR that must be reached before this tier is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr_hurdle: Option<Rate>,
    /// Return contributed capital pro rata before later tiers
    #[serde(default)]
    pub return_of_capital: bool,
}

impl WaterfallTier {
    /// A plain profit split.
    pub fn split(name: impl Into<String>, gp_split: Rate) -> Self {
        Self {
            name: name.into(),
            pref_rate: None,
            catch_up_pct: None,
            gp_split: None,
            lp_split: None,
            irr_hurdle: None,
            return_of_capital: false,
        }
        .with_gp_split(gp_split)
    }

    pub fn preferred(name: impl Into<String>, rate: Rate, gp_split: Rate) -> Self {
        Self {
            pref_rate: Some(rate),
            ..Self::split(name, gp_split)
        }
    }

    pub fn return_of_capital(name: impl Into<String>, gp_split: Rate) -> Self {
        Self {
            return_of_capital: true,
            ..Self::split(name, gp_split)
        }
    }

    /// Catch-up paying `catch_up_pct` to the GP until the GP holds
    /// `target_gp_share` of cumulative profit.
    pub fn catch_up(name: impl Into<String>, catch_up_pct: Rate, target_gp_share: Rate) -> Self {
        Self {
            catch_up_pct: Some(catch_up_pct),
            ..Self::split(name, target_gp_share)
        }
    }

    pub fn with_hurdle(mut self, irr_hurdle: Rate) -> Self {
        self.irr_hurdle = Some(irr_hurdle);
        self
    }

    /// Set the GP side and recompute the LP side so the two sum to 100%.
    pub fn with_gp_split(mut self, gp_split: Rate) -> Self {
        self.gp_split = Some(gp_split);
        self.lp_split = Some(Decimal::ONE - gp_split);
        self
    }

    /// Set the LP side and recompute the GP side so the two sum to 100%.
    pub fn with_lp_split(mut self, lp_split: Rate) -> Self {
        self.lp_split = Some(lp_split);
        self.gp_split = Some(Decimal::ONE - lp_split);
        self
    }

    /// Resolve the tier's role and a split that sums to exactly 100%.
    pub fn normalize(&self) -> DealResult<NormalizedTier> {
        let field = |f: &str| format!("tiers[{}].{f}", self.name);

        let (gp_split, lp_split) = match (self.gp_split, self.lp_split) {
            (Some(gp), Some(lp)) => {
                if gp + lp != Decimal::ONE {
                    return Err(DealAnalysisError::invalid(
                        field("gp_split"),
                        format!("GP split {gp} and LP split {lp} must sum to 100%"),
                    ));
                }
                (gp, lp)
            }
            (Some(gp), None) => (gp, Decimal::ONE - gp),
            (None, Some(lp)) => (Decimal::ONE - lp, lp),
            (None, None) => {
                return Err(DealAnalysisError::invalid(
                    field("gp_split"),
                    "At least one of GP split or LP split is required",
                ));
            }
        };
        for (name, v) in [("gp_split", gp_split), ("lp_split", lp_split)] {
            if v < Decimal::ZERO || v > Decimal::ONE {
                return Err(DealAnalysisError::invalid(
                    field(name),
                    "Split must be between 0% and 100%",
                ));
            }
        }

        let role = if let Some(c) = self.catch_up_pct {
            if c <= Decimal::ZERO || c > Decimal::ONE {
                return Err(DealAnalysisError::invalid(
                    field("catch_up_pct"),
                    "Catch-up percentage must be in (0%, 100%]",
                ));
            }
            TierRole::CatchUp { gp_share: c }
        } else if let Some(rate) = self.pref_rate {
            if rate < Decimal::ZERO {
                return Err(DealAnalysisError::invalid(
                    field("pref_rate"),
                    "Preferred return cannot be negative",
                ));
            }
            if lp_split.is_zero() {
                return Err(DealAnalysisError::invalid(
                    field("lp_split"),
                    "A preferred-return tier must allocate to the LP",
                ));
            }
            TierRole::PreferredReturn { rate }
        } else if self.return_of_capital {
            TierRole::ReturnOfCapital
        } else {
            TierRole::Split
        };

        if let Some(h) = self.irr_hurdle {
            if h <= dec!(-1) {
                return Err(DealAnalysisError::invalid(
                    field("irr_hurdle"),
                    "IRR hurdle must be greater than -100%",
                ));
            }
        }

        Ok(NormalizedTier {
            name: self.name.clone(),
            role,
            gp_split,
            lp_split,
            irr_hurdle: self.irr_hurdle,
        })
    }
}

/// Distribution mechanics resolved from a tier's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TierRole {
    PreferredReturn { rate: Rate },
    ReturnOfCapital,
    /// `gp_share` of cash goes to the GP while catching up
    CatchUp { gp_share: Rate },
    Split,
}

/// A validated tier whose splits sum to exactly 100%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTier {
    pub name: String,
    pub role: TierRole,
    pub gp_split: Rate,
    pub lp_split: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr_hurdle: Option<Rate>,
}

/// Equity split plus ordered tiers for a promote calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteConfig {
    pub gp_equity_pct: Rate,
    pub lp_equity_pct: Rate,
    pub tiers: Vec<WaterfallTier>,
}

impl PromoteConfig {
    pub fn validate(&self, warnings: &mut Vec<String>) -> DealResult<Vec<NormalizedTier>> {
        validate_equity_split(self.gp_equity_pct, self.lp_equity_pct)?;
        if self.tiers.is_empty() {
            return Err(DealAnalysisError::invalid(
                "tiers",
                "At least one waterfall tier is required",
            ));
        }

        let tiers = self
            .tiers
            .iter()
            .map(WaterfallTier::normalize)
            .collect::<DealResult<Vec<_>>>()?;

        if tiers[0].irr_hurdle.is_some() && tiers[0].role == TierRole::Split {
            warnings.push(format!(
                "First tier '{}' has an IRR hurdle; cash below the hurdle is split pro rata to equity",
                tiers[0].name
            ));
        }
        let first_pref = tiers
            .iter()
            .position(|t| matches!(t.role, TierRole::PreferredReturn { .. }));
        if let Some(pref_idx) = first_pref {
            if let Some(h) = tiers[..pref_idx].iter().find(|t| t.irr_hurdle.is_some()) {
                warnings.push(format!(
                    "Hurdle tier '{}' precedes the preferred return; tiers are processed in the order given",
                    h.name
                ));
            }
        }
        for t in &tiers {
            if let Some(h) = t.irr_hurdle {
                if h > Decimal::ONE {
                    warnings.push(format!(
                        "Tier '{}' IRR hurdle {h} exceeds 100%, looks like a percentage; rates are decimals (0.15 = 15%)",
                        t.name
                    ));
                }
            }
            if let TierRole::CatchUp { gp_share } = t.role {
                if gp_share <= t.gp_split {
                    warnings.push(format!(
                        "Catch-up tier '{}' pays {gp_share} to GP, not above its {} target; it absorbs all remaining cash",
                        t.name, t.gp_split
                    ));
                }
            }
        }

        Ok(tiers)
    }
}

pub(crate) fn validate_equity_split(gp: Rate, lp: Rate) -> DealResult<()> {
    for (field, v) in [("gp_equity_pct", gp), ("lp_equity_pct", lp)] {
        if v < Decimal::ZERO || v > Decimal::ONE {
            return Err(DealAnalysisError::invalid(
                field,
                "Equity percentage must be between 0% and 100%",
            ));
        }
    }
    if gp + lp != Decimal::ONE {
        return Err(DealAnalysisError::invalid(
            "gp_equity_pct",
            format!("GP equity {gp} and LP equity {lp} must sum to 100%"),
        ));
    }
    Ok(())
}

/// Standard syndication waterfall: 8% pref pari passu, return of capital,
/// 70/30 to a 15% LP IRR, 50/50 thereafter.
pub fn default_tiers(gp_equity_pct: Rate) -> Vec<WaterfallTier> {
    vec![
        WaterfallTier::preferred("Preferred Return", dec!(0.08), gp_equity_pct),
        WaterfallTier::return_of_capital("Return of Capital", gp_equity_pct),
        WaterfallTier::split("70/30 Split", dec!(0.30)),
        WaterfallTier::split("50/50 Above 15% IRR", dec!(0.50)).with_hurdle(dec!(0.15)),
    ]
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Cash allocated by one tier in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub tier_name: String,
    pub amount: Money,
    pub to_gp: Money,
    pub to_lp: Money,
}

/// One year of the waterfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyDistribution {
    pub year: u32,
    pub distributable_cash: Money,
    /// LP cash satisfying preferred return (current and carried)
    pub lp_preferred: Money,
    /// GP cash from catch-up tiers
    pub gp_catch_up: Money,
    /// Contributed capital returned to both parties
    pub capital_returned: Money,
    pub lp_residual: Money,
    pub gp_residual: Money,
    pub gp_total: Money,
    pub lp_total: Money,
    pub cumulative_gp: Money,
    pub cumulative_lp: Money,
    /// Preferred return owed but unpaid at year end, carried forward
    pub unpaid_preferred: Money,
    pub tiers: Vec<TierAllocation>,
}

/// GP/LP returns for a full waterfall run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteOutput {
    pub lp_capital: Money,
    pub gp_capital: Money,
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub lp_equity_multiple: Ratio,
    pub gp_equity_multiple: Ratio,
    pub lp_total_distributions: Money,
    pub gp_total_distributions: Money,
    /// Distributions minus contributions
    pub lp_total_return: Money,
    pub gp_total_return: Money,
    /// GP distributions above its pro-rata equity share
    pub total_promote: Money,
    pub total_distributed: Money,
    /// Cash below the 8-dp allocation grid dropped before the split, summed
    /// over all years. Yearly `distributable_cash` is the gridded amount
    /// and GP + LP equals it exactly.
    pub sub_grid_remainder: Money,
    pub tiers: Vec<NormalizedTier>,
    pub yearly: Vec<YearlyDistribution>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Every allocation lands on this grid so GP + LP always equals the cash split.
const ALLOCATION_DP: u32 = 8;

fn to_grid(amount: Money) -> Money {
    amount.round_dp_with_strategy(ALLOCATION_DP, RoundingStrategy::ToZero)
}

/// Running totals threaded from one year to the next within a single run.
#[derive(Debug, Clone)]
struct WaterfallState {
    lp_unreturned: Money,
    gp_unreturned: Money,
    /// Unpaid preferred return, one slot per tier position
    unpaid_pref: Vec<Money>,
    cumulative_lp: Money,
    cumulative_gp: Money,
    lp_capital_returned: Money,
    gp_capital_returned: Money,
    /// Year 0 contribution followed by each year's LP total
    lp_history: Vec<Money>,
    gp_history: Vec<Money>,
}

impl WaterfallState {
    fn new(lp_capital: Money, gp_capital: Money, tier_count: usize) -> Self {
        Self {
            lp_unreturned: lp_capital,
            gp_unreturned: gp_capital,
            unpaid_pref: vec![Decimal::ZERO; tier_count],
            cumulative_lp: Decimal::ZERO,
            cumulative_gp: Decimal::ZERO,
            lp_capital_returned: Decimal::ZERO,
            gp_capital_returned: Decimal::ZERO,
            lp_history: vec![-lp_capital],
            gp_history: vec![-gp_capital],
        }
    }
}

/// Within-year ledger; discarded once the year's row is built.
struct YearLedger {
    remaining: Money,
    allocations: Vec<TierAllocation>,
    gp: Money,
    lp: Money,
    lp_preferred: Money,
    gp_catch_up: Money,
    lp_capital: Money,
    gp_capital: Money,
}

impl YearLedger {
    fn new(cash: Money, tiers: &[NormalizedTier]) -> Self {
        Self {
            remaining: cash,
            allocations: tiers
                .iter()
                .map(|t| TierAllocation {
                    tier_name: t.name.clone(),
                    amount: Decimal::ZERO,
                    to_gp: Decimal::ZERO,
                    to_lp: Decimal::ZERO,
                })
                .collect(),
            gp: Decimal::ZERO,
            lp: Decimal::ZERO,
            lp_preferred: Decimal::ZERO,
            gp_catch_up: Decimal::ZERO,
            lp_capital: Decimal::ZERO,
            gp_capital: Decimal::ZERO,
        }
    }

    /// Pay `amount` (capped at the remaining cash) at the given GP share,
    /// booked against tier `slot`. Returns `(to_gp, to_lp)`.
    fn pay(&mut self, slot: usize, amount: Money, gp_share: Rate) -> (Money, Money) {
        let amount = to_grid(amount.min(self.remaining).max(Decimal::ZERO));
        if amount.is_zero() {
            return (Decimal::ZERO, Decimal::ZERO);
        }
        let to_gp = to_grid(amount * gp_share);
        let to_lp = amount - to_gp;
        self.book(slot, to_gp, to_lp);
        (to_gp, to_lp)
    }

    fn book(&mut self, slot: usize, to_gp: Money, to_lp: Money) {
        let alloc = &mut self.allocations[slot];
        alloc.amount += to_gp + to_lp;
        alloc.to_gp += to_gp;
        alloc.to_lp += to_lp;
        self.remaining -= to_gp + to_lp;
        self.gp += to_gp;
        self.lp += to_lp;
    }
}

/// `amount / share`, or `None` when the share is zero or the quotient overflows.
fn gross_up(amount: Money, share: Rate) -> Option<Money> {
    if share.is_zero() {
        None
    } else {
        amount.checked_div(share)
    }
}

/// LP dollars still needed this year for the LP's point-in-time IRR to
/// reach `hurdle`: the negated future value of the LP's flows at the
/// hurdle rate, when negative. `None` when the future value overflows, in
/// which case the hurdle cannot be reached with this year's cash.
fn lp_shortfall_to_hurdle(state: &WaterfallState, lp_this_year: Money, hurdle: Rate) -> Option<Money> {
    let growth = Decimal::ONE + hurdle;
    let mut value = Decimal::ZERO;
    for flow in state.lp_history.iter().chain(std::iter::once(&lp_this_year)) {
        value = value.checked_mul(growth)?.checked_add(*flow)?;
    }
    Some(if value < Decimal::ZERO { -value } else { Decimal::ZERO })
}

fn distribute_year(
    state: WaterfallState,
    year: u32,
    cash: Money,
    tiers: &[NormalizedTier],
    config: &PromoteConfig,
) -> (WaterfallState, YearlyDistribution) {
    let mut next = state.clone();
    let mut ledger = YearLedger::new(cash, tiers);

    // Preferred return accrues on capital outstanding at the start of the year.
    let mut owed: Vec<Money> = tiers
        .iter()
        .enumerate()
        .map(|(i, t)| match t.role {
            TierRole::PreferredReturn { rate } => state.unpaid_pref[i]
                .saturating_add(state.lp_unreturned.saturating_mul(rate)),
            _ => Decimal::ZERO,
        })
        .collect();

    if cash < Decimal::ZERO {
        // Capital call: funded pro rata to equity and added to capital.
        let gp_part = to_grid(cash * config.gp_equity_pct);
        let lp_part = cash - gp_part;
        let last = tiers.len() - 1;
        ledger.book(last, gp_part, lp_part);
        next.lp_unreturned -= lp_part;
        next.gp_unreturned -= gp_part;
    } else {
        for (k, tier) in tiers.iter().enumerate() {
            if ledger.remaining <= Decimal::ZERO {
                break;
            }
            match tier.role {
                TierRole::PreferredReturn { .. } => {
                    let target = gross_up(owed[k], tier.lp_split).unwrap_or(ledger.remaining);
                    let (_, to_lp) = ledger.pay(k, target, tier.gp_split);
                    ledger.lp_preferred += to_lp;
                    owed[k] = (owed[k] - to_lp).max(Decimal::ZERO);
                }
                TierRole::ReturnOfCapital => {
                    let outstanding = next.lp_unreturned + next.gp_unreturned;
                    let amount = to_grid(ledger.remaining.min(outstanding));
                    if amount > Decimal::ZERO {
                        let to_lp = to_grid(amount * next.lp_unreturned / outstanding);
                        let to_gp = amount - to_lp;
                        ledger.book(k, to_gp, to_lp);
                        next.lp_unreturned = (next.lp_unreturned - to_lp).max(Decimal::ZERO);
                        next.gp_unreturned = (next.gp_unreturned - to_gp).max(Decimal::ZERO);
                        ledger.lp_capital += to_lp;
                        ledger.gp_capital += to_gp;
                    }
                }
                TierRole::CatchUp { gp_share } => {
                    let target = tier.gp_split;
                    let amount = if gp_share <= target {
                        ledger.remaining
                    } else {
                        let capital_back = next.lp_capital_returned
                            + next.gp_capital_returned
                            + ledger.lp_capital
                            + ledger.gp_capital;
                        let gp_profit = next.cumulative_gp + ledger.gp
                            - next.gp_capital_returned
                            - ledger.gp_capital;
                        let total_profit =
                            next.cumulative_gp + next.cumulative_lp + ledger.gp + ledger.lp
                                - capital_back;
                        ((target * total_profit - gp_profit) / (gp_share - target))
                            .max(Decimal::ZERO)
                    };
                    let (to_gp, _) = ledger.pay(k, amount, gp_share);
                    ledger.gp_catch_up += to_gp;
                }
                TierRole::Split => {
                    if let Some(hurdle) = tier.irr_hurdle {
                        let needed = lp_shortfall_to_hurdle(&next, ledger.lp, hurdle);
                        if needed != Some(Decimal::ZERO) {
                            let (slot, prior_gp, prior_lp) = match k.checked_sub(1) {
                                Some(p) => (p, tiers[p].gp_split, tiers[p].lp_split),
                                None => (k, config.gp_equity_pct, config.lp_equity_pct),
                            };
                            let amount = needed
                                .and_then(|n| gross_up(n, prior_lp))
                                .unwrap_or(ledger.remaining);
                            debug!(tier = %tier.name, year, amount = %amount, "LP below hurdle, paying at prior split");
                            ledger.pay(slot, amount, prior_gp);
                        }
                    }

                    let next_hurdle = tiers
                        .get(k + 1)
                        .filter(|t| t.role == TierRole::Split)
                        .and_then(|t| t.irr_hurdle);
                    let amount = match next_hurdle {
                        Some(h) => {
                            lp_shortfall_to_hurdle(&next, ledger.lp, h)
                                .and_then(|needed| gross_up(needed, tier.lp_split))
                                .unwrap_or(ledger.remaining)
                        }
                        None => ledger.remaining,
                    };
                    ledger.pay(k, amount, tier.gp_split);
                }
            }
        }

        if ledger.remaining > Decimal::ZERO {
            let last = tiers.len() - 1;
            let leftover = ledger.remaining;
            ledger.pay(last, leftover, tiers[last].gp_split);
        }
    }

    for (i, t) in tiers.iter().enumerate() {
        if let TierRole::PreferredReturn { .. } = t.role {
            next.unpaid_pref[i] = owed[i];
        }
    }
    next.cumulative_gp += ledger.gp;
    next.cumulative_lp += ledger.lp;
    next.lp_capital_returned += ledger.lp_capital;
    next.gp_capital_returned += ledger.gp_capital;
    next.lp_history.push(ledger.lp);
    next.gp_history.push(ledger.gp);

    let row = YearlyDistribution {
        year,
        distributable_cash: cash,
        lp_preferred: ledger.lp_preferred,
        gp_catch_up: ledger.gp_catch_up,
        capital_returned: ledger.lp_capital + ledger.gp_capital,
        lp_residual: ledger.lp - ledger.lp_preferred - ledger.lp_capital,
        gp_residual: ledger.gp - ledger.gp_catch_up - ledger.gp_capital,
        gp_total: ledger.gp,
        lp_total: ledger.lp,
        cumulative_gp: next.cumulative_gp,
        cumulative_lp: next.cumulative_lp,
        unpaid_preferred: next.unpaid_pref.iter().copied().sum(),
        tiers: ledger.allocations,
    };

    (next, row)
}

fn contributed_and_received(history: &[Money]) -> (Money, Money) {
    history.iter().fold((Decimal::ZERO, Decimal::ZERO), |(c, r), f| {
        if *f < Decimal::ZERO {
            (c - *f, r)
        } else {
            (c, r + *f)
        }
    })
}

/// Run the promote waterfall over a series of yearly distributable cash
/// amounts (year 1 first; the final year includes exit proceeds).
///
/// `total_equity` is split into GP and LP capital by the config's equity
/// percentages. Tiers are processed in the order given every year; state
/// (unpaid preferred return, unreturned capital, cumulative totals) is
/// carried from year to year as a fold accumulator.
///
/// Cash is truncated to 8 decimal places before allocation; whatever falls
/// below that grid is reported as `sub_grid_remainder`.
pub fn run_waterfall(
    distributable: &[Money],
    total_equity: Money,
    config: &PromoteConfig,
    warnings: &mut Vec<String>,
) -> DealResult<PromoteOutput> {
    if distributable.is_empty() || distributable.len() > MAX_HOLD_PERIOD_YEARS as usize {
        return Err(DealAnalysisError::invalid(
            "distributable",
            format!("Between 1 and {MAX_HOLD_PERIOD_YEARS} years of distributable cash required"),
        ));
    }
    if total_equity <= Decimal::ZERO {
        return Err(DealAnalysisError::invalid(
            "total_equity",
            "Total equity must be positive",
        ));
    }
    let tiers = config.validate(warnings)?;

    let gp_capital = total_equity * config.gp_equity_pct;
    let lp_capital = total_equity - gp_capital;

    let gridded: Vec<Money> = distributable.iter().map(|c| to_grid(*c)).collect();
    let sub_grid_remainder: Money = distributable
        .iter()
        .zip(&gridded)
        .map(|(raw, g)| (*raw - *g).abs())
        .sum();
    if sub_grid_remainder > Decimal::ZERO {
        debug!(remainder = %sub_grid_remainder, "distributable cash truncated to allocation grid");
    }
    let distributable = gridded;
    let initial = WaterfallState::new(lp_capital, gp_capital, tiers.len());
    let (state, yearly) = distributable.iter().enumerate().fold(
        (initial, Vec::with_capacity(distributable.len())),
        |(state, mut rows), (i, cash)| {
            let (next, row) = distribute_year(state, (i + 1) as u32, *cash, &tiers, config);
            rows.push(row);
            (next, rows)
        },
    );

    let lp_irr = irr_or_none(&state.lp_history, "LP", warnings);
    let gp_irr = if gp_capital.is_zero() {
        None
    } else {
        irr_or_none(&state.gp_history, "GP", warnings)
    };

    let (lp_contributed, lp_received) = contributed_and_received(&state.lp_history);
    let (gp_contributed, gp_received) = contributed_and_received(&state.gp_history);
    let total_distributed: Money = distributable.iter().filter(|c| **c > Decimal::ZERO).sum();

    let unpaid: Money = state.unpaid_pref.iter().copied().sum();
    if unpaid > Decimal::ZERO {
        warnings.push(format!(
            "Preferred return of {} remained unpaid at the end of the hold period",
            unpaid.round_dp(2)
        ));
    }

    Ok(PromoteOutput {
        lp_capital,
        gp_capital,
        lp_irr,
        gp_irr,
        lp_equity_multiple: Ratio::of(lp_received, lp_contributed),
        gp_equity_multiple: Ratio::of(gp_received, gp_contributed),
        lp_total_distributions: lp_received,
        gp_total_distributions: gp_received,
        lp_total_return: lp_received - lp_contributed,
        gp_total_return: gp_received - gp_contributed,
        total_promote: gp_received - total_distributed * config.gp_equity_pct,
        total_distributed,
        sub_grid_remainder,
        tiers,
        yearly,
    })
}

/// Split a structure's equity cash flows between GP and LP.
///
/// Uses the analysis's year-by-year equity cash flows (exit proceeds in the
/// final year) and its total equity as contributed capital.
pub fn calculate_promote(
    base: &DealInputsBase,
    analysis: &StructureAnalysis,
    config: &PromoteConfig,
) -> DealResult<ComputationOutput<PromoteOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let expected = base.hold_period_years as usize + 1;
    if analysis.equity_cash_flows.len() != expected {
        return Err(DealAnalysisError::invalid(
            "analysis",
            format!(
                "Analysis has {} equity cash flows; hold period of {} years needs {expected}",
                analysis.equity_cash_flows.len(),
                base.hold_period_years
            ),
        ));
    }

    let output = run_waterfall(
        &analysis.equity_cash_flows[1..],
        analysis.result.total_equity,
        config,
        &mut warnings,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "GP/LP Promote Waterfall (annual, tiered)",
        &serde_json::json!({
            "structure": analysis.result.kind,
            "total_equity": analysis.result.total_equity.to_string(),
            "gp_equity_pct": config.gp_equity_pct.to_string(),
            "lp_equity_pct": config.lp_equity_pct.to_string(),
            "num_tiers": config.tiers.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Serialized request shape used by the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteInput {
    pub base: DealInputsBase,
    /// Financing whose equity cash flows feed the waterfall; default
    /// conventional parameters when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureParameters>,
    pub promote: PromoteConfig,
}

/// Model the structure, then split its equity cash flows. Financing
/// warnings come first in the returned envelope.
pub fn calculate_promote_for_structure(
    input: &PromoteInput,
) -> DealResult<ComputationOutput<PromoteOutput>> {
    let params = input
        .structure
        .clone()
        .unwrap_or_else(|| default_structure_parameters(StructureKind::Conventional, &input.base));

    let analysis = analyze_structure(&input.base, &params)?;
    let mut output = calculate_promote(&input.base, &analysis.result, &input.promote)?;

    let mut warnings = analysis.warnings;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
