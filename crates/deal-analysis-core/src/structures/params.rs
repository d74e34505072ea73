use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DealAnalysisError;
use crate::projection::{DealInputsBase, MAX_HOLD_PERIOD_YEARS};
use crate::types::{Money, Rate};
use crate::waterfall::{default_tiers, validate_equity_split, WaterfallTier};
use crate::DealResult;

/// Mortgage rate assumed when the caller supplies no market rate.
pub const DEFAULT_MORTGAGE_RATE: Rate = dec!(0.07);

const DEFAULT_AMORTIZATION_YEARS: u32 = 30;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// The financing mechanics the engine can model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    AllCash,
    Conventional,
    BridgeRefi,
    Assumable,
    Syndication,
}

impl StructureKind {
    pub const ALL: [StructureKind; 5] = [
        StructureKind::AllCash,
        StructureKind::Conventional,
        StructureKind::BridgeRefi,
        StructureKind::Assumable,
        StructureKind::Syndication,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StructureKind::AllCash => "All Cash",
            StructureKind::Conventional => "Conventional Mortgage",
            StructureKind::BridgeRefi => "Bridge + Refinance (BRRRR)",
            StructureKind::Assumable => "Assumable Loan",
            StructureKind::Syndication => "Syndication (GP/LP)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureKind::AllCash => "all_cash",
            StructureKind::Conventional => "conventional",
            StructureKind::BridgeRefi => "bridge_refi",
            StructureKind::Assumable => "assumable",
            StructureKind::Syndication => "syndication",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StructureKind {
    type Err = DealAnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        StructureKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                DealAnalysisError::invalid(
                    "kind",
                    format!(
                        "Unknown structure '{s}'; expected one of all_cash, conventional, bridge_refi, assumable, syndication"
                    ),
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Per-kind parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionalParams {
    /// Loan-to-value on purchase price
    pub ltv: Rate,
    pub interest_rate: Rate,
    pub amortization_years: u32,
    /// Origination fee as a fraction of the loan
    #[serde(default)]
    pub loan_fee_pct: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRefiParams {
    /// Bridge loan-to-value on purchase price (interest-only)
    pub bridge_ltv: Rate,
    pub bridge_rate: Rate,
    /// Up-front points as a fraction of the bridge loan
    #[serde(default)]
    pub bridge_points_pct: Rate,
    /// Years on the bridge before refinancing
    pub bridge_years: u32,
    /// Rent increase achieved by the renovation
    #[serde(default)]
    pub rent_increase_pct: Rate,
    /// After-repair value; capitalized stabilized NOI when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arv_override: Option<Money>,
    pub refinance_ltv: Rate,
    pub refinance_rate: Rate,
    pub refinance_amortization_years: u32,
    /// Loan term (maturity) of the refinance loan
    pub refinance_term_years: u32,
    #[serde(default)]
    pub refinance_closing_cost_pct: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumableParams {
    pub assumed_balance: Money,
    pub assumed_rate: Rate,
    pub assumed_remaining_years: u32,
    /// Lender assumption fee as a fraction of the assumed balance
    #[serde(default)]
    pub assumption_fee_pct: Rate,
    /// Second loan covering part of the seller's equity
    #[serde(default)]
    pub supplemental_amount: Money,
    #[serde(default)]
    pub supplemental_rate: Rate,
    #[serde(default)]
    pub supplemental_amortization_years: u32,
    /// Rate new financing would cost today
    pub market_rate: Rate,
    pub market_amortization_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyndicationParams {
    pub ltv: Rate,
    pub interest_rate: Rate,
    pub amortization_years: u32,
    pub gp_equity_pct: Rate,
    pub lp_equity_pct: Rate,
    /// Of purchase price, funded at close
    #[serde(default)]
    pub acquisition_fee_pct: Rate,
    /// Of effective gross income, paid yearly
    #[serde(default)]
    pub asset_management_fee_pct: Rate,
    /// Of sale price, paid at exit
    #[serde(default)]
    pub disposition_fee_pct: Rate,
    /// Of renovation budget, funded at close
    #[serde(default)]
    pub construction_management_fee_pct: Rate,
    pub tiers: Vec<WaterfallTier>,
}

/// Structure-specific parameters, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureParameters {
    AllCash,
    Conventional(ConventionalParams),
    BridgeRefi(BridgeRefiParams),
    Assumable(AssumableParams),
    Syndication(SyndicationParams),
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConventionalPatch {
    pub ltv: Option<Rate>,
    pub interest_rate: Option<Rate>,
    pub amortization_years: Option<u32>,
    pub loan_fee_pct: Option<Rate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeRefiPatch {
    pub bridge_ltv: Option<Rate>,
    pub bridge_rate: Option<Rate>,
    pub bridge_points_pct: Option<Rate>,
    pub bridge_years: Option<u32>,
    pub rent_increase_pct: Option<Rate>,
    pub arv_override: Option<Money>,
    pub refinance_ltv: Option<Rate>,
    pub refinance_rate: Option<Rate>,
    pub refinance_amortization_years: Option<u32>,
    pub refinance_term_years: Option<u32>,
    pub refinance_closing_cost_pct: Option<Rate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssumablePatch {
    pub assumed_balance: Option<Money>,
    pub assumed_rate: Option<Rate>,
    pub assumed_remaining_years: Option<u32>,
    pub assumption_fee_pct: Option<Rate>,
    pub supplemental_amount: Option<Money>,
    pub supplemental_rate: Option<Rate>,
    pub supplemental_amortization_years: Option<u32>,
    pub market_rate: Option<Rate>,
    pub market_amortization_years: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyndicationPatch {
    pub ltv: Option<Rate>,
    pub interest_rate: Option<Rate>,
    pub amortization_years: Option<u32>,
    pub gp_equity_pct: Option<Rate>,
    pub lp_equity_pct: Option<Rate>,
    pub acquisition_fee_pct: Option<Rate>,
    pub asset_management_fee_pct: Option<Rate>,
    pub disposition_fee_pct: Option<Rate>,
    pub construction_management_fee_pct: Option<Rate>,
    pub tiers: Option<Vec<WaterfallTier>>,
}

/// Partial override of one kind's parameters; unset fields keep their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructurePatch {
    AllCash,
    Conventional(ConventionalPatch),
    BridgeRefi(BridgeRefiPatch),
    Assumable(AssumablePatch),
    Syndication(SyndicationPatch),
}

impl StructurePatch {
    pub fn kind(&self) -> StructureKind {
        match self {
            StructurePatch::AllCash => StructureKind::AllCash,
            StructurePatch::Conventional(_) => StructureKind::Conventional,
            StructurePatch::BridgeRefi(_) => StructureKind::BridgeRefi,
            StructurePatch::Assumable(_) => StructureKind::Assumable,
            StructurePatch::Syndication(_) => StructureKind::Syndication,
        }
    }
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

impl StructureParameters {
    pub fn kind(&self) -> StructureKind {
        match self {
            StructureParameters::AllCash => StructureKind::AllCash,
            StructureParameters::Conventional(_) => StructureKind::Conventional,
            StructureParameters::BridgeRefi(_) => StructureKind::BridgeRefi,
            StructureParameters::Assumable(_) => StructureKind::Assumable,
            StructureParameters::Syndication(_) => StructureKind::Syndication,
        }
    }

    /// Apply the fields set in `patch`. A patch for another kind is rejected.
    pub fn apply_patch(&mut self, patch: &StructurePatch) -> DealResult<()> {
        match (self, patch) {
            (StructureParameters::AllCash, StructurePatch::AllCash) => {}
            (StructureParameters::Conventional(p), StructurePatch::Conventional(o)) => {
                set(&mut p.ltv, &o.ltv);
                set(&mut p.interest_rate, &o.interest_rate);
                set(&mut p.amortization_years, &o.amortization_years);
                set(&mut p.loan_fee_pct, &o.loan_fee_pct);
            }
            (StructureParameters::BridgeRefi(p), StructurePatch::BridgeRefi(o)) => {
                set(&mut p.bridge_ltv, &o.bridge_ltv);
                set(&mut p.bridge_rate, &o.bridge_rate);
                set(&mut p.bridge_points_pct, &o.bridge_points_pct);
                set(&mut p.bridge_years, &o.bridge_years);
                set(&mut p.rent_increase_pct, &o.rent_increase_pct);
                if o.arv_override.is_some() {
                    p.arv_override = o.arv_override;
                }
                set(&mut p.refinance_ltv, &o.refinance_ltv);
                set(&mut p.refinance_rate, &o.refinance_rate);
                set(&mut p.refinance_amortization_years, &o.refinance_amortization_years);
                set(&mut p.refinance_term_years, &o.refinance_term_years);
                set(&mut p.refinance_closing_cost_pct, &o.refinance_closing_cost_pct);
            }
            (StructureParameters::Assumable(p), StructurePatch::Assumable(o)) => {
                set(&mut p.assumed_balance, &o.assumed_balance);
                set(&mut p.assumed_rate, &o.assumed_rate);
                set(&mut p.assumed_remaining_years, &o.assumed_remaining_years);
                set(&mut p.assumption_fee_pct, &o.assumption_fee_pct);
                set(&mut p.supplemental_amount, &o.supplemental_amount);
                set(&mut p.supplemental_rate, &o.supplemental_rate);
                set(&mut p.supplemental_amortization_years, &o.supplemental_amortization_years);
                set(&mut p.market_rate, &o.market_rate);
                set(&mut p.market_amortization_years, &o.market_amortization_years);
            }
            (StructureParameters::Syndication(p), StructurePatch::Syndication(o)) => {
                set(&mut p.ltv, &o.ltv);
                set(&mut p.interest_rate, &o.interest_rate);
                set(&mut p.amortization_years, &o.amortization_years);
                // Editing one side of the equity split recomputes the other.
                match (o.gp_equity_pct, o.lp_equity_pct) {
                    (Some(gp), None) => {
                        p.gp_equity_pct = gp;
                        p.lp_equity_pct = Decimal::ONE - gp;
                    }
                    (None, Some(lp)) => {
                        p.lp_equity_pct = lp;
                        p.gp_equity_pct = Decimal::ONE - lp;
                    }
                    (gp, lp) => {
                        set(&mut p.gp_equity_pct, &gp);
                        set(&mut p.lp_equity_pct, &lp);
                    }
                }
                set(&mut p.acquisition_fee_pct, &o.acquisition_fee_pct);
                set(&mut p.asset_management_fee_pct, &o.asset_management_fee_pct);
                set(&mut p.disposition_fee_pct, &o.disposition_fee_pct);
                set(
                    &mut p.construction_management_fee_pct,
                    &o.construction_management_fee_pct,
                );
                set(&mut p.tiers, &o.tiers);
            }
            (params, patch) => {
                return Err(DealAnalysisError::invalid(
                    "kind",
                    format!(
                        "Cannot apply a {} patch to {} parameters",
                        patch.kind(),
                        params.kind()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Reject parameters the models cannot price; push warnings for
    /// unusual-but-legal values.
    pub fn validate(&self, base: &DealInputsBase, warnings: &mut Vec<String>) -> DealResult<()> {
        match self {
            StructureParameters::AllCash => Ok(()),
            StructureParameters::Conventional(p) => {
                check_ltv("ltv", p.ltv, warnings)?;
                check_rate("interest_rate", p.interest_rate, warnings)?;
                check_term("amortization_years", p.amortization_years)?;
                check_fraction("loan_fee_pct", p.loan_fee_pct)
            }
            StructureParameters::BridgeRefi(p) => {
                check_ltv("bridge_ltv", p.bridge_ltv, warnings)?;
                check_rate("bridge_rate", p.bridge_rate, warnings)?;
                check_fraction("bridge_points_pct", p.bridge_points_pct)?;
                if p.bridge_years < 1 || p.bridge_years > base.hold_period_years {
                    return Err(DealAnalysisError::invalid(
                        "bridge_years",
                        format!(
                            "Bridge period must be between 1 and the {}-year hold period",
                            base.hold_period_years
                        ),
                    ));
                }
                if p.rent_increase_pct <= dec!(-1) {
                    return Err(DealAnalysisError::invalid(
                        "rent_increase_pct",
                        "Rent increase must be greater than -100%",
                    ));
                }
                if let Some(arv) = p.arv_override {
                    if arv <= Decimal::ZERO {
                        return Err(DealAnalysisError::invalid(
                            "arv_override",
                            "After-repair value must be positive",
                        ));
                    }
                }
                check_ltv("refinance_ltv", p.refinance_ltv, warnings)?;
                check_rate("refinance_rate", p.refinance_rate, warnings)?;
                check_term("refinance_amortization_years", p.refinance_amortization_years)?;
                check_term("refinance_term_years", p.refinance_term_years)?;
                check_fraction("refinance_closing_cost_pct", p.refinance_closing_cost_pct)
            }
            StructureParameters::Assumable(p) => {
                for (field, v) in [
                    ("assumed_balance", p.assumed_balance),
                    ("supplemental_amount", p.supplemental_amount),
                ] {
                    if v < Decimal::ZERO {
                        return Err(DealAnalysisError::invalid(field, "Loan amount cannot be negative"));
                    }
                }
                check_rate("assumed_rate", p.assumed_rate, warnings)?;
                check_rate("supplemental_rate", p.supplemental_rate, warnings)?;
                check_rate("market_rate", p.market_rate, warnings)?;
                check_term("assumed_remaining_years", p.assumed_remaining_years)?;
                check_term("supplemental_amortization_years", p.supplemental_amortization_years)?;
                check_term("market_amortization_years", p.market_amortization_years)?;
                check_fraction("assumption_fee_pct", p.assumption_fee_pct)
            }
            StructureParameters::Syndication(p) => {
                check_ltv("ltv", p.ltv, warnings)?;
                check_rate("interest_rate", p.interest_rate, warnings)?;
                check_term("amortization_years", p.amortization_years)?;
                validate_equity_split(p.gp_equity_pct, p.lp_equity_pct)?;
                for (field, v) in [
                    ("acquisition_fee_pct", p.acquisition_fee_pct),
                    ("asset_management_fee_pct", p.asset_management_fee_pct),
                    ("disposition_fee_pct", p.disposition_fee_pct),
                    ("construction_management_fee_pct", p.construction_management_fee_pct),
                ] {
                    check_fraction(field, v)?;
                }
                Ok(())
            }
        }
    }
}

fn check_fraction(field: &str, value: Rate) -> DealResult<()> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(DealAnalysisError::invalid(
            field,
            "Percentage must be in [0, 1)",
        ));
    }
    Ok(())
}

fn check_ltv(field: &str, ltv: Rate, warnings: &mut Vec<String>) -> DealResult<()> {
    if ltv < Decimal::ZERO || ltv > Decimal::ONE {
        return Err(DealAnalysisError::invalid(field, "LTV must be between 0% and 100%"));
    }
    if ltv > dec!(0.80) {
        warnings.push(format!(
            "{field} of {:.0}% exceeds 80%, above typical lender limits",
            ltv * dec!(100)
        ));
    }
    Ok(())
}

fn check_rate(field: &str, rate: Rate, warnings: &mut Vec<String>) -> DealResult<()> {
    if rate < Decimal::ZERO {
        return Err(DealAnalysisError::invalid(field, "Interest rate cannot be negative"));
    }
    if rate > dec!(0.20) {
        warnings.push(format!(
            "{field} of {rate} looks like a percentage; rates are decimals (0.065 = 6.5%)"
        ));
    }
    Ok(())
}

fn check_term(field: &str, years: u32) -> DealResult<()> {
    if years > MAX_HOLD_PERIOD_YEARS {
        return Err(DealAnalysisError::invalid(
            field,
            format!("Term cannot exceed {MAX_HOLD_PERIOD_YEARS} years"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Seed parameters for `kind` from the deal and its market signals.
///
/// Market rate comes from `base.market.current_mortgage_rate` (7% when
/// absent). Agency-eligible deals get the higher leverage agency programs
/// allow. A comparable-sales estimate seeds the bridge ARV.
pub fn default_structure_parameters(kind: StructureKind, base: &DealInputsBase) -> StructureParameters {
    let market = &base.market;
    let market_rate = market.current_mortgage_rate.unwrap_or(DEFAULT_MORTGAGE_RATE);

    match kind {
        StructureKind::AllCash => StructureParameters::AllCash,
        StructureKind::Conventional => StructureParameters::Conventional(ConventionalParams {
            ltv: if market.agency_eligible { dec!(0.80) } else { dec!(0.75) },
            interest_rate: market_rate,
            amortization_years: DEFAULT_AMORTIZATION_YEARS,
            loan_fee_pct: dec!(0.01),
        }),
        StructureKind::BridgeRefi => StructureParameters::BridgeRefi(BridgeRefiParams {
            bridge_ltv: dec!(0.80),
            bridge_rate: market_rate + dec!(0.03),
            bridge_points_pct: dec!(0.02),
            bridge_years: 1,
            rent_increase_pct: dec!(0.10),
            arv_override: market.comparable_value,
            refinance_ltv: dec!(0.75),
            refinance_rate: market_rate,
            refinance_amortization_years: DEFAULT_AMORTIZATION_YEARS,
            refinance_term_years: 10,
            refinance_closing_cost_pct: dec!(0.02),
        }),
        StructureKind::Assumable => StructureParameters::Assumable(AssumableParams {
            assumed_balance: base.purchase_price
                * if market.agency_eligible { dec!(0.65) } else { dec!(0.60) },
            assumed_rate: dec!(0.035),
            assumed_remaining_years: 25,
            assumption_fee_pct: dec!(0.01),
            supplemental_amount: Decimal::ZERO,
            supplemental_rate: market_rate + dec!(0.02),
            supplemental_amortization_years: DEFAULT_AMORTIZATION_YEARS,
            market_rate,
            market_amortization_years: DEFAULT_AMORTIZATION_YEARS,
        }),
        StructureKind::Syndication => {
            let gp_equity_pct = dec!(0.10);
            StructureParameters::Syndication(SyndicationParams {
                ltv: if market.agency_eligible { dec!(0.75) } else { dec!(0.65) },
                interest_rate: market_rate,
                amortization_years: DEFAULT_AMORTIZATION_YEARS,
                gp_equity_pct,
                lp_equity_pct: Decimal::ONE - gp_equity_pct,
                acquisition_fee_pct: dec!(0.02),
                asset_management_fee_pct: dec!(0.02),
                disposition_fee_pct: dec!(0.01),
                construction_management_fee_pct: dec!(0.05),
                tiers: default_tiers(gp_equity_pct),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::MarketSignals;
    use pretty_assertions::assert_eq;
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
            rent_growth: Decimal::ZERO,
            expense_growth: Decimal::ZERO,
            renovation_budget: Decimal::ZERO,
            closing_cost_pct: Decimal::ZERO,
            market: MarketSignals::default(),
        }
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in StructureKind::ALL {
            assert_eq!(kind.as_str().parse::<StructureKind>().unwrap(), kind);
        }
        assert_eq!("bridge-refi".parse::<StructureKind>().unwrap(), StructureKind::BridgeRefi);
        assert!("seller_finance".parse::<StructureKind>().is_err());
    }

    #[test]
    fn test_defaults_use_market_signals() {
        let mut b = base();
        b.market = MarketSignals {
            current_mortgage_rate: Some(dec!(0.065)),
            comparable_value: Some(dec!(1250000)),
            agency_eligible: true,
        };
        match default_structure_parameters(StructureKind::Conventional, &b) {
            StructureParameters::Conventional(p) => {
                assert_eq!(p.interest_rate, dec!(0.065));
                assert_eq!(p.ltv, dec!(0.80));
            }
            other => panic!("unexpected {other:?}"),
        }
        match default_structure_parameters(StructureKind::BridgeRefi, &b) {
            StructureParameters::BridgeRefi(p) => {
                assert_eq!(p.bridge_rate, dec!(0.095));
                assert_eq!(p.arv_override, Some(dec!(1250000)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_defaults_without_market_data() {
        let b = base();
        for kind in StructureKind::ALL {
            let params = default_structure_parameters(kind, &b);
            assert_eq!(params.kind(), kind);
            let mut warnings = Vec::new();
            params.validate(&b, &mut warnings).unwrap();
        }
        match default_structure_parameters(StructureKind::Syndication, &b) {
            StructureParameters::Syndication(p) => {
                assert_eq!(p.interest_rate, DEFAULT_MORTGAGE_RATE);
                assert_eq!(p.gp_equity_pct + p.lp_equity_pct, Decimal::ONE);
                assert_eq!(p.tiers.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_patch_overrides_only_set_fields() {
        let b = base();
        let mut params = default_structure_parameters(StructureKind::Conventional, &b);
        params
            .apply_patch(&StructurePatch::Conventional(ConventionalPatch {
                ltv: Some(dec!(0.70)),
                interest_rate: Some(dec!(0.065)),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(
            params,
            StructureParameters::Conventional(ConventionalParams {
                ltv: dec!(0.70),
                interest_rate: dec!(0.065),
                amortization_years: 30,
                loan_fee_pct: dec!(0.01),
            })
        );
    }

    #[test]
    fn test_patch_kind_mismatch_rejected() {
        let b = base();
        let mut params = default_structure_parameters(StructureKind::Conventional, &b);
        let err = params
            .apply_patch(&StructurePatch::Syndication(SyndicationPatch::default()))
            .unwrap_err();
        assert!(matches!(err, DealAnalysisError::InvalidInput { .. }));
    }

    #[test]
    fn test_syndication_patch_recomputes_other_side() {
        let b = base();
        let mut params = default_structure_parameters(StructureKind::Syndication, &b);
        params
            .apply_patch(&StructurePatch::Syndication(SyndicationPatch {
                gp_equity_pct: Some(dec!(0.05)),
                ..Default::default()
            }))
            .unwrap();
        match params {
            StructureParameters::Syndication(p) => assert_eq!(p.lp_equity_pct, dec!(0.95)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_patch_deserializes_from_partial_json() {
        let patch: StructurePatch =
            serde_json::from_str(r#"{"kind":"bridge_refi","bridge_years":2}"#).unwrap();
        assert_eq!(
            patch,
            StructurePatch::BridgeRefi(BridgeRefiPatch {
                bridge_years: Some(2),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        let b = base();
        let mut warnings = Vec::new();

        let bridge = StructureParameters::BridgeRefi(BridgeRefiParams {
            bridge_years: 6,
            ..match default_structure_parameters(StructureKind::BridgeRefi, &b) {
                StructureParameters::BridgeRefi(p) => p,
                _ => unreachable!(),
            }
        });
        assert!(bridge.validate(&b, &mut warnings).is_err());

        let conv = StructureParameters::Conventional(ConventionalParams {
            ltv: dec!(1.1),
            interest_rate: dec!(0.06),
            amortization_years: 30,
            loan_fee_pct: Decimal::ZERO,
        });
        assert!(conv.validate(&b, &mut warnings).is_err());

        let synd = StructureParameters::Syndication(SyndicationParams {
            lp_equity_pct: dec!(0.8),
            ..match default_structure_parameters(StructureKind::Syndication, &b) {
                StructureParameters::Syndication(p) => p,
                _ => unreachable!(),
            }
        });
        assert!(synd.validate(&b, &mut warnings).is_err());
    }

    #[test]
    fn test_percentage_style_rate_warns() {
        let b = base();
        let mut warnings = Vec::new();
        let conv = StructureParameters::Conventional(ConventionalParams {
            ltv: dec!(0.7),
            interest_rate: dec!(6.5),
            amortization_years: 30,
            loan_fee_pct: Decimal::ZERO,
        });
        conv.validate(&b, &mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("interest_rate")));
    }
}
