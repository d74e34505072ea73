use deal_analysis_core::projection::{DealInputsBase, MarketSignals};
use deal_analysis_core::sensitivity::{calculate_promote_sensitivity, PromoteSensitivityInput, SensitivityAxes};
use deal_analysis_core::structures::params::ConventionalParams;
use deal_analysis_core::structures::{
    analyze_structure, default_structure_parameters, StructureKind, StructureParameters,
};
use deal_analysis_core::waterfall::{
    calculate_promote, calculate_promote_for_structure, default_tiers, PromoteConfig, PromoteInput,
    WaterfallTier,
};
use deal_analysis_core::Money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn base() -> DealInputsBase {
    DealInputsBase {
        purchase_price: dec!(2400000),
        units: 24,
        gross_rental_income: dec!(310000),
        other_income: dec!(12000),
        vacancy_rate: dec!(0.06),
        operating_expenses: dec!(88000),
        capex_reserve: dec!(7200),
        property_taxes: dec!(31000),
        insurance: dec!(14500),
        hold_period_years: 7,
        exit_cap_rate: dec!(0.0625),
        rent_growth: dec!(0.03),
        expense_growth: dec!(0.025),
        renovation_budget: dec!(150000),
        closing_cost_pct: dec!(0.015),
        market: MarketSignals {
            current_mortgage_rate: Some(dec!(0.0625)),
            comparable_value: None,
            agency_eligible: false,
        },
    }
}

fn config(tiers: Vec<WaterfallTier>) -> PromoteConfig {
    PromoteConfig {
        gp_equity_pct: dec!(0.10),
        lp_equity_pct: dec!(0.90),
        tiers,
    }
}

const TOLERANCE: Decimal = dec!(0.00000001);

// ===========================================================================
// Waterfall over a modeled deal
// ===========================================================================

#[test]
fn test_promote_conserves_cash_every_year() {
    let b = base();
    let params = StructureParameters::Conventional(ConventionalParams {
        ltv: dec!(0.70),
        interest_rate: dec!(0.0625),
        amortization_years: 30,
        loan_fee_pct: dec!(0.01),
    });
    let analysis = analyze_structure(&b, &params).unwrap().result;

    let tier_sets = vec![
        default_tiers(dec!(0.10)),
        vec![
            WaterfallTier::preferred("Pref", dec!(0.08), dec!(0.10)),
            WaterfallTier::catch_up("GP Catch-Up", dec!(0.80), dec!(0.20)),
            WaterfallTier::split("80/20", dec!(0.20)),
        ],
        vec![
            WaterfallTier::return_of_capital("ROC", dec!(0.10)),
            WaterfallTier::split("Pro Rata", dec!(0.10)).with_hurdle(dec!(0.12)),
            WaterfallTier::split("Promote", dec!(0.35)).with_hurdle(dec!(0.18)),
        ],
    ];

    for tiers in tier_sets {
        let out = calculate_promote(&b, &analysis, &config(tiers)).unwrap().result;
        assert_eq!(out.yearly.len(), 7);
        let mut running: Money = Decimal::ZERO;
        for (row, cash) in out.yearly.iter().zip(&analysis.equity_cash_flows[1..]) {
            assert_eq!(row.gp_total + row.lp_total, row.distributable_cash);
            assert!((row.distributable_cash - *cash).abs() < TOLERANCE);
            running += row.distributable_cash;
            assert_eq!(row.cumulative_gp + row.cumulative_lp, running);
            let tier_total: Money = row.tiers.iter().map(|t| t.to_gp + t.to_lp).sum();
            assert_eq!(tier_total, row.distributable_cash);
        }
    }
}

#[test]
fn test_tier_splits_always_sum_to_one() {
    let b = base();
    let analysis = analyze_structure(&b, &StructureParameters::AllCash)
        .unwrap()
        .result;
    let tiers = vec![
        WaterfallTier::preferred("Pref", dec!(0.07), dec!(0.10)),
        WaterfallTier::split("Split", dec!(0.3)).with_lp_split(dec!(0.65)),
    ];
    let out = calculate_promote(&b, &analysis, &config(tiers)).unwrap().result;
    for t in &out.tiers {
        assert_eq!(t.gp_split + t.lp_split, Decimal::ONE, "tier {}", t.name);
    }
    assert_eq!(out.tiers[1].gp_split, dec!(0.35));
}

#[test]
fn test_promote_rejects_mismatched_hold_period() {
    let b = base();
    let analysis = analyze_structure(&b, &StructureParameters::AllCash)
        .unwrap()
        .result;
    let mut shorter = b.clone();
    shorter.hold_period_years = 5;
    assert!(calculate_promote(&shorter, &analysis, &config(default_tiers(dec!(0.10)))).is_err());
}

#[test]
fn test_syndication_runs_waterfall_internally() {
    let b = base();
    let params = default_structure_parameters(StructureKind::Syndication, &b);
    let out = analyze_structure(&b, &params).unwrap().result;
    let promote = out.waterfall.expect("syndication carries a waterfall");
    assert_eq!(promote.yearly.len(), 7);
    assert!(promote.gp_irr.unwrap() > promote.lp_irr.unwrap());

    let total: Money = promote.yearly.iter().map(|y| y.distributable_cash).sum();
    assert_eq!(promote.lp_total_distributions + promote.gp_total_distributions, total);
}

#[test]
fn test_promote_request_defaults_to_conventional() {
    let b = base();
    let input: PromoteInput = serde_json::from_value(serde_json::json!({
        "base": serde_json::to_value(&b).unwrap(),
        "promote": serde_json::to_value(config(default_tiers(dec!(0.10)))).unwrap(),
    }))
    .unwrap();
    assert!(input.structure.is_none());

    let via_request = calculate_promote_for_structure(&input).unwrap();
    let params = default_structure_parameters(StructureKind::Conventional, &b);
    let analysis = analyze_structure(&b, &params).unwrap().result;
    let direct = calculate_promote(&b, &analysis, &input.promote).unwrap().result;
    assert_eq!(via_request.result.yearly, direct.yearly);
    assert_eq!(via_request.assumptions["structure"], serde_json::json!("conventional"));
}

// ===========================================================================
// Promote sensitivity
// ===========================================================================

#[test]
fn test_promote_sensitivity_base_cell_matches_direct_run() {
    let b = base();
    let promote = config(default_tiers(dec!(0.10)));
    let input = PromoteSensitivityInput {
        base: b.clone(),
        structure: None,
        promote: promote.clone(),
        axes: SensitivityAxes::default(),
    };
    let grid = calculate_promote_sensitivity(&input).unwrap().result;

    let params = default_structure_parameters(StructureKind::Conventional, &b);
    let analysis = analyze_structure(&b, &params).unwrap().result;
    let direct = calculate_promote(&b, &analysis, &promote).unwrap().result;

    let (r, c) = grid.base_case_position;
    let cell = grid.cells[r][c].value.as_ref().unwrap();
    assert!(grid.cells[r][c].is_base_case);
    assert_eq!(cell.lp_irr, direct.lp_irr);
    assert_eq!(cell.gp_irr, direct.gp_irr);
    assert_eq!(cell.lp_multiple, direct.lp_equity_multiple);
}
