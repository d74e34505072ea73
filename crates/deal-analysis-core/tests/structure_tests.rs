use deal_analysis_core::comparison::compare_structures;
use deal_analysis_core::projection::{DealInputsBase, MarketSignals};
use deal_analysis_core::structures::params::{BridgeRefiParams, ConventionalParams};
use deal_analysis_core::structures::{
    analyze_structure, default_structure_parameters, StructureDetails, StructureKind,
    StructureParameters,
};
use deal_analysis_core::amortization::Loan;
use deal_analysis_core::Ratio;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn scenario_base() -> DealInputsBase {
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

fn conventional(ltv: Decimal, rate: Decimal) -> StructureParameters {
    StructureParameters::Conventional(ConventionalParams {
        ltv,
        interest_rate: rate,
        amortization_years: 30,
        loan_fee_pct: Decimal::ZERO,
    })
}

// ===========================================================================
// Concrete scenario
// ===========================================================================

#[test]
fn test_scenario_conventional_metrics() {
    let base = scenario_base();
    let out = analyze_structure(&base, &conventional(dec!(0.70), dec!(0.065))).unwrap();
    let r = &out.result.result;

    assert!(r.year1_noi > Decimal::ZERO);
    assert_eq!(r.year1_noi, dec!(79500));
    let dscr = r.dscr.finite().expect("DSCR should be finite with debt");
    assert!(dscr > Decimal::ZERO);
    assert_eq!(r.total_debt, dec!(700000));
    assert_eq!(r.total_equity, dec!(300000));
    assert!(r.irr.is_some());
}

#[test]
fn test_positive_leverage_lifts_irr() {
    let base = scenario_base();
    let unlevered = analyze_structure(&base, &StructureParameters::AllCash)
        .unwrap()
        .result
        .result
        .irr
        .unwrap();
    let levered = analyze_structure(&base, &conventional(dec!(0.70), dec!(0.065)))
        .unwrap()
        .result
        .result
        .irr
        .unwrap();

    let constant = Loan::new(dec!(700000), dec!(0.065), 30)
        .mortgage_constant()
        .unwrap();
    assert!(unlevered > constant, "unlevered {unlevered} vs constant {constant}");
    assert!(levered > unlevered, "levered {levered} should beat all-cash {unlevered}");
}

#[test]
fn test_negative_leverage_lowers_irr() {
    let base = scenario_base();
    let unlevered = analyze_structure(&base, &StructureParameters::AllCash)
        .unwrap()
        .result
        .result
        .irr
        .unwrap();
    let out = analyze_structure(&base, &conventional(dec!(0.70), dec!(0.16))).unwrap();
    let levered = out.result.result.irr.unwrap();

    let constant = Loan::new(dec!(700000), dec!(0.16), 30)
        .mortgage_constant()
        .unwrap();
    assert!(constant > unlevered);
    assert!(levered < unlevered, "levered {levered} should trail all-cash {unlevered}");
    assert!(out.warnings.iter().any(|w| w.contains("DSCR")));
}

// ===========================================================================
// Bridge / refinance
// ===========================================================================

#[test]
fn test_bridge_infinite_flag_tracks_capital_recovery() {
    let base = scenario_base();
    for arv in [dec!(900000), dec!(1200000), dec!(1500000), dec!(2000000)] {
        let params = StructureParameters::BridgeRefi(BridgeRefiParams {
            bridge_ltv: dec!(0.80),
            bridge_rate: dec!(0.10),
            bridge_points_pct: dec!(0.02),
            bridge_years: 1,
            rent_increase_pct: dec!(0.10),
            arv_override: Some(arv),
            refinance_ltv: dec!(0.75),
            refinance_rate: dec!(0.07),
            refinance_amortization_years: 30,
            refinance_term_years: 10,
            refinance_closing_cost_pct: dec!(0.02),
        });
        let out = analyze_structure(&base, &params).unwrap().result;
        let StructureDetails::BridgeRefi(d) = &out.result.details else {
            panic!("expected bridge details");
        };
        let recovered = d.cash_returned_at_refinance >= out.result.total_equity;
        assert_eq!(d.infinite_return, recovered, "arv {arv}");
        assert_eq!(d.infinite_return, d.cash_left_in_deal <= Decimal::ZERO);
        assert_eq!(out.result.cash_on_cash == Ratio::Infinite, d.infinite_return);
    }
}

// ===========================================================================
// Serialization
// ===========================================================================

#[test]
fn test_parameters_parse_from_tagged_json() {
    let json = r#"{
        "kind": "conventional",
        "ltv": "0.70",
        "interest_rate": "0.065",
        "amortization_years": 30
    }"#;
    let params: StructureParameters = serde_json::from_str(json).unwrap();
    assert_eq!(params, conventional(dec!(0.70), dec!(0.065)));
}

#[test]
fn test_result_serializes_undefined_dscr() {
    let base = scenario_base();
    let out = analyze_structure(&base, &StructureParameters::AllCash).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["result"]["result"]["dscr"], serde_json::json!("undefined"));
    assert_eq!(json["result"]["result"]["kind"], serde_json::json!("all_cash"));
    assert_eq!(json["result"]["result"]["details"]["kind"], serde_json::json!("all_cash"));
}

// ===========================================================================
// Comparison
// ===========================================================================

#[test]
fn test_comparison_deterministic_across_runs() {
    let mut base = scenario_base();
    base.rent_growth = dec!(0.03);
    base.expense_growth = dec!(0.025);
    base.market = MarketSignals {
        current_mortgage_rate: Some(dec!(0.0675)),
        comparable_value: Some(dec!(1150000)),
        agency_eligible: true,
    };

    let first = compare_structures(&base, &[], &[]).unwrap();
    for _ in 0..3 {
        let again = compare_structures(&base, &[], &[]).unwrap();
        assert_eq!(again.result, first.result);
        assert_eq!(again.warnings, first.warnings);
    }
}

#[test]
fn test_comparison_uses_default_parameters() {
    let base = scenario_base();
    let out = compare_structures(&base, &[StructureKind::Syndication], &[])
        .unwrap()
        .result;
    assert_eq!(
        out.entries[0].parameters,
        default_structure_parameters(StructureKind::Syndication, &base)
    );
}
