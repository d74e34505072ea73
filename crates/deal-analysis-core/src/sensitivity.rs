use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use crate::error::DealAnalysisError;
use crate::projection::DealInputsBase;
use crate::structures::{default_structure_parameters, model_structure, StructureKind, StructureParameters};
use crate::types::*;
use crate::waterfall::{run_waterfall, PromoteConfig};
use crate::DealResult;

/// Largest number of offsets accepted on one axis.
const MAX_AXIS_POINTS: usize = 25;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

fn default_exit_cap_offsets() -> Vec<Rate> {
    vec![dec!(-0.01), dec!(-0.005), Decimal::ZERO, dec!(0.005), dec!(0.01)]
}

fn default_rent_growth_offsets() -> Vec<Rate> {
    vec![dec!(-0.02), dec!(-0.01), Decimal::ZERO, dec!(0.01), dec!(0.02)]
}

/// Offsets added to the base exit cap rate (rows) and rent growth (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAxes {
    #[serde(default = "default_exit_cap_offsets")]
    pub exit_cap_offsets: Vec<Rate>,
    #[serde(default = "default_rent_growth_offsets")]
    pub rent_growth_offsets: Vec<Rate>,
}

impl Default for SensitivityAxes {
    fn default() -> Self {
        Self {
            exit_cap_offsets: default_exit_cap_offsets(),
            rent_growth_offsets: default_rent_growth_offsets(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealSensitivityInput {
    pub base: DealInputsBase,
    pub parameters: StructureParameters,
    #[serde(default)]
    pub axes: SensitivityAxes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteSensitivityInput {
    pub base: DealInputsBase,
    /// Financing to re-run at each point; default conventional parameters when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureParameters>,
    pub promote: PromoteConfig,
    #[serde(default)]
    pub axes: SensitivityAxes,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCell<T> {
    pub exit_cap_rate: Rate,
    pub rent_growth: Rate,
    pub is_base_case: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `cells[row][col]` is evaluated at `exit_cap_rates[row]` and
/// `rent_growth_rates[col]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid<T> {
    pub exit_cap_rates: Vec<Rate>,
    pub rent_growth_rates: Vec<Rate>,
    pub cells: Vec<Vec<SensitivityCell<T>>>,
    /// (row, col) of the unperturbed deal
    pub base_case_position: (usize, usize),
    pub failed_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSensitivityValue {
    pub irr: Option<Rate>,
    pub equity_multiple: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteSensitivityValue {
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub lp_multiple: Ratio,
    pub gp_multiple: Ratio,
}

// ---------------------------------------------------------------------------
// Grid evaluation
// ---------------------------------------------------------------------------

/// Sorted, deduplicated offsets that always contain zero.
fn normalize_offsets(field: &str, offsets: &[Rate]) -> DealResult<Vec<Rate>> {
    let mut out: Vec<Rate> = offsets.to_vec();
    out.push(Decimal::ZERO);
    out.sort();
    out.dedup();
    if out.len() > MAX_AXIS_POINTS {
        return Err(DealAnalysisError::invalid(
            field,
            format!("At most {MAX_AXIS_POINTS} offsets per axis"),
        ));
    }
    Ok(out)
}

fn evaluate_grid<T, F>(
    base: &DealInputsBase,
    axes: &SensitivityAxes,
    warnings: &mut Vec<String>,
    eval: F,
) -> DealResult<SensitivityGrid<T>>
where
    F: Fn(&DealInputsBase) -> DealResult<T>,
{
    let cap_offsets = normalize_offsets("exit_cap_offsets", &axes.exit_cap_offsets)?;
    let growth_offsets = normalize_offsets("rent_growth_offsets", &axes.rent_growth_offsets)?;

    let exit_cap_rates: Vec<Rate> = cap_offsets.iter().map(|o| base.exit_cap_rate + o).collect();
    let rent_growth_rates: Vec<Rate> = growth_offsets.iter().map(|o| base.rent_growth + o).collect();

    let base_row = cap_offsets.iter().position(|o| o.is_zero()).unwrap_or(0);
    let base_col = growth_offsets.iter().position(|o| o.is_zero()).unwrap_or(0);

    let mut failed_cells = 0;
    let mut cells = Vec::with_capacity(exit_cap_rates.len());
    for (i, cap) in exit_cap_rates.iter().enumerate() {
        let mut row = Vec::with_capacity(rent_growth_rates.len());
        for (j, growth) in rent_growth_rates.iter().enumerate() {
            let mut point = base.clone();
            point.exit_cap_rate = *cap;
            point.rent_growth = *growth;

            let (value, error) = match eval(&point) {
                Ok(v) => (Some(v), None),
                Err(e) => {
                    failed_cells += 1;
                    warn!(exit_cap_rate = %cap, rent_growth = %growth, error = %e, "sensitivity cell failed");
                    warnings.push(format!(
                        "Evaluation failed at (exit cap {cap}, rent growth {growth}): {e}"
                    ));
                    (None, Some(e.to_string()))
                }
            };
            row.push(SensitivityCell {
                exit_cap_rate: *cap,
                rent_growth: *growth,
                is_base_case: i == base_row && j == base_col,
                value,
                error,
            });
        }
        cells.push(row);
    }

    Ok(SensitivityGrid {
        exit_cap_rates,
        rent_growth_rates,
        cells,
        base_case_position: (base_row, base_col),
        failed_cells,
    })
}

/// Two-way sweep of one structure's IRR and equity multiple over exit cap
/// rate (rows) and rent growth (columns).
pub fn analyze_deal_sensitivity(
    base: &DealInputsBase,
    params: &StructureParameters,
    axes: &SensitivityAxes,
) -> DealResult<ComputationOutput<SensitivityGrid<DealSensitivityValue>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    base.validate(&mut warnings)?;
    params.validate(base, &mut warnings)?;

    let grid = evaluate_grid(base, axes, &mut warnings, |point| {
        let mut cell_warnings = Vec::new();
        let analysis = model_structure(point, params, &mut cell_warnings)?;
        Ok(DealSensitivityValue {
            irr: analysis.result.irr,
            equity_multiple: analysis.result.equity_multiple,
        })
    })?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Deal Sensitivity (exit cap rate x rent growth)",
        &serde_json::json!({
            "structure": params.kind(),
            "base_exit_cap_rate": base.exit_cap_rate.to_string(),
            "base_rent_growth": base.rent_growth.to_string(),
            "axes": axes,
        }),
        warnings,
        elapsed,
        grid,
    ))
}

/// Two-way sweep of GP and LP returns: the structure and the promote
/// waterfall are re-run at every (exit cap rate, rent growth) point.
pub fn calculate_promote_sensitivity(
    input: &PromoteSensitivityInput,
) -> DealResult<ComputationOutput<SensitivityGrid<PromoteSensitivityValue>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let structure = input
        .structure
        .clone()
        .unwrap_or_else(|| default_structure_parameters(StructureKind::Conventional, &input.base));

    input.base.validate(&mut warnings)?;
    structure.validate(&input.base, &mut warnings)?;
    input.promote.validate(&mut warnings)?;

    let grid = evaluate_grid(&input.base, &input.axes, &mut warnings, |point| {
        let mut cell_warnings = Vec::new();
        let analysis = model_structure(point, &structure, &mut cell_warnings)?;
        let promote = run_waterfall(
            &analysis.equity_cash_flows[1..],
            analysis.result.total_equity,
            &input.promote,
            &mut cell_warnings,
        )?;
        Ok(PromoteSensitivityValue {
            lp_irr: promote.lp_irr,
            gp_irr: promote.gp_irr,
            lp_multiple: promote.lp_equity_multiple,
            gp_multiple: promote.gp_equity_multiple,
        })
    })?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Promote Sensitivity (exit cap rate x rent growth)",
        &serde_json::json!({
            "structure": structure.kind(),
            "gp_equity_pct": input.promote.gp_equity_pct.to_string(),
            "num_tiers": input.promote.tiers.len(),
            "axes": input.axes,
        }),
        warnings,
        elapsed,
        grid,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::MarketSignals;
    use crate::waterfall::{default_tiers, WaterfallTier};
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
            rent_growth: dec!(0.03),
            expense_growth: dec!(0.02),
            renovation_budget: Decimal::ZERO,
            closing_cost_pct: dec!(0.01),
            market: MarketSignals::default(),
        }
    }

    #[test]
    fn test_offsets_sorted_deduped_with_zero() {
        let out = normalize_offsets("x", &[dec!(0.01), dec!(-0.01), dec!(0.01)]).unwrap();
        assert_eq!(out, vec![dec!(-0.01), Decimal::ZERO, dec!(0.01)]);
        assert_eq!(normalize_offsets("x", &[]).unwrap(), vec![Decimal::ZERO]);
    }

    #[test]
    fn test_deal_grid_shape_and_base_case() {
        let b = base();
        let params = default_structure_parameters(StructureKind::Conventional, &b);
        let out = analyze_deal_sensitivity(&b, &params, &SensitivityAxes::default())
            .unwrap()
            .result;
        assert_eq!(out.cells.len(), 5);
        assert!(out.cells.iter().all(|r| r.len() == 5));
        assert_eq!(out.base_case_position, (2, 2));
        assert_eq!(out.exit_cap_rates[2], dec!(0.06));
        assert_eq!(out.rent_growth_rates[2], dec!(0.03));

        let base_cells: usize = out
            .cells
            .iter()
            .flatten()
            .filter(|c| c.is_base_case)
            .count();
        assert_eq!(base_cells, 1);
        assert_eq!(out.failed_cells, 0);

        // Base cell matches a direct run
        let mut w = Vec::new();
        let direct = model_structure(&b, &params, &mut w).unwrap();
        assert_eq!(out.cells[2][2].value.as_ref().unwrap().irr, direct.result.irr);
    }

    #[test]
    fn test_irr_falls_as_exit_cap_rises() {
        let b = base();
        let params = default_structure_parameters(StructureKind::AllCash, &b);
        let out = analyze_deal_sensitivity(&b, &params, &SensitivityAxes::default())
            .unwrap()
            .result;
        let col = out.base_case_position.1;
        let irrs: Vec<Rate> = out
            .cells
            .iter()
            .map(|row| row[col].value.as_ref().unwrap().irr.unwrap())
            .collect();
        assert!(irrs.windows(2).all(|w| w[0] > w[1]), "{irrs:?}");
    }

    #[test]
    fn test_failed_cells_recorded_and_sweep_continues() {
        let b = base();
        let params = default_structure_parameters(StructureKind::AllCash, &b);
        let axes = SensitivityAxes {
            exit_cap_offsets: vec![dec!(-0.06), Decimal::ZERO],
            rent_growth_offsets: vec![Decimal::ZERO],
        };
        let out = analyze_deal_sensitivity(&b, &params, &axes).unwrap();
        let grid = &out.result;
        assert_eq!(grid.failed_cells, 1);
        assert!(grid.cells[0][0].error.is_some());
        assert!(grid.cells[0][0].value.is_none());
        assert!(grid.cells[1][0].value.is_some());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_promote_sensitivity_defaults_to_conventional() {
        let input = PromoteSensitivityInput {
            base: base(),
            structure: None,
            promote: PromoteConfig {
                gp_equity_pct: dec!(0.10),
                lp_equity_pct: dec!(0.90),
                tiers: default_tiers(dec!(0.10)),
            },
            axes: SensitivityAxes::default(),
        };
        let out = calculate_promote_sensitivity(&input).unwrap();
        assert_eq!(out.assumptions["structure"], serde_json::json!("conventional"));
        let grid = out.result;
        let (r, c) = grid.base_case_position;
        let cell = grid.cells[r][c].value.as_ref().unwrap();
        assert!(cell.lp_irr.is_some());
        assert!(cell.gp_irr.is_some());
        // Lower exit cap => higher LP return
        let better = grid.cells[0][c].value.as_ref().unwrap();
        assert!(better.lp_irr.unwrap() > cell.lp_irr.unwrap());
    }

    #[test]
    fn test_promote_sensitivity_rejects_bad_config() {
        let input = PromoteSensitivityInput {
            base: base(),
            structure: None,
            promote: PromoteConfig {
                gp_equity_pct: dec!(0.10),
                lp_equity_pct: dec!(0.90),
                tiers: vec![],
            },
            axes: SensitivityAxes::default(),
        };
        assert!(calculate_promote_sensitivity(&input).is_err());
    }

    #[test]
    fn test_axes_default_from_partial_json() {
        let axes: SensitivityAxes =
            serde_json::from_str(r#"{"exit_cap_offsets":["0.0025"]}"#).unwrap();
        assert_eq!(axes.exit_cap_offsets, vec![dec!(0.0025)]);
        assert_eq!(axes.rent_growth_offsets.len(), 5);
    }

    #[test]
    fn test_overflowing_cell_fails_alone() {
        let mut b = base();
        b.hold_period_years = 50;
        let params = default_structure_parameters(StructureKind::AllCash, &b);
        let axes = SensitivityAxes {
            exit_cap_offsets: vec![dec!(-0.005), dec!(0.005)],
            rent_growth_offsets: vec![dec!(0.01), dec!(3)],
        };
        let out = analyze_deal_sensitivity(&b, &params, &axes).unwrap();
        let grid = out.result;

        assert_eq!(grid.rent_growth_rates, vec![dec!(0.03), dec!(0.04), dec!(3.03)]);
        assert_eq!(grid.failed_cells, 3);
        for row in &grid.cells {
            assert!(row[0].value.is_some() && row[1].value.is_some());
            assert!(row[2].value.is_none());
            assert!(row[2].error.as_deref().unwrap().contains("overflows"));
        }
        assert!(out.warnings.iter().any(|w| w.contains("Evaluation failed")));
    }

    #[test]
    fn test_promote_grid_survives_out_of_reach_hurdle() {
        let mut b = base();
        b.hold_period_years = 40;
        let input = PromoteSensitivityInput {
            structure: Some(default_structure_parameters(StructureKind::AllCash, &b)),
            base: b,
            promote: PromoteConfig {
                gp_equity_pct: dec!(0.10),
                lp_equity_pct: dec!(0.90),
                tiers: vec![WaterfallTier::split("50/50", dec!(0.50)).with_hurdle(dec!(15))],
            },
            axes: SensitivityAxes::default(),
        };
        let out = calculate_promote_sensitivity(&input).unwrap();
        assert_eq!(out.result.failed_cells, 0);
        assert!(out.result.cells.iter().flatten().all(|c| c.value.is_some()));
        assert!(out.warnings.iter().any(|w| w.contains("exceeds 100%")));
    }
}
