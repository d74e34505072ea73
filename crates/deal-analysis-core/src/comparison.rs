use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use crate::projection::DealInputsBase;
use crate::structures::{
    default_structure_parameters, model_structure, DealAnalysisResult, StructureKind,
    StructureParameters, StructurePatch,
};
use crate::types::*;
use crate::DealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Headline metrics ranked across structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    CashOnCash,
    Irr,
    EquityMultiple,
    Dscr,
    Year1CashFlow,
    TotalProfit,
    TotalEquity,
    TotalDebt,
    BreakEvenOccupancy,
}

impl ComparisonMetric {
    pub const ALL: [ComparisonMetric; 9] = [
        ComparisonMetric::CashOnCash,
        ComparisonMetric::Irr,
        ComparisonMetric::EquityMultiple,
        ComparisonMetric::Dscr,
        ComparisonMetric::Year1CashFlow,
        ComparisonMetric::TotalProfit,
        ComparisonMetric::TotalEquity,
        ComparisonMetric::TotalDebt,
        ComparisonMetric::BreakEvenOccupancy,
    ];

    pub fn higher_is_better(&self) -> bool {
        !matches!(
            self,
            ComparisonMetric::TotalEquity
                | ComparisonMetric::TotalDebt
                | ComparisonMetric::BreakEvenOccupancy
        )
    }

    /// The metric's value for one result; `Undefined` when it has none.
    pub fn value(&self, r: &DealAnalysisResult) -> Ratio {
        match self {
            ComparisonMetric::CashOnCash => r.cash_on_cash,
            ComparisonMetric::Irr => r.irr.map(Ratio::Finite).unwrap_or(Ratio::Undefined),
            ComparisonMetric::EquityMultiple => r.equity_multiple,
            ComparisonMetric::Dscr => r.dscr,
            ComparisonMetric::Year1CashFlow => Ratio::Finite(r.year1_cash_flow),
            ComparisonMetric::TotalProfit => Ratio::Finite(r.total_profit),
            ComparisonMetric::TotalEquity => Ratio::Finite(r.total_equity),
            ComparisonMetric::TotalDebt => Ratio::Finite(r.total_debt),
            ComparisonMetric::BreakEvenOccupancy => r.break_even_occupancy,
        }
    }
}

/// One structure's outcome. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub kind: StructureKind,
    pub label: String,
    pub parameters: StructureParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DealAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWinner {
    pub metric: ComparisonMetric,
    pub higher_is_better: bool,
    /// `None` when no structure has a usable value or the best is tied
    pub winner: Option<StructureKind>,
    pub value: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutput {
    pub entries: Vec<ComparisonEntry>,
    pub winners: Vec<MetricWinner>,
}

/// Serialized request shape used by the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub base: DealInputsBase,
    /// Structures to compare; every kind when empty
    #[serde(default)]
    pub kinds: Vec<StructureKind>,
    #[serde(default)]
    pub overrides: Vec<StructurePatch>,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Ordering key: an infinite ratio beats every finite value.
fn rank_key(value: Ratio) -> Option<Decimal> {
    match value {
        Ratio::Finite(v) if !v.is_zero() => Some(v),
        Ratio::Infinite => Some(Decimal::MAX),
        _ => None,
    }
}

fn pick_winner(metric: ComparisonMetric, entries: &[ComparisonEntry]) -> MetricWinner {
    let candidates: Vec<(StructureKind, Ratio, Decimal)> = entries
        .iter()
        .filter_map(|e| {
            let value = metric.value(e.result.as_ref()?);
            rank_key(value).map(|k| (e.kind, value, k))
        })
        .collect();

    let best = if metric.higher_is_better() {
        candidates.iter().map(|c| c.2).max()
    } else {
        candidates.iter().map(|c| c.2).min()
    };

    let mut at_best = candidates.iter().filter(|c| Some(c.2) == best);
    let (winner, value) = match (at_best.next(), at_best.next()) {
        (Some(c), None) => (Some(c.0), c.1),
        _ => (None, Ratio::Undefined),
    };

    MetricWinner {
        metric,
        higher_is_better: metric.higher_is_better(),
        winner,
        value,
    }
}

fn run_entry(
    base: &DealInputsBase,
    kind: StructureKind,
    overrides: &[StructurePatch],
) -> ComparisonEntry {
    let mut parameters = default_structure_parameters(kind, base);
    let mut warnings = Vec::new();

    let outcome = overrides
        .iter()
        .filter(|p| p.kind() == kind)
        .try_for_each(|p| parameters.apply_patch(p))
        .and_then(|_| model_structure(base, &parameters, &mut warnings));

    let (result, error) = match outcome {
        Ok(analysis) => (Some(analysis.result), None),
        Err(e) => {
            warn!(structure = %kind, error = %e, "structure failed during comparison");
            (None, Some(e.to_string()))
        }
    };

    ComparisonEntry {
        kind,
        label: kind.label().to_string(),
        parameters,
        result,
        error,
        warnings,
    }
}

/// Run each requested structure on the same deal and mark, per metric, the
/// structure with the unique best finite non-zero value.
///
/// Each kind starts from `default_structure_parameters` and then takes
/// every override patch of the same kind, in order. A structure that fails
/// is reported with its error; the others still run.
pub fn compare_structures(
    base: &DealInputsBase,
    kinds: &[StructureKind],
    overrides: &[StructurePatch],
) -> DealResult<ComputationOutput<ComparisonOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    base.validate(&mut warnings)?;

    let mut selected: Vec<StructureKind> = Vec::new();
    let requested: &[StructureKind] = if kinds.is_empty() {
        &StructureKind::ALL
    } else {
        kinds
    };
    for kind in requested {
        if !selected.contains(kind) {
            selected.push(*kind);
        }
    }

    for patch in overrides {
        if !selected.contains(&patch.kind()) {
            warnings.push(format!(
                "Override for {} ignored; structure not in the comparison",
                patch.kind()
            ));
        }
    }

    let entries: Vec<ComparisonEntry> = selected
        .iter()
        .map(|kind| run_entry(base, *kind, overrides))
        .collect();

    for e in entries.iter().filter(|e| e.error.is_some()) {
        warnings.push(format!(
            "{} failed: {}",
            e.label,
            e.error.as_deref().unwrap_or_default()
        ));
    }

    let winners = ComparisonMetric::ALL
        .iter()
        .map(|m| pick_winner(*m, &entries))
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Financing Structure Comparison",
        &serde_json::json!({
            "structures": selected,
            "num_overrides": overrides.len(),
            "winner_rule": "unique best finite non-zero value per metric",
        }),
        warnings,
        elapsed,
        ComparisonOutput { entries, winners },
    ))
}
