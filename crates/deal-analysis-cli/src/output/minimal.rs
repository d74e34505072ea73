use serde_json::Value;

use super::{envelope_result, scalar_text};

/// Print just the key answer value from the output.
///
/// Comparisons print one `metric: winner` line per metric; everything else
/// prints the first populated headline field.
pub fn print_minimal(value: &Value) {
    for line in minimal_lines(envelope_result(value)) {
        println!("{}", line);
    }
}

fn minimal_lines(result: &Value) -> Vec<String> {
    if let Some(Value::Array(winners)) = result.get("winners") {
        return winners
            .iter()
            .map(|w| {
                let metric = w.get("metric").map(scalar_text).unwrap_or_default();
                let winner = w.get("winner").map(scalar_text).unwrap_or_default();
                format!("{metric}: {winner}")
            })
            .collect();
    }

    // Structure analyses nest the headline metrics one level down.
    let headline = match result.get("result") {
        Some(inner @ Value::Object(_)) => inner,
        _ => result,
    };

    let priority_keys = ["irr", "lp_irr", "gp_irr", "equity_multiple", "cash_on_cash"];

    if let Value::Object(map) = headline {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    return vec![scalar_text(val)];
                }
            }
        }

        if let Some((row, col)) = base_case(headline) {
            if let Some(cell) = map
                .get("cells")
                .and_then(|c| c.get(row))
                .and_then(|r| r.get(col))
                .and_then(|c| c.get("value"))
            {
                return minimal_lines(cell);
            }
        }

        if let Some((key, val)) = map.iter().next() {
            return vec![format!("{}: {}", key, scalar_text(val))];
        }
    }

    vec![scalar_text(headline)]
}

fn base_case(grid: &Value) -> Option<(usize, usize)> {
    let pos = grid.get("base_case_position")?.as_array()?;
    let row = pos.first()?.as_u64()? as usize;
    let col = pos.get(1)?.as_u64()? as usize;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_prints_irr() {
        let analysis = json!({"result": {"irr": "0.2412", "dscr": {"finite": "1.49"}}});
        assert_eq!(minimal_lines(&analysis), vec!["0.2412"]);
    }

    #[test]
    fn test_missing_irr_falls_through() {
        let promote = json!({"lp_irr": null, "gp_irr": "0.31"});
        assert_eq!(minimal_lines(&promote), vec!["0.31"]);
    }

    #[test]
    fn test_comparison_prints_winners() {
        let out = json!({"entries": [], "winners": [
            {"metric": "irr", "winner": "bridge_refi"},
            {"metric": "dscr", "winner": null}
        ]});
        assert_eq!(minimal_lines(&out), vec!["irr: bridge_refi", "dscr: n/a"]);
    }

    #[test]
    fn test_grid_prints_base_cell() {
        let grid = json!({
            "cells": [[{"value": {"irr": "0.1"}}, {"value": {"irr": "0.2"}}]],
            "base_case_position": [0, 1]
        });
        assert_eq!(minimal_lines(&grid), vec!["0.2"]);
    }
}
