use serde_json::{Map, Value};
use std::io;

use super::{envelope_result, flatten, scalar_text};

/// Write output as CSV to stdout.
///
/// Sensitivity grids come out long-form (one row per cell) and
/// comparisons one row per structure; anything else is a two-column
/// field/value listing. A closed pipe or full disk surfaces as an error.
pub fn print_csv(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    write_csv(stdout.lock(), value)?;
    Ok(())
}

fn write_csv<W: io::Write>(out: W, value: &Value) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    let rows = match envelope_result(value) {
        Value::Object(map) => csv_rows(map),
        Value::Array(arr) => records(arr),
        other => vec![vec![scalar_text(other)]],
    };
    for row in rows {
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn csv_rows(map: &Map<String, Value>) -> Vec<Vec<String>> {
    if let Some(Value::Array(cells)) = map.get("cells") {
        let flat: Vec<Value> = cells
            .iter()
            .filter_map(Value::as_array)
            .flatten()
            .cloned()
            .collect();
        return records(&flat);
    }
    if let Some(Value::Array(entries)) = map.get("entries") {
        return records(entries);
    }

    let mut fields = Vec::new();
    flatten("", map, &mut fields);
    let mut rows = vec![vec!["field".to_string(), "value".to_string()]];
    rows.extend(fields.into_iter().map(|(k, v)| vec![k, v]));
    rows
}

/// Header row from the union of flattened keys, then one row per record.
fn records(arr: &[Value]) -> Vec<Vec<String>> {
    let flattened: Vec<Vec<(String, String)>> = arr
        .iter()
        .map(|item| {
            let mut out = Vec::new();
            match item {
                Value::Object(map) => flatten("", map, &mut out),
                other => out.push(("value".to_string(), scalar_text(other))),
            }
            out
        })
        .collect();

    let mut headers: Vec<String> = Vec::new();
    for row in &flattened {
        for (key, _) in row {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut rows = vec![headers.clone()];
    for row in &flattened {
        rows.push(
            headers
                .iter()
                .map(|h| {
                    row.iter()
                        .find(|(k, _)| k == h)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect(),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grid_is_long_form() {
        let grid = json!({
            "exit_cap_rates": ["0.055", "0.06"],
            "rent_growth_rates": ["0.03"],
            "cells": [
                [{"exit_cap_rate": "0.055", "rent_growth": "0.03", "is_base_case": false,
                  "value": {"irr": "0.14", "equity_multiple": {"finite": "1.9"}}}],
                [{"exit_cap_rate": "0.06", "rent_growth": "0.03", "is_base_case": true,
                  "error": "bad cap"}]
            ],
            "base_case_position": [1, 0],
            "failed_cells": 1
        });
        let rows = csv_rows(grid.as_object().unwrap());
        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains(&"value.irr".to_string()));
        assert!(rows[0].contains(&"error".to_string()));
        let err_col = rows[0].iter().position(|h| h == "error").unwrap();
        assert_eq!(rows[2][err_col], "bad cap");
        assert_eq!(rows[1][err_col], "");
    }

    #[test]
    fn test_plain_result_is_field_value() {
        let rows = csv_rows(json!({"irr": "0.1"}).as_object().unwrap());
        assert_eq!(rows, vec![vec!["field", "value"], vec!["irr", "0.1"]]);
    }

    #[test]
    fn test_write_errors_propagate() {
        struct Closed;
        impl io::Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = write_csv(Closed, &json!({"result": {"irr": "0.1"}})).unwrap_err();
        assert!(err.to_string().contains("pipe closed"));
    }
}
