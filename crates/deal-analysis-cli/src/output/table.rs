use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{envelope_result, flatten, is_leaf, scalar_text};

/// Format output as tables using the tabled crate.
///
/// Scalar fields go in one Field/Value table; every array of records
/// (projections, yearly distributions, comparison entries) gets its own.
pub fn print_table(value: &Value) {
    let result = envelope_result(value);
    match result {
        Value::Object(map) if map.contains_key("cells") => print_grid(map),
        Value::Object(map) => print_record(map),
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", scalar_text(result)),
    }

    if let Some(envelope) = value.as_object() {
        print_footer(envelope);
    }
}

fn print_record(map: &Map<String, Value>) {
    // Structure analyses keep their headline metrics under `result`.
    let headline = match map.get("result") {
        Some(Value::Object(inner)) => inner,
        _ => map,
    };

    let mut fields = Vec::new();
    flatten("", headline, &mut fields);
    if !fields.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in &fields {
            builder.push_record([key.as_str(), val.as_str()]);
        }
        println!("{}", Table::from(builder));
    }

    print_nested_tables(headline);
    if !std::ptr::eq(headline, map) {
        print_nested_tables(map);
    }
}

fn print_nested_tables(map: &Map<String, Value>) {
    for (key, val) in map {
        if let Value::Array(rows) = val {
            if rows.first().is_some_and(Value::is_object) {
                println!("\n{}:", key);
                print_array_table(rows);
            }
        }
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let mut headers = Vec::new();
        flatten("", first, &mut headers);
        let headers: Vec<String> = headers.into_iter().map(|(k, _)| k).collect();

        let mut builder = Builder::default();
        builder.push_record(headers.iter().map(String::as_str));
        for item in arr {
            if let Value::Object(map) = item {
                let mut cells = Vec::new();
                flatten("", map, &mut cells);
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        cells
                            .iter()
                            .find(|(k, _)| k == h)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    })
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", scalar_text(item));
        }
    }
}

/// Exit cap rates down the side, rent growth across the top.
fn print_grid(map: &Map<String, Value>) {
    let rates = |key: &str| -> Vec<String> {
        map.get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(scalar_text).collect())
            .unwrap_or_default()
    };
    let cap_rates = rates("exit_cap_rates");
    let growth_rates = rates("rent_growth_rates");

    let mut builder = Builder::default();
    let mut header = vec!["exit cap \\ rent growth".to_string()];
    header.extend(growth_rates);
    builder.push_record(header);

    let rows = map.get("cells").and_then(Value::as_array);
    for (cap, row) in cap_rates.iter().zip(rows.into_iter().flatten()) {
        let mut record = vec![cap.clone()];
        for cell in row.as_array().into_iter().flatten() {
            record.push(grid_cell_text(cell));
        }
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

fn grid_cell_text(cell: &Value) -> String {
    let marker = if cell.get("is_base_case").and_then(Value::as_bool) == Some(true) {
        "*"
    } else {
        ""
    };
    match (cell.get("value"), cell.get("error")) {
        (Some(Value::Object(value)), _) => {
            let parts: Vec<String> = value
                .iter()
                .filter(|(_, v)| is_leaf(v))
                .map(|(k, v)| format!("{k}={}", scalar_text(v)))
                .collect();
            format!("{marker}{}", parts.join(" "))
        }
        (_, Some(err)) => format!("{marker}error: {}", scalar_text(err)),
        _ => marker.to_string(),
    }
}

fn print_footer(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
