pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => json::print_json(value)?,
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value)?,
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
    Ok(())
}

/// Render a leaf value as text.
///
/// Ratios arrive as `{"finite": "1.25"}`, `"infinite"` or `"undefined"`;
/// the finite form collapses to its number.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "n/a".to_string(),
        Value::Object(map) => match map.get("finite") {
            Some(inner) if map.len() == 1 => scalar_text(inner),
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
        Value::Array(arr) => arr.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
    }
}

/// True for values printed in a single cell.
pub(crate) fn is_leaf(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.len() == 1 && map.contains_key("finite"),
        Value::Array(arr) => arr.iter().all(|v| !v.is_object() && !v.is_array()),
        _ => true,
    }
}

/// Flatten nested objects into `parent.child` keys; arrays of objects are left out.
pub(crate) fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if is_leaf(val) {
            out.push((path, scalar_text(val)));
        } else if let Value::Object(inner) = val {
            flatten(&path, inner, out);
        }
    }
}

/// The innermost `result` object of an envelope.
///
/// Structure analyses nest the metrics one level deeper (`result.result`),
/// so only the outer envelope is peeled here.
pub(crate) fn envelope_result(value: &Value) -> &Value {
    value
        .as_object()
        .filter(|m| m.contains_key("methodology"))
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ratio_renders_as_number() {
        assert_eq!(scalar_text(&json!({"finite": "1.25"})), "1.25");
        assert_eq!(scalar_text(&json!("infinite")), "infinite");
        assert_eq!(scalar_text(&Value::Null), "n/a");
    }

    #[test]
    fn test_flatten_skips_object_arrays() {
        let value = json!({
            "irr": "0.12",
            "dscr": {"finite": "1.4"},
            "details": {"kind": "conventional", "loan_amount": "700000"},
            "projections": [{"year": 1}]
        });
        let mut out = Vec::new();
        flatten("", value.as_object().unwrap(), &mut out);
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["details.kind", "details.loan_amount", "dscr", "irr"]
        );
    }

    #[test]
    fn test_envelope_result_peels_once() {
        let value = json!({"methodology": "m", "result": {"result": {"irr": "0.1"}}});
        assert!(envelope_result(&value).get("result").is_some());
    }
}
