pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Row collections worth tabulating, in lookup order.
pub(crate) const ROW_KEYS: [&str; 8] = [
    "periods",
    "scores",
    "samples",
    "impacts",
    "sweeps",
    "summaries",
    "classifiers",
    "flows",
];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("JSON serialization error: {e}"),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The result body: the `result` member of an output envelope, or the value itself.
pub(crate) fn body(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// First non-empty array of objects under one of [`ROW_KEYS`].
pub(crate) fn rows(value: &Value) -> Option<(&'static str, &Vec<Value>)> {
    let map = body(value).as_object()?;
    ROW_KEYS.iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(arr)) if arr.first().is_some_and(Value::is_object) => Some((*key, arr)),
        _ => None,
    })
}
