use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{body, rows};

/// Format output as tables: headline fields, then the main row collection.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(envelope) => {
            let result = body(value);
            if let Value::Object(map) = result {
                print_fields(map);
            }
            if let Some((key, arr)) = rows(value) {
                println!("\n{key}:");
                print_array_table(arr);
            }
            print_narrative(result);
            print_notes(envelope, result);
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{value}"),
    }
}

/// Scalar fields and one level of nested objects, as dotted keys.
fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (sub, v) in inner {
                    if !v.is_object() {
                        builder.push_record([format!("{key}.{sub}"), format_value(v)]);
                    }
                }
            }
            Value::Array(arr) if arr.iter().any(|v| v.is_object() || v.is_array()) => {
                builder.push_record([key.clone(), format!("[{} items]", arr.len())]);
            }
            _ => builder.push_record([key.clone(), format_value(val)]),
        }
    }
    println!("{}", Table::from(builder));
}

fn print_narrative(result: &Value) {
    if let Some(Value::Array(lines)) = result.get("interpretation") {
        if !lines.is_empty() {
            println!("\nInterpretation:");
            for line in lines.iter().filter_map(Value::as_str) {
                println!("  {line}");
            }
        }
    }
    if let Some(Value::Array(recs)) = result.get("recommendations") {
        if !recs.is_empty() {
            println!("\nRecommendations:");
            for rec in recs {
                let priority = rec.get("priority").and_then(Value::as_str).unwrap_or("-");
                let message = rec.get("message").and_then(Value::as_str).unwrap_or_default();
                println!("  [{priority}] {message}");
            }
        }
    }
}

fn print_notes(envelope: &Map<String, Value>, result: &Value) {
    let warnings = envelope
        .get("warnings")
        .or_else(|| result.get("warnings"))
        .and_then(Value::as_array);
    if let Some(warnings) = warnings {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first
            .iter()
            .filter(|(_, v)| !v.is_object() && !v.is_array())
            .map(|(k, _)| k.clone())
            .collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);
        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
