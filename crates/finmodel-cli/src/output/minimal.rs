use serde_json::Value;

/// Print just the headline figure of the output.
///
/// Looks for well-known fields in priority order, then falls back to the
/// first field of the result.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "label",
        "enterprise_value",
        "tier",
        "worst_shock",
        "binomial",
        "closed_form",
        "npv",
        "probability_of_positive_npv",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        // Distress history: tier of the latest period, with the trend when known
        if let Some(tier) = map
            .get("scores")
            .and_then(Value::as_array)
            .and_then(|scores| scores.last())
            .and_then(|latest| latest.get("tier"))
        {
            match map.get("trend") {
                Some(trend) => println!("{} ({})", format_minimal(tier), format_minimal(trend)),
                None => println!("{}", format_minimal(tier)),
            }
            return;
        }

        // Simulation output keeps its headline inside `metrics`
        if let Some(p) = map
            .get("metrics")
            .and_then(|m| m.get("probability_of_positive_npv"))
        {
            println!("{}", format_minimal(p));
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
