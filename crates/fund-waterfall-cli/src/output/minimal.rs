use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let priority_keys = [
        "clawback_exposure",
        "accrued_carry",
        "total_to_gp",
        "irr",
        "tvpi",
        "moic",
    ];

    if let Value::Object(map) = value {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(value));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // IRR outcomes: {"Computed": "0.14"} or {"Unavailable": reason}
        Value::Object(map) if map.len() == 1 => match map.iter().next() {
            Some((tag, inner)) if tag == "Computed" => format_minimal(inner),
            Some((tag, inner)) if tag == "Unavailable" => {
                format!("unavailable ({})", format_minimal(inner))
            }
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
