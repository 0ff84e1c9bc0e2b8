use serde_json::Value;

/// Masks payment credentials and customer contact details in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_secret_field(key) {
                    Value::String("****".to_string())
                } else if is_contact_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_secret_field(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("signature")
        || key.contains("secret")
        || key.contains("password")
        || key.contains("token")
        || key.contains("card")
        || key.contains("cvv")
        || matches!(key.as_str(), "api_key" | "authorization")
}

fn is_contact_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "phone" | "customerphone" | "email" | "customeremail" | "shippingaddress" | "address"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let start: String = s.chars().take(2).collect();
            let end: String = s.chars().rev().take(2).collect::<Vec<_>>().into_iter().rev().collect();
            Value::String(format!("{}****{}", start, end))
        }
        _ => Value::String("****".to_string()),
    }
}
