//! Parameter schema validation
//!
//! Tools describe their parameters with the object-schema subset the
//! reasoning service understands: `type: object`, `properties` with typed
//! entries, and a `required` list. Schemas are checked structurally at
//! registration time; parameters are checked against the schema before the
//! capability body ever runs.

use serde_json::Value;

/// Check that a schema is a well-formed object schema.
///
/// Returns a human-readable problem description on violation.
pub fn check_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;

    match obj.get("type").and_then(|t| t.as_str()) {
        Some("object") => {}
        Some(other) => return Err(format!("schema type must be 'object', got '{}'", other)),
        None => return Err("schema is missing 'type'".to_string()),
    }

    if let Some(properties) = obj.get("properties") {
        let properties = properties
            .as_object()
            .ok_or_else(|| "'properties' must be an object".to_string())?;
        for (name, prop) in properties {
            let prop_type = prop
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| format!("property '{}' is missing a type", name))?;
            if !matches!(
                prop_type,
                "string" | "integer" | "number" | "boolean" | "array" | "object"
            ) {
                return Err(format!(
                    "property '{}' has unsupported type '{}'",
                    name, prop_type
                ));
            }
        }
    }

    if let Some(required) = obj.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| "'required' must be an array".to_string())?;
        for entry in required {
            if !entry.is_string() {
                return Err("'required' entries must be strings".to_string());
            }
        }
    }

    Ok(())
}

/// Validate params against an object schema.
///
/// Returns a descriptive message on the first violation found.
pub fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    let params_obj = params
        .as_object()
        .ok_or_else(|| "parameters must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !params_obj.contains_key(field) {
                return Err(format!("missing required parameter '{}'", field));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, value) in params_obj {
            let Some(prop) = properties.get(name) else {
                return Err(format!("unknown parameter '{}'", name));
            };
            let Some(expected) = prop.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "parameter '{}' should be of type {}",
                    name, expected
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => false,
    }
}
