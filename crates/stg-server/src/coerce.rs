//! Lenient parameter coercion.
//!
//! Agent callers routinely pass scalars as strings and structures as JSON
//! text. Every coercion records its failure instead of returning early, so
//! one `validation_failed` response enumerates every offending field.

use std::collections::HashMap;

use serde_json::Value;

use stg_domain::error::{Error, FieldError, Result};

/// Collects field diagnostics across a whole parameter set.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: &str, received: Option<&Value>) {
        self.errors.push(FieldError::new(
            field,
            message,
            received.map(render_received),
        ));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn collected diagnostics into one aggregated validation error.
    ///
    /// # Errors
    ///
    /// Returns `validation_failed` when any coercion failed.
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let fields: Vec<String> = self.errors.iter().map(|e| e.field.clone()).collect();
        Err(Error::validation(
            format!("invalid parameters: {}", fields.join(", ")),
            self.errors,
        ))
    }
}

fn render_received(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Boolean, accepting `true/false`, `1/0`, `"yes"/"no"` spellings.
pub fn opt_bool(errs: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<bool> {
    let value = value?;
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => {
                errs.push(field, "expected boolean (true/false/1/0/yes/no)", Some(value));
                None
            }
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => {
                errs.push(field, "expected boolean (true/false/1/0/yes/no)", Some(value));
                None
            }
        },
        _ => {
            errs.push(field, "expected boolean (true/false/1/0/yes/no)", Some(value));
            None
        }
    }
}

pub fn bool_or(errs: &mut FieldErrors, field: &str, value: Option<&Value>, default: bool) -> bool {
    opt_bool(errs, field, value).unwrap_or(default)
}

/// Unsigned integer, accepting numbers and decimal strings.
pub fn opt_u64(errs: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<u64> {
    let value = value?;
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            errs.push(field, "expected a non-negative integer", Some(value));
            None
        }),
        Value::String(s) => s.trim().parse::<u64>().map_or_else(
            |_| {
                errs.push(field, "expected a non-negative integer", Some(value));
                None
            },
            Some,
        ),
        _ => {
            errs.push(field, "expected a non-negative integer", Some(value));
            None
        }
    }
}

pub fn usize_or(errs: &mut FieldErrors, field: &str, value: Option<&Value>, default: usize) -> usize {
    opt_u64(errs, field, value).map_or(default, |v| v as usize)
}

pub fn opt_u16(errs: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<u16> {
    let raw = opt_u64(errs, field, value)?;
    u16::try_from(raw).map_or_else(
        |_| {
            errs.push(field, "expected a port number (0-65535)", value);
            None
        },
        Some,
    )
}

pub fn opt_i32(errs: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<i32> {
    let raw = opt_u64(errs, field, value)?;
    i32::try_from(raw).map_or_else(
        |_| {
            errs.push(field, "integer out of range", value);
            None
        },
        Some,
    )
}

/// Float, accepting numbers and decimal strings.
pub fn f32_or(errs: &mut FieldErrors, field: &str, value: Option<&Value>, default: f32) -> f32 {
    let Some(value) = value else { return default };
    match value {
        Value::Number(n) => n.as_f64().map_or_else(
            || {
                errs.push(field, "expected a number", Some(value));
                default
            },
            |f| f as f32,
        ),
        Value::String(s) => s.trim().parse::<f32>().unwrap_or_else(|_| {
            errs.push(field, "expected a number", Some(value));
            default
        }),
        _ => {
            errs.push(field, "expected a number", Some(value));
            default
        }
    }
}

pub fn opt_f32(errs: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<f32> {
    value.map(|v| f32_or(errs, field, Some(v), 0.0))
}

fn value_as_object(errs: &mut FieldErrors, field: &str, value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            _ => {
                errs.push(field, "expected an object or JSON object text", Some(value));
                None
            }
        },
        _ => {
            errs.push(field, "expected an object or JSON object text", Some(value));
            None
        }
    }
}

/// String map, accepting a native object or JSON object text; scalar values
/// are stringified.
pub fn opt_string_map(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<HashMap<String, String>> {
    let object = value_as_object(errs, field, value?)?;
    let Value::Object(map) = object else { return None };
    let mut out = HashMap::with_capacity(map.len());
    for (key, entry) in map {
        match entry {
            Value::String(s) => {
                out.insert(key, s);
            }
            Value::Bool(_) | Value::Number(_) => {
                out.insert(key, entry.to_string());
            }
            _ => errs.push(
                field,
                &format!("value for key '{key}' must be a scalar"),
                Some(&entry),
            ),
        }
    }
    Some(out)
}

pub fn string_map_or_default(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> HashMap<String, String> {
    opt_string_map(errs, field, value).unwrap_or_default()
}

/// Free-form map, accepting a native object or JSON object text.
pub fn opt_value_map(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<HashMap<String, Value>> {
    let object = value_as_object(errs, field, value?)?;
    match object {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}

/// String list, accepting a native array or JSON array text.
pub fn opt_string_list(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<Vec<String>> {
    let value = value?;
    let array = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => {
                errs.push(field, "expected a list or JSON array text", Some(value));
                return None;
            }
        },
        _ => {
            errs.push(field, "expected a list or JSON array text", Some(value));
            return None;
        }
    };
    let mut out = Vec::with_capacity(array.len());
    for item in array {
        match item {
            Value::String(s) => out.push(s),
            other => errs.push(field, "list entries must be strings", Some(&other)),
        }
    }
    Some(out)
}

/// Mission scope, accepting a native object or JSON object text.
pub fn scope_or_default(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> stg_domain::entities::MissionScope {
    let Some(value) = value else {
        return stg_domain::entities::MissionScope::default();
    };
    let Some(object) = value_as_object(errs, field, value) else {
        return stg_domain::entities::MissionScope::default();
    };
    serde_json::from_value(object).unwrap_or_else(|e| {
        errs.push(field, &format!("bad scope shape: {e}"), Some(value));
        stg_domain::entities::MissionScope::default()
    })
}

/// Authentication spec: `{"type":"basic",...}` or `{"type":"bearer",...}`.
pub fn opt_auth(
    errs: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<stg_application::AuthSpec> {
    let raw = value?;
    let object = value_as_object(errs, field, raw)?;
    let get = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_owned);
    match get("type").as_deref() {
        Some("basic") => match (get("username"), get("password")) {
            (Some(username), Some(password)) => {
                Some(stg_application::AuthSpec::Basic { username, password })
            }
            _ => {
                errs.push(field, "basic auth needs username and password", Some(raw));
                None
            }
        },
        Some("bearer") => match get("token") {
            Some(token) => Some(stg_application::AuthSpec::Bearer { token }),
            None => {
                errs.push(field, "bearer auth needs a token", Some(raw));
                None
            }
        },
        _ => {
            errs.push(field, "auth type must be 'basic' or 'bearer'", Some(raw));
            None
        }
    }
}

/// Tri-state action outcome: booleans, 0/1, yes/no spellings, or "unknown".
pub fn outcome(
    errs: &mut FieldErrors,
    field: &str,
    value: &Value,
) -> Option<stg_domain::entities::ActionOutcome> {
    use stg_domain::entities::ActionOutcome;
    match value {
        Value::Bool(true) => Some(ActionOutcome::Success),
        Value::Bool(false) => Some(ActionOutcome::Failure),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(ActionOutcome::Success),
            Some(0) => Some(ActionOutcome::Failure),
            _ => {
                errs.push(field, "expected true, false or unknown", Some(value));
                None
            }
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" | "success" => Some(ActionOutcome::Success),
            "false" | "0" | "no" | "failure" => Some(ActionOutcome::Failure),
            "unknown" => Some(ActionOutcome::Unknown),
            _ => {
                errs.push(field, "expected true, false or unknown", Some(value));
                None
            }
        },
        _ => {
            errs.push(field, "expected true, false or unknown", Some(value));
            None
        }
    }
}

/// Enum through the domain `FromStr` with its message as the diagnostic.
pub fn opt_enum<T>(errs: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw = value?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(message) => {
            errs.push(field, &message, Some(&Value::String(raw.to_owned())));
            None
        }
    }
}

pub fn enum_or<T>(errs: &mut FieldErrors, field: &str, value: Option<&str>, default: T) -> T
where
    T: std::str::FromStr<Err = String>,
{
    opt_enum(errs, field, value).unwrap_or(default)
}

/// Typed UUID identifier.
pub fn opt_id<T>(errs: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<T>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    let raw = value?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errs.push(
                field,
                "expected a UUID",
                Some(&Value::String(raw.to_owned())),
            );
            None
        }
    }
}

/// Required typed UUID identifier.
pub fn require_id<T>(errs: &mut FieldErrors, field: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    opt_id(errs, field, Some(value))
}
