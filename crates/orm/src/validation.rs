//! Hooks for the external validation collaborator
//!
//! Rule execution lives outside this crate. The core only reads the declared
//! rules, runs get rules after a fetch and keeps the `validated`/`valid` flags.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::ModelInstance;

/// Runs save rules against an instance
pub trait ValidationHook {
    /// Returns whether the instance passed
    fn validate(&self, instance: &ModelInstance) -> ModelResult<bool>;
}

impl<F> ValidationHook for F
where
    F: Fn(&ModelInstance) -> ModelResult<bool>,
{
    fn validate(&self, instance: &ModelInstance) -> ModelResult<bool> {
        self(instance)
    }
}

/// Custom get rules, consulted for any rule the core does not know
pub trait GetRuleHandler: Send + Sync {
    /// Transformed value, or `None` if the rule is not handled here
    fn apply(&self, rule: &str, field: &str, value: &Value) -> Option<Value>;
}

/// Apply one of the built-in get rules; `None` for unknown rules
pub fn builtin_get_rule(rule: &str, value: &Value) -> Option<Value> {
    let transformed = match rule {
        "intval" => Value::from(int_value(value)),
        "floatval" => float_value(value)
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or_else(|| Value::from(0)),
        "boolval" => Value::Bool(truthy(value)),
        "strval" => Value::String(string_value(value)),
        "trim" => match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other.clone(),
        },
        _ => return None,
    };
    Some(transformed)
}

fn int_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => leading_number(s)
            .and_then(|n| n.parse::<f64>().ok())
            .map(|f| f.trunc() as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => leading_number(s).and_then(|n| n.parse().ok()),
        _ => None,
    }
}

/// The numeric prefix of a string, like `"42abc"` -> `"42"`
fn leading_number(s: &str) -> Option<&str> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if seen_digit {
        Some(s[..end].trim_end_matches('.'))
    } else {
        None
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(crate) fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        other => other.to_string(),
    }
}
