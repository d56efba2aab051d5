//! Named value transformations for `{{name(path)}}` tokens.

use super::context::Transforming;
use log::debug;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const INT: &str = "int";
pub const DOUBLE: &str = "double";
pub const STRING: &str = "string";
pub const BOOL: &str = "bool";

pub type Transformation = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// Registry of transformations. Unregistered names pass values through.
#[derive(Clone, Default)]
pub struct Transformer {
    transformations: HashMap<String, Transformation>,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.transformations.keys().collect();
        names.sort();
        f.debug_struct("Transformer").field("names", &names).finish()
    }
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `int`, `double`, `string` and `bool` conversions.
    pub fn with_defaults() -> Self {
        let mut transformer = Self::new();
        transformer.register(INT, |value| value.map(to_int));
        transformer.register(DOUBLE, |value| value.map(to_double));
        transformer.register(STRING, |value| value.map(to_string));
        transformer.register(BOOL, |value| value.map(to_bool));
        transformer
    }

    pub fn register<F>(&mut self, name: impl Into<String>, transformation: F)
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.transformations
            .insert(name.into(), Arc::new(transformation));
    }
}

impl Transforming for Transformer {
    fn transform(&self, name: &str, value: Option<Value>) -> Option<Value> {
        match self.transformations.get(name) {
            Some(transformation) => transformation(value),
            None => {
                debug!("No transformation named '{}', passing value through", name);
                value
            }
        }
    }
}

// Conversions keep the original value when it cannot be converted.

fn to_int(value: Value) -> Value {
    let converted = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    converted.map(Value::from).unwrap_or(value)
}

fn to_double(value: Value) -> Value {
    let converted = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    converted
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(value)
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        other => Value::String(other.to_string()),
    }
}

fn to_bool(value: Value) -> Value {
    match &value {
        Value::String(s) => Value::Bool(s.trim().eq_ignore_ascii_case("true")),
        Value::Number(n) => Value::Bool(n.as_f64() == Some(1.0)),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_transformation() {
        let transformer = Transformer::with_defaults();
        assert_eq!(transformer.transform(INT, Some(json!("12"))), Some(json!(12)));
        assert_eq!(transformer.transform(INT, Some(json!("3.9"))), Some(json!(3)));
        assert_eq!(transformer.transform(INT, Some(json!(7.2))), Some(json!(7)));
        assert_eq!(transformer.transform(INT, Some(json!(true))), Some(json!(1)));
        assert_eq!(transformer.transform(INT, Some(json!("abc"))), Some(json!("abc")));
        assert_eq!(transformer.transform(INT, None), None);
    }

    #[test]
    fn test_double_string_and_bool_transformations() {
        let transformer = Transformer::with_defaults();
        assert_eq!(transformer.transform(DOUBLE, Some(json!("2.5"))), Some(json!(2.5)));
        assert_eq!(transformer.transform(DOUBLE, Some(json!(2))), Some(json!(2.0)));
        assert_eq!(transformer.transform(STRING, Some(json!(42))), Some(json!("42")));
        assert_eq!(transformer.transform(STRING, Some(json!("x"))), Some(json!("x")));
        assert_eq!(transformer.transform(BOOL, Some(json!("TRUE"))), Some(json!(true)));
        assert_eq!(transformer.transform(BOOL, Some(json!("no"))), Some(json!(false)));
        assert_eq!(transformer.transform(BOOL, Some(json!(0))), Some(json!(false)));
    }

    #[test]
    fn test_unknown_and_custom_names() {
        let mut transformer = Transformer::new();
        assert_eq!(transformer.transform("urlenc", Some(json!("a b"))), Some(json!("a b")));

        transformer.register("urlenc", |value| {
            value.and_then(|v| v.as_str().map(|s| json!(s.replace(' ', "%20"))))
        });
        assert_eq!(transformer.transform("urlenc", Some(json!("a b"))), Some(json!("a%20b")));
    }
}
