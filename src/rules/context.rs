//! Collaborators an evaluation runs against.

use super::result::RulesResult;
use serde_json::{Map, Value};

/// Resolves token paths (`a.b.c`, `~type`) to values.
pub trait TokenFinder {
    fn get(&self, key: &str) -> Option<Value>;
}

/// Dot-path lookup. A literal key containing dots wins over a nested path.
impl TokenFinder for Map<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = Map::get(self, key) {
            return Some(value.clone());
        }

        let mut segments = key.split('.');
        let mut current = Map::get(self, segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }
}

/// Implements the operators named in conditions.
pub trait Evaluating: Send + Sync {
    fn evaluate(&self, lhs: &Value, operator: &str, rhs: &Value) -> RulesResult;

    /// `value` is `None` when the operand did not resolve.
    fn evaluate_unary(&self, operator: &str, value: Option<&Value>) -> RulesResult;
}

/// Named value transformations applied by `{{fn(path)}}` tokens.
pub trait Transforming: Send + Sync {
    fn transform(&self, name: &str, value: Option<Value>) -> Option<Value>;
}

/// Everything one evaluation pass needs, by reference.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub token_finder: &'a dyn TokenFinder,
    pub evaluator: &'a dyn Evaluating,
    pub transformer: &'a dyn Transforming,
}

impl<'a> Context<'a> {
    pub fn new(
        token_finder: &'a dyn TokenFinder,
        evaluator: &'a dyn Evaluating,
        transformer: &'a dyn Transforming,
    ) -> Self {
        Self {
            token_finder,
            evaluator,
            transformer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_finder_walks_nested_objects() {
        let data = json!({"xdm": {"web": {"url": "https://example.com"}}, "flat.key": 1});
        let map = data.as_object().unwrap();

        assert_eq!(
            TokenFinder::get(map, "xdm.web.url"),
            Some(json!("https://example.com"))
        );
        assert_eq!(TokenFinder::get(map, "flat.key"), Some(json!(1)));
        assert_eq!(TokenFinder::get(map, "xdm.missing"), None);
        assert_eq!(TokenFinder::get(map, "xdm.web.url.deeper"), None);
    }
}
