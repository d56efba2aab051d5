//! Rule set holder and evaluator.
//!
//! The rule list is an immutable snapshot behind a mutex: mutators swap in a
//! new `Arc<Vec<_>>`, and `evaluate` clones the current `Arc` before running,
//! so an evaluation always sees one complete list.

use super::context::{Context, Evaluating, TokenFinder, Transforming};
use super::expression::Evaluable;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;

/// Anything with a root condition can be held by the engine.
pub trait Rule: Clone + Send + Sync {
    fn condition(&self) -> &Evaluable;
}

pub struct RulesEngine<R: Rule> {
    evaluator: Arc<dyn Evaluating>,
    transformer: Arc<dyn Transforming>,
    rules: Mutex<Arc<Vec<R>>>,
}

impl<R: Rule> std::fmt::Debug for RulesEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesEngine")
            .field("rule_count", &self.rules.lock().len())
            .finish()
    }
}

impl<R: Rule> RulesEngine<R> {
    pub fn new(evaluator: Arc<dyn Evaluating>, transformer: Arc<dyn Transforming>) -> Self {
        Self {
            evaluator,
            transformer,
            rules: Mutex::new(Arc::new(Vec::new())),
        }
    }

    pub fn transformer(&self) -> &dyn Transforming {
        self.transformer.as_ref()
    }

    /// Rules whose condition holds, in list order.
    pub fn evaluate(&self, token_finder: &dyn TokenFinder) -> Vec<R> {
        let snapshot = self.rules();
        let context = Context::new(
            token_finder,
            self.evaluator.as_ref(),
            self.transformer.as_ref(),
        );

        snapshot
            .iter()
            .filter(|rule| match rule.condition().evaluate(&context) {
                Ok(()) => true,
                Err(failure) => {
                    debug!("Rule not matched: {}", failure);
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// `None` leaves the current rules in place.
    pub fn replace_rules(&self, rules: Option<Vec<R>>) {
        let Some(rules) = rules else {
            return;
        };
        *self.rules.lock() = Arc::new(rules);
    }

    pub fn add_rules(&self, rules: Vec<R>) {
        let mut current = self.rules.lock();
        let mut next = Vec::with_capacity(current.len() + rules.len());
        next.extend(current.iter().cloned());
        next.extend(rules);
        *current = Arc::new(next);
    }

    /// The current snapshot.
    pub fn rules(&self) -> Arc<Vec<R>> {
        Arc::clone(&self.rules.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::evaluator::ConditionEvaluator;
    use crate::rules::operand::Operand;
    use crate::rules::transformer::Transformer;
    use serde_json::{json, Map, Value};

    #[derive(Clone, Debug)]
    struct TestRule {
        id: &'static str,
        condition: Evaluable,
    }

    impl Rule for TestRule {
        fn condition(&self) -> &Evaluable {
            &self.condition
        }
    }

    fn rule(id: &'static str, key: &str, expected: &str) -> TestRule {
        TestRule {
            id,
            condition: Evaluable::comparison(
                Operand::token(&format!("{{{{{}}}}}", key)),
                "equals",
                Operand::literal(expected),
            ),
        }
    }

    fn engine() -> RulesEngine<TestRule> {
        RulesEngine::new(
            Arc::new(ConditionEvaluator::default()),
            Arc::new(Transformer::with_defaults()),
        )
    }

    fn ids(rules: &[TestRule]) -> Vec<&'static str> {
        rules.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_evaluate_keeps_list_order() {
        let engine = engine();
        engine.replace_rules(Some(vec![
            rule("first", "type", "launch"),
            rule("second", "type", "close"),
            rule("third", "source", "os"),
        ]));

        let data: Map<String, Value> = json!({"type": "launch", "source": "os"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(ids(&engine.evaluate(&data)), vec!["first", "third"]);
    }

    #[test]
    fn test_replace_with_none_is_a_no_op() {
        let engine = engine();
        engine.replace_rules(Some(vec![rule("kept", "type", "launch")]));
        engine.replace_rules(None);
        assert_eq!(ids(&engine.rules()), vec!["kept"]);

        engine.replace_rules(Some(Vec::new()));
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_add_rules_appends() {
        let engine = engine();
        engine.add_rules(vec![rule("a", "type", "x")]);
        engine.add_rules(vec![rule("b", "type", "y"), rule("c", "type", "z")]);
        assert_eq!(ids(&engine.rules()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let engine = engine();
        engine.replace_rules(Some(vec![rule("old", "type", "x")]));
        let snapshot = engine.rules();

        engine.replace_rules(Some(vec![rule("new", "type", "x")]));
        assert_eq!(ids(&snapshot), vec!["old"]);
        assert_eq!(ids(&engine.rules()), vec!["new"]);
    }
}
