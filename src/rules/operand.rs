use super::context::Context;
use super::template::Template;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type OperandFn = dyn Fn(&Context<'_>) -> Option<Value> + Send + Sync;

/// A value computed from the context at evaluation time.
#[derive(Clone)]
pub struct OperandFunction {
    name: String,
    function: Arc<OperandFn>,
}

impl OperandFunction {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Context<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, context: &Context<'_>) -> Option<Value> {
        (self.function)(context)
    }
}

impl fmt::Debug for OperandFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperandFunction")
            .field("name", &self.name)
            .finish()
    }
}

/// One side of a comparison.
#[derive(Clone, Debug)]
pub enum Operand {
    Literal(Value),
    /// Parsed once, resolved on every evaluation
    Token(Template),
    Function(OperandFunction),
    Empty,
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn token(template: &str) -> Self {
        Operand::Token(Template::parse(template))
    }

    pub fn function<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Context<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Operand::Function(OperandFunction::new(name, function))
    }

    /// A template that is exactly one token keeps the raw resolved value;
    /// anything else renders to a string.
    pub fn resolve(&self, context: &Context<'_>) -> Option<Value> {
        match self {
            Operand::Literal(value) => Some(value.clone()),
            Operand::Token(template) => match template.single_token() {
                Some(token) => token.resolve(context.token_finder, context.transformer),
                None => Some(Value::String(
                    template.render(context.token_finder, context.transformer),
                )),
            },
            Operand::Function(function) => function.call(context),
            Operand::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::evaluator::ConditionEvaluator;
    use crate::rules::transformer::Transformer;
    use serde_json::{json, Map};

    #[test]
    fn test_resolve_variants() {
        let data: Map<String, Value> =
            json!({"count": 7, "name": "x"}).as_object().cloned().unwrap();
        let evaluator = ConditionEvaluator::default();
        let transformer = Transformer::with_defaults();
        let context = Context::new(&data, &evaluator, &transformer);

        assert_eq!(Operand::literal(5).resolve(&context), Some(json!(5)));
        assert_eq!(Operand::token("{{count}}").resolve(&context), Some(json!(7)));
        assert_eq!(
            Operand::token("{{name}}-{{count}}").resolve(&context),
            Some(json!("x-7"))
        );
        assert_eq!(Operand::token("{{missing}}").resolve(&context), None);
        assert_eq!(
            Operand::function("double_count", |ctx| {
                ctx.token_finder
                    .get("count")
                    .and_then(|v| v.as_i64())
                    .map(|n| json!(n * 2))
            })
            .resolve(&context),
            Some(json!(14))
        );
        assert_eq!(Operand::Empty.resolve(&context), None);
    }
}
