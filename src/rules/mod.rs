//! Rules evaluation.
//!
//! Conditions are an [`Evaluable`] tree of comparisons, logical groups and
//! unary checks over [`Operand`]s. Operands that are `{{token}}` templates are
//! parsed once and resolved on every evaluation through a [`TokenFinder`] and a
//! [`Transforming`]; the operators themselves come from an [`Evaluating`].
//! [`RulesEngine`] holds the rule list as a swappable snapshot.

pub mod context;
pub mod engine;
pub mod evaluator;
pub mod expression;
pub mod json;
pub mod operand;
pub mod result;
pub mod template;
pub mod token;
pub mod token_finder;
pub mod transformer;

pub use context::{Context, Evaluating, TokenFinder, Transforming};
pub use engine::{Rule, RulesEngine};
pub use evaluator::ConditionEvaluator;
pub use expression::Evaluable;
pub use json::{parse_rules, LaunchRule, RuleConsequence};
pub use operand::{Operand, OperandFunction};
pub use result::{FailureType, RulesFailure, RulesResult};
pub use template::{DelimiterPair, Segment, Template, TemplateParser};
pub use token::MustacheToken;
pub use token_finder::EventTokenFinder;
pub use transformer::Transformer;
