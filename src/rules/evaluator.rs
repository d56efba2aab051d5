//! Default operator implementations.

use super::context::Evaluating;
use super::result::{FailureType, RulesFailure, RulesResult};
use serde_json::Value;
use std::cmp::Ordering;

pub const EQUALS: &str = "equals";
pub const NOT_EQUALS: &str = "notEquals";
pub const GREATER_THAN: &str = "greaterThan";
pub const GREATER_EQUAL: &str = "greaterEqual";
pub const LESS_THAN: &str = "lessThan";
pub const LESS_EQUAL: &str = "lessEqual";
pub const CONTAINS: &str = "contains";
pub const NOT_CONTAINS: &str = "notContains";
pub const STARTS_WITH: &str = "startsWith";
pub const ENDS_WITH: &str = "endsWith";
pub const EXISTS: &str = "exists";
pub const NOT_EXIST: &str = "notExist";

/// Compares JSON values. Strings compare case-insensitively unless built with
/// [`ConditionEvaluator::case_sensitive`]; numbers compare as `f64`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionEvaluator {
    case_sensitive: bool,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive() -> Self {
        Self {
            case_sensitive: true,
        }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn fold(&self, value: &str) -> String {
        if self.case_sensitive {
            value.to_string()
        } else {
            value.to_lowercase()
        }
    }

    fn equals(&self, lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            (Value::String(l), Value::String(r)) => self.fold(l) == self.fold(r),
            (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
            _ => lhs == rhs,
        }
    }

    fn order(&self, lhs: &Value, operator: &str, rhs: &Value) -> Result<Ordering, RulesFailure> {
        lhs.as_f64()
            .zip(rhs.as_f64())
            .and_then(|(l, r)| l.partial_cmp(&r))
            .ok_or_else(|| {
                RulesFailure::new(
                    FailureType::TypeMismatched,
                    format!("'{}' needs numbers, got {} and {}", operator, lhs, rhs),
                )
            })
    }

    fn strings(
        &self,
        lhs: &Value,
        operator: &str,
        rhs: &Value,
    ) -> Result<(String, String), RulesFailure> {
        match (lhs, rhs) {
            (Value::String(l), Value::String(r)) => Ok((self.fold(l), self.fold(r))),
            _ => Err(RulesFailure::new(
                FailureType::TypeMismatched,
                format!("'{}' needs strings, got {} and {}", operator, lhs, rhs),
            )),
        }
    }
}

fn outcome(matched: bool, lhs: &Value, operator: &str, rhs: &Value) -> RulesResult {
    if matched {
        Ok(())
    } else {
        Err(RulesFailure::new(
            FailureType::ConditionFailed,
            format!("{} {} {} is false", lhs, operator, rhs),
        ))
    }
}

impl Evaluating for ConditionEvaluator {
    fn evaluate(&self, lhs: &Value, operator: &str, rhs: &Value) -> RulesResult {
        let matched = match operator {
            EQUALS => self.equals(lhs, rhs),
            NOT_EQUALS => !self.equals(lhs, rhs),
            GREATER_THAN => self.order(lhs, operator, rhs)? == Ordering::Greater,
            GREATER_EQUAL => self.order(lhs, operator, rhs)? != Ordering::Less,
            LESS_THAN => self.order(lhs, operator, rhs)? == Ordering::Less,
            LESS_EQUAL => self.order(lhs, operator, rhs)? != Ordering::Greater,
            CONTAINS => {
                let (l, r) = self.strings(lhs, operator, rhs)?;
                l.contains(&r)
            }
            NOT_CONTAINS => {
                let (l, r) = self.strings(lhs, operator, rhs)?;
                !l.contains(&r)
            }
            STARTS_WITH => {
                let (l, r) = self.strings(lhs, operator, rhs)?;
                l.starts_with(&r)
            }
            ENDS_WITH => {
                let (l, r) = self.strings(lhs, operator, rhs)?;
                l.ends_with(&r)
            }
            _ => {
                return Err(RulesFailure::new(
                    FailureType::Unknown,
                    format!("Unknown operator '{}'", operator),
                ))
            }
        };
        outcome(matched, lhs, operator, rhs)
    }

    fn evaluate_unary(&self, operator: &str, value: Option<&Value>) -> RulesResult {
        let present = value.map_or(false, |v| !v.is_null());
        let matched = match operator {
            EXISTS => present,
            NOT_EXIST => !present,
            _ => {
                return Err(RulesFailure::new(
                    FailureType::Unknown,
                    format!("Unknown unary operator '{}'", operator),
                ))
            }
        };

        if matched {
            Ok(())
        } else {
            Err(RulesFailure::new(
                FailureType::ConditionFailed,
                format!("{} is false for {:?}", operator, value),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind(result: RulesResult) -> Option<FailureType> {
        result.err().map(|failure| failure.kind)
    }

    #[test]
    fn test_equality_ignores_case_by_default() {
        let evaluator = ConditionEvaluator::default();
        assert!(evaluator.evaluate(&json!("Launch"), EQUALS, &json!("launch")).is_ok());
        assert!(evaluator.evaluate(&json!(3), EQUALS, &json!(3.0)).is_ok());
        assert!(evaluator.evaluate(&json!(true), NOT_EQUALS, &json!(false)).is_ok());
        assert!(evaluator.evaluate(&json!("3"), NOT_EQUALS, &json!(3)).is_ok());

        let strict = ConditionEvaluator::case_sensitive();
        assert_eq!(
            kind(strict.evaluate(&json!("Launch"), EQUALS, &json!("launch"))),
            Some(FailureType::ConditionFailed)
        );
    }

    #[test]
    fn test_numeric_ordering() {
        let evaluator = ConditionEvaluator::default();
        assert!(evaluator.evaluate(&json!(5), GREATER_THAN, &json!(4.5)).is_ok());
        assert!(evaluator.evaluate(&json!(5), GREATER_EQUAL, &json!(5)).is_ok());
        assert!(evaluator.evaluate(&json!(-1), LESS_THAN, &json!(0)).is_ok());
        assert!(evaluator.evaluate(&json!(2), LESS_EQUAL, &json!(2.0)).is_ok());
        assert_eq!(
            kind(evaluator.evaluate(&json!(1), GREATER_THAN, &json!(2))),
            Some(FailureType::ConditionFailed)
        );
        assert_eq!(
            kind(evaluator.evaluate(&json!("5"), GREATER_THAN, &json!(4))),
            Some(FailureType::TypeMismatched)
        );
    }

    #[test]
    fn test_string_operators() {
        let evaluator = ConditionEvaluator::default();
        let url = json!("https://Example.com/page");
        assert!(evaluator.evaluate(&url, CONTAINS, &json!("example")).is_ok());
        assert!(evaluator.evaluate(&url, NOT_CONTAINS, &json!("other")).is_ok());
        assert!(evaluator.evaluate(&url, STARTS_WITH, &json!("HTTPS://")).is_ok());
        assert!(evaluator.evaluate(&url, ENDS_WITH, &json!("/page")).is_ok());
        assert_eq!(
            kind(evaluator.evaluate(&json!(12), CONTAINS, &json!("1"))),
            Some(FailureType::TypeMismatched)
        );
    }

    #[test]
    fn test_unary_and_unknown_operators() {
        let evaluator = ConditionEvaluator::default();
        assert!(evaluator.evaluate_unary(EXISTS, Some(&json!(0))).is_ok());
        assert!(evaluator.evaluate_unary(NOT_EXIST, None).is_ok());
        assert!(evaluator.evaluate_unary(NOT_EXIST, Some(&Value::Null)).is_ok());
        assert_eq!(
            kind(evaluator.evaluate_unary(EXISTS, None)),
            Some(FailureType::ConditionFailed)
        );
        assert_eq!(
            kind(evaluator.evaluate_unary("maybe", None)),
            Some(FailureType::Unknown)
        );
        assert_eq!(
            kind(evaluator.evaluate(&json!(1), "around", &json!(1))),
            Some(FailureType::Unknown)
        );
    }
}
