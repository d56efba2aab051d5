//! Condition expression tree.

use super::context::Context;
use super::operand::Operand;
use super::result::{FailureType, RulesFailure, RulesResult};

#[derive(Clone, Debug)]
pub enum Evaluable {
    /// `lhs <operator> rhs`; both sides must resolve
    Comparison {
        lhs: Operand,
        operator: Option<String>,
        rhs: Operand,
    },
    /// `and` / `or` over children, short-circuiting; `None` children are skipped
    Logical {
        operator: Option<String>,
        operands: Vec<Option<Evaluable>>,
    },
    /// `<operator> lhs`; an unresolved lhs is passed through to the evaluator
    Unary {
        lhs: Operand,
        operator: Option<String>,
    },
}

impl Evaluable {
    pub fn comparison(lhs: Operand, operator: impl Into<String>, rhs: Operand) -> Self {
        Evaluable::Comparison {
            lhs,
            operator: Some(operator.into()),
            rhs,
        }
    }

    pub fn logical(operator: impl Into<String>, operands: Vec<Evaluable>) -> Self {
        Evaluable::Logical {
            operator: Some(operator.into()),
            operands: operands.into_iter().map(Some).collect(),
        }
    }

    pub fn unary(lhs: Operand, operator: impl Into<String>) -> Self {
        Evaluable::Unary {
            lhs,
            operator: Some(operator.into()),
        }
    }

    pub fn evaluate(&self, context: &Context<'_>) -> RulesResult {
        match self {
            Evaluable::Comparison { lhs, operator, rhs } => {
                let operator = operator.as_deref().ok_or_else(|| {
                    RulesFailure::new(
                        FailureType::MissingOperator,
                        "Comparison has no operator",
                    )
                })?;
                match (lhs.resolve(context), rhs.resolve(context)) {
                    (Some(lhs), Some(rhs)) => context.evaluator.evaluate(&lhs, operator, &rhs),
                    _ => Err(RulesFailure::new(
                        FailureType::InvalidOperand,
                        format!("Operand did not resolve for '{}'", operator),
                    )),
                }
            }
            Evaluable::Logical { operator, operands } => match operator.as_deref() {
                Some("and") => evaluate_and(operands, context),
                Some("or") => evaluate_or(operands, context),
                other => Err(RulesFailure::new(
                    FailureType::MissingOperator,
                    format!("Unknown logical operator {:?}", other),
                )),
            },
            Evaluable::Unary { lhs, operator } => {
                let operator = operator.as_deref().ok_or_else(|| {
                    RulesFailure::new(FailureType::MissingOperator, "Unary has no operator")
                })?;
                let value = lhs.resolve(context);
                context.evaluator.evaluate_unary(operator, value.as_ref())
            }
        }
    }
}

fn evaluate_and(operands: &[Option<Evaluable>], context: &Context<'_>) -> RulesResult {
    for operand in operands.iter().flatten() {
        if let Err(failure) = operand.evaluate(context) {
            return Err(RulesFailure::new(
                FailureType::ConditionFailed,
                format!("AND failed: {}", failure),
            ));
        }
    }
    Ok(())
}

fn evaluate_or(operands: &[Option<Evaluable>], context: &Context<'_>) -> RulesResult {
    if operands.iter().flatten().any(|operand| operand.evaluate(context).is_ok()) {
        return Ok(());
    }
    Err(RulesFailure::new(
        FailureType::ConditionFailed,
        "OR had no succeeding operand",
    ))
}
