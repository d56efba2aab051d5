//! `rules.json` rule set parsing.
//!
//! ```json
//! {"version": 1, "rules": [{
//!     "condition": {"type": "group", "definition": {"logic": "and", "conditions": [
//!         {"type": "matcher", "definition": {"key": "~type", "matcher": "eq", "values": ["launch"]}}
//!     ]}},
//!     "consequences": [{"id": "c1", "type": "add", "detail": {"eventdata": {"seen": "{{~type}}"}}}]
//! }]}
//! ```
//!
//! A rule whose condition cannot be built is skipped with a warning; the rest
//! of the set still loads.

use super::context::{TokenFinder, Transforming};
use super::engine::Rule;
use super::evaluator::{
    CONTAINS, ENDS_WITH, EQUALS, EXISTS, GREATER_EQUAL, GREATER_THAN, LESS_EQUAL, LESS_THAN,
    NOT_CONTAINS, NOT_EQUALS, NOT_EXIST, STARTS_WITH,
};
use super::expression::Evaluable;
use super::operand::Operand;
use super::template::Template;
use super::transformer::{BOOL, DOUBLE, INT, STRING};
use crate::history::{EventHistoryRequest, HistoryLookup};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

const CONDITION_GROUP: &str = "group";
const CONDITION_MATCHER: &str = "matcher";
const CONDITION_HISTORICAL: &str = "historical";
const SEARCH_TYPE_ORDERED: &str = "ordered";

// ================================================================================================
// RULE MODEL
// ================================================================================================

/// What a matched rule asks the host to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleConsequence {
    pub id: String,
    #[serde(rename = "type")]
    pub consequence_type: String,
    #[serde(default)]
    pub detail: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct LaunchRule {
    pub condition: Evaluable,
    pub consequences: Vec<RuleConsequence>,
}

impl Rule for LaunchRule {
    fn condition(&self) -> &Evaluable {
        &self.condition
    }
}

impl LaunchRule {
    /// Consequences with `{{...}}` tokens in their string details rendered.
    pub fn expanded_consequences(
        &self,
        token_finder: &dyn TokenFinder,
        transformer: &dyn Transforming,
    ) -> Vec<RuleConsequence> {
        self.consequences
            .iter()
            .map(|consequence| RuleConsequence {
                id: consequence.id.clone(),
                consequence_type: consequence.consequence_type.clone(),
                detail: consequence
                    .detail
                    .iter()
                    .map(|(key, value)| {
                        (key.clone(), expand_value(value, token_finder, transformer))
                    })
                    .collect(),
            })
            .collect()
    }
}

fn expand_value(
    value: &Value,
    token_finder: &dyn TokenFinder,
    transformer: &dyn Transforming,
) -> Value {
    match value {
        Value::String(text) if text.contains("{{") => {
            Value::String(Template::parse(text).render(token_finder, transformer))
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand_value(item, token_finder, transformer))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), expand_value(item, token_finder, transformer)))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ================================================================================================
// DOCUMENT SHAPES
// ================================================================================================

#[derive(Deserialize)]
struct RuleSetDocument {
    #[serde(default)]
    version: i64,
    #[serde(default)]
    rules: Vec<Value>,
}

#[derive(Deserialize)]
struct RuleDocument {
    condition: ConditionDocument,
    #[serde(default)]
    consequences: Vec<RuleConsequence>,
}

#[derive(Deserialize)]
struct ConditionDocument {
    #[serde(rename = "type")]
    condition_type: String,
    #[serde(default)]
    definition: DefinitionDocument,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionDocument {
    logic: Option<String>,
    #[serde(default)]
    conditions: Vec<ConditionDocument>,
    key: Option<String>,
    matcher: Option<String>,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    events: Vec<Map<String, Value>>,
    from: Option<i64>,
    to: Option<i64>,
    search_type: Option<String>,
    value: Option<Value>,
}

// ================================================================================================
// PARSING
// ================================================================================================

/// Parses a rule set. `history` backs `historical` conditions; without it
/// those conditions never match.
pub fn parse_rules(
    json: &str,
    history: Option<Arc<dyn HistoryLookup>>,
) -> Result<Vec<LaunchRule>, String> {
    let document: RuleSetDocument =
        serde_json::from_str(json).map_err(|e| format!("Invalid rules JSON: {}", e))?;
    debug!(
        "Parsing rule set version {} with {} rule(s)",
        document.version,
        document.rules.len()
    );

    let mut rules = Vec::with_capacity(document.rules.len());
    for (index, raw) in document.rules.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RuleDocument>(raw)
            .map_err(|e| e.to_string())
            .and_then(|rule| {
                let condition = build_condition(&rule.condition, history.as_ref())?;
                Ok(LaunchRule {
                    condition,
                    consequences: rule.consequences,
                })
            });

        match parsed {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("Skipping rule {}: {}", index, e),
        }
    }

    Ok(rules)
}

fn build_condition(
    condition: &ConditionDocument,
    history: Option<&Arc<dyn HistoryLookup>>,
) -> Result<Evaluable, String> {
    let definition = &condition.definition;
    match condition.condition_type.as_str() {
        CONDITION_GROUP => build_group(definition, history),
        CONDITION_MATCHER => build_matcher(definition),
        CONDITION_HISTORICAL => build_historical(definition, history),
        other => Err(format!("Unsupported condition type '{}'", other)),
    }
}

fn build_group(
    definition: &DefinitionDocument,
    history: Option<&Arc<dyn HistoryLookup>>,
) -> Result<Evaluable, String> {
    let logic = definition
        .logic
        .as_deref()
        .map(str::to_ascii_lowercase)
        .ok_or("Group condition has no logic")?;
    if logic != "and" && logic != "or" {
        return Err(format!("Unsupported group logic '{}'", logic));
    }

    let children: Vec<Evaluable> = definition
        .conditions
        .iter()
        .filter_map(|child| match build_condition(child, history) {
            Ok(evaluable) => Some(evaluable),
            Err(e) => {
                warn!("Dropping condition from group: {}", e);
                None
            }
        })
        .collect();
    if children.is_empty() {
        return Err("Group condition has no valid conditions".to_string());
    }

    Ok(Evaluable::logical(logic, children))
}

/// Maps a short matcher code to an evaluator operator.
fn operator_for(matcher: &str) -> Option<&'static str> {
    let operator = match matcher {
        "eq" => EQUALS,
        "ne" => NOT_EQUALS,
        "gt" => GREATER_THAN,
        "ge" => GREATER_EQUAL,
        "lt" => LESS_THAN,
        "le" => LESS_EQUAL,
        "co" => CONTAINS,
        "nc" => NOT_CONTAINS,
        "sw" => STARTS_WITH,
        "ew" => ENDS_WITH,
        "ex" => EXISTS,
        "nx" => NOT_EXIST,
        _ => return None,
    };
    Some(operator)
}

fn is_unary(operator: &str) -> bool {
    operator == EXISTS || operator == NOT_EXIST
}

/// Token for `key`, converted to the type of the value it is compared with.
fn typed_token(key: &str, value: &Value) -> Operand {
    let transformation = match value {
        Value::String(_) => Some(STRING),
        Value::Bool(_) => Some(BOOL),
        Value::Number(n) if n.is_f64() => Some(DOUBLE),
        Value::Number(_) => Some(INT),
        _ => None,
    };
    match transformation {
        Some(name) => Operand::token(&format!("{{{{{}({})}}}}", name, key)),
        None => Operand::token(&format!("{{{{{}}}}}", key)),
    }
}

fn build_matcher(definition: &DefinitionDocument) -> Result<Evaluable, String> {
    let key = definition
        .key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or("Matcher condition has no key")?;
    let matcher = definition
        .matcher
        .as_deref()
        .ok_or("Matcher condition has no matcher")?;
    let operator =
        operator_for(matcher).ok_or_else(|| format!("Unsupported matcher '{}'", matcher))?;

    if is_unary(operator) {
        return Ok(Evaluable::unary(
            Operand::token(&format!("{{{{{}}}}}", key)),
            operator,
        ));
    }

    let mut comparisons: Vec<Evaluable> = definition
        .values
        .iter()
        .map(|value| {
            Evaluable::comparison(
                typed_token(key, value),
                operator,
                Operand::Literal(value.clone()),
            )
        })
        .collect();

    match comparisons.len() {
        0 => Err(format!("Matcher '{}' on '{}' has no values", matcher, key)),
        1 => Ok(comparisons.remove(0)),
        _ => Ok(Evaluable::logical("or", comparisons)),
    }
}

fn build_historical(
    definition: &DefinitionDocument,
    history: Option<&Arc<dyn HistoryLookup>>,
) -> Result<Evaluable, String> {
    if definition.events.is_empty() {
        return Err("Historical condition has no events".to_string());
    }
    let matcher = definition
        .matcher
        .as_deref()
        .ok_or("Historical condition has no matcher")?;
    let operator = operator_for(matcher)
        .filter(|operator| !is_unary(operator))
        .ok_or_else(|| format!("Unsupported historical matcher '{}'", matcher))?;
    let value = definition
        .value
        .clone()
        .ok_or("Historical condition has no value")?;

    let from_ms = definition.from.unwrap_or(0);
    let to_ms = definition.to.unwrap_or(0);
    let enforce_order = definition.search_type.as_deref() == Some(SEARCH_TYPE_ORDERED);
    let requests: Vec<EventHistoryRequest> = definition
        .events
        .iter()
        .map(|mask| EventHistoryRequest::new(mask.clone(), from_ms, to_ms))
        .collect();

    if history.is_none() {
        warn!("No event history available, historical condition will not match");
    }
    let history = history.cloned();
    let count = Operand::function("historical_count", move |_| {
        history
            .as_ref()
            .map(|lookup| Value::from(lookup.count_events(&requests, enforce_order)))
    });

    Ok(Evaluable::comparison(count, operator, Operand::Literal(value)))
}
