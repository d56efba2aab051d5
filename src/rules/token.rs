use super::context::{TokenFinder, Transforming};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static FUNCTION_TOKEN: OnceLock<Regex> = OnceLock::new();

fn function_token_regex() -> &'static Regex {
    FUNCTION_TOKEN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\((.+)\)$").expect("function token pattern")
    })
}

/// The inside of one `{{...}}` token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MustacheToken {
    /// `{{path}}`
    Variable(String),
    /// `{{name(path)}}`, the path value run through the named transformation
    Function { name: String, path: String },
}

impl MustacheToken {
    pub fn parse(content: &str) -> Self {
        let content = content.trim();
        match function_token_regex().captures(content) {
            Some(caps) => MustacheToken::Function {
                name: caps[1].to_string(),
                path: caps[2].trim().to_string(),
            },
            None => MustacheToken::Variable(content.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            MustacheToken::Variable(path) => path,
            MustacheToken::Function { path, .. } => path,
        }
    }

    /// Looks the path up now; nothing is cached between calls.
    pub fn resolve(
        &self,
        token_finder: &dyn TokenFinder,
        transformer: &dyn Transforming,
    ) -> Option<Value> {
        match self {
            MustacheToken::Variable(path) => token_finder.get(path),
            MustacheToken::Function { name, path } => {
                transformer.transform(name, token_finder.get(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::transformer::Transformer;
    use serde_json::{json, Map};

    #[test]
    fn test_parse_variable_and_function() {
        assert_eq!(
            MustacheToken::parse(" xdm.eventType "),
            MustacheToken::Variable("xdm.eventType".to_string())
        );
        assert_eq!(
            MustacheToken::parse("int(~state.count)"),
            MustacheToken::Function {
                name: "int".to_string(),
                path: "~state.count".to_string()
            }
        );
        // No argument means it is just a path with parentheses
        assert_eq!(
            MustacheToken::parse("int()"),
            MustacheToken::Variable("int()".to_string())
        );
    }

    #[test]
    fn test_resolve_applies_transformation() {
        let data: Map<String, Value> = json!({"count": "42"}).as_object().cloned().unwrap();
        let transformer = Transformer::with_defaults();

        let plain = MustacheToken::parse("count");
        assert_eq!(plain.resolve(&data, &transformer), Some(json!("42")));

        let typed = MustacheToken::parse("int(count)");
        assert_eq!(typed.resolve(&data, &transformer), Some(json!(42)));

        let missing = MustacheToken::parse("int(nothing)");
        assert_eq!(missing.resolve(&data, &transformer), None);
    }
}
