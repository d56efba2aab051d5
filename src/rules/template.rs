//! Text with embedded tokens.
//!
//! Parsing splits the text once into literal and token segments; rendering
//! resolves the token segments against whatever finder it is given.

use super::context::{TokenFinder, Transforming};
use super::token::MustacheToken;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelimiterPair {
    pub start: String,
    pub end: String,
}

impl DelimiterPair {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Default for DelimiterPair {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Token(MustacheToken),
}

pub struct TemplateParser;

impl TemplateParser {
    /// An unterminated start delimiter and everything after it stay literal text.
    ///
    /// With an empty start or end delimiter nothing can be delimited, so the
    /// whole input is one text segment.
    pub fn parse(input: &str, delimiters: &DelimiterPair) -> Vec<Segment> {
        let mut segments = Vec::new();
        if delimiters.start.is_empty() || delimiters.end.is_empty() {
            if !input.is_empty() {
                segments.push(Segment::Text(input.to_string()));
            }
            return segments;
        }
        let mut rest = input;

        while !rest.is_empty() {
            let Some(start) = rest.find(&delimiters.start) else {
                segments.push(Segment::Text(rest.to_string()));
                break;
            };
            let after_start = &rest[start + delimiters.start.len()..];
            let Some(end) = after_start.find(&delimiters.end) else {
                segments.push(Segment::Text(rest.to_string()));
                break;
            };

            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let content = &after_start[..end];
            if content.trim().is_empty() {
                let whole = start + delimiters.start.len() + end + delimiters.end.len();
                segments.push(Segment::Text(rest[start..whole].to_string()));
            } else {
                segments.push(Segment::Token(MustacheToken::parse(content)));
            }
            rest = &after_start[end + delimiters.end.len()..];
        }

        segments
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Self {
        Self::parse_with(input, &DelimiterPair::default())
    }

    pub fn parse_with(input: &str, delimiters: &DelimiterPair) -> Self {
        Self {
            segments: TemplateParser::parse(input, delimiters),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The token, when the whole template is exactly one token.
    pub fn single_token(&self) -> Option<&MustacheToken> {
        match self.segments.as_slice() {
            [Segment::Token(token)] => Some(token),
            _ => None,
        }
    }

    /// Unresolved tokens render as empty text.
    pub fn render(&self, token_finder: &dyn TokenFinder, transformer: &dyn Transforming) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Token(token) => {
                    if let Some(value) = token.resolve(token_finder, transformer) {
                        rendered.push_str(&render_value(&value));
                    }
                }
            }
        }
        rendered
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
