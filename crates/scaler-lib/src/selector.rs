//! Set-based label selectors
//!
//! Parses the Kubernetes label selector grammar into a list of requirements,
//! renders it back in canonical form and evaluates it against a label set.
//!
//! Supported clauses:
//! - `key` / `!key` (existence)
//! - `key=value`, `key==value`, `key!=value` (equality)
//! - `key in (a,b)`, `key notin (a,b)` (set membership)
//! - `key>1`, `key<1` (integer comparison)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

/// Errors produced while parsing a selector expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("found '{found}' at position {position}, expected: {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        position: usize,
    },

    #[error("invalid label key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid label value {value:?}: {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("for '{operator}' operator on key {key:?}, values set can't be empty")]
    EmptyValueSet { key: String, operator: Operator },
}

/// Requirement operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Exists => "exists",
            Operator::DoesNotExist => "!",
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
        };
        f.write_str(s)
    }
}

/// A single `key <op> values` clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a validated requirement
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = String>,
    ) -> Result<Self, SelectorError> {
        let key = key.into();
        validate_key(&key)?;
        let values: BTreeSet<String> = values.into_iter().collect();

        match operator {
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(SelectorError::EmptyValueSet { key, operator });
                }
            }
            Operator::Equals | Operator::NotEquals => {
                if values.len() != 1 {
                    return Err(SelectorError::InvalidValue {
                        value: values.into_iter().collect::<Vec<_>>().join(","),
                        reason: "exact-match operators take exactly one value".to_string(),
                    });
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(SelectorError::InvalidValue {
                        value: values.into_iter().collect::<Vec<_>>().join(","),
                        reason: "existence operators take no values".to_string(),
                    });
                }
            }
            Operator::GreaterThan | Operator::LessThan => {
                let integer = values.len() == 1 && values.iter().all(|v| v.parse::<i64>().is_ok());
                if !integer {
                    return Err(SelectorError::InvalidValue {
                        value: values.into_iter().collect::<Vec<_>>().join(","),
                        reason: "comparison operators take a single integer value".to_string(),
                    });
                }
            }
        }

        if !matches!(operator, Operator::GreaterThan | Operator::LessThan) {
            for v in &values {
                validate_value(v)?;
            }
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Evaluate the requirement against a label set
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let current = labels.get(&self.key);
        match self.operator {
            Operator::Exists => current.is_some(),
            Operator::DoesNotExist => current.is_none(),
            Operator::Equals | Operator::In => {
                current.map(|v| self.values.contains(v)).unwrap_or(false)
            }
            Operator::NotEquals | Operator::NotIn => {
                current.map(|v| !self.values.contains(v)).unwrap_or(true)
            }
            Operator::GreaterThan | Operator::LessThan => {
                let Some(actual) = current.and_then(|v| v.parse::<i64>().ok()) else {
                    return false;
                };
                let Some(bound) = self.values.iter().next().and_then(|v| v.parse::<i64>().ok())
                else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            op => write!(f, "{}{}{}", self.key, op, joined()),
        }
    }
}

/// Parsed label selector: the conjunction of its requirements
///
/// Requirements are kept sorted by key (then rendering) so that equivalent expressions
/// render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector expression
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let tokens = Lexer::new(input).tokenize();
        let requirements = Parser::new(tokens).parse()?;
        Ok(Self::from_requirements(requirements))
    }

    /// Build a selector from already validated requirements
    pub fn from_requirements(mut requirements: Vec<Requirement>) -> Self {
        requirements.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.to_string().cmp(&b.to_string()))
        });
        Self { requirements }
    }

    /// A selector without requirements matches every object
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&rendered.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Identifier(String),
    Bang,
    Equals,
    DoubleEquals,
    NotEquals,
    GreaterThan,
    LessThan,
    Comma,
    OpenParen,
    CloseParen,
    End,
}

impl TokenKind {
    fn literal(&self) -> String {
        match self {
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Bang => "!".into(),
            TokenKind::Equals => "=".into(),
            TokenKind::DoubleEquals => "==".into(),
            TokenKind::NotEquals => "!=".into(),
            TokenKind::GreaterThan => ">".into(),
            TokenKind::LessThan => "<".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::OpenParen => "(".into(),
            TokenKind::CloseParen => ")".into(),
            TokenKind::End => "end of string".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn is_special(c: char) -> bool {
    matches!(c, '!' | '=' | '>' | '<' | ',' | '(' | ')')
}

struct Lexer<'a> {
    input: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input }
    }

    fn tokenize(self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut chars = self.input.char_indices().peekable();

        while let Some(&(pos, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }

            let kind = match c {
                '!' => {
                    chars.next();
                    if matches!(chars.peek(), Some(&(_, '='))) {
                        chars.next();
                        TokenKind::NotEquals
                    } else {
                        TokenKind::Bang
                    }
                }
                '=' => {
                    chars.next();
                    if matches!(chars.peek(), Some(&(_, '='))) {
                        chars.next();
                        TokenKind::DoubleEquals
                    } else {
                        TokenKind::Equals
                    }
                }
                '>' => {
                    chars.next();
                    TokenKind::GreaterThan
                }
                '<' => {
                    chars.next();
                    TokenKind::LessThan
                }
                ',' => {
                    chars.next();
                    TokenKind::Comma
                }
                '(' => {
                    chars.next();
                    TokenKind::OpenParen
                }
                ')' => {
                    chars.next();
                    TokenKind::CloseParen
                }
                _ => {
                    let mut ident = String::new();
                    while let Some(&(_, c)) = chars.peek() {
                        if c.is_whitespace() || is_special(c) {
                            break;
                        }
                        ident.push(c);
                        chars.next();
                    }
                    TokenKind::Identifier(ident)
                }
            };

            tokens.push(Token {
                kind,
                position: pos,
            });
        }

        tokens.push(Token {
            kind: TokenKind::End,
            position: self.input.len(),
        });
        tokens
    }
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, cursor: 0 }
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with End, which is never consumed past.
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn unexpected(token: &Token, expected: &'static str) -> SelectorError {
        SelectorError::Unexpected {
            found: token.kind.literal(),
            expected,
            position: token.position,
        }
    }

    fn parse(mut self) -> Result<Vec<Requirement>, SelectorError> {
        let mut requirements = Vec::new();

        loop {
            match &self.peek().kind {
                TokenKind::Identifier(_) | TokenKind::Bang => {
                    requirements.push(self.parse_requirement()?);

                    let separator = self.next();
                    match separator.kind {
                        TokenKind::End => return Ok(requirements),
                        TokenKind::Comma => {
                            let after = self.peek();
                            if !matches!(after.kind, TokenKind::Identifier(_) | TokenKind::Bang) {
                                return Err(Self::unexpected(after, "identifier after ','"));
                            }
                        }
                        _ => return Err(Self::unexpected(&separator, "',' or 'end of string'")),
                    }
                }
                TokenKind::End => return Ok(requirements),
                _ => {
                    return Err(Self::unexpected(
                        self.peek(),
                        "!, identifier, or 'end of string'",
                    ))
                }
            }
        }
    }

    fn parse_requirement(&mut self) -> Result<Requirement, SelectorError> {
        let first = self.next();
        if first.kind == TokenKind::Bang {
            let key = self.parse_key()?;
            return Requirement::new(key, Operator::DoesNotExist, Vec::new());
        }

        let TokenKind::Identifier(key) = first.kind else {
            return Err(Self::unexpected(&first, "identifier"));
        };

        let operator = match &self.peek().kind {
            TokenKind::End | TokenKind::Comma => {
                return Requirement::new(key, Operator::Exists, Vec::new());
            }
            TokenKind::Equals | TokenKind::DoubleEquals => Operator::Equals,
            TokenKind::NotEquals => Operator::NotEquals,
            TokenKind::GreaterThan => Operator::GreaterThan,
            TokenKind::LessThan => Operator::LessThan,
            TokenKind::Identifier(word) if word == "in" => Operator::In,
            TokenKind::Identifier(word) if word == "notin" => Operator::NotIn,
            _ => {
                return Err(Self::unexpected(
                    self.peek(),
                    "'=', '!=', '==', 'in', 'notin', '>' or '<'",
                ))
            }
        };
        self.next();

        let values = match operator {
            Operator::In | Operator::NotIn => self.parse_value_set()?,
            _ => vec![self.parse_exact_value()?],
        };

        Requirement::new(key, operator, values)
    }

    fn parse_key(&mut self) -> Result<String, SelectorError> {
        let token = self.next();
        match token.kind {
            TokenKind::Identifier(key) => Ok(key),
            _ => Err(Self::unexpected(&token, "identifier")),
        }
    }

    fn parse_exact_value(&mut self) -> Result<String, SelectorError> {
        match &self.peek().kind {
            TokenKind::End | TokenKind::Comma => Ok(String::new()),
            _ => {
                let token = self.next();
                match token.kind {
                    TokenKind::Identifier(value) => Ok(value),
                    _ => Err(Self::unexpected(&token, "value")),
                }
            }
        }
    }

    fn parse_value_set(&mut self) -> Result<Vec<String>, SelectorError> {
        let open = self.next();
        if open.kind != TokenKind::OpenParen {
            return Err(Self::unexpected(&open, "'('"));
        }

        let mut values = Vec::new();
        if self.peek().kind == TokenKind::CloseParen {
            self.next();
            return Ok(values);
        }

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::Identifier(value) => {
                    values.push(value);
                    let after = self.next();
                    match after.kind {
                        TokenKind::Comma => {
                            // `(a,)` carries an empty value
                            if self.peek().kind == TokenKind::CloseParen {
                                self.next();
                                values.push(String::new());
                                return Ok(values);
                            }
                        }
                        TokenKind::CloseParen => return Ok(values),
                        _ => return Err(Self::unexpected(&after, "',' or ')'")),
                    }
                }
                TokenKind::Comma => {
                    values.push(String::new());
                    if self.peek().kind == TokenKind::CloseParen {
                        self.next();
                        values.push(String::new());
                        return Ok(values);
                    }
                }
                _ => return Err(Self::unexpected(&token, "value, ',' or ')'")),
            }
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name part must be non-empty".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!("must be no more than {MAX_NAME_LENGTH} characters"));
    }
    let first = name.chars().next().unwrap_or('-');
    let last = name.chars().last().unwrap_or('-');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err("must start and end with an alphanumeric character".to_string());
    }
    if !name.chars().all(is_name_char) {
        return Err("may only contain alphanumerics, '-', '_' or '.'".to_string());
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LENGTH {
        return Err(format!(
            "prefix must be a DNS subdomain of 1 to {MAX_PREFIX_LENGTH} characters"
        ));
    }
    for label in prefix.split('.') {
        let valid = !label.is_empty()
            && label.len() <= MAX_NAME_LENGTH
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');
        if !valid {
            return Err(format!("prefix {prefix:?} is not a valid DNS subdomain"));
        }
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: String| SelectorError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            validate_prefix(prefix).map_err(invalid)?;
            name
        }
        None => key,
    };
    validate_name(name).map_err(invalid)
}

fn validate_value(value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name(value).map_err(|reason| SelectorError::InvalidValue {
        value: value.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_equality() {
        let selector = LabelSelector::parse("app=demo").unwrap();
        assert_eq!(selector.requirements().len(), 1);
        assert_eq!(selector.requirements()[0].operator(), Operator::Equals);
        assert_eq!(selector.to_string(), "app=demo");
    }

    #[test]
    fn test_parse_double_equals_renders_as_equals() {
        let selector = LabelSelector::parse("app==demo").unwrap();
        assert_eq!(selector.to_string(), "app=demo");
    }

    #[test]
    fn test_parse_set_based_clauses() {
        let selector =
            LabelSelector::parse("tier in (web, api), env notin (dev), !canary, team").unwrap();
        assert_eq!(
            selector.to_string(),
            "!canary,env notin (dev),team,tier in (api,web)"
        );
    }

    #[test]
    fn test_canonical_form_is_order_independent() {
        let a = LabelSelector::parse("b=2,a=1").unwrap();
        let b = LabelSelector::parse("a=1, b=2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "a=1,b=2");
    }

    #[test]
    fn test_parse_prefixed_key() {
        let selector = LabelSelector::parse("app.kubernetes.io/name=web").unwrap();
        assert_eq!(selector.requirements()[0].key(), "app.kubernetes.io/name");
    }

    #[test]
    fn test_parse_empty_value() {
        let selector = LabelSelector::parse("app=").unwrap();
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn test_parse_comparison() {
        let selector = LabelSelector::parse("replicas>2").unwrap();
        assert!(selector.matches(&labels(&[("replicas", "3")])));
        assert!(!selector.matches(&labels(&[("replicas", "2")])));
        assert!(!selector.matches(&labels(&[("replicas", "abc")])));

        assert!(LabelSelector::parse("replicas<abc").is_err());
    }

    #[test]
    fn test_empty_input_is_empty_selector() {
        assert!(LabelSelector::parse("").unwrap().is_empty());
        assert!(LabelSelector::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        for input in [
            "app=demo,",
            ",app=demo",
            "app demo",
            "app in demo",
            "app in ()",
            "app=(demo)",
            "-app=demo",
            "app=demo-",
            "Bad_Prefix/app=x",
            "a b c",
            "!",
            "app!demo",
        ] {
            assert!(
                LabelSelector::parse(input).is_err(),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_error_reports_position() {
        let err = LabelSelector::parse("app=demo,").unwrap_err();
        match err {
            SelectorError::Unexpected { position, .. } => assert_eq!(position, 9),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_key_length_limit() {
        let long = "a".repeat(64);
        assert!(matches!(
            LabelSelector::parse(&format!("{long}=x")),
            Err(SelectorError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_matching() {
        let selector = LabelSelector::parse("app=web,tier in (api,frontend),!canary").unwrap();

        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "api")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "db")])));
        assert!(!selector.matches(&labels(&[
            ("app", "web"),
            ("tier", "api"),
            ("canary", "true")
        ])));
        assert!(!selector.matches(&labels(&[("tier", "api")])));
    }

    #[test]
    fn test_not_equals_matches_missing_key() {
        let selector = LabelSelector::parse("env!=prod").unwrap();
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("env", "dev")])));
        assert!(!selector.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_round_trip_through_display() {
        let original = LabelSelector::parse("x in (b,a),y,!z,w!=1").unwrap();
        let reparsed = LabelSelector::parse(&original.to_string()).unwrap();
        assert_eq!(original, reparsed);
    }
}
