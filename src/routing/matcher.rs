//! Route template compilation.
//!
//! # Responsibilities
//! - Compile a route template into an anchored regular expression
//! - Record placeholder names in declaration order
//! - Extract positional captures from a matching path
//!
//! # Design Decisions
//! - `{name}` captures one segment (`[^/]+?`), `*` captures lazily across
//!   segments (`.*?`)
//! - A final segment consisting of a single placeholder becomes optional,
//!   together with its leading slash
//! - One trailing slash is always tolerated
//! - Captures are positional; names are only attached by the caller

use regex::Regex;
use thiserror::Error;

/// Parameter name recorded for the `*` wildcard.
pub const WILDCARD: &str = "*";

/// Error returned when a route template is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route template `{0}` must start with '/'")]
    MissingLeadingSlash(String),
    #[error("route template `{pattern}` has an unterminated placeholder at byte {position}")]
    Unterminated { pattern: String, position: usize },
    #[error("route template `{pattern}` has an unexpected '}}' at byte {position}")]
    UnexpectedClose { pattern: String, position: usize },
    #[error("route template `{pattern}` has an invalid placeholder name `{name}`")]
    InvalidName { pattern: String, name: String },
    #[error("route template `{pattern}` declares `{name}` more than once")]
    DuplicateName { pattern: String, name: String },
    #[error("route template `{0}` failed to compile: {1}")]
    Regex(String, String),
}

#[derive(Debug)]
enum Token {
    Literal(String),
    Named(String),
    Wildcard,
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    names: Vec<String>,
}

impl CompiledMatcher {
    /// Compile a route template such as `/users/{id}` or `/files/*`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }

        let mut tokens = tokenize(pattern)?;

        // "/users/" and "/users" describe the same route
        if let Some(Token::Literal(text)) = tokens.last_mut() {
            if text.len() > 1 && text.ends_with('/') {
                text.pop();
            }
        }

        let mut names = Vec::new();
        for token in &tokens {
            let name = match token {
                Token::Named(name) => name.as_str(),
                Token::Wildcard => WILDCARD,
                Token::Literal(_) => continue,
            };
            if names.iter().any(|n| n == name) {
                return Err(PatternError::DuplicateName {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            names.push(name.to_string());
        }

        // A trailing "/{placeholder}" is optional as a whole.
        let optional_tail = matches!(
            tokens.as_slice(),
            [.., Token::Literal(prefix), Token::Named(_) | Token::Wildcard] if prefix.ends_with('/')
        );
        if optional_tail {
            if let Some(Token::Literal(prefix)) = tokens.iter_mut().rev().nth(1) {
                prefix.pop();
            }
        }

        let mut source = String::from("^");
        let last = tokens.len().saturating_sub(1);
        for (index, token) in tokens.iter().enumerate() {
            let group = match token {
                Token::Literal(text) => {
                    if text != "/" || index != last {
                        source.push_str(&regex::escape(text));
                    }
                    continue;
                }
                Token::Named(_) => "([^/]+?)",
                Token::Wildcard => "(.*?)",
            };
            if optional_tail && index == last {
                source.push_str("(?:/");
                source.push_str(group);
                source.push_str(")?");
            } else {
                source.push_str(group);
            }
        }
        source.push_str("/?$");

        let regex = Regex::new(&source)
            .map_err(|e| PatternError::Regex(pattern.to_string(), e.to_string()))?;

        Ok(Self { regex, names })
    }

    /// Returns true if the path matches this template.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Positional captures for a matching path, `None` for groups that did
    /// not participate. Returns `None` when the path does not match.
    pub fn captures(&self, path: &str) -> Option<Vec<Option<String>>> {
        let caps = self.regex.captures(path)?;
        Some(
            (1..=self.names.len())
                .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Placeholder names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// The generated expression, mostly useful in logs.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(PatternError::Unterminated {
                        pattern: pattern.to_string(),
                        position,
                    });
                }
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(PatternError::InvalidName {
                        pattern: pattern.to_string(),
                        name,
                    });
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Named(name));
            }
            '}' => {
                return Err(PatternError::UnexpectedClose {
                    pattern: pattern.to_string(),
                    position,
                });
            }
            '*' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard);
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}
