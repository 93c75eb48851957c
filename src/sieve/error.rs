use std::path::PathBuf;

use crate::sieve::token::{Token, TokenType};

/// A syntax or semantic error, anchored at the offending token.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {}: {message}", .token.line)]
pub struct ParseError {
    token: Token,
    expected: Vec<TokenType>,
    message: String,
}

impl ParseError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            token: token.clone(),
            expected: Vec::new(),
            message: message.into(),
        }
    }

    /// `<found> where <a> or <b> expected near <text>`
    pub fn expected(token: &Token, expected: &[TokenType]) -> Self {
        let wanted = expected
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" or ");
        let message = format!("{} where {wanted} expected near {}", token.kind, token.text);
        Self {
            token: token.clone(),
            expected: expected.to_vec(),
            message,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn line(&self) -> usize {
        self.token.line
    }

    /// Token types that would have been accepted; empty for literal messages.
    pub fn expected_types(&self) -> &[TokenType] {
        &self.expected
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Problems with grammar or extension resources.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed grammar resource '{resource}': {source}")]
    Json {
        resource: String,
        source: serde_json::Error,
    },
    #[error("Unsupported keyword type '{kind}' in grammar '{resource}'")]
    UnsupportedKeyword { kind: String, resource: String },
    #[error("Unsupported extension type '{kind}' in extension '{extension}'")]
    UnsupportedExtensionType { kind: String, extension: String },
    #[error("Unsupported parameter type '{kind}' in {origin}")]
    UnsupportedParameter { kind: String, origin: String },
    #[error("Unsupported {attribute} '{value}' in {origin}")]
    UnsupportedAttribute {
        attribute: &'static str,
        value: String,
        origin: String,
    },
    #[error("invalid pattern `{pattern}` in {origin}: {source}")]
    InvalidPattern {
        pattern: String,
        origin: String,
        source: Box<regex::Error>,
    },
    #[error("tagged argument in {origin} must hold exactly one tag parameter")]
    TaggedArgumentShape { origin: String },
}

/// Crate-level error for one-shot validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
