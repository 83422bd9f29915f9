use std::io;
use thiserror::Error;

/// Custom error types for the text-generation engine
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// Construction-time violations: empty rule text, empty symbol key,
    /// empty ruleset, per-symbol weight sum above 100, bad modifier argument.
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Symbol key \"{0}\" not found")]
    SymbolNotFound(String),

    #[error("No matching rule found for symbol \"{0}\"")]
    NoMatchingRule(String),

    #[error("Modifier \"{0}\" not found")]
    ModifierNotFound(String),

    #[error("No symbol or action found in \"{0}\"")]
    MalformedTag(String),

    #[error("Expansion depth limit of {0} exceeded")]
    DepthExceeded(usize),
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GrammarError>;
