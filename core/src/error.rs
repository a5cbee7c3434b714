use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language::{Pos, Span, Tag};

/// Fatal errors. Any of these aborts the current parse or fold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{message}")]
    Syntax { message: String, span: Span },
    #[error("Runaway recursion: scope depth exceeded {limit}.")]
    Recursion { limit: usize },
    #[error("{0} is not implemented.")]
    Unimplemented(Tag),
    #[error("No case matches {scrutinee}.")]
    NonExhaustiveCase {
        scrutinee: String,
        span: Option<Span>,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid AST table: {0}")]
    Import(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Import(e.to_string())
    }
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Syntax { span, .. } => Some(*span),
            Error::NonExhaustiveCase { span, .. } => *span,
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.span().unwrap_or_default(), self.to_string())
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

/// A parse error record as consumed by host editors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub from: Pos,
    pub to: Pos,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            from: span.from_pos(),
            to: span.to_pos(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Soft error for an identifier with no definition in scope
    pub fn name_not_found(span: Span, name: &str) -> Self {
        Diagnostic::new(span, format!("Name '{name}' not found."))
    }
}
