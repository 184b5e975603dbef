//! Error types for parsing, pipe construction and rendering.
//!
//! [`ParseError`] is produced by the parser, either because the
//! [`ParseOptions`](crate::ParseOptions) are unusable or because a template
//! nests deeper than the configured limit. Malformed template text is never
//! an error: unterminated tags and stray closers degrade to literal text.
//!
//! [`EvalError`] is produced while building a [`Pipe`](crate::Pipe) or
//! rendering one. It can originate from the engine itself (depth limits)
//! or from a user-supplied tag handler.

use std::sync::Arc;
use thiserror::Error;

// ── Parse errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::InvalidOptions, message)
    }

    pub fn recursion_limit(max: usize) -> Self {
        Self::new(
            ParseErrorKind::RecursionLimit,
            format!("template nesting exceeds maximum depth of {max}"),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The delimiter configuration cannot be scanned unambiguously.
    InvalidOptions,
    /// Tags are nested deeper than [`ParseOptions::max_depth`](crate::ParseOptions::max_depth).
    RecursionLimit,
}

// ── Eval errors ─────────────────────────────────────────────────────────

/// An error raised while building a pipe or rendering a template.
///
/// Carries a structured [`EvalErrorKind`], a human-readable message and an
/// optional underlying cause.
///
/// # Error chaining
///
/// Handlers that wrap a lower-level failure can keep the original error
/// reachable through [`std::error::Error::source`]:
///
/// ```rust
/// use kurly::EvalError;
///
/// fn lookup() -> Result<(), EvalError> {
///     let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
///     Err(EvalError::handler("include failed").with_source(io_err))
/// }
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    /// Wrapped in `Arc` so that `EvalError` remains `Clone`.
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying error cause to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// A failure reported by a user-supplied tag handler.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Handler, message)
    }

    pub fn type_error(field: &str, expected: &str, got: &str) -> Self {
        Self::new(
            EvalErrorKind::InvalidArgument,
            format!("record field `{field}`: expected {expected}, got {got}"),
        )
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            EvalErrorKind::InvalidArgument,
            format!("missing required record field: {field}"),
        )
    }

    pub fn recursion_limit(max: usize) -> Self {
        Self::new(
            EvalErrorKind::RecursionLimit,
            format!("tag nesting exceeds maximum depth of {max}"),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Raised by handler code, passed through unmodified.
    Handler,
    /// A record field a handler requires is missing or has the wrong type.
    InvalidArgument,
    /// The tree nests deeper than [`EvalOptions::max_depth`](crate::EvalOptions::max_depth).
    RecursionLimit,
}
