use crate::error::ParseError;

/// Default limit on tag nesting, shared by the parser and the pipe builder.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Delimiter configuration for [`parse_with_options`](crate::parse_with_options).
///
/// Create with [`ParseOptions::new()`] and chain builder methods:
///
/// ```rust
/// use kurly::ParseOptions;
///
/// let opts = ParseOptions::new()
///     .delimiters('<', '>')
///     .optional(true)
///     .max_depth(16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Opening delimiter. Defaults to `{`.
    pub open: char,

    /// Closing delimiter. Defaults to `}`.
    pub close: char,

    /// When `true`, tags may appear without delimiters. Such "naked" tags
    /// run from the name to the next space.
    pub optional: bool,

    /// Maximum tag nesting depth. A tag at the top level has depth 1.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            open: '{',
            close: '}',
            optional: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Create options with `{`/`}` delimiters, mandatory delimiters and the
    /// default depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delimiters(mut self, open: char, close: char) -> Self {
        self.open = open;
        self.close = close;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Reject delimiters the scanner could not tell apart from tag names,
    /// body whitespace or escapes.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.open == self.close {
            return Err(ParseError::invalid_options(format!(
                "open and close delimiters must differ, both are `{}`",
                self.open
            )));
        }
        for (role, c) in [("open", self.open), ("close", self.close)] {
            if c.is_whitespace() || c == '\\' || c == '_' || c.is_ascii_alphanumeric() {
                return Err(ParseError::invalid_options(format!(
                    "`{}` cannot be used as the {role} delimiter",
                    c.escape_default()
                )));
            }
        }
        Ok(())
    }
}
