//! Error records collected during a parse, and the failures that can occur
//! while assembling a grammar in the first place.

use std::fmt;

use thiserror::Error as ThisError;

/// No error.
pub const NO_ERROR: u16 = 0;
/// Smallest notice code.
pub const NOTICE: u16 = 1;
/// Smallest warning code.
pub const WARNING: u16 = 100;
/// Smallest error code.
pub const ERROR: u16 = 1000;
/// A series failed at or past its mandatory threshold.
pub const MANDATORY_CONTINUATION: u16 = 1010;
/// A series failed at or past its mandatory threshold at the end of input.
pub const MANDATORY_CONTINUATION_AT_EOF: u16 = 1015;
/// The root parser matched, but did not consume the whole document.
pub const PARSER_STOPPED_BEFORE_END: u16 = 1040;
/// A mandatory violation was detected while a previous one was still being
/// resumed from.
pub const ERROR_WHILE_RECOVERING: u16 = 1301;
/// Smallest fatality code.
pub const FATALITY: u16 = 10000;

/// A single entry of the error report that a parse run produces.
///
/// The list a parse returns is ordered by detection time, not by source
/// position; sort by [`Error::position`] if source order is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: u16,
    pub message: String,
    /// Byte offset into the document.
    pub position: usize,
    /// 1-based line, filled in when the error is recorded.
    pub line: u32,
    /// 1-based column (in runes), filled in when the error is recorded.
    pub column: u32,
    /// Length in bytes of the region the error refers to.
    pub length: usize,
    pub related: Vec<Error>,
}

impl Error {
    pub fn new(code: u16, message: impl Into<String>, position: usize) -> Self {
        Self {
            code,
            message: message.into(),
            position,
            line: 0,
            column: 0,
            length: 1,
            related: Vec::new(),
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn is_error(&self) -> bool {
        self.code >= ERROR
    }

    pub fn is_warning(&self) -> bool {
        (WARNING..ERROR).contains(&self.code)
    }

    pub fn is_fatal(&self) -> bool {
        self.code >= FATALITY
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: error {}: {}",
            self.line, self.column, self.code, self.message
        )
    }
}

/// A mistake in the construction of a grammar, reported before any document
/// is parsed.
#[derive(Debug, ThisError)]
pub enum GrammarError {
    #[error("invalid regular expression `{pattern}`: {reason}")]
    BadRegex { pattern: String, reason: String },

    #[error("invalid character class `{pattern}`: {reason}")]
    BadCharClass { pattern: String, reason: String },

    #[error("conflicting comment regexes `{first}` and `{second}` within one grammar")]
    CommentConflict { first: String, second: String },

    #[error("forward parser `{0}` was never defined")]
    UndefinedForward(String),

    #[error("no error-catching parser found beneath `{0}`")]
    NoErrorCatcher(String),

    #[error("more than one error-catching parser found beneath `{0}`")]
    AmbiguousErrorCatcher(String),
}
