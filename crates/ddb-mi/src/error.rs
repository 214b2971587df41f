//! Parse errors for the MI value grammar and line classifier.

use thiserror::Error;

/// Errors produced while parsing a single MI line or value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiParseError {
    /// Encountered a character the grammar does not expect at this point.
    #[error("unexpected character: {0:?}")]
    UnexpectedChar(char),

    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The line did not start with a recognized record-class sigil.
    #[error("unrecognized record class in line: {0:?}")]
    UnknownRecordClass(String),
}

/// Convenience result alias.
pub type MiParseResult<T> = Result<T, MiParseError>;
