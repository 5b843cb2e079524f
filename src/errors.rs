use std::fmt;
use std::io;

/// Broad family a [`ParseError`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorClass {
    /// Unterminated quotes, unbalanced braces or parentheses, end of input mid-value.
    Lexical,
    /// Well-delimited input which does not follow the entry grammar.
    Grammar,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ParseErrorKind {
    #[error("unexpected end of input inside a field value (collected so far: '{partial}')")]
    UnterminatedValue { partial: String },
    #[error("unexpected '}}' inside a quoted value")]
    StrayClosingBrace,
    #[error("unbalanced braces or parentheses in entry")]
    UnbalancedDelimiters,
    #[error("expected {expected}")]
    Expected { expected: String },
    #[error("invalid entry type name")]
    InvalidTypeName,
    #[error("invalid entry key")]
    InvalidKey,
    #[error("invalid field name")]
    InvalidFieldName,
    #[error("entry is not well-formed")]
    NotWellFormed,
}

impl ParseErrorKind {
    pub(crate) fn expected(what: impl Into<String>) -> Self {
        Self::Expected {
            expected: what.into(),
        }
    }
}

/// A malformed piece of input, rejected as a whole.
///
/// `line` and `column` are 1-based. A value of `0` for both means no position
/// is available for this error.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub column: usize,
    /// text of the offending token, if there is one
    pub token: Option<String>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, line: usize, column: usize) -> Self {
        ParseError {
            kind,
            line,
            column,
            token: None,
        }
    }

    pub(crate) fn at_token(kind: ParseErrorKind, token: &crate::lexer::Token) -> Self {
        ParseError {
            kind,
            line: token.line,
            column: token.column,
            token: Some(token.value.clone()),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind {
            ParseErrorKind::UnterminatedValue { .. }
            | ParseErrorKind::StrayClosingBrace
            | ParseErrorKind::UnbalancedDelimiters => ErrorClass::Lexical,
            _ => ErrorClass::Grammar,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.line > 0 {
            write!(f, " at line {} col {}", self.line, self.column)?;
        }
        if let Some(token) = &self.token {
            write!(f, " (found '{}')", token)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Any error returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("index {index} is out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("entry {0} must not be empty")]
    EmptyEntryPart(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let err = ParseError {
            kind: ParseErrorKind::expected("'='"),
            line: 3,
            column: 9,
            token: Some("title".to_string()),
        };
        assert_eq!(err.to_string(), "expected '=' at line 3 col 9 (found 'title')");
        assert_eq!(err.class(), ErrorClass::Grammar);
    }

    #[test]
    fn test_display_without_position() {
        let err = ParseError::new(ParseErrorKind::UnbalancedDelimiters, 0, 0);
        assert_eq!(err.to_string(), "unbalanced braces or parentheses in entry");
        assert_eq!(err.class(), ErrorClass::Lexical);
    }
}
