//! FML syntax error types and diagnostics

use crate::{
    ErrorCode, FML0001, FML0002, FML0010, FML0011, FML0012, FML0013, SourceLocation, Span,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Processing cannot proceed
    Error,
    /// Potential issue, processing continued
    Warning,
    /// Informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Additional context or help
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the span (converts to location using provided source)
    pub fn with_span(mut self, span: Span, source: &str) -> Self {
        self.location = Some(SourceLocation::from_span(span, source));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// A malformed token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message} at {location}")]
pub struct LexError {
    pub code: ErrorCode,
    pub message: String,
    pub location: SourceLocation,
}

impl LexError {
    pub fn new(code: ErrorCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            code,
            message: message.into(),
            location,
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }

    pub fn offset(&self) -> usize {
        self.location.offset
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code, self.message.clone())
            .with_location(self.location.clone());
        match self.code.info().help {
            Some(help) => diag.with_help(help),
            None => diag,
        }
    }
}

/// Grammar violation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnexpectedEnd,
    DuplicateName,
    InvalidArity,
    UnknownTransform,
    NestingTooDeep,
}

impl ParseErrorKind {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnexpectedToken => FML0001,
            Self::UnexpectedEnd => FML0002,
            Self::DuplicateName => FML0010,
            Self::InvalidArity => FML0011,
            Self::UnknownTransform => FML0012,
            Self::NestingTooDeep => FML0013,
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnexpectedToken => "unexpected token",
            Self::UnexpectedEnd => "unexpected end of input",
            Self::DuplicateName => "duplicate name",
            Self::InvalidArity => "invalid arity",
            Self::UnknownTransform => "unknown transform",
            Self::NestingTooDeep => "nesting too deep",
        };
        f.write_str(name)
    }
}

/// A grammar violation, positioned at the offending token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message} at {location}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub code: ErrorCode,
    pub message: String,
    pub location: SourceLocation,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            location,
        }
    }

    pub fn unexpected_token(
        found: impl fmt::Display,
        expected: impl fmt::Display,
        location: SourceLocation,
    ) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            format!("Unexpected {found}, expected {expected}"),
            location,
        )
    }

    pub fn unexpected_end(expected: impl fmt::Display, location: SourceLocation) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedEnd,
            format!("Unexpected end of input, expected {expected}"),
            location,
        )
    }

    pub fn duplicate_name(what: &str, name: &str, location: SourceLocation) -> Self {
        Self::new(
            ParseErrorKind::DuplicateName,
            format!("Duplicate {what} name '{name}'"),
            location,
        )
    }

    pub fn invalid_arity(
        transform: &str,
        expected: impl fmt::Display,
        found: usize,
        location: SourceLocation,
    ) -> Self {
        Self::new(
            ParseErrorKind::InvalidArity,
            format!("Transform '{transform}' takes {expected} argument(s), found {found}"),
            location,
        )
    }

    pub fn unknown_transform(name: &str, location: SourceLocation) -> Self {
        Self::new(
            ParseErrorKind::UnknownTransform,
            format!("Unknown transform '{name}'"),
            location,
        )
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code, self.message.clone())
            .with_location(self.location.clone());
        match self.code.info().help {
            Some(help) => diag.with_help(help),
            None => diag,
        }
    }
}

/// Any failure of the lex/parse stage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FmlError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FmlError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Lex(e) => e.code,
            Self::Parse(e) => e.code,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Lex(e) => &e.location,
            Self::Parse(e) => &e.location,
        }
    }

    /// The parse error kind, if this is a grammar violation
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Self::Lex(_) => None,
            Self::Parse(e) => Some(e.kind),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Lex(e) => e.to_diagnostic(),
            Self::Parse(e) => e.to_diagnostic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FML0004;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::unexpected_token("'}'", "identifier", SourceLocation::new(3, 7, 40, 1));
        let text = err.to_string();
        assert!(text.contains("FML0001"));
        assert!(text.contains("3:7"));
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ParseErrorKind::InvalidArity.code(), FML0011);
        assert_eq!(
            ParseError::unknown_transform("frobnicate", SourceLocation::default()).code,
            FML0012
        );
    }

    #[test]
    fn test_fml_error_from_lex() {
        let lex = LexError::new(FML0004, "Unterminated string literal", SourceLocation::new(2, 5, 9, 1));
        let err: FmlError = lex.into();
        assert_eq!(err.code(), FML0004);
        assert_eq!(err.location().line, 2);
        assert_eq!(err.parse_kind(), None);
        assert!(err.to_diagnostic().to_string().starts_with("error: FML0004"));
    }

    #[test]
    fn test_diagnostic_carries_code_help() {
        let err = ParseError::duplicate_name("group", "Main", SourceLocation::default());
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.help.is_some());
    }
}
