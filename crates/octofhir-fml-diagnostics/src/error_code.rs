//! FML error codes following a structured numbering system
//!
//! Error code ranges:
//! - FML0001-FML0099: Syntax errors (lexer and parser)
//! - FML0100-FML0199: Analysis warnings (type resolution, binding)
//! - FML0200-FML0299: Transform errors (execution)
//! - FML0300-FML0399: Model and terminology errors
//! - FML0400-FML0499: System errors (I/O, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a syntax error (0001-0099)
    pub const fn is_syntax_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is an analysis warning (0100-0199)
    pub const fn is_analysis_warning(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a transform error (0200-0299)
    pub const fn is_transform_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is a model or terminology error (0300-0399)
    pub const fn is_model_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FML{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Syntax errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Unexpected character"));
    map.insert(4, ErrorInfo::new("Unterminated string literal"));
    map.insert(5, ErrorInfo::new("Unterminated comment"));
    map.insert(6, ErrorInfo::new("Invalid string escape sequence"));
    map.insert(7, ErrorInfo::new("Invalid number format"));
    map.insert(8, ErrorInfo::new("Invalid date/time format"));
    map.insert(9, ErrorInfo::new("Unterminated delimited identifier"));
    map.insert(
        10,
        ErrorInfo::new("Duplicate name")
            .with_help("Group, parameter, constant and concept map names must be unique"),
    );
    map.insert(11, ErrorInfo::new("Invalid transform arity"));
    map.insert(
        12,
        ErrorInfo::new("Unknown transform")
            .with_help("Transforms are fixed by the language; see the transform table"),
    );
    map.insert(13, ErrorInfo::new("Nesting too deep"));

    // Analysis warnings (0100-0199)
    map.insert(
        100,
        ErrorInfo::new("Unresolved type")
            .with_help("Check the uses declarations and the type provider"),
    );
    map.insert(101, ErrorInfo::new("Unresolved group"));
    map.insert(102, ErrorInfo::new("Unbound variable"));
    map.insert(103, ErrorInfo::new("Unknown element"));
    map.insert(104, ErrorInfo::new("Recursive group invocation"));
    map.insert(105, ErrorInfo::new("Resource not found"));
    map.insert(106, ErrorInfo::new("Undeclared structure alias"));

    // Transform errors (0200-0299)
    map.insert(200, ErrorInfo::new("Unresolved group"));
    map.insert(201, ErrorInfo::new("Unresolved type"));
    map.insert(202, ErrorInfo::new("Unbound variable"));
    map.insert(203, ErrorInfo::new("Terminology failure"));
    map.insert(204, ErrorInfo::new("Arity mismatch"));
    map.insert(
        205,
        ErrorInfo::new("Cyclic invocation")
            .with_help("A group invoked itself through dependent rules or extends"),
    );
    map.insert(206, ErrorInfo::new("Check condition failed"));
    map.insert(207, ErrorInfo::new("List mode violation"));
    map.insert(208, ErrorInfo::new("Expression evaluation failed"));
    map.insert(209, ErrorInfo::new("Maximum invocation depth exceeded"));
    map.insert(210, ErrorInfo::new("Invalid transform argument"));
    map.insert(211, ErrorInfo::new("Resource not found"));
    map.insert(
        212,
        ErrorInfo::new("Invalid input node")
            .with_help("Input node ids must come from the tree passed to the transform"),
    );

    // Model errors (0300-0399)
    map.insert(300, ErrorInfo::new("Type not found in model"));
    map.insert(301, ErrorInfo::new("Element not found"));
    map.insert(302, ErrorInfo::new("Model load failed"));
    map.insert(303, ErrorInfo::new("Code validation failed"));
    map.insert(304, ErrorInfo::new("ValueSet expansion failed"));
    map.insert(305, ErrorInfo::new("Resource not found"));
    map.insert(
        306,
        ErrorInfo::new("Unexpected resource kind")
            .with_help("The canonical URL resolved to a different kind of resource"),
    );

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("Internal error"));
    map.insert(401, ErrorInfo::new("I/O error"));
    map.insert(402, ErrorInfo::new("Configuration error"));

    map
});

// Syntax errors
pub const FML0001: ErrorCode = ErrorCode::new(1);
pub const FML0002: ErrorCode = ErrorCode::new(2);
pub const FML0003: ErrorCode = ErrorCode::new(3);
pub const FML0004: ErrorCode = ErrorCode::new(4);
pub const FML0005: ErrorCode = ErrorCode::new(5);
pub const FML0006: ErrorCode = ErrorCode::new(6);
pub const FML0007: ErrorCode = ErrorCode::new(7);
pub const FML0008: ErrorCode = ErrorCode::new(8);
pub const FML0009: ErrorCode = ErrorCode::new(9);
pub const FML0010: ErrorCode = ErrorCode::new(10);
pub const FML0011: ErrorCode = ErrorCode::new(11);
pub const FML0012: ErrorCode = ErrorCode::new(12);
pub const FML0013: ErrorCode = ErrorCode::new(13);

// Analysis warnings
pub const FML0100: ErrorCode = ErrorCode::new(100);
pub const FML0101: ErrorCode = ErrorCode::new(101);
pub const FML0102: ErrorCode = ErrorCode::new(102);
pub const FML0103: ErrorCode = ErrorCode::new(103);
pub const FML0104: ErrorCode = ErrorCode::new(104);
pub const FML0105: ErrorCode = ErrorCode::new(105);
pub const FML0106: ErrorCode = ErrorCode::new(106);

// Transform errors
pub const FML0200: ErrorCode = ErrorCode::new(200);
pub const FML0201: ErrorCode = ErrorCode::new(201);
pub const FML0202: ErrorCode = ErrorCode::new(202);
pub const FML0203: ErrorCode = ErrorCode::new(203);
pub const FML0204: ErrorCode = ErrorCode::new(204);
pub const FML0205: ErrorCode = ErrorCode::new(205);
pub const FML0206: ErrorCode = ErrorCode::new(206);
pub const FML0207: ErrorCode = ErrorCode::new(207);
pub const FML0208: ErrorCode = ErrorCode::new(208);
pub const FML0209: ErrorCode = ErrorCode::new(209);
pub const FML0210: ErrorCode = ErrorCode::new(210);
pub const FML0211: ErrorCode = ErrorCode::new(211);
pub const FML0212: ErrorCode = ErrorCode::new(212);

// Model errors
pub const FML0300: ErrorCode = ErrorCode::new(300);
pub const FML0301: ErrorCode = ErrorCode::new(301);
pub const FML0302: ErrorCode = ErrorCode::new(302);
pub const FML0303: ErrorCode = ErrorCode::new(303);
pub const FML0304: ErrorCode = ErrorCode::new(304);
pub const FML0305: ErrorCode = ErrorCode::new(305);
pub const FML0306: ErrorCode = ErrorCode::new(306);

// System errors
pub const FML0400: ErrorCode = ErrorCode::new(400);
pub const FML0401: ErrorCode = ErrorCode::new(401);
pub const FML0402: ErrorCode = ErrorCode::new(402);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(FML0001.to_string(), "FML0001");
        assert_eq!(FML0205.to_string(), "FML0205");
    }

    #[test]
    fn test_error_categories() {
        assert!(FML0004.is_syntax_error());
        assert!(!FML0004.is_analysis_warning());
        assert!(FML0100.is_analysis_warning());
        assert!(FML0203.is_transform_error());
        assert!(FML0303.is_model_error());
        assert!(FML0401.is_system_error());
    }

    #[test]
    fn test_error_info() {
        assert_eq!(FML0011.info().description, "Invalid transform arity");
        assert!(FML0100.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
