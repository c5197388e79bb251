//! FML diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by the FML
//! lexer, parser, analyzer and executor: error codes, source locations and
//! diagnostic reporting.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;

/// Result type for FML syntax operations
pub type Result<T> = std::result::Result<T, FmlError>;
