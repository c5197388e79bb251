//! Model provider errors

use octofhir_fml_diagnostics::{
    Diagnostic, ErrorCode, FML0300, FML0301, FML0302, FML0303, FML0304, FML0305, FML0306, FML0401,
};

/// Errors raised by type, resource and terminology collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Element not found: {type_name}.{element}")]
    ElementNotFound { type_name: String, element: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource {url} is not a {expected}")]
    WrongKind { url: String, expected: &'static str },

    #[error("Load error: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Code validation failed: {0}")]
    Validation(String),

    #[error("ValueSet expansion failed: {0}")]
    Expansion(String),
}

impl ModelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TypeNotFound(_) => FML0300,
            Self::ElementNotFound { .. } => FML0301,
            Self::Load(_) => FML0302,
            Self::Validation(_) => FML0303,
            Self::Expansion(_) => FML0304,
            Self::ResourceNotFound(_) => FML0305,
            Self::WrongKind { .. } => FML0306,
            Self::Io(_) => FML0401,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string())
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Load(err.to_string())
    }
}
