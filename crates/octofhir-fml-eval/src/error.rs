//! Transform errors

use octofhir_fml_diagnostics::{
    Diagnostic, ErrorCode, FML0200, FML0201, FML0202, FML0203, FML0204, FML0205, FML0206,
    FML0207, FML0208, FML0209, FML0210, FML0211, FML0212,
};
use octofhir_fml_model::ModelError;
use octofhir_fml_types::TreeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for executor operations
pub type EvalResult<T> = Result<T, TransformError>;

/// What went wrong while executing a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformErrorKind {
    UnresolvedGroup,
    UnresolvedType,
    UnboundVariable,
    TerminologyFailure,
    ArityMismatch,
    CyclicInvocation,
    /// A source `check` condition was false
    CheckFailed,
    /// A source list mode or cardinality could not be satisfied
    ListModeViolation,
    /// An expression could not be evaluated
    Expression,
    DepthExceeded,
    /// A transform argument had the wrong kind of value
    InvalidArgument,
    ResourceNotFound,
    /// An input node id is not part of the tree
    InvalidInput,
}

impl TransformErrorKind {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnresolvedGroup => FML0200,
            Self::UnresolvedType => FML0201,
            Self::UnboundVariable => FML0202,
            Self::TerminologyFailure => FML0203,
            Self::ArityMismatch => FML0204,
            Self::CyclicInvocation => FML0205,
            Self::CheckFailed => FML0206,
            Self::ListModeViolation => FML0207,
            Self::Expression => FML0208,
            Self::DepthExceeded => FML0209,
            Self::InvalidArgument => FML0210,
            Self::ResourceNotFound => FML0211,
            Self::InvalidInput => FML0212,
        }
    }
}

/// A failure during execution, located by group and rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}: {message}{}", .kind.code(), site(.group.as_deref(), .rule.as_deref()))]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub message: String,
    pub group: Option<String>,
    pub rule: Option<String>,
}

fn site(group: Option<&str>, rule: Option<&str>) -> String {
    match (group, rule) {
        (Some(group), Some(rule)) => format!(" (group {group}, rule {rule})"),
        (Some(group), None) => format!(" (group {group})"),
        _ => String::new(),
    }
}

impl TransformError {
    pub fn new(kind: TransformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            group: None,
            rule: None,
        }
    }

    pub fn unresolved_group(name: &str) -> Self {
        Self::new(TransformErrorKind::UnresolvedGroup, format!("Group {name} not found"))
    }

    pub fn unresolved_type(name: &str) -> Self {
        Self::new(TransformErrorKind::UnresolvedType, format!("Type {name} could not be resolved"))
    }

    pub fn unbound_variable(name: &str) -> Self {
        Self::new(TransformErrorKind::UnboundVariable, format!("Variable {name} is not bound"))
    }

    pub fn expression(message: impl Into<String>) -> Self {
        Self::new(TransformErrorKind::Expression, message)
    }

    pub fn invalid_argument(transform: &str, message: impl Into<String>) -> Self {
        Self::new(
            TransformErrorKind::InvalidArgument,
            format!("{transform}: {}", message.into()),
        )
    }

    /// Attach the group and rule where the error arose, keeping any
    /// location already recorded deeper in the call
    pub fn at(mut self, group: &str, rule: Option<&str>) -> Self {
        if self.group.is_none() {
            self.group = Some(group.to_string());
            self.rule = rule.map(str::to_string);
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string())
    }
}

impl From<ModelError> for TransformError {
    fn from(err: ModelError) -> Self {
        let kind = match err {
            ModelError::ResourceNotFound(_) | ModelError::WrongKind { .. } => {
                TransformErrorKind::ResourceNotFound
            }
            ModelError::Validation(_) | ModelError::Expansion(_) => {
                TransformErrorKind::TerminologyFailure
            }
            _ => TransformErrorKind::UnresolvedType,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<TreeError> for TransformError {
    fn from(err: TreeError) -> Self {
        Self::new(TransformErrorKind::InvalidInput, err.to_string())
    }
}
