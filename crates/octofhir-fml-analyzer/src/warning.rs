//! Analysis warnings

use octofhir_fml_diagnostics::{
    Diagnostic, ErrorCode, FML0100, FML0101, FML0102, FML0103, FML0104, FML0105, FML0106,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an [`AnalysisWarning`] is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisWarningKind {
    UnresolvedType,
    UnresolvedGroup,
    UnboundVariable,
    UnknownElement,
    RecursiveInvocation,
    ResourceNotFound,
    UndeclaredAlias,
}

impl AnalysisWarningKind {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnresolvedType => FML0100,
            Self::UnresolvedGroup => FML0101,
            Self::UnboundVariable => FML0102,
            Self::UnknownElement => FML0103,
            Self::RecursiveInvocation => FML0104,
            Self::ResourceNotFound => FML0105,
            Self::UndeclaredAlias => FML0106,
        }
    }
}

/// A non-fatal analysis finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub code: ErrorCode,
    pub kind: AnalysisWarningKind,
    /// Group the finding belongs to; empty for map-level findings
    pub group: String,
    /// Rule name, when the finding belongs to a rule
    pub rule: Option<String>,
    pub message: String,
}

impl AnalysisWarning {
    pub fn new(
        kind: AnalysisWarningKind,
        group: &str,
        rule: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: kind.code(),
            kind,
            group: group.to_string(),
            rule: rule.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::warning(self.code, self.to_string())
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{}: group {}, rule {}: {}", self.code, self.group, rule, self.message),
            None if self.group.is_empty() => write!(f, "{}: {}", self.code, self.message),
            None => write!(f, "{}: group {}: {}", self.code, self.group, self.message),
        }
    }
}
