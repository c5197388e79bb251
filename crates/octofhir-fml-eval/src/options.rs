//! Executor configuration

use octofhir_fml_model::{FetchPolicy, TerminologyServiceOptions};
use serde::{Deserialize, Serialize};

/// Smallest unit abandoned when a rule fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Any error fails the whole transform
    #[default]
    Transform,
    /// The failing group invocation is abandoned; its caller continues
    Group,
    /// The failing rule is abandoned; sibling rules still run
    Rule,
}

/// What a terminology failure does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminologyFailureMode {
    /// Skip the rest of the rule for the failing binding and record an issue
    #[default]
    SkipAssignment,
    /// Fail with [`TransformErrorKind::TerminologyFailure`](crate::TransformErrorKind::TerminologyFailure)
    Abort,
}

/// Options for [`Transformer::transform`](crate::Transformer::transform)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    pub error_policy: ErrorPolicy,
    pub terminology_failure: TerminologyFailureMode,
    /// How missing imports, concept maps and `create` types are treated
    pub fetch_policy: FetchPolicy,
    /// Maximum nesting of group invocations
    pub max_depth: usize,
    pub terminology_options: TerminologyServiceOptions,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            terminology_failure: TerminologyFailureMode::default(),
            fetch_policy: FetchPolicy::default(),
            max_depth: 64,
            terminology_options: TerminologyServiceOptions::default(),
        }
    }
}

impl TransformOptions {
    pub fn builder() -> TransformOptionsBuilder {
        TransformOptionsBuilder::default()
    }
}

/// Builder for [`TransformOptions`]
#[derive(Debug, Clone, Default)]
pub struct TransformOptionsBuilder {
    options: TransformOptions,
}

impl TransformOptionsBuilder {
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.error_policy = policy;
        self
    }

    pub fn terminology_failure(mut self, mode: TerminologyFailureMode) -> Self {
        self.options.terminology_failure = mode;
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.options.fetch_policy = policy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    pub fn terminology_options(mut self, options: TerminologyServiceOptions) -> Self {
        self.options.terminology_options = options;
        self
    }

    pub fn build(self) -> TransformOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = TransformOptions::builder()
            .error_policy(ErrorPolicy::Rule)
            .max_depth(8)
            .build();
        assert_eq!(options.error_policy, ErrorPolicy::Rule);
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.terminology_failure, TerminologyFailureMode::SkipAssignment);
    }

    #[test]
    fn test_from_json() {
        let options: TransformOptions =
            serde_json::from_str(r#"{"errorPolicy": "group", "terminologyFailure": "abort"}"#).unwrap();
        assert_eq!(options.error_policy, ErrorPolicy::Group);
        assert_eq!(options.terminology_failure, TerminologyFailureMode::Abort);
        assert_eq!(options.max_depth, 64);
    }
}
