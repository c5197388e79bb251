//! Analysis configuration

use octofhir_fml_model::FetchPolicy;
use serde::{Deserialize, Serialize};

/// Options for [`Analyzer::analyse`](crate::Analyzer::analyse)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Groups to start from; all groups when empty
    pub entry_groups: Vec<String>,
    /// Maximum nesting of dependent invocations and extends
    pub max_depth: usize,
    /// How unresolvable `uses` and `imports` URLs are reported
    pub fetch_policy: FetchPolicy,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            entry_groups: Vec::new(),
            max_depth: 64,
            fetch_policy: FetchPolicy::Lenient,
        }
    }
}

impl AnalysisOptions {
    pub fn with_entry_group(mut self, name: impl Into<String>) -> Self {
        self.entry_groups.push(name.into());
        self
    }
}
