//! Static analysis of FML mapping definitions
//!
//! The [`Analyzer`] walks a [`MappingDefinition`](octofhir_fml_ast::MappingDefinition)
//! against type metadata and builds, for each group, the tree of elements
//! its rules read from the inputs and write to the outputs. Nothing is
//! executed. Problems are collected as [`AnalysisWarning`]s and never abort
//! the analysis.

mod analyzer;
mod options;
mod profile;
mod warning;

pub use analyzer::Analyzer;
pub use options::AnalysisOptions;
pub use profile::{AnalysisResult, GroupProfile, ProfileElement};
pub use warning::{AnalysisWarning, AnalysisWarningKind};
