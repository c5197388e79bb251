//! FHIR Mapping Language (FML) implementation for Rust
//!
//! This crate ties the FML pipeline together:
//! - Parsing mapping documents into a [`MappingDefinition`]
//! - Rendering definitions back to canonical FML text
//! - Static analysis of the element profiles each group reads and writes
//! - Executing a mapping over JSON or [`ElementTree`] inputs
//!
//! # Example
//!
//! ```
//! use octofhir_fml::{ModelRegistry, NoopTerminology, TransformOptions, parse, transform_json};
//! use serde_json::json;
//!
//! let map = parse("group Main(source src, target tgt) { src.id as id -> tgt.id = id; }").unwrap();
//! let registry = ModelRegistry::new();
//! let outputs = transform_json(
//!     &map,
//!     &json!({"id": "p1"}),
//!     &registry,
//!     &NoopTerminology,
//!     &TransformOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(outputs, vec![json!({"id": "p1"})]);
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_fml_analyzer as analyzer;
pub use octofhir_fml_ast as ast;
pub use octofhir_fml_diagnostics as diagnostics;
pub use octofhir_fml_eval as eval;
pub use octofhir_fml_model as model;
pub use octofhir_fml_parser as parser;
pub use octofhir_fml_types as types;

// Convenience re-exports
pub use octofhir_fml_analyzer::{AnalysisOptions, AnalysisResult, Analyzer};
pub use octofhir_fml_ast::MappingDefinition;
pub use octofhir_fml_diagnostics::{Diagnostic, FmlError};
pub use octofhir_fml_eval::{
    ErrorPolicy, TerminologyFailureMode, TransformError, TransformOptions, TransformOutcome,
    Transformer,
};
pub use octofhir_fml_model::{
    InMemoryTerminology, ModelRegistry, NoopTerminology, ResourceResolver, TerminologyService,
    TypeProvider,
};
pub use octofhir_fml_parser::{parse, parse_with_options, render};
pub use octofhir_fml_types::{ElementTree, TreeError};

use octofhir_fml_diagnostics::FML0402;

/// Any failure of the parse-and-transform pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] FmlError),

    /// The input could not be loaded into a tree
    #[error("invalid input: {0}")]
    Input(#[from] TreeError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl Error {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Syntax(e) => e.to_diagnostic(),
            Self::Input(e) => Diagnostic::error(FML0402, e.to_string()),
            Self::Transform(e) => e.to_diagnostic(),
        }
    }
}

/// Analyse `map` against the types known to `registry`
pub fn analyse(
    map: &MappingDefinition,
    registry: &ModelRegistry,
    options: &AnalysisOptions,
) -> AnalysisResult {
    Analyzer::new(registry, registry).analyse(map, options)
}

/// Run `map` over one JSON input and return every output as JSON
///
/// The input fills the entry group's single source parameter; its target
/// parameters start as new nodes of their declared types.
pub fn transform_json(
    map: &MappingDefinition,
    input: &serde_json::Value,
    registry: &ModelRegistry,
    terminology: &dyn TerminologyService,
    options: &TransformOptions,
) -> Result<Vec<serde_json::Value>, Error> {
    let mut tree = ElementTree::new();
    let root = tree.import_json(input, None)?;
    let outcome = Transformer::new(registry, registry, terminology)
        .transform(map, &mut tree, &[root], None, options)?;
    if !outcome.issues.is_empty() {
        log::debug!("transform finished with {} issue(s)", outcome.issues.len());
    }
    Ok(outcome.to_json(&tree))
}

/// Parse `source` and run it over `input`
pub fn transform_source(
    source: &str,
    input: &serde_json::Value,
    registry: &ModelRegistry,
    terminology: &dyn TerminologyService,
    options: &TransformOptions,
) -> Result<Vec<serde_json::Value>, Error> {
    let map = parse(source)?;
    transform_json(&map, input, registry, terminology, options)
}
