//! FML transform executor
//!
//! This crate runs parsed mapping definitions:
//! - [`Transformer`] executes a group against nodes of an
//!   [`ElementTree`](octofhir_fml_types::ElementTree) and writes the targets
//! - [`ExpressionContext`] evaluates the FHIRPath subset used by conditions
//!   and `evaluate`
//! - [`TransformOptions`] select the error policy, the terminology failure
//!   mode and the fetch policy
//!
//! Type metadata, canonical resources and terminology come from the
//! collaborator traits of `octofhir-fml-model`.
//!
//! ```ignore
//! let transformer = Transformer::new(&registry, &registry, &NoopTerminology);
//! let outcome = transformer.transform(&map, &mut tree, &[input], None, &TransformOptions::default())?;
//! ```

mod engine;
mod error;
mod expression;
mod options;
mod transforms;
mod value;

pub use engine::{Scope, TransformOutcome, Transformer};
pub use error::{EvalResult, TransformError, TransformErrorKind};
pub use expression::ExpressionContext;
pub use options::{ErrorPolicy, TerminologyFailureMode, TransformOptions, TransformOptionsBuilder};
pub use value::{Item, Value, navigate};
