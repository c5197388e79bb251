//! Concrete element trees for FML execution
//!
//! Inputs and outputs of a transform are nodes of one [`ElementTree`] arena.
//! A node has an optional type name, an optional [`PrimitiveValue`] and an
//! ordered list of named children.

mod tree;
mod value;

pub use tree::*;
pub use value::*;

/// Errors building a tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("Unsupported JSON: {0}")]
    UnsupportedJson(String),
    #[error("Node {0} does not belong to this tree")]
    UnknownNode(u32),
}
