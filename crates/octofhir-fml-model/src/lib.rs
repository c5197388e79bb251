//! FML collaborator model
//!
//! This crate provides:
//! - FHIR structure definitions and concept maps as serde types
//! - The [`TypeProvider`], [`ResourceResolver`] and [`TerminologyService`]
//!   traits consumed by the analyzer and the executor
//! - Type navigation over element definitions ([`TypeContext`])
//! - An in-memory [`ModelRegistry`] and [`InMemoryTerminology`] for loading
//!   definitions from JSON and for tests

mod concept_map;
mod error;
mod navigation;
mod provider;
mod registry;
mod structure;
mod terminology;

pub use concept_map::*;
pub use error::*;
pub use navigation::*;
pub use provider::*;
pub use registry::*;
pub use structure::*;
pub use terminology::*;
