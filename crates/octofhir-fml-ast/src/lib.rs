//! FML mapping definition model
//!
//! This crate defines the in-memory form of a FHIR Mapping Language document:
//! the [`MappingDefinition`] produced by the parser and consumed by the
//! analyzer, the executor and the renderer, plus the FHIRPath-subset
//! [`Expression`] tree used by rule conditions and `evaluate` transforms.
//!
//! The model carries no source positions, so two definitions compare equal
//! exactly when they describe the same mapping.

mod expression;
mod literal;
mod map;
mod operator;
mod rule;
mod transform;

pub use expression::*;
pub use literal::*;
pub use map::*;
pub use operator::*;
pub use rule::*;
pub use transform::*;

/// Words with grammatical meaning somewhere in a mapping document.
///
/// Names spelled like one of these are written in delimited form by the
/// renderer so they read back as names.
pub const RESERVED_WORDS: &[&str] = &[
    "alias", "and", "as", "check", "collate", "conceptmap", "contains", "default", "div",
    "extends", "false", "first", "group", "implies", "imports", "in", "last", "let", "log",
    "map", "mod", "not_first", "not_last", "only_one", "or", "prefix", "produced", "queried",
    "share", "single", "source", "target", "then", "true", "type", "types", "uses", "where",
    "while", "xor",
];

/// Whether `name` can be written without delimiters
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !RESERVED_WORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("Patient"));
        assert!(is_plain_identifier("_tmp1"));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier("has space"));
        assert!(!is_plain_identifier("then"));
        assert!(!is_plain_identifier(""));
    }
}
