//! FML parser and canonical renderer
//!
//! This crate turns FHIR Mapping Language source text into a
//! [`MappingDefinition`] and back. Parsing is a recursive descent over the
//! token stream produced by [`Lexer`]; expressions use precedence climbing.
//! The first error aborts the parse and is reported with its position.
//!
//! ```
//! use octofhir_fml_parser::{parse, render};
//!
//! let map = parse("group Main(source src, target tgt) { src.id -> tgt.id; }").unwrap();
//! assert_eq!(map.groups[0].rules[0].name, "id");
//! let text = render(&map);
//! assert_eq!(parse(&text).unwrap(), map);
//! ```

mod expression;
mod lexer;
mod parser;
mod render;

pub use lexer::{Lexer, Token, tokenize};
pub use render::{render, render_expression};

use octofhir_fml_ast::{Expression, MappingDefinition};
use octofhir_fml_diagnostics::Result;
use parser::Parser;
use serde::{Deserialize, Serialize};

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Maximum nesting of rule blocks and sub-expressions
    pub max_nesting_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
        }
    }
}

/// Parse a mapping document with default options
pub fn parse(source: &str) -> Result<MappingDefinition> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse a mapping document
pub fn parse_with_options(source: &str, options: &ParseOptions) -> Result<MappingDefinition> {
    let mut parser = Parser::new(source, options);
    let map = parser.mapping_definition()?;
    log::debug!(
        "parsed mapping '{}' with {} group(s)",
        map.metadata.url.as_deref().unwrap_or("<anonymous>"),
        map.groups.len()
    );
    Ok(map)
}

/// Parse a standalone expression of the FHIRPath subset
pub fn parse_expression(source: &str) -> Result<Expression> {
    let mut parser = Parser::new(source, &ParseOptions::default());
    let expression = parser.expression()?;
    parser.expect_end()?;
    Ok(expression)
}
