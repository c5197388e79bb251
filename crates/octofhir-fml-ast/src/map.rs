//! Mapping definition structure

use crate::{Group, Literal};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete mapping document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDefinition {
    pub metadata: Metadata,
    /// `uses` declarations
    pub structures: Vec<StructureDeclaration>,
    /// `imports` declarations (canonical URLs of other maps)
    pub imports: Vec<String>,
    /// `let` constants
    pub constants: Vec<Constant>,
    /// Embedded `conceptmap` blocks
    pub concept_maps: Vec<ConceptMap>,
    pub groups: Vec<Group>,
}

impl MappingDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub fn structure(&self, alias: &str) -> Option<&StructureDeclaration> {
        self.structures.iter().find(|s| s.alias_or_name() == alias)
    }

    pub fn constant(&self, name: &str) -> Option<&Literal> {
        self.constants.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    pub fn concept_map(&self, name: &str) -> Option<&ConceptMap> {
        self.concept_maps.iter().find(|c| c.name == name)
    }

    /// The first group, the default entry point
    pub fn entry_group(&self) -> Option<&Group> {
        self.groups.first()
    }
}

/// Header metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub url: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    /// Other `/// key = value` entries in declaration order
    pub extra: IndexMap<String, String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.name.is_none()
            && self.title.is_none()
            && self.status.is_none()
            && self.extra.is_empty()
    }

    /// Store an entry, routing the well-known keys to their fields
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match key {
            "url" => self.url = Some(value),
            "name" => self.name = Some(value),
            "title" => self.title = Some(value),
            "status" => self.status = Some(value),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    /// All entries, well-known keys first
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let known = [
            ("url", &self.url),
            ("name", &self.name),
            ("title", &self.title),
            ("status", &self.status),
        ];
        known
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect()
    }
}

/// How a structure is used by the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureMode {
    Source,
    Target,
    Queried,
    Produced,
}

impl StructureMode {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "source" => Some(Self::Source),
            "target" => Some(Self::Target),
            "queried" => Some(Self::Queried),
            "produced" => Some(Self::Produced),
            _ => None,
        }
    }

    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Queried => "queried",
            Self::Produced => "produced",
        }
    }
}

impl fmt::Display for StructureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `uses "url" alias Name as source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDeclaration {
    pub url: String,
    pub alias: Option<String>,
    pub mode: StructureMode,
}

impl StructureDeclaration {
    pub fn new(url: impl Into<String>, mode: StructureMode) -> Self {
        Self {
            url: url.into(),
            alias: None,
            mode,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias, or the last path segment of the URL
    pub fn alias_or_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.url.rsplit('/').next().unwrap_or(&self.url),
        }
    }
}

/// `let name = literal;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: Literal,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: Literal) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An embedded concept map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMap {
    pub name: String,
    pub prefixes: Vec<ConceptMapPrefix>,
    pub mappings: Vec<ConceptMapping>,
}

impl ConceptMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// System URL bound to a prefix
    pub fn prefix_url(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| p.prefix == prefix)
            .map(|p| p.url.as_str())
    }

    /// Mappings whose source is `code` in `system` (any system when `None`)
    pub fn lookup<'a>(
        &'a self,
        system: Option<&'a str>,
        code: &'a str,
    ) -> impl Iterator<Item = &'a ConceptMapping> + 'a {
        self.mappings.iter().filter(move |m| {
            m.source_code == code
                && system.is_none_or(|s| self.prefix_url(&m.source_prefix) == Some(s))
        })
    }
}

/// `prefix s = "http://..."`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMapPrefix {
    pub prefix: String,
    pub url: String,
}

/// `s:code == t:code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMapping {
    pub source_prefix: String,
    pub source_code: String,
    pub relationship: ConceptRelationship,
    pub target_prefix: String,
    pub target_code: String,
}

/// Relationship between a source and a target concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConceptRelationship {
    Equivalent,
    Equal,
    Disjoint,
    Wider,
    Narrower,
    Inexact,
}

impl ConceptRelationship {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Equivalent => "==",
            Self::Equal => "=",
            Self::Disjoint => "!=",
            Self::Wider => "<=",
            Self::Narrower => ">=",
            Self::Inexact => "~",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => Self::Equivalent,
            "=" => Self::Equal,
            "!=" => Self::Disjoint,
            "<=" => Self::Wider,
            ">=" => Self::Narrower,
            "~" => Self::Inexact,
            _ => return None,
        })
    }

    /// Whether a translation may use this mapping
    pub const fn is_match(&self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_routes_known_keys() {
        let mut meta = Metadata::default();
        meta.set("url", "http://example.org/map");
        meta.set("publisher", "ACME");
        assert_eq!(meta.url.as_deref(), Some("http://example.org/map"));
        assert_eq!(
            meta.entries(),
            vec![("url", "http://example.org/map"), ("publisher", "ACME")]
        );
    }

    #[test]
    fn test_structure_alias_fallback() {
        let decl = StructureDeclaration::new(
            "http://hl7.org/fhir/StructureDefinition/Patient",
            StructureMode::Source,
        );
        assert_eq!(decl.alias_or_name(), "Patient");
        assert_eq!(decl.with_alias("Pat").alias_or_name(), "Pat");
    }

    #[test]
    fn test_concept_map_lookup() {
        let mut cm = ConceptMap::new("gender");
        cm.prefixes.push(ConceptMapPrefix {
            prefix: "s".into(),
            url: "http://src".into(),
        });
        cm.prefixes.push(ConceptMapPrefix {
            prefix: "t".into(),
            url: "http://tgt".into(),
        });
        cm.mappings.push(ConceptMapping {
            source_prefix: "s".into(),
            source_code: "M".into(),
            relationship: ConceptRelationship::Equivalent,
            target_prefix: "t".into(),
            target_code: "male".into(),
        });
        assert_eq!(cm.lookup(None, "M").count(), 1);
        assert_eq!(cm.lookup(Some("http://src"), "M").count(), 1);
        assert_eq!(cm.lookup(Some("http://other"), "M").count(), 0);
    }

    #[test]
    fn test_relationship_symbols() {
        for rel in [
            ConceptRelationship::Equivalent,
            ConceptRelationship::Equal,
            ConceptRelationship::Disjoint,
            ConceptRelationship::Wider,
            ConceptRelationship::Narrower,
            ConceptRelationship::Inexact,
        ] {
            assert_eq!(ConceptRelationship::from_symbol(rel.symbol()), Some(rel));
        }
    }
}
