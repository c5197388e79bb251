//! Collaborator traits for type and resource lookup

use crate::{ConceptMapResource, ModelError, StructureDefinition};
use octofhir_fml_ast::MappingDefinition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Canonical base of the core FHIR types
pub const CORE_TYPE_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

/// Canonical URL of a core type code; absolute URLs are returned unchanged
pub fn core_type_url(code: &str) -> String {
    if code.contains("://") || code.starts_with("urn:") {
        code.to_string()
    } else {
        format!("{CORE_TYPE_BASE}{code}")
    }
}

/// Trait for resolving structural type metadata
///
/// "Not found" is `Ok(None)`; errors are reserved for lookups that could not
/// be carried out.
pub trait TypeProvider: Send + Sync {
    /// Resolve a type by canonical URL or by type name
    fn resolve_type(&self, name_or_url: &str)
    -> Result<Option<Arc<StructureDefinition>>, ModelError>;

    /// Resolve a core type by code (`string`, `HumanName`, `Patient`)
    fn resolve_core_type(&self, code: &str) -> Result<Option<Arc<StructureDefinition>>, ModelError> {
        self.resolve_type(&core_type_url(code))
    }
}

/// What a caller wants when a canonical URL does not resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchPolicy {
    /// Not found is an absent value
    #[default]
    Lenient,
    /// Not found is an error
    Strict,
}

impl FetchPolicy {
    pub const fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// A resource addressable by canonical URL
#[derive(Debug, Clone)]
pub enum Resource {
    StructureDefinition(Arc<StructureDefinition>),
    ConceptMap(Arc<ConceptMapResource>),
    StructureMap(Arc<MappingDefinition>),
}

impl Resource {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::StructureDefinition(sd) => Some(&sd.url),
            Self::ConceptMap(cm) => Some(&cm.url),
            Self::StructureMap(map) => map.metadata.url.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StructureDefinition(_) => StructureDefinition::KIND,
            Self::ConceptMap(_) => ConceptMapResource::KIND,
            Self::StructureMap(_) => MappingDefinition::KIND,
        }
    }
}

/// Typed view of a [`Resource`]
pub trait FromResource: Sized {
    const KIND: &'static str;

    fn from_resource(resource: Resource) -> Option<Arc<Self>>;
}

impl FromResource for StructureDefinition {
    const KIND: &'static str = "StructureDefinition";

    fn from_resource(resource: Resource) -> Option<Arc<Self>> {
        match resource {
            Resource::StructureDefinition(sd) => Some(sd),
            _ => None,
        }
    }
}

impl FromResource for ConceptMapResource {
    const KIND: &'static str = "ConceptMap";

    fn from_resource(resource: Resource) -> Option<Arc<Self>> {
        match resource {
            Resource::ConceptMap(cm) => Some(cm),
            _ => None,
        }
    }
}

impl FromResource for MappingDefinition {
    const KIND: &'static str = "StructureMap";

    fn from_resource(resource: Resource) -> Option<Arc<Self>> {
        match resource {
            Resource::StructureMap(map) => Some(map),
            _ => None,
        }
    }
}

/// Trait for fetching resources by canonical URL
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, url: &str) -> Result<Option<Resource>, ModelError>;

    /// Lenient fetch: not found is `Ok(None)`
    fn fetch(&self, url: &str) -> Result<Option<Resource>, ModelError> {
        self.resolve(url)
    }

    /// Strict fetch: not found is [`ModelError::ResourceNotFound`]
    fn fetch_strict(&self, url: &str) -> Result<Resource, ModelError> {
        self.resolve(url)?
            .ok_or_else(|| ModelError::ResourceNotFound(url.to_string()))
    }

    fn fetch_with(&self, url: &str, policy: FetchPolicy) -> Result<Option<Resource>, ModelError> {
        match policy {
            FetchPolicy::Lenient => self.fetch(url),
            FetchPolicy::Strict => self.fetch_strict(url).map(Some),
        }
    }
}

impl dyn ResourceResolver + '_ {
    /// Fetch a resource of kind `T`
    ///
    /// A resource of another kind is treated like a missing one: absent when
    /// lenient, [`ModelError::WrongKind`] when strict.
    pub fn fetch_as<T: FromResource>(
        &self,
        url: &str,
        policy: FetchPolicy,
    ) -> Result<Option<Arc<T>>, ModelError> {
        let Some(resource) = self.fetch_with(url, policy)? else {
            return Ok(None);
        };
        match T::from_resource(resource) {
            Some(typed) => Ok(Some(typed)),
            None if policy.is_strict() => Err(ModelError::WrongKind {
                url: url.to_string(),
                expected: T::KIND,
            }),
            None => Ok(None),
        }
    }
}

/// Resolver with no resources
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl ResourceResolver for NoopResolver {
    fn resolve(&self, _url: &str) -> Result<Option<Resource>, ModelError> {
        Ok(None)
    }
}

impl TypeProvider for NoopResolver {
    fn resolve_type(&self, _name_or_url: &str) -> Result<Option<Arc<StructureDefinition>>, ModelError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Patient", "http://hl7.org/fhir/StructureDefinition/Patient")]
    #[case("http://example.org/StructureDefinition/X", "http://example.org/StructureDefinition/X")]
    #[case("urn:uuid:1", "urn:uuid:1")]
    fn test_core_type_url(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(core_type_url(code), expected);
    }

    #[test]
    fn test_fetch_policies_on_missing() {
        let resolver: &dyn ResourceResolver = &NoopResolver;
        assert!(resolver.fetch("urn:missing").unwrap().is_none());
        assert_eq!(
            resolver.fetch_strict("urn:missing").unwrap_err(),
            ModelError::ResourceNotFound("urn:missing".into())
        );
        assert!(
            resolver
                .fetch_as::<StructureDefinition>("urn:missing", FetchPolicy::Lenient)
                .unwrap()
                .is_none()
        );
    }
}
