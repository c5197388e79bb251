//! In-memory resource registry implementing TypeProvider and ResourceResolver

use crate::{
    ConceptMapResource, ModelError, Resource, ResourceResolver, StructureDefinition, TypeProvider,
    core_type_url,
};
use indexmap::IndexMap;
use octofhir_fml_ast::MappingDefinition;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default)]
struct RegistryInner {
    /// Canonical URL to resource
    resources: IndexMap<String, Resource>,
    /// Type name to canonical URL
    types: IndexMap<String, String>,
}

/// Registry of structure definitions, concept maps and structure maps
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load resources from a JSON string: one resource, an array of
    /// resources or a Bundle
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let registry = Self::new();
        registry.load_json(json)?;
        Ok(registry)
    }

    /// Load resources from a JSON file at runtime
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add resources from JSON, returning how many were registered
    pub fn load_json(&self, json: &str) -> Result<usize, ModelError> {
        let value: Value = serde_json::from_str(json)?;
        self.load_value(&value)
    }

    pub fn load_value(&self, value: &Value) -> Result<usize, ModelError> {
        match value {
            Value::Array(items) => items.iter().try_fold(0, |n, item| Ok(n + self.load_value(item)?)),
            Value::Object(fields) => match fields.get("resourceType").and_then(Value::as_str) {
                Some("Bundle") => fields
                    .get("entry")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|entry| entry.get("resource"))
                    .try_fold(0, |n, resource| Ok(n + self.load_value(resource)?)),
                Some("StructureDefinition") => {
                    let sd: StructureDefinition = serde_json::from_value(value.clone())?;
                    self.add_structure_definition(sd);
                    Ok(1)
                }
                Some("ConceptMap") => {
                    let cm: ConceptMapResource = serde_json::from_value(value.clone())?;
                    self.add_concept_map(cm);
                    Ok(1)
                }
                other => {
                    log::debug!("Skipping resource of type {}", other.unwrap_or("<none>"));
                    Ok(0)
                }
            },
            _ => Err(ModelError::Load("expected a JSON object or array".into())),
        }
    }

    /// Register a structure definition under its URL and type name
    ///
    /// The type name points at the core definition when one is registered,
    /// so profiles never shadow the base type.
    pub fn add_structure_definition(&self, sd: StructureDefinition) {
        let mut inner = self.inner.write();
        let url = sd.url.clone();
        let is_core = url == core_type_url(&sd.type_name);
        if is_core || !inner.types.contains_key(&sd.type_name) {
            inner.types.insert(sd.type_name.clone(), url.clone());
        }
        if !sd.name.is_empty() && !inner.types.contains_key(&sd.name) {
            inner.types.insert(sd.name.clone(), url.clone());
        }
        inner
            .resources
            .insert(url, Resource::StructureDefinition(Arc::new(sd)));
    }

    pub fn add_concept_map(&self, cm: ConceptMapResource) {
        self.inner
            .write()
            .resources
            .insert(cm.url.clone(), Resource::ConceptMap(Arc::new(cm)));
    }

    /// Register a parsed mapping definition under its `url` metadata
    pub fn add_structure_map(&self, map: MappingDefinition) -> Result<(), ModelError> {
        let url = map
            .metadata
            .url
            .clone()
            .ok_or_else(|| ModelError::Load("structure map has no url".into()))?;
        self.inner
            .write()
            .resources
            .insert(url, Resource::StructureMap(Arc::new(map)));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().resources.is_empty()
    }

    /// Registered canonical URLs, in registration order
    pub fn urls(&self) -> Vec<String> {
        self.inner.read().resources.keys().cloned().collect()
    }
}

impl TypeProvider for ModelRegistry {
    fn resolve_type(&self, name_or_url: &str) -> Result<Option<Arc<StructureDefinition>>, ModelError> {
        let inner = self.inner.read();
        let url = inner
            .types
            .get(name_or_url)
            .map(String::as_str)
            .unwrap_or(name_or_url);
        Ok(match inner.resources.get(url) {
            Some(Resource::StructureDefinition(sd)) => Some(Arc::clone(sd)),
            _ => None,
        })
    }
}

impl ResourceResolver for ModelRegistry {
    fn resolve(&self, url: &str) -> Result<Option<Resource>, ModelError> {
        Ok(self.inner.read().resources.get(url).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FetchPolicy, StructureKind};
    use std::io::Write;

    const BUNDLE: &str = r#"{
        "resourceType": "Bundle",
        "entry": [
            {"resource": {
                "resourceType": "StructureDefinition",
                "url": "http://hl7.org/fhir/StructureDefinition/Patient",
                "name": "Patient",
                "type": "Patient",
                "kind": "resource",
                "snapshot": {"element": [{"path": "Patient"}, {"path": "Patient.active", "max": "1", "type": [{"code": "boolean"}]}]}
            }},
            {"resource": {
                "resourceType": "ConceptMap",
                "url": "http://example.org/ConceptMap/gender",
                "group": []
            }},
            {"resource": {"resourceType": "Patient", "id": "ignored"}}
        ]
    }"#;

    #[test]
    fn test_from_bundle() {
        let registry = ModelRegistry::from_json(BUNDLE).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve_type("Patient").unwrap().is_some());
        assert!(registry.resolve_core_type("Patient").unwrap().is_some());

        let resolver: &dyn ResourceResolver = &registry;
        let cm = resolver
            .fetch_as::<ConceptMapResource>("http://example.org/ConceptMap/gender", FetchPolicy::Strict)
            .unwrap();
        assert!(cm.is_some());
    }

    #[test]
    fn test_wrong_kind() {
        let registry = ModelRegistry::from_json(BUNDLE).unwrap();
        let resolver: &dyn ResourceResolver = &registry;
        let url = "http://example.org/ConceptMap/gender";
        assert!(
            resolver
                .fetch_as::<StructureDefinition>(url, FetchPolicy::Lenient)
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            resolver.fetch_as::<StructureDefinition>(url, FetchPolicy::Strict),
            Err(ModelError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_profile_does_not_shadow_core_type() {
        let registry = ModelRegistry::new();
        registry.add_structure_definition(StructureDefinition::new(
            "http://hl7.org/fhir/StructureDefinition/Patient",
            "Patient",
            StructureKind::Resource,
        ));
        let mut profile = StructureDefinition::new(
            "http://example.org/StructureDefinition/MyPatient",
            "Patient",
            StructureKind::Resource,
        );
        profile.name = "MyPatient".into();
        registry.add_structure_definition(profile);

        let resolved = registry.resolve_type("Patient").unwrap().unwrap();
        assert_eq!(resolved.url, "http://hl7.org/fhir/StructureDefinition/Patient");
        let by_name = registry.resolve_type("MyPatient").unwrap().unwrap();
        assert_eq!(by_name.url, "http://example.org/StructureDefinition/MyPatient");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BUNDLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let registry = ModelRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.urls().len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelRegistry::from_json_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        assert!(matches!(
            ModelRegistry::from_json("{not json"),
            Err(ModelError::Load(_))
        ));
        assert!(matches!(
            ModelRegistry::from_json("42"),
            Err(ModelError::Load(_))
        ));
    }
}
