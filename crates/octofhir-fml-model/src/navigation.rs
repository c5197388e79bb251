//! Walking element paths through type metadata

use crate::{ModelError, StructureDefinition, TypeProvider};
use octofhir_fml_types::is_primitive_type;
use std::sync::Arc;

/// A position in type metadata: a type's root or one of its inline
/// (backbone) elements
#[derive(Debug, Clone, PartialEq)]
pub struct TypeContext {
    definition: Arc<StructureDefinition>,
    path: String,
    type_name: String,
}

impl TypeContext {
    /// Root of a type
    pub fn new(definition: Arc<StructureDefinition>) -> Self {
        Self {
            path: definition.root_path().to_string(),
            type_name: definition.type_name.clone(),
            definition,
        }
    }

    pub fn definition(&self) -> &Arc<StructureDefinition> {
        &self.definition
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Type name of the position (`BackboneElement` for inline elements)
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Resolve child `name`
    ///
    /// Inline elements stay inside the same definition; anything else with a
    /// single complex type code is resolved through `provider`. Returns
    /// `Ok(None)` when the definition has no such element.
    pub fn element(
        &self,
        name: &str,
        provider: &dyn TypeProvider,
    ) -> Result<Option<ResolvedElement>, ModelError> {
        let Some(found) = self.definition.child(&self.path, name) else {
            return Ok(None);
        };
        let definition = found.definition;
        let inline = self.definition.has_children(&found.path);
        let context = if inline {
            Some(Self {
                definition: Arc::clone(&self.definition),
                type_name: found
                    .type_code
                    .clone()
                    .unwrap_or_else(|| "BackboneElement".to_string()),
                path: found.path.clone(),
            })
        } else {
            match found.type_code.as_deref() {
                Some(code) if !is_primitive_type(code) => {
                    provider.resolve_core_type(code)?.map(Self::new)
                }
                _ => None,
            }
        };
        Ok(Some(ResolvedElement {
            name: name.to_string(),
            type_code: found.type_code,
            min: definition.min_occurs(),
            max: definition.max_occurs(),
            context,
        }))
    }
}

/// An element found by [`TypeContext::element`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    pub name: String,
    /// Declared type code; `None` for an unselected choice
    pub type_code: Option<String>,
    pub min: u32,
    /// `None` when unbounded
    pub max: Option<u32>,
    /// Where to continue navigating; `None` for primitives and unresolved types
    pub context: Option<TypeContext>,
}

impl ResolvedElement {
    pub fn is_repeating(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }

    /// Type name for display: the context type, else the declared code
    pub fn type_name(&self) -> &str {
        self.context
            .as_ref()
            .map(TypeContext::type_name)
            .or(self.type_code.as_deref())
            .unwrap_or("unknown")
    }
}
