//! FHIR StructureDefinition subset
//!
//! Only the parts used for type navigation are modelled: the type, its kind,
//! and the snapshot (or differential) element list with paths, cardinalities
//! and type codes. Unknown JSON fields are ignored on load.

use octofhir_fml_types::choice_type_code;
use serde::{Deserialize, Serialize};

/// `StructureDefinition.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

/// Structural type metadata for one type or profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StructureKind>,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ElementList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differential: Option<ElementList>,
}

/// `snapshot` / `differential`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementList {
    #[serde(default)]
    pub element: Vec<ElementDefinition>,
}

/// One element of a structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    /// `"*"` or a number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<ElementType>,
    /// `#Questionnaire.item`: the element has the content of another element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,
}

/// `ElementDefinition.type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementType {
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_profile: Vec<String>,
}

impl ElementType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            profile: Vec::new(),
            target_profile: Vec::new(),
        }
    }
}

impl ElementDefinition {
    pub fn new(path: impl Into<String>, type_codes: &[&str], min: u32, max: &str) -> Self {
        Self {
            id: None,
            path: path.into(),
            min: Some(min),
            max: Some(max.to_string()),
            types: type_codes.iter().map(|code| ElementType::new(*code)).collect(),
            content_reference: None,
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// `value[x]` style element
    pub fn is_choice(&self) -> bool {
        self.path.ends_with("[x]")
    }

    pub fn min_occurs(&self) -> u32 {
        self.min.unwrap_or(0)
    }

    /// Upper bound; `None` when unbounded
    pub fn max_occurs(&self) -> Option<u32> {
        match self.max.as_deref() {
            None | Some("*") => None,
            Some(max) => max.parse().ok(),
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.max_occurs().is_none_or(|max| max > 1)
    }

    pub fn type_codes(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.code.as_str())
    }

    /// Path named by `contentReference`, without the URL part
    pub fn referenced_path(&self) -> Option<&str> {
        let reference = self.content_reference.as_deref()?;
        Some(reference.rsplit_once('#').map_or(reference, |(_, path)| path))
    }
}

impl StructureDefinition {
    /// A definition with a root element and no children
    pub fn new(url: impl Into<String>, type_name: impl Into<String>, kind: StructureKind) -> Self {
        let type_name = type_name.into();
        Self {
            url: url.into(),
            name: type_name.clone(),
            snapshot: Some(ElementList {
                element: vec![ElementDefinition::new(type_name.clone(), &[], 0, "*")],
            }),
            type_name,
            kind: Some(kind),
            is_abstract: false,
            base_definition: None,
            differential: None,
        }
    }

    /// Add a snapshot element; `path` is relative to the root
    pub fn with_element(mut self, path: &str, type_codes: &[&str], min: u32, max: &str) -> Self {
        let full = format!("{}.{path}", self.root_path());
        self.snapshot
            .get_or_insert_with(ElementList::default)
            .element
            .push(ElementDefinition::new(full, type_codes, min, max));
        self
    }

    /// Add a snapshot element whose content is that of `referenced` (root-relative)
    pub fn with_content_reference(mut self, path: &str, referenced: &str, min: u32, max: &str) -> Self {
        let root = self.root_path().to_string();
        let mut element = ElementDefinition::new(format!("{root}.{path}"), &[], min, max);
        element.content_reference = Some(format!("#{root}.{referenced}"));
        self.snapshot
            .get_or_insert_with(ElementList::default)
            .element
            .push(element);
        self
    }

    /// Snapshot elements, or the differential when there is no snapshot
    pub fn elements(&self) -> &[ElementDefinition] {
        self.snapshot
            .as_ref()
            .or(self.differential.as_ref())
            .map(|list| list.element.as_slice())
            .unwrap_or_default()
    }

    /// Path of the root element
    pub fn root_path(&self) -> &str {
        self.elements()
            .first()
            .map(|e| e.path.as_str())
            .filter(|path| !path.contains('.'))
            .unwrap_or(&self.type_name)
    }

    pub fn element(&self, path: &str) -> Option<&ElementDefinition> {
        self.elements().iter().find(|e| e.path == path)
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == Some(StructureKind::PrimitiveType)
    }

    /// Whether elements are declared below `path`
    pub fn has_children(&self, path: &str) -> bool {
        self.children(path).next().is_some()
    }

    /// Direct children of `path`
    pub fn children<'a, 'p>(&'a self, path: &'p str) -> impl Iterator<Item = &'a ElementDefinition> + use<'a, 'p> {
        self.elements().iter().filter(move |e| {
            e.path
                .strip_prefix(path)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|rest| !rest.contains('.'))
        })
    }

    /// Find child `name` of the element at `parent_path`
    ///
    /// `name` may select one branch of a choice element (`valueString` for
    /// `value[x]`). A content reference is followed, so the match's `path`
    /// is where the element's own children are declared.
    pub fn child(&self, parent_path: &str, name: &str) -> Option<ElementMatch<'_>> {
        let direct = format!("{parent_path}.{name}");
        if let Some(definition) = self.element(&direct) {
            let type_code = match definition.types.as_slice() {
                [single] => Some(single.code.clone()),
                _ => None,
            };
            let path = definition
                .referenced_path()
                .map_or(direct, str::to_string);
            return Some(ElementMatch {
                definition,
                path,
                type_code,
            });
        }

        // `value` or `valueString` against `value[x]`
        self.children(parent_path)
            .filter(|e| e.is_choice())
            .find_map(|definition| {
                let base = definition.name().strip_suffix("[x]")?;
                let suffix = name.strip_prefix(base)?;
                let type_code = if suffix.is_empty() {
                    match definition.types.as_slice() {
                        [single] => Some(single.code.clone()),
                        _ => None,
                    }
                } else {
                    let code = choice_type_code(suffix);
                    if !definition.type_codes().any(|c| c == code) {
                        return None;
                    }
                    Some(code)
                };
                Some(ElementMatch {
                    definition,
                    path: definition.path.clone(),
                    type_code,
                })
            })
    }
}

/// Result of [`StructureDefinition::child`]
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMatch<'a> {
    pub definition: &'a ElementDefinition,
    /// Path whose children describe the element's content
    pub path: String,
    /// Type code when the element, or the selected choice branch, has exactly one
    pub type_code: Option<String>,
}
