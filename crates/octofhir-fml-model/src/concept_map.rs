//! FHIR ConceptMap subset used by `translate`

use crate::Coding;
use octofhir_fml_ast::{ConceptMap, ConceptRelationship};
use serde::{Deserialize, Serialize};

/// A ConceptMap resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapResource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Vec<ConceptMapGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub element: Vec<SourceElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default)]
    pub target: Vec<TargetElement>,
}

/// A mapped concept; R4 uses `equivalence`, R5 `relationship`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl TargetElement {
    /// Whether the mapping may be used for a translation
    pub fn is_match(&self) -> bool {
        let excluded = ["unmatched", "disjoint", "not-related-to"];
        ![self.equivalence.as_deref(), self.relationship.as_deref()]
            .into_iter()
            .flatten()
            .any(|r| excluded.contains(&r))
    }
}

impl ConceptMapResource {
    /// Build from an embedded `conceptmap` block; `url` is the `#name` reference
    pub fn from_embedded(map: &ConceptMap) -> Self {
        let mut resource = Self {
            url: format!("#{}", map.name),
            name: Some(map.name.clone()),
            group: Vec::new(),
        };
        for mapping in &map.mappings {
            let source = map.prefix_url(&mapping.source_prefix).map(str::to_string);
            let target = map.prefix_url(&mapping.target_prefix).map(str::to_string);
            let index = match resource
                .group
                .iter()
                .position(|g| g.source == source && g.target == target)
            {
                Some(index) => index,
                None => {
                    resource.group.push(ConceptMapGroup {
                        source,
                        target,
                        element: Vec::new(),
                    });
                    resource.group.len() - 1
                }
            };
            resource.group[index].element.push(SourceElement {
                code: Some(mapping.source_code.clone()),
                display: None,
                target: vec![TargetElement {
                    code: Some(mapping.target_code.clone()),
                    display: None,
                    equivalence: Some(equivalence_name(mapping.relationship).to_string()),
                    relationship: None,
                }],
            });
        }
        resource
    }

    /// Target concepts for `code` (in `system`, or any source system when `None`)
    pub fn translate(&self, system: Option<&str>, code: &str) -> Vec<Coding> {
        self.group
            .iter()
            .filter(|g| system.is_none_or(|s| g.source.as_deref().is_none_or(|src| src == s)))
            .flat_map(|g| {
                g.element
                    .iter()
                    .filter(|e| e.code.as_deref() == Some(code))
                    .flat_map(|e| e.target.iter())
                    .filter(|t| t.is_match())
                    .filter_map(move |t| {
                        Some(Coding {
                            system: g.target.clone(),
                            code: t.code.clone()?,
                            display: t.display.clone(),
                        })
                    })
            })
            .collect()
    }
}

fn equivalence_name(relationship: ConceptRelationship) -> &'static str {
    match relationship {
        ConceptRelationship::Equivalent => "equivalent",
        ConceptRelationship::Equal => "equal",
        ConceptRelationship::Disjoint => "disjoint",
        ConceptRelationship::Wider => "wider",
        ConceptRelationship::Narrower => "narrower",
        ConceptRelationship::Inexact => "inexact",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fml_ast::{ConceptMapPrefix, ConceptMapping};
    use pretty_assertions::assert_eq;

    fn embedded() -> ConceptMap {
        let mut map = ConceptMap::new("sex");
        map.prefixes = vec![
            ConceptMapPrefix {
                prefix: "s".into(),
                url: "http://example.org/sex".into(),
            },
            ConceptMapPrefix {
                prefix: "t".into(),
                url: "http://hl7.org/fhir/administrative-gender".into(),
            },
        ];
        for (code, relationship, target) in [
            ("M", ConceptRelationship::Equivalent, "male"),
            ("F", ConceptRelationship::Equivalent, "female"),
            ("X", ConceptRelationship::Disjoint, "other"),
        ] {
            map.mappings.push(ConceptMapping {
                source_prefix: "s".into(),
                source_code: code.into(),
                relationship,
                target_prefix: "t".into(),
                target_code: target.into(),
            });
        }
        map
    }

    #[test]
    fn test_embedded_translation() {
        let resource = ConceptMapResource::from_embedded(&embedded());
        assert_eq!(resource.url, "#sex");
        assert_eq!(resource.group.len(), 1);
        assert_eq!(
            resource.translate(Some("http://example.org/sex"), "F"),
            vec![Coding {
                system: Some("http://hl7.org/fhir/administrative-gender".into()),
                code: "female".into(),
                display: None,
            }]
        );
    }

    #[test]
    fn test_disjoint_and_other_systems_excluded() {
        let resource = ConceptMapResource::from_embedded(&embedded());
        assert!(resource.translate(None, "X").is_empty());
        assert!(resource.translate(Some("http://other"), "M").is_empty());
        assert_eq!(resource.translate(None, "M")[0].code, "male");
    }

    #[test]
    fn test_r4_json() {
        let json = r#"{
            "resourceType": "ConceptMap",
            "url": "http://example.org/ConceptMap/status",
            "group": [{
                "source": "http://example.org/status",
                "target": "http://hl7.org/fhir/observation-status",
                "element": [
                    {"code": "F", "target": [{"code": "final", "display": "Final", "equivalence": "equivalent"}]},
                    {"code": "Z", "target": [{"equivalence": "unmatched"}]}
                ]
            }]
        }"#;
        let resource: ConceptMapResource = serde_json::from_str(json).unwrap();
        let found = resource.translate(None, "F");
        assert_eq!(found[0].display.as_deref(), Some("Final"));
        assert!(resource.translate(None, "Z").is_empty());
    }
}
