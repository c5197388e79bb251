//! JSON interchange tests for element trees

use octofhir_fml_types::{ElementTree, PrimitiveValue};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

// === Import ===

#[test]
fn test_import_patient() {
    let mut tree = ElementTree::new();
    let patient = tree
        .import_json(
            &json!({
                "resourceType": "Patient",
                "id": "p1",
                "active": true,
                "name": [{"family": "Doe", "given": ["Jane", "Q"]}],
                "_birthDate": {"extension": []},
                "birthDate": "1970-01-01"
            }),
            None,
        )
        .unwrap();

    assert_eq!(tree.type_name(patient), Some("Patient"));
    let active = tree.first_child(patient, "active").unwrap();
    assert_eq!(tree.value(active), Some(&PrimitiveValue::Boolean(true)));

    let name = tree.first_child(patient, "name").unwrap();
    assert_eq!(tree.children(name, "given").len(), 2);
    assert!(tree.first_child(patient, "_birthDate").is_none());
}

#[test]
fn test_import_typed_scalar() {
    let mut tree = ElementTree::new();
    let node = tree.import_json(&json!("2024-05-01"), Some("date")).unwrap();
    assert_eq!(tree.type_name(node), Some("date"));
    assert_eq!(tree.value(node), Some(&PrimitiveValue::Date("2024-05-01".into())));
}

// === Export ===

#[rstest]
#[case(json!({"resourceType": "Patient", "id": "p1"}))]
#[case(json!({"resourceType": "Observation", "code": {"coding": [{"system": "s", "code": "c"}]}, "valueQuantity": {"value": 1.5, "unit": "mg"}}))]
#[case(json!({"resourceType": "Bundle", "entry": [{"fullUrl": "a"}, {"fullUrl": "b"}]}))]
fn test_resource_json_preserved(#[case] input: serde_json::Value) {
    let mut tree = ElementTree::new();
    let root = tree.import_json(&input, None).unwrap();
    assert_eq!(tree.to_resource_json(root), input);
}

#[test]
fn test_repeated_names_become_arrays() {
    let mut tree = ElementTree::new();
    let root = tree.create(Some("Patient"));
    for given in ["A", "B"] {
        let node = tree.create_primitive(given.into());
        tree.append_child(root, "given", node);
    }
    let family = tree.create_primitive("Doe".into());
    tree.append_child(root, "family", family);

    assert_eq!(tree.to_json(root), json!({"given": ["A", "B"], "family": "Doe"}));
}

#[test]
fn test_marked_list_with_single_item() {
    let mut tree = ElementTree::new();
    let root = tree.create(None);
    let id = tree.create(Some("Identifier"));
    let value = tree.create_primitive("123".into());
    tree.append_child(id, "value", value);
    tree.append_child(root, "identifier", id);
    tree.mark_list(root, "identifier");

    assert_eq!(tree.to_json(root), json!({"identifier": [{"value": "123"}]}));
}
