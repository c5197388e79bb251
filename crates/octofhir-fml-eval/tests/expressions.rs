//! Tests for the FHIRPath subset
//!
//! Covers:
//! - Navigation from variables and the focus
//! - Functions and string helpers
//! - Empty propagation in comparisons and logic
//! - Errors for undefined constants and multi-item operands

use indexmap::IndexMap;
use octofhir_fml_eval::{ExpressionContext, Item, TransformErrorKind};
use octofhir_fml_model::NoopResolver;
use octofhir_fml_parser::{parse, parse_expression};
use octofhir_fml_types::{ElementTree, PrimitiveValue};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

const PATIENT: &str = r#"{
    "resourceType": "Patient",
    "id": "p1",
    "active": true,
    "name": [
        {"family": "Smith", "given": ["Ann", "Marie"]},
        {"family": "Jones", "given": ["Ann"]}
    ],
    "multipleBirthInteger": 2
}"#;

struct Fixture {
    tree: ElementTree,
    variables: IndexMap<String, Item>,
}

impl Fixture {
    fn new() -> Self {
        let mut tree = ElementTree::new();
        let root = tree
            .import_json(&serde_json::from_str(PATIENT).unwrap(), None)
            .unwrap();
        let mut variables = IndexMap::new();
        variables.insert("pat".to_string(), Item::node(root));
        variables.insert("n".to_string(), Item::primitive(PrimitiveValue::Integer(5)));
        Self { tree, variables }
    }

    fn context(&self) -> ExpressionContext<'_> {
        ExpressionContext {
            tree: &self.tree,
            types: &NoopResolver,
            variables: &self.variables,
            map: None,
        }
    }

    fn eval(&self, source: &str) -> Vec<serde_json::Value> {
        let expr = parse_expression(source).unwrap_or_else(|e| panic!("Failed to parse {source}: {e}"));
        self.context()
            .evaluate(&expr, &[])
            .unwrap_or_else(|e| panic!("Failed to evaluate {source}: {e}"))
            .iter()
            .map(|item| match item.node_id() {
                Some(id) => self.tree.to_json(id),
                None => item.primitive_value(&self.tree).map(PrimitiveValue::to_json).unwrap(),
            })
            .collect()
    }
}

// === Navigation ===

#[rstest]
#[case("pat.id", vec![json!("p1")])]
#[case("pat.name.family", vec![json!("Smith"), json!("Jones")])]
#[case("pat.name.given", vec![json!("Ann"), json!("Marie"), json!("Ann")])]
#[case("pat.name[1].family", vec![json!("Jones")])]
#[case("pat.multipleBirth", vec![json!(2)])]
#[case("pat.missing", vec![])]
#[case("pat.name.where(family = 'Jones').given", vec![json!("Ann")])]
#[case("pat.name.given.first()", vec![json!("Ann")])]
#[case("pat.name.given.last()", vec![json!("Ann")])]
fn test_navigation(#[case] source: &str, #[case] expected: Vec<serde_json::Value>) {
    assert_eq!(Fixture::new().eval(source), expected);
}

// === Functions ===

#[rstest]
#[case("pat.name.exists()", json!(true))]
#[case("pat.missing.exists()", json!(false))]
#[case("pat.name.exists(family = 'Brown')", json!(false))]
#[case("pat.missing.empty()", json!(true))]
#[case("pat.name.count()", json!(2))]
#[case("pat.active.not()", json!(false))]
#[case("pat.id.hasValue()", json!(true))]
#[case("iif(n > 3, 'big', 'small')", json!("big"))]
#[case("n.toString() & '!'", json!("5!"))]
#[case("'12'.toInteger() + n", json!(17))]
#[case("pat.name[0].family.length()", json!(5))]
#[case("pat.name[0].family.upper()", json!("SMITH"))]
#[case("pat.name[0].family.startsWith('Sm')", json!(true))]
#[case("pat.name[0].family.matches('^S.*h$')", json!(true))]
#[case("pat.name[0].family.substring(1, 3)", json!("mit"))]
#[case("(pat.name.given | pat.name.given).count()", json!(2))]
#[case("'Marie' in pat.name.given", json!(true))]
#[case("pat.name.family contains 'Brown'", json!(false))]
#[case("'ANN ' ~ 'ann'", json!(true))]
#[case("n / 2", json!(2.5))]
#[case("n div 2", json!(2))]
fn test_functions_and_operators(#[case] source: &str, #[case] expected: serde_json::Value) {
    assert_eq!(Fixture::new().eval(source), vec![expected]);
}

// === Empty propagation ===

#[rstest]
#[case("pat.missing = 'x'")]
#[case("pat.missing < 3")]
#[case("pat.missing and true")]
#[case("n / 0")]
fn test_empty_results(#[case] source: &str) {
    assert!(Fixture::new().eval(source).is_empty());
}

#[test]
fn test_conditions_treat_empty_as_false() {
    let fixture = Fixture::new();
    let context = fixture.context();
    let expr = parse_expression("pat.missing = 'x'").unwrap();
    assert!(!context.is_true(&expr, &[]).unwrap());
    let expr = parse_expression("pat.active and n > 1").unwrap();
    assert!(context.is_true(&expr, &[]).unwrap());
}

#[test]
fn test_focus_members() {
    let fixture = Fixture::new();
    let context = fixture.context();
    let pat = fixture.variables["pat"].clone();
    let expr = parse_expression("name.family.first() = 'Smith'").unwrap();
    assert!(context.is_true(&expr, std::slice::from_ref(&pat)).unwrap());
}

// === Constants and errors ===

#[test]
fn test_map_constants() {
    let map = parse("let limit = 3;\n\ngroup G(source s) {\n  s;\n}\n").unwrap();
    let fixture = Fixture::new();
    let context = ExpressionContext {
        map: Some(&map),
        ..fixture.context()
    };
    let expr = parse_expression("n > %limit").unwrap();
    assert!(context.is_true(&expr, &[]).unwrap());
}

#[rstest]
#[case("%undefined")]
#[case("pat.name.family = 'Smith' and pat.name.given")]
#[case("pat.id > 3")]
#[case("pat.name.given in pat.name.given")]
#[case("pat.name.family.unknownFunction()")]
fn test_expression_errors(#[case] source: &str) {
    let fixture = Fixture::new();
    let expr = parse_expression(source).unwrap();
    let err = fixture.context().evaluate(&expr, &[]).unwrap_err();
    assert_eq!(err.kind, TransformErrorKind::Expression);
}
