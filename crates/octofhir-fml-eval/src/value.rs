//! Values bound to variables during execution

use octofhir_fml_model::{ModelError, TypeContext, TypeProvider};
use octofhir_fml_types::{ElementTree, NodeId, PrimitiveValue, is_primitive_type};

/// A tree node or a free-standing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(NodeId),
    Primitive(PrimitiveValue),
}

/// A value with whatever type information is known about it
///
/// Input trees may carry no types at all; the type of an item reached by
/// navigation is taken from type metadata instead of being written back
/// into the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub value: Value,
    pub type_name: Option<String>,
    /// Metadata to navigate children with
    pub context: Option<TypeContext>,
}

impl Item {
    pub fn node(id: NodeId) -> Self {
        Self {
            value: Value::Node(id),
            type_name: None,
            context: None,
        }
    }

    pub fn primitive(value: PrimitiveValue) -> Self {
        Self {
            type_name: Some(value.type_name().to_string()),
            value: Value::Primitive(value),
            context: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>, context: Option<TypeContext>) -> Self {
        self.type_name = Some(type_name.into());
        self.context = context;
        self
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self.value {
            Value::Node(id) => Some(id),
            Value::Primitive(_) => None,
        }
    }

    /// Primitive value of a primitive item or a primitive node
    pub fn primitive_value<'t>(&'t self, tree: &'t ElementTree) -> Option<&'t PrimitiveValue> {
        match &self.value {
            Value::Primitive(value) => Some(value),
            Value::Node(id) => tree.value(*id),
        }
    }

    /// Known type: the item's own, else the node's, else the value's
    pub fn type_name<'t>(&'t self, tree: &'t ElementTree) -> Option<&'t str> {
        self.type_name.as_deref().or_else(|| match &self.value {
            Value::Node(id) => tree.type_name(*id),
            Value::Primitive(value) => Some(value.type_name()),
        })
    }

    /// A node without a primitive value
    pub fn is_complex(&self, tree: &ElementTree) -> bool {
        match self.value {
            Value::Node(id) => tree.value(id).is_none(),
            Value::Primitive(_) => false,
        }
    }

    pub fn text(&self, tree: &ElementTree) -> Option<String> {
        self.primitive_value(tree).map(PrimitiveValue::to_string)
    }

    /// Value equality: primitives with numeric promotion, nodes by content
    pub fn equals(&self, other: &Self, tree: &ElementTree) -> bool {
        match (self.primitive_value(tree), other.primitive_value(tree)) {
            (Some(a), Some(b)) => a.equals(b),
            (None, None) => match (self.node_id(), other.node_id()) {
                (Some(a), Some(b)) => a == b || tree.to_json(a) == tree.to_json(b),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Children of `item` named `name`, typed from the item's metadata
///
/// Declared element types win over the node's own type, which for imported
/// JSON scalars only reflects the JSON kind.
/// A name with no direct children is tried as a choice element base, so
/// `value` finds `valueString` and types it `string`.
pub fn navigate(
    tree: &ElementTree,
    types: &dyn TypeProvider,
    item: &Item,
    name: &str,
) -> Result<Vec<Item>, ModelError> {
    let Value::Node(id) = item.value else {
        return Ok(Vec::new());
    };
    let direct = tree.children(id, name);
    if !direct.is_empty() {
        let resolved = match &item.context {
            Some(context) => context.element(name, types)?,
            None => None,
        };
        return Ok(direct
            .into_iter()
            .map(|child| {
                let type_name = resolved
                    .as_ref()
                    .and_then(|r| r.type_code.clone())
                    .or_else(|| tree.type_name(child).map(str::to_string));
                let context = resolved.as_ref().and_then(|r| r.context.clone());
                Item {
                    value: Value::Node(child),
                    type_name,
                    context,
                }
            })
            .collect());
    }
    tree.choice_children(id, name)
        .into_iter()
        .map(|(code, child)| {
            let context = if is_primitive_type(&code) {
                None
            } else {
                types.resolve_core_type(&code)?.map(TypeContext::new)
            };
            Ok(Item {
                value: Value::Node(child),
                type_name: Some(code),
                context,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fml_model::{ModelRegistry, StructureDefinition, StructureKind};
    use serde_json::json;

    #[test]
    fn test_navigate_types_children_from_metadata() {
        let registry = ModelRegistry::new();
        registry.add_structure_definition(
            StructureDefinition::new(
                "http://hl7.org/fhir/StructureDefinition/Observation",
                "Observation",
                StructureKind::Resource,
            )
            .with_element("status", &["code"], 1, "1")
            .with_element("value[x]", &["Quantity", "string"], 0, "1"),
        );
        let mut tree = ElementTree::new();
        let root = tree
            .import_json(&json!({"resourceType": "Observation", "status": "final", "valueString": "high"}), None)
            .unwrap();
        let definition = registry.resolve_type("Observation").unwrap().unwrap();
        let item = Item::node(root).with_type("Observation", Some(TypeContext::new(definition)));

        let status = navigate(&tree, &registry, &item, "status").unwrap();
        assert_eq!(status[0].type_name.as_deref(), Some("code"));

        let value = navigate(&tree, &registry, &item, "value").unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value[0].type_name.as_deref(), Some("string"));
        assert_eq!(value[0].text(&tree).as_deref(), Some("high"));
    }

    #[test]
    fn test_equality() {
        let mut tree = ElementTree::new();
        let a = tree.import_json(&json!({"system": "s", "code": "c"}), Some("Coding")).unwrap();
        let b = tree.deep_clone(a);
        assert!(Item::node(a).equals(&Item::node(b), &tree));
        assert!(Item::primitive(PrimitiveValue::Integer(1)).equals(
            &Item::primitive(PrimitiveValue::Decimal(1.into())),
            &tree
        ));
        assert!(!Item::node(a).equals(&Item::primitive(PrimitiveValue::string("c")), &tree));
    }
}
