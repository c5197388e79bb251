//! Arena of typed element nodes
//!
//! Every node of every tree handled by one transform lives in a single
//! [`ElementTree`]. Edges are `(name, NodeId)` pairs held by the parent, so a
//! node reachable from two parents is one index referenced twice.

use crate::{PrimitiveValue, TreeError, choice_type_code};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Stable index of a node in an [`ElementTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named edge from a parent to a child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub name: String,
    pub node: NodeId,
}

/// One element: type, optional primitive value and ordered children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub type_name: Option<String>,
    pub value: Option<PrimitiveValue>,
    children: Vec<Child>,
    /// Child names rendered as JSON arrays even with a single entry
    lists: SmallVec<[String; 2]>,
}

impl Node {
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn is_primitive(&self) -> bool {
        self.value.is_some()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_list(&self, name: &str) -> bool {
        self.lists.iter().any(|l| l == name)
    }
}

/// Node arena
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate an empty node
    pub fn create(&mut self, type_name: Option<&str>) -> NodeId {
        self.push(Node {
            type_name: type_name.map(str::to_string),
            ..Node::default()
        })
    }

    /// Allocate a primitive node typed after its value
    pub fn create_primitive(&mut self, value: PrimitiveValue) -> NodeId {
        let type_name = value.type_name().to_string();
        self.create_typed_primitive(&type_name, value)
    }

    /// Allocate a primitive node with an explicit type (`code`, `uri`, ...)
    pub fn create_typed_primitive(&mut self, type_name: &str, value: PrimitiveValue) -> NodeId {
        self.push(Node {
            type_name: Some(type_name.to_string()),
            value: Some(value),
            ..Node::default()
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// `id` itself, if this tree allocated it
    pub fn check(&self, id: NodeId) -> Result<NodeId, TreeError> {
        if id.index() < self.nodes.len() {
            Ok(id)
        } else {
            Err(TreeError::UnknownNode(id.0))
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Node by id
    ///
    /// # Panics
    /// If `id` was not allocated by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).type_name()
    }

    pub fn set_type(&mut self, id: NodeId, type_name: &str) {
        self.node_mut(id).type_name = Some(type_name.to_string());
    }

    pub fn value(&self, id: NodeId) -> Option<&PrimitiveValue> {
        self.node(id).value.as_ref()
    }

    pub fn set_value(&mut self, id: NodeId, value: PrimitiveValue) {
        let node = self.node_mut(id);
        if node.type_name.is_none() {
            node.type_name = Some(value.type_name().to_string());
        }
        node.value = Some(value);
    }

    /// Render `name` as an array under `parent`
    pub fn mark_list(&mut self, parent: NodeId, name: &str) {
        let node = self.node_mut(parent);
        if !node.is_list(name) {
            node.lists.push(name.to_string());
        }
    }

    pub fn append_child(&mut self, parent: NodeId, name: &str, child: NodeId) {
        self.node_mut(parent).children.push(Child {
            name: name.to_string(),
            node: child,
        });
    }

    /// Insert `child` ahead of the existing `name` children
    pub fn prepend_child(&mut self, parent: NodeId, name: &str, child: NodeId) {
        let children = &mut self.node_mut(parent).children;
        let position = children
            .iter()
            .position(|c| c.name == name)
            .unwrap_or(children.len());
        children.insert(
            position,
            Child {
                name: name.to_string(),
                node: child,
            },
        );
    }

    /// Make `child` the only `name` child, keeping the slot of the first one
    pub fn replace_child(&mut self, parent: NodeId, name: &str, child: NodeId) {
        let children = &mut self.node_mut(parent).children;
        let position = children.iter().position(|c| c.name == name);
        children.retain(|c| c.name != name);
        let edge = Child {
            name: name.to_string(),
            node: child,
        };
        match position {
            Some(index) => children.insert(index, edge),
            None => children.push(edge),
        }
    }

    pub fn remove_children(&mut self, parent: NodeId, name: &str) {
        self.node_mut(parent).children.retain(|c| c.name != name);
    }

    /// Children named exactly `name`, in order
    pub fn children(&self, parent: NodeId, name: &str) -> Vec<NodeId> {
        self.node(parent)
            .children
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.node)
            .collect()
    }

    pub fn first_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.node)
    }

    /// Children of a choice element: `value` matches `valueString`,
    /// `valueQuantity`, ... Each entry carries the type code from the suffix.
    pub fn choice_children(&self, parent: NodeId, base: &str) -> Vec<(String, NodeId)> {
        let base = base.strip_suffix("[x]").unwrap_or(base);
        self.node(parent)
            .children
            .iter()
            .filter_map(|c| {
                let suffix = c.name.strip_prefix(base)?;
                suffix
                    .starts_with(|ch: char| ch.is_ascii_uppercase())
                    .then(|| (choice_type_code(suffix), c.node))
            })
            .collect()
    }

    /// Copy the subtree under `id` into fresh nodes
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id).clone();
        let copy = self.push(Node {
            type_name: source.type_name,
            value: source.value,
            children: Vec::with_capacity(source.children.len()),
            lists: source.lists,
        });
        for child in source.children {
            let cloned = self.deep_clone(child.node);
            self.append_child(copy, &child.name, cloned);
        }
        copy
    }

    /// Import a JSON object or scalar
    ///
    /// `resourceType` becomes the node type; otherwise `type_name` is used.
    /// Keys starting with `_` (primitive extensions) are not imported.
    pub fn import_json(
        &mut self,
        value: &serde_json::Value,
        type_name: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        match value {
            serde_json::Value::Object(fields) => {
                let type_name = fields
                    .get("resourceType")
                    .and_then(serde_json::Value::as_str)
                    .or(type_name);
                let node = self.create(type_name);
                for (name, field) in fields {
                    if name == "resourceType" || name.starts_with('_') {
                        continue;
                    }
                    match field {
                        serde_json::Value::Array(items) => {
                            self.mark_list(node, name);
                            for item in items {
                                let child = self.import_json(item, None)?;
                                self.append_child(node, name, child);
                            }
                        }
                        serde_json::Value::Null => {}
                        _ => {
                            let child = self.import_json(field, None)?;
                            self.append_child(node, name, child);
                        }
                    }
                }
                Ok(node)
            }
            serde_json::Value::Array(_) => Err(TreeError::UnsupportedJson(
                "a JSON array cannot be a node".into(),
            )),
            serde_json::Value::Null => Err(TreeError::UnsupportedJson(
                "null cannot be a node".into(),
            )),
            scalar => {
                let value = PrimitiveValue::from_json(scalar, type_name).ok_or_else(|| {
                    TreeError::UnsupportedJson(format!("unsupported scalar {scalar}"))
                })?;
                Ok(match type_name {
                    Some(type_name) => self.create_typed_primitive(type_name, value),
                    None => self.create_primitive(value),
                })
            }
        }
    }

    /// JSON form of the subtree under `id`
    ///
    /// A child name becomes an array when it repeats or was marked as a list.
    /// Primitive nodes render as their value.
    pub fn to_json(&self, id: NodeId) -> serde_json::Value {
        let node = self.node(id);
        if let Some(value) = &node.value {
            return value.to_json();
        }
        let mut fields = serde_json::Map::new();
        let mut seen: Vec<&str> = Vec::new();
        for child in &node.children {
            if seen.contains(&child.name.as_str()) {
                continue;
            }
            seen.push(&child.name);
            let items: Vec<_> = node
                .children
                .iter()
                .filter(|c| c.name == child.name)
                .map(|c| self.to_json(c.node))
                .collect();
            let field = if items.len() > 1 || node.is_list(&child.name) {
                serde_json::Value::Array(items)
            } else {
                items.into_iter().next().unwrap_or(serde_json::Value::Null)
            };
            fields.insert(child.name.clone(), field);
        }
        serde_json::Value::Object(fields)
    }

    /// [`to_json`](Self::to_json) with `resourceType` set from the node type
    pub fn to_resource_json(&self, id: NodeId) -> serde_json::Value {
        match (self.to_json(id), self.type_name(id)) {
            (serde_json::Value::Object(fields), Some(type_name)) => {
                let mut json = serde_json::Map::with_capacity(fields.len() + 1);
                json.insert("resourceType".into(), type_name.into());
                json.extend(fields);
                serde_json::Value::Object(json)
            }
            (json, _) => json,
        }
    }
}
