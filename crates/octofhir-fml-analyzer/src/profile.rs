//! Type profiles produced by analysis

use crate::AnalysisWarning;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Placeholder type of anything that could not be resolved
pub const UNKNOWN: &str = "unknown";

/// One element of a profile tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileElement {
    pub name: String,
    pub type_name: String,
    pub min: u32,
    /// `None` when unbounded
    pub max: Option<u32>,
    pub children: Vec<ProfileElement>,
}

impl ProfileElement {
    pub fn child(&self, name: &str) -> Option<&ProfileElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Descendant at a dotted path relative to this element
    pub fn at(&self, path: &str) -> Option<&ProfileElement> {
        path.split('.').try_fold(self, |element, name| element.child(name))
    }

    pub fn is_unknown(&self) -> bool {
        self.type_name == UNKNOWN
    }

    /// `name : Type [min..max]`
    fn line(&self) -> String {
        let max = self.max.map_or_else(|| "*".to_string(), |m| m.to_string());
        format!("{} : {} [{}..{}]", self.name, self.type_name, self.min, max)
    }

    fn write_summary(&self, out: &mut String, depth: usize) {
        let _ = writeln!(out, "{:indent$}{}", "", self.line(), indent = depth * 2);
        for child in &self.children {
            child.write_summary(out, depth + 1);
        }
    }
}

/// Input and output profiles of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    /// One root per source parameter, named after the parameter
    pub inputs: Vec<ProfileElement>,
    /// One root per target parameter, then any bare target variables
    pub outputs: Vec<ProfileElement>,
}

impl GroupProfile {
    pub fn input(&self, name: &str) -> Option<&ProfileElement> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ProfileElement> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Everything [`Analyzer::analyse`](crate::Analyzer::analyse) found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Group name to profile, in analysis order
    pub profiles: IndexMap<String, GroupProfile>,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    pub fn profile(&self, group: &str) -> Option<&GroupProfile> {
        self.profiles.get(group)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Indented text form of every profile
    ///
    /// ```text
    /// group Main
    ///   source src : Patient [1..1]
    ///     name : HumanName [0..*]
    ///   target tgt : Patient [1..1]
    /// ```
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for profile in self.profiles.values() {
            let _ = writeln!(out, "group {}", profile.name);
            for (mode, roots) in [("source", &profile.inputs), ("target", &profile.outputs)] {
                for root in roots {
                    let _ = writeln!(out, "  {mode} {}", root.line());
                    for child in &root.children {
                        child.write_summary(&mut out, 2);
                    }
                }
            }
        }
        out
    }
}

/// Index of a node in a [`ProfileBuilder`]
pub type ProfileNodeId = usize;

#[derive(Debug, Clone)]
struct ProfileNode {
    name: String,
    type_name: String,
    min: u32,
    max: Option<u32>,
    children: Vec<ProfileNodeId>,
}

/// Arena used while walking a group; frozen into [`GroupProfile`]
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    nodes: Vec<ProfileNode>,
    inputs: Vec<ProfileNodeId>,
    outputs: Vec<ProfileNodeId>,
}

impl ProfileBuilder {
    fn push(&mut self, name: &str, type_name: &str, min: u32, max: Option<u32>) -> ProfileNodeId {
        self.nodes.push(ProfileNode {
            name: name.to_string(),
            type_name: type_name.to_string(),
            min,
            max,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn add_input(&mut self, name: &str, type_name: &str) -> ProfileNodeId {
        let id = self.push(name, type_name, 1, Some(1));
        self.inputs.push(id);
        id
    }

    /// Output root `name`, reused when the group already has one
    pub fn add_output(&mut self, name: &str, type_name: &str) -> ProfileNodeId {
        if let Some(id) = self.outputs.iter().copied().find(|&o| self.nodes[o].name == name) {
            self.refine(id, type_name);
            return id;
        }
        let id = self.push(name, type_name, 1, Some(1));
        self.outputs.push(id);
        id
    }

    /// Replace an unknown type with `type_name`
    pub fn refine(&mut self, id: ProfileNodeId, type_name: &str) {
        if self.nodes[id].type_name == UNKNOWN {
            self.nodes[id].type_name = type_name.to_string();
        }
    }

    /// Child `name` of `parent`, created when absent
    ///
    /// An existing child keeps its cardinality; an unknown type is replaced
    /// by a known one.
    pub fn child(
        &mut self,
        parent: ProfileNodeId,
        name: &str,
        type_name: &str,
        min: u32,
        max: Option<u32>,
    ) -> ProfileNodeId {
        let existing = self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name);
        if let Some(id) = existing {
            self.refine(id, type_name);
            return id;
        }
        let id = self.push(name, type_name, min, max);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn type_name(&self, id: ProfileNodeId) -> &str {
        &self.nodes[id].type_name
    }

    fn freeze(&self, id: ProfileNodeId) -> ProfileElement {
        let node = &self.nodes[id];
        ProfileElement {
            name: node.name.clone(),
            type_name: node.type_name.clone(),
            min: node.min,
            max: node.max,
            children: node.children.iter().map(|&c| self.freeze(c)).collect(),
        }
    }

    pub fn finish(&self, name: &str) -> GroupProfile {
        GroupProfile {
            name: name.to_string(),
            inputs: self.inputs.iter().map(|&id| self.freeze(id)).collect(),
            outputs: self.outputs.iter().map(|&id| self.freeze(id)).collect(),
        }
    }
}
