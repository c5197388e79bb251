//! Groups, rules, rule sources and rule targets

use crate::{Expression, Transform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, parameterized transformation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub parameters: Vec<GroupParameter>,
    /// Group whose rules run before this group's own rules
    pub extends: Option<String>,
    pub type_mode: TypeMode,
    pub rules: Vec<Rule>,
    pub documentation: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            extends: None,
            type_mode: TypeMode::None,
            rules: Vec::new(),
            documentation: None,
        }
    }

    pub fn with_parameter(mut self, parameter: GroupParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &GroupParameter> {
        self.parameters
            .iter()
            .filter(|p| p.mode == ParameterMode::Source)
    }

    pub fn targets(&self) -> impl Iterator<Item = &GroupParameter> {
        self.parameters
            .iter()
            .filter(|p| p.mode == ParameterMode::Target)
    }

    pub fn parameter(&self, name: &str) -> Option<&GroupParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Declared types of the first source and first target parameter of a
    /// `<<types>>` / `<<type+>>` group
    pub fn type_signature(&self) -> Option<(&str, Option<&str>)> {
        if self.type_mode == TypeMode::None {
            return None;
        }
        let source = self.sources().next()?.type_name.as_deref()?;
        let target = self.targets().next().and_then(|p| p.type_name.as_deref());
        Some((source, target))
    }
}

/// Whether a group is a default mapping between two types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeMode {
    #[default]
    None,
    /// `<<types>>`
    Types,
    /// `<<type+>>`
    TypeAndTypes,
}

impl TypeMode {
    /// Annotation text, empty for [`TypeMode::None`]
    pub const fn annotation(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Types => "<<types>>",
            Self::TypeAndTypes => "<<type+>>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterMode {
    Source,
    Target,
}

impl ParameterMode {
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `source src : Patient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParameter {
    pub mode: ParameterMode,
    pub name: String,
    pub type_name: Option<String>,
}

impl GroupParameter {
    pub fn source(name: impl Into<String>, type_name: Option<&str>) -> Self {
        Self {
            mode: ParameterMode::Source,
            name: name.into(),
            type_name: type_name.map(str::to_string),
        }
    }

    pub fn target(name: impl Into<String>, type_name: Option<&str>) -> Self {
        Self {
            mode: ParameterMode::Target,
            name: name.into(),
            type_name: type_name.map(str::to_string),
        }
    }
}

/// One transformation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Explicit name, or the positionally derived one
    pub name: String,
    pub sources: Vec<RuleSource>,
    pub targets: Vec<RuleTarget>,
    pub dependents: Vec<DependentInvocation>,
    /// Nested rules run once per source binding
    pub rules: Vec<Rule>,
    pub documentation: Option<String>,
}

impl Rule {
    /// A rule named by position; `index` is 1-based within its rule list
    pub fn new(sources: Vec<RuleSource>, targets: Vec<RuleTarget>, index: usize) -> Self {
        let name = Self::derived_name(&sources, index);
        Self {
            name,
            sources,
            targets,
            dependents: Vec::new(),
            rules: Vec::new(),
            documentation: None,
        }
    }

    /// Name given to a rule that does not declare one: the source element
    /// for a single-source rule with an element, otherwise `rule{index}`.
    pub fn derived_name(sources: &[RuleSource], index: usize) -> String {
        match sources {
            [source] => match &source.element {
                Some(element) => element.clone(),
                None => format!("rule{index}"),
            },
            _ => format!("rule{index}"),
        }
    }

    pub fn has_explicit_name(&self, index: usize) -> bool {
        self.name != Self::derived_name(&self.sources, index)
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.is_empty() || !self.rules.is_empty()
    }

    /// Variables bound by this rule's sources and targets, in order
    pub fn bound_variables(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter_map(|s| s.variable.as_deref())
            .chain(self.targets.iter().filter_map(|t| t.variable.as_deref()))
    }
}

/// Source list-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceListMode {
    First,
    NotFirst,
    Last,
    NotLast,
    OnlyOne,
}

impl SourceListMode {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "first" => Self::First,
            "not_first" => Self::NotFirst,
            "last" => Self::Last,
            "not_last" => Self::NotLast,
            "only_one" => Self::OnlyOne,
            _ => return None,
        })
    }

    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::NotFirst => "not_first",
            Self::Last => "last",
            Self::NotLast => "not_last",
            Self::OnlyOne => "only_one",
        }
    }
}

/// Cardinality constraint on a source (`0..1`, `1..*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: u32,
    /// `None` is unbounded (`*`)
    pub max: Option<u32>,
}

impl Cardinality {
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn admits(&self, count: usize) -> bool {
        self.max.is_none_or(|max| count <= max as usize)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// One source clause of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSource {
    /// Variable the source reads from
    pub context: String,
    pub element: Option<String>,
    /// Declared type filter
    pub type_name: Option<String>,
    pub cardinality: Option<Cardinality>,
    /// Value used when the element is absent
    pub default_value: Option<Expression>,
    pub list_mode: Option<SourceListMode>,
    pub variable: Option<String>,
    /// `where (...)`: items failing it are skipped
    pub condition: Option<Expression>,
    /// `check (...)`: items failing it are an error
    pub check: Option<Expression>,
    /// `log (...)`: evaluated and logged per item
    pub log: Option<Expression>,
    /// `while (...)`: iteration stops at the first item failing it
    pub while_condition: Option<Expression>,
}

impl RuleSource {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Self::default()
        }
    }

    pub fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn list_mode(mut self, mode: SourceListMode) -> Self {
        self.list_mode = Some(mode);
        self
    }

    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Target list-mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetListMode {
    First,
    Last,
    /// Replace any existing value
    Single,
    /// Reuse an existing element if there is one
    Collate,
    /// Reuse the node created by another target with the same share id
    Share(String),
}

impl TargetListMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Single => "single",
            Self::Collate => "collate",
            Self::Share(_) => "share",
        }
    }
}

/// One target clause of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTarget {
    /// Variable the target writes into; `None` for a bare invocation target
    pub context: Option<String>,
    pub element: Option<String>,
    pub transform: Option<Transform>,
    pub variable: Option<String>,
    pub list_mode: Option<TargetListMode>,
}

impl RuleTarget {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Self::default()
        }
    }

    /// `create('Type') as v` style target with no context
    pub fn bare(transform: Transform) -> Self {
        Self {
            transform: Some(transform),
            ..Self::default()
        }
    }

    pub fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn list_mode(mut self, mode: TargetListMode) -> Self {
        self.list_mode = Some(mode);
        self
    }
}

/// `then Group(a, b)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentInvocation {
    pub name: String,
    /// Variable names passed positionally
    pub arguments: Vec<String>,
}

impl DependentInvocation {
    pub fn new<I, S>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }
}
