//! Group walker that builds type profiles

use crate::profile::{ProfileBuilder, ProfileNodeId, UNKNOWN};
use crate::{AnalysisOptions, AnalysisResult, AnalysisWarning, AnalysisWarningKind};
use indexmap::{IndexMap, IndexSet};
use octofhir_fml_ast::{
    Group, Literal, MappingDefinition, ParameterMode, Parameter, Rule, RuleSource, RuleTarget,
    Transform,
};
use octofhir_fml_model::{ResourceResolver, TypeContext, TypeProvider};
use octofhir_fml_types::is_primitive_type;
use std::collections::VecDeque;
use std::sync::Arc;

/// Static analyzer over a mapping definition
///
/// Collaborators are borrowed for the analyzer's lifetime; an analyzer holds
/// no state between [`analyse`](Self::analyse) calls.
pub struct Analyzer<'a> {
    types: &'a dyn TypeProvider,
    resources: &'a dyn ResourceResolver,
}

impl<'a> Analyzer<'a> {
    pub fn new(types: &'a dyn TypeProvider, resources: &'a dyn ResourceResolver) -> Self {
        Self { types, resources }
    }

    /// Build the input and output profile of every reachable group
    ///
    /// Never fails: unresolvable types, groups and variables become
    /// warnings and the affected elements are typed `unknown`.
    pub fn analyse(&self, map: &MappingDefinition, options: &AnalysisOptions) -> AnalysisResult {
        let mut walk = Walk {
            types: self.types,
            resources: self.resources,
            map,
            options,
            imported: Vec::new(),
            warnings: Vec::new(),
            profiles: IndexMap::new(),
            in_progress: IndexSet::new(),
        };
        walk.load_imports();
        walk.check_structures();
        for name in walk.reachable_groups() {
            if let Some(group) = map.group(&name) {
                walk.analyse_entry(group);
            }
        }
        AnalysisResult {
            profiles: walk.profiles,
            warnings: walk.warnings,
        }
    }
}

/// Where a finding was made
#[derive(Clone, Copy)]
struct Site<'s> {
    group: &'s str,
    rule: Option<&'s str>,
}

impl<'s> Site<'s> {
    fn group(group: &'s str) -> Self {
        Self { group, rule: None }
    }

    fn rule(group: &'s str, rule: &'s Rule) -> Self {
        Self {
            group,
            rule: Some(&rule.name),
        }
    }
}

/// A group found locally or in an imported map
enum GroupRef<'m> {
    Local(&'m Group),
    Imported(Arc<MappingDefinition>, usize),
}

impl GroupRef<'_> {
    fn get(&self) -> &Group {
        match self {
            Self::Local(group) => group,
            Self::Imported(map, index) => &map.groups[*index],
        }
    }
}

/// What a variable is bound to during the walk
#[derive(Debug, Clone)]
struct Binding {
    node: ProfileNodeId,
    /// Type metadata to navigate from; `None` for primitives and unknowns
    context: Option<TypeContext>,
}

type Scope = IndexMap<String, Binding>;

/// Type a target transform produces
struct Produced {
    type_name: String,
    context: Option<TypeContext>,
    /// Explicit types (`create`, `cast`) win over the element's declared type
    explicit: bool,
}

struct Walk<'w> {
    types: &'w dyn TypeProvider,
    resources: &'w dyn ResourceResolver,
    map: &'w MappingDefinition,
    options: &'w AnalysisOptions,
    imported: Vec<Arc<MappingDefinition>>,
    warnings: Vec<AnalysisWarning>,
    profiles: IndexMap<String, crate::GroupProfile>,
    /// Groups on the current invocation path
    in_progress: IndexSet<String>,
}

impl<'w> Walk<'w> {
    fn warn(&mut self, kind: AnalysisWarningKind, site: Site<'_>, message: impl Into<String>) {
        let warning = AnalysisWarning::new(kind, site.group, site.rule, message);
        if !self.warnings.contains(&warning) {
            log::warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    fn load_imports(&mut self) {
        let (map, resolver) = (self.map, self.resources);
        for url in &map.imports {
            if url.contains('*') {
                log::debug!("Skipping wildcard import {url}");
                continue;
            }
            match resolver.fetch_as::<MappingDefinition>(url, self.options.fetch_policy) {
                Ok(Some(imported)) => self.imported.push(imported),
                Ok(None) => log::debug!("Import {url} not found"),
                Err(e) => self.warn(
                    AnalysisWarningKind::ResourceNotFound,
                    Site::group(""),
                    format!("import {url}: {e}"),
                ),
            }
        }
    }

    /// Under a strict policy every `uses` URL must resolve
    fn check_structures(&mut self) {
        if !self.options.fetch_policy.is_strict() {
            return;
        }
        let map = self.map;
        for decl in &map.structures {
            match self.types.resolve_type(&decl.url) {
                Ok(Some(_)) => {}
                Ok(None) => self.warn(
                    AnalysisWarningKind::ResourceNotFound,
                    Site::group(""),
                    format!("structure {} not found", decl.url),
                ),
                Err(e) => self.warn(
                    AnalysisWarningKind::UnresolvedType,
                    Site::group(""),
                    format!("structure {}: {e}", decl.url),
                ),
            }
        }
    }

    /// Local groups reachable from the entry groups through dependent
    /// invocations and extends, in discovery order
    fn reachable_groups(&mut self) -> Vec<String> {
        let (map, options) = (self.map, self.options);
        if options.entry_groups.is_empty() {
            return map.groups.iter().map(|g| g.name.clone()).collect();
        }
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::new();
        for entry in &options.entry_groups {
            if map.group(entry).is_some() {
                queue.push_back(entry.clone());
            } else {
                self.warn(
                    AnalysisWarningKind::UnresolvedGroup,
                    Site::group(entry),
                    format!("entry group {entry} not found"),
                );
            }
        }
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(group) = map.group(&name) else {
                continue;
            };
            queue.extend(group.extends.iter().cloned());
            let mut stack: Vec<&Rule> = group.rules.iter().collect();
            while let Some(rule) = stack.pop() {
                queue.extend(rule.dependents.iter().map(|d| d.name.clone()));
                stack.extend(rule.rules.iter());
            }
        }
        seen.into_iter().filter(|name| map.group(name).is_some()).collect()
    }

    fn find_group(&self, name: &str) -> Option<GroupRef<'w>> {
        let map: &'w MappingDefinition = self.map;
        if let Some(group) = map.group(name) {
            return Some(GroupRef::Local(group));
        }
        self.imported.iter().find_map(|imported| {
            imported
                .group_index(name)
                .map(|index| GroupRef::Imported(Arc::clone(imported), index))
        })
    }

    /// URL declared by `uses` for an alias or type name
    fn structure_url(&self, name: &str) -> Option<String> {
        std::iter::once(self.map)
            .chain(self.imported.iter().map(Arc::as_ref))
            .flat_map(|map| map.structures.iter())
            .find(|decl| decl.alias_or_name() == name)
            .map(|decl| decl.url.clone())
    }

    /// Resolve a declared type name: `uses` aliases first, then the type
    /// provider by name, then as a core type
    fn resolve_declared(&mut self, site: Site<'_>, name: &str) -> (String, Option<TypeContext>) {
        if is_primitive_type(name) {
            return (name.to_string(), None);
        }
        let declared = self.structure_url(name);
        let lookup = declared.as_deref().unwrap_or(name);
        let found = match self.types.resolve_type(lookup) {
            Ok(None) => self.types.resolve_core_type(name),
            other => other,
        };
        match found {
            Ok(Some(definition)) => (
                definition.type_name.clone(),
                Some(TypeContext::new(definition)),
            ),
            Ok(None) if declared.is_none() && !self.map.structures.is_empty() => {
                self.warn(
                    AnalysisWarningKind::UndeclaredAlias,
                    site,
                    format!("type {name} is neither declared by uses nor known"),
                );
                (UNKNOWN.to_string(), None)
            }
            Ok(None) => {
                self.warn(
                    AnalysisWarningKind::UnresolvedType,
                    site,
                    format!("type {lookup} could not be resolved"),
                );
                (UNKNOWN.to_string(), None)
            }
            Err(e) => {
                self.warn(
                    AnalysisWarningKind::UnresolvedType,
                    site,
                    format!("type {lookup}: {e}"),
                );
                (UNKNOWN.to_string(), None)
            }
        }
    }

    fn analyse_entry(&mut self, group: &Group) {
        log::debug!("Analysing group {}", group.name);
        let mut builder = ProfileBuilder::default();
        let mut scope = Scope::new();
        for parameter in &group.parameters {
            let (type_name, context) = match &parameter.type_name {
                Some(declared) => self.resolve_declared(Site::group(&group.name), declared),
                None => (UNKNOWN.to_string(), None),
            };
            let node = match parameter.mode {
                ParameterMode::Source => builder.add_input(&parameter.name, &type_name),
                ParameterMode::Target => builder.add_output(&parameter.name, &type_name),
            };
            scope.insert(parameter.name.clone(), Binding { node, context });
        }
        self.in_progress.insert(group.name.clone());
        self.walk_group_body(group, &mut builder, &scope, 0);
        self.in_progress.shift_remove(&group.name);
        self.profiles
            .insert(group.name.clone(), builder.finish(&group.name));
    }

    /// Rules of the extended group, then the group's own rules
    fn walk_group_body(&mut self, group: &Group, builder: &mut ProfileBuilder, scope: &Scope, depth: usize) {
        if let Some(parent) = &group.extends {
            let arguments = group
                .parameters
                .iter()
                .map(|p| scope.get(&p.name).cloned())
                .collect();
            self.enter_group(Site::group(&group.name), parent, arguments, builder, depth + 1);
        }
        for rule in &group.rules {
            self.walk_rule(&group.name, rule, builder, scope.clone(), depth);
        }
    }

    /// Walk `name` with positional arguments bound to its parameters
    fn enter_group(
        &mut self,
        caller: Site<'_>,
        name: &str,
        arguments: Vec<Option<Binding>>,
        builder: &mut ProfileBuilder,
        depth: usize,
    ) {
        let Some(found) = self.find_group(name) else {
            self.warn(
                AnalysisWarningKind::UnresolvedGroup,
                caller,
                format!("group {name} not found"),
            );
            return;
        };
        let group = found.get();
        if depth > self.options.max_depth {
            self.warn(
                AnalysisWarningKind::RecursiveInvocation,
                caller,
                format!("maximum depth {} reached at group {name}", self.options.max_depth),
            );
            return;
        }
        if self.in_progress.contains(name) {
            self.warn(
                AnalysisWarningKind::RecursiveInvocation,
                caller,
                format!("group {name} is already being analysed on this path"),
            );
            return;
        }
        if arguments.len() != group.parameters.len() {
            self.warn(
                AnalysisWarningKind::UnresolvedGroup,
                caller,
                format!(
                    "group {name} takes {} parameters, {} given",
                    group.parameters.len(),
                    arguments.len()
                ),
            );
            return;
        }
        // Unbound arguments were already reported by the caller
        let Some(arguments) = arguments.into_iter().collect::<Option<Vec<_>>>() else {
            return;
        };

        let mut scope = Scope::new();
        for (parameter, mut binding) in group.parameters.iter().zip(arguments) {
            if let (None, Some(declared)) = (&binding.context, &parameter.type_name) {
                let (type_name, context) = self.resolve_declared(Site::group(name), declared);
                builder.refine(binding.node, &type_name);
                binding.context = context;
            }
            scope.insert(parameter.name.clone(), binding);
        }
        log::debug!("Entering group {name} at depth {depth}");
        self.in_progress.insert(name.to_string());
        self.walk_group_body(group, builder, &scope, depth);
        self.in_progress.shift_remove(name);
    }

    fn walk_rule(&mut self, group: &str, rule: &Rule, builder: &mut ProfileBuilder, mut scope: Scope, depth: usize) {
        let site = Site::rule(group, rule);
        let mut first_source = None;
        for source in &rule.sources {
            let Some(binding) = self.walk_source(site, source, builder, &mut scope) else {
                return;
            };
            first_source.get_or_insert(binding);
        }

        for target in &rule.targets {
            let Some(binding) = self.walk_target(site, target, builder, &mut scope, first_source.as_ref())
            else {
                continue;
            };
            if target.transform.is_none() && target.element.is_some() && !rule.has_dependents() {
                if let Some(source) = &first_source {
                    self.dispatch_types(site, source.clone(), binding, builder, depth);
                }
            }
        }

        for dependent in &rule.dependents {
            let mut arguments = Vec::with_capacity(dependent.arguments.len());
            for argument in &dependent.arguments {
                let binding = scope.get(argument).cloned();
                if binding.is_none() {
                    self.warn(
                        AnalysisWarningKind::UnboundVariable,
                        site,
                        format!("variable {argument} passed to {} is not bound", dependent.name),
                    );
                }
                arguments.push(binding);
            }
            self.enter_group(site, &dependent.name, arguments, builder, depth + 1);
        }

        for nested in &rule.rules {
            self.walk_rule(group, nested, builder, scope.clone(), depth);
        }
    }

    /// Narrow a source by its element path; `None` skips the rule
    fn walk_source(
        &mut self,
        site: Site<'_>,
        source: &RuleSource,
        builder: &mut ProfileBuilder,
        scope: &mut Scope,
    ) -> Option<Binding> {
        let Some(parent) = scope.get(&source.context).cloned() else {
            self.warn(
                AnalysisWarningKind::UnboundVariable,
                site,
                format!("source variable {} is not bound", source.context),
            );
            return None;
        };
        let binding = match &source.element {
            Some(element) => {
                let resolved = self.navigate(site, &parent, element, builder);
                let (mut type_name, mut context, mut min, mut max) = match resolved {
                    Some(r) => (r.type_name().to_string(), r.context, r.min, r.max),
                    None => (UNKNOWN.to_string(), None, 0, None),
                };
                if let Some(filter) = &source.type_name {
                    (type_name, context) = self.resolve_declared(site, filter);
                }
                if let Some(cardinality) = source.cardinality {
                    min = cardinality.min;
                    max = cardinality.max;
                }
                let node = builder.child(parent.node, element, &type_name, min, max);
                Binding { node, context }
            }
            None => parent,
        };
        if let Some(variable) = &source.variable {
            scope.insert(variable.clone(), binding.clone());
        }
        Some(binding)
    }

    /// Element `name` below `parent`, warning when the type has no such element
    fn navigate(
        &mut self,
        site: Site<'_>,
        parent: &Binding,
        name: &str,
        builder: &ProfileBuilder,
    ) -> Option<octofhir_fml_model::ResolvedElement> {
        let context = parent.context.as_ref()?;
        match context.element(name, self.types) {
            Ok(Some(resolved)) => Some(resolved),
            Ok(None) => {
                self.warn(
                    AnalysisWarningKind::UnknownElement,
                    site,
                    format!("{} has no element {name}", builder.type_name(parent.node)),
                );
                None
            }
            Err(e) => {
                self.warn(AnalysisWarningKind::UnresolvedType, site, e.to_string());
                None
            }
        }
    }

    fn walk_target(
        &mut self,
        site: Site<'_>,
        target: &RuleTarget,
        builder: &mut ProfileBuilder,
        scope: &mut Scope,
        first_source: Option<&Binding>,
    ) -> Option<Binding> {
        let produced = self.produced_type(site, target.transform.as_ref(), scope, first_source, builder);
        let binding = match &target.context {
            Some(context) => {
                let Some(parent) = scope.get(context).cloned() else {
                    self.warn(
                        AnalysisWarningKind::UnboundVariable,
                        site,
                        format!("target variable {context} is not bound"),
                    );
                    return None;
                };
                match &target.element {
                    Some(element) => {
                        let declared = self.navigate(site, &parent, element, builder);
                        let (min, max) = declared.as_ref().map_or((0, None), |d| (d.min, d.max));
                        let (type_name, context) = match (produced, declared) {
                            (Some(p), _) if p.explicit => (p.type_name, p.context),
                            (_, Some(d)) if d.type_code.is_some() => (d.type_name().to_string(), d.context),
                            (Some(p), _) => (p.type_name, p.context),
                            (None, _) => (UNKNOWN.to_string(), None),
                        };
                        let node = builder.child(parent.node, element, &type_name, min, max);
                        Binding { node, context }
                    }
                    None => parent,
                }
            }
            None => {
                let variable = target.variable.as_ref()?;
                let (type_name, context) = produced.map_or((UNKNOWN.to_string(), None), |p| (p.type_name, p.context));
                let node = builder.add_output(variable, &type_name);
                Binding { node, context }
            }
        };
        if let Some(variable) = &target.variable {
            scope.insert(variable.clone(), binding.clone());
        }
        Some(binding)
    }

    /// Type a transform writes, when it can be told without executing it
    fn produced_type(
        &mut self,
        site: Site<'_>,
        transform: Option<&Transform>,
        scope: &Scope,
        first_source: Option<&Binding>,
        builder: &ProfileBuilder,
    ) -> Option<Produced> {
        let Some(transform) = transform else {
            // implicit copy of the first source
            return first_source.map(|source| Produced {
                type_name: builder.type_name(source.node).to_string(),
                context: source.context.clone(),
                explicit: false,
            });
        };

        let type_parameter = match transform {
            Transform::Create { type_name } => type_name.as_ref(),
            Transform::Cast { type_name, .. } => type_name.as_ref(),
            _ => None,
        };
        for parameter in transform.parameters() {
            if let Parameter::Id(name) = parameter {
                let is_type = type_parameter.is_some_and(|t| std::ptr::eq(t, parameter));
                if !is_type && !scope.contains_key(name) && self.map.constant(name).is_none() {
                    self.warn(
                        AnalysisWarningKind::UnboundVariable,
                        site,
                        format!("variable {name} used by {} is not bound", transform.name()),
                    );
                }
            }
        }

        if let Some(parameter) = type_parameter {
            let name = match parameter {
                Parameter::Id(name) if !scope.contains_key(name) => name.as_str(),
                Parameter::Literal(Literal::String(name)) => name.as_str(),
                _ => return None,
            };
            let (type_name, context) = self.resolve_declared(site, name);
            return Some(Produced {
                type_name,
                context,
                explicit: true,
            });
        }

        let fixed = match transform {
            Transform::Copy { value } => {
                return match value {
                    Parameter::Id(name) => scope.get(name).map(|binding| Produced {
                        type_name: builder.type_name(binding.node).to_string(),
                        context: binding.context.clone(),
                        explicit: false,
                    }),
                    Parameter::Literal(literal) => Some(Produced {
                        type_name: literal.type_name().to_string(),
                        context: None,
                        explicit: false,
                    }),
                };
            }
            Transform::Truncate { .. }
            | Transform::Escape { .. }
            | Transform::Append { .. }
            | Transform::Reference { .. }
            | Transform::Pointer { .. } => "string",
            Transform::DateOp { .. } => "dateTime",
            Transform::Uuid => "id",
            Transform::CodeableConcept(_) => "CodeableConcept",
            Transform::Coding { .. } => "Coding",
            Transform::Quantity(_) => "Quantity",
            Transform::Identifier { .. } => "Identifier",
            Transform::ContactPoint { .. } => "ContactPoint",
            Transform::Translate { output, .. } => match output {
                Parameter::Literal(Literal::String(field)) => match field.as_str() {
                    "code" => "code",
                    "system" => "uri",
                    "display" => "string",
                    "Coding" => "Coding",
                    "CodeableConcept" => "CodeableConcept",
                    _ => return None,
                },
                _ => return None,
            },
            Transform::Evaluate { .. } | Transform::Create { .. } | Transform::Cast { .. } => {
                return None;
            }
        };
        let context = if is_primitive_type(fixed) {
            None
        } else {
            self.types
                .resolve_core_type(fixed)
                .ok()
                .flatten()
                .map(TypeContext::new)
        };
        Some(Produced {
            type_name: fixed.to_string(),
            context,
            explicit: false,
        })
    }

    /// Map a complex value through the `<<types>>` group for its type pair
    fn dispatch_types(
        &mut self,
        site: Site<'_>,
        source: Binding,
        target: Binding,
        builder: &mut ProfileBuilder,
        depth: usize,
    ) {
        if source.context.is_none() {
            return;
        }
        let source_type = builder.type_name(source.node).to_string();
        let target_type = builder.type_name(target.node).to_string();
        let candidate = std::iter::once(self.map)
            .chain(self.imported.iter().map(Arc::as_ref))
            .flat_map(|map| map.groups.iter())
            .find(|group| match group.type_signature() {
                Some((s, t)) => s == source_type && t.is_none_or(|t| t == target_type),
                None => false,
            })
            .map(|group| group.name.clone());
        if let Some(name) = candidate {
            log::debug!("Dispatching {source_type} -> {target_type} to group {name}");
            self.enter_group(site, &name, vec![Some(source), Some(target)], builder, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fml_ast::{GroupParameter, RuleSource, RuleTarget};
    use octofhir_fml_model::{ModelRegistry, NoopResolver, StructureDefinition, StructureKind};
    use pretty_assertions::assert_eq;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry.add_structure_definition(
            StructureDefinition::new(
                "http://hl7.org/fhir/StructureDefinition/Patient",
                "Patient",
                StructureKind::Resource,
            )
            .with_element("active", &["boolean"], 0, "1"),
        );
        registry
    }

    fn copy_group(source_type: &str) -> Group {
        Group::new("Main")
            .with_parameter(GroupParameter::source("src", Some(source_type)))
            .with_parameter(GroupParameter::target("tgt", Some("Patient")))
            .with_rule(Rule::new(
                vec![RuleSource::new("src").element("active").variable("a")],
                vec![RuleTarget::new("tgt").element("active").transform(Transform::Copy {
                    value: Parameter::id("a"),
                })],
                1,
            ))
    }

    #[test]
    fn test_copy_types_both_sides() {
        let registry = registry();
        let mut map = MappingDefinition::new();
        map.groups.push(copy_group("Patient"));

        let result = Analyzer::new(&registry, &NoopResolver).analyse(&map, &AnalysisOptions::default());
        assert!(!result.has_warnings(), "{:?}", result.warnings);
        let profile = result.profile("Main").unwrap();
        assert_eq!(profile.input("src").unwrap().at("active").unwrap().type_name, "boolean");
        assert_eq!(profile.output("tgt").unwrap().at("active").unwrap().max, Some(1));
    }

    #[test]
    fn test_unresolved_parameter_type_is_unknown() {
        let registry = registry();
        let mut map = MappingDefinition::new();
        map.groups.push(copy_group("Missing"));

        let result = Analyzer::new(&registry, &NoopResolver).analyse(&map, &AnalysisOptions::default());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, AnalysisWarningKind::UnresolvedType);
        let input = result.profile("Main").unwrap().input("src").unwrap();
        assert!(input.is_unknown());
        assert!(input.at("active").unwrap().is_unknown());
    }
}
