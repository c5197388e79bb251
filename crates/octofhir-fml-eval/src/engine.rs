//! Mapping execution
//!
//! A [`Transformer`] runs one group of a [`MappingDefinition`] against nodes
//! of an [`ElementTree`]. Each group invocation gets a fresh scope holding
//! only its arguments; rules run in declaration order and may see nodes
//! created by earlier rules through those arguments.

use crate::error::{EvalResult, TransformError, TransformErrorKind};
use crate::expression::ExpressionContext;
use crate::options::{ErrorPolicy, TerminologyFailureMode, TransformOptions};
use crate::value::{Item, Value, navigate};
use indexmap::IndexMap;
use octofhir_fml_ast::{
    Group, MappingDefinition, ParameterMode, Rule, RuleSource, RuleTarget, SourceListMode,
    TargetListMode,
};
use octofhir_fml_model::{
    ResolvedElement, ResourceResolver, TerminologyService, TypeContext, TypeProvider,
};
use octofhir_fml_types::{ElementTree, NodeId, PrimitiveValue, is_primitive_type};
use std::sync::Arc;

/// Variables visible to the rules of one group invocation
pub type Scope = IndexMap<String, Item>;

/// Executes mapping definitions
///
/// The transformer holds only its collaborators, so one instance can run any
/// number of transforms, each on its own tree.
pub struct Transformer<'a> {
    types: &'a dyn TypeProvider,
    resources: &'a dyn ResourceResolver,
    terminology: &'a dyn TerminologyService,
}

/// Result of a successful transform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    /// Target nodes: created target parameters and nodes made by bare
    /// targets, in creation order
    pub outputs: Vec<NodeId>,
    /// Errors downgraded by the error policy or the terminology failure mode
    pub issues: Vec<TransformError>,
}

impl TransformOutcome {
    /// JSON of every output, with `resourceType` from the node type
    pub fn to_json(&self, tree: &ElementTree) -> Vec<serde_json::Value> {
        self.outputs.iter().map(|id| tree.to_resource_json(*id)).collect()
    }
}

impl<'a> Transformer<'a> {
    pub fn new(
        types: &'a dyn TypeProvider,
        resources: &'a dyn ResourceResolver,
        terminology: &'a dyn TerminologyService,
    ) -> Self {
        Self {
            types,
            resources,
            terminology,
        }
    }

    /// Run `entry` (or the first group) over `inputs`
    ///
    /// `inputs` either fills every group parameter in order, or only the
    /// source parameters; in the second case each target parameter gets a
    /// new node of its declared type.
    pub fn transform(
        &self,
        map: &MappingDefinition,
        tree: &mut ElementTree,
        inputs: &[NodeId],
        entry: Option<&str>,
        options: &TransformOptions,
    ) -> EvalResult<TransformOutcome> {
        let group = match entry {
            Some(name) => map.group(name).ok_or_else(|| TransformError::unresolved_group(name))?,
            None => map.entry_group().ok_or_else(|| {
                TransformError::new(TransformErrorKind::UnresolvedGroup, "the map has no groups")
            })?,
        };
        for id in inputs {
            tree.check(*id)?;
        }
        let mut execution = Execution::new(self, map, tree, options)?;

        let sources = group.sources().count();
        let args = if inputs.len() == group.parameters.len() {
            let args: Vec<Item> = inputs.iter().copied().map(Item::node).collect();
            for (param, id) in group.parameters.iter().zip(inputs) {
                if param.mode == ParameterMode::Target {
                    execution.outputs.push(*id);
                }
            }
            args
        } else if inputs.len() == sources {
            let mut remaining = inputs.iter().copied();
            let mut args = Vec::with_capacity(group.parameters.len());
            for param in &group.parameters {
                match param.mode {
                    ParameterMode::Source => {
                        args.extend(remaining.next().map(Item::node));
                    }
                    ParameterMode::Target => {
                        let type_name = match &param.type_name {
                            Some(declared) => Some(
                                execution
                                    .resolve_declared(map, declared)?
                                    .map_or_else(|| declared.clone(), |(name, _)| name),
                            ),
                            None => None,
                        };
                        let id = execution.tree.create(type_name.as_deref());
                        execution.outputs.push(id);
                        args.push(Item::node(id));
                    }
                }
            }
            args
        } else {
            return Err(TransformError::new(
                TransformErrorKind::ArityMismatch,
                format!(
                    "group {} takes {} sources or {} parameters, {} inputs given",
                    group.name,
                    sources,
                    group.parameters.len(),
                    inputs.len()
                ),
            ));
        };

        execution.invoke(&group.name, args)?;
        Ok(TransformOutcome {
            outputs: execution.outputs,
            issues: execution.issues,
        })
    }
}

/// Map owning a group: the executed map or one of its imports
enum Owner<'a> {
    Local(&'a MappingDefinition),
    Imported(Arc<MappingDefinition>),
}

impl Owner<'_> {
    fn map(&self) -> &MappingDefinition {
        match self {
            Self::Local(map) => map,
            Self::Imported(map) => map,
        }
    }
}

/// The group whose rules are running and the map that declares it
#[derive(Clone, Copy)]
pub struct Frame<'m> {
    pub map: &'m MappingDefinition,
    pub group: &'m Group,
}

/// State of one transform
pub struct Execution<'a, 't> {
    pub types: &'a dyn TypeProvider,
    pub resources: &'a dyn ResourceResolver,
    pub terminology: &'a dyn TerminologyService,
    pub options: &'a TransformOptions,
    map: &'a MappingDefinition,
    imports: Vec<Arc<MappingDefinition>>,
    pub tree: &'t mut ElementTree,
    /// Nodes registered by `share` targets in the running invocation, keyed
    /// by the parent they were placed under and the share id
    shares: IndexMap<(Option<NodeId>, String), NodeId>,
    /// Active invocations with their argument values
    stack: Vec<(String, Vec<Value>)>,
    outputs: Vec<NodeId>,
    issues: Vec<TransformError>,
}

impl<'a, 't> Execution<'a, 't> {
    fn new(
        transformer: &Transformer<'a>,
        map: &'a MappingDefinition,
        tree: &'t mut ElementTree,
        options: &'a TransformOptions,
    ) -> EvalResult<Self> {
        let mut imports = Vec::new();
        for url in &map.imports {
            if url.contains('*') {
                log::debug!("Skipping wildcard import {url}");
                continue;
            }
            match transformer
                .resources
                .fetch_as::<MappingDefinition>(url, options.fetch_policy)?
            {
                Some(imported) => imports.push(imported),
                None => log::debug!("Import {url} not found"),
            }
        }
        Ok(Self {
            types: transformer.types,
            resources: transformer.resources,
            terminology: transformer.terminology,
            options,
            map,
            imports,
            tree,
            shares: IndexMap::new(),
            stack: Vec::new(),
            outputs: Vec::new(),
            issues: Vec::new(),
        })
    }

    /// Keep an error as an issue instead of failing
    pub fn record(&mut self, err: TransformError) {
        log::warn!("{err}");
        self.issues.push(err);
    }

    fn find_group(&self, name: &str) -> Option<(Owner<'a>, usize)> {
        if let Some(index) = self.map.group_index(name) {
            return Some((Owner::Local(self.map), index));
        }
        self.imports.iter().find_map(|map| {
            map.group_index(name)
                .map(|index| (Owner::Imported(Arc::clone(map)), index))
        })
    }

    /// Name and metadata of a declared type: `uses` aliases first, then the
    /// type provider by name, then as a core type
    pub fn resolve_declared(
        &self,
        map: &MappingDefinition,
        name: &str,
    ) -> EvalResult<Option<(String, Option<TypeContext>)>> {
        if is_primitive_type(name) {
            return Ok(Some((name.to_string(), None)));
        }
        let declared = std::iter::once(map)
            .chain(self.imports.iter().map(Arc::as_ref))
            .flat_map(|m| m.structures.iter())
            .find(|decl| decl.alias_or_name() == name)
            .map(|decl| decl.url.as_str());
        let found = match self.types.resolve_type(declared.unwrap_or(name))? {
            Some(definition) => Some(definition),
            None => self.types.resolve_core_type(name)?,
        };
        Ok(found.map(|definition| {
            (definition.type_name.clone(), Some(TypeContext::new(definition)))
        }))
    }

    /// Expression evaluation over `variables` and the constants of `map`
    pub fn expressions<'s>(
        &'s self,
        map: &'s MappingDefinition,
        variables: &'s Scope,
    ) -> ExpressionContext<'s> {
        ExpressionContext {
            tree: &*self.tree,
            types: self.types,
            variables,
            map: Some(map),
        }
    }

    /// Invoke a group by name with a fresh scope and share registry
    ///
    /// Re-entry counts as a cycle only when a running invocation of the same
    /// group has identical arguments. A group that recurses on nodes it has
    /// just created never repeats its arguments, so only `max_depth` stops it.
    pub fn invoke(&mut self, name: &str, args: Vec<Item>) -> EvalResult<()> {
        let (owner, index) = self
            .find_group(name)
            .ok_or_else(|| TransformError::unresolved_group(name))?;
        let map = owner.map();
        let group = &map.groups[index];
        if group.parameters.len() != args.len() {
            return Err(arity_mismatch(group, args.len()));
        }
        if self.stack.len() >= self.options.max_depth {
            return Err(TransformError::new(
                TransformErrorKind::DepthExceeded,
                format!("invoking {name} exceeds the maximum depth of {}", self.options.max_depth),
            ));
        }
        let key: Vec<Value> = args.iter().map(|arg| arg.value.clone()).collect();
        if self.stack.iter().any(|(active, values)| active == name && *values == key) {
            return Err(TransformError::new(
                TransformErrorKind::CyclicInvocation,
                format!("group {name} is already running with the same arguments"),
            ));
        }

        log::debug!("Entering group {name}");
        self.stack.push((name.to_string(), key));
        let caller_shares = std::mem::take(&mut self.shares);
        let result = self.run_group(Frame { map, group }, &args, &mut Vec::new());
        self.shares = caller_shares;
        self.stack.pop();
        log::debug!("Leaving group {name}");

        match result {
            Err(err) if self.options.error_policy == ErrorPolicy::Group => {
                self.record(err.at(&group.name, None));
                Ok(())
            }
            other => other.map_err(|err| err.at(&group.name, None)),
        }
    }

    /// Rules of `frame.group`, after those of the groups it extends
    fn run_group(&mut self, frame: Frame<'_>, args: &[Item], chain: &mut Vec<String>) -> EvalResult<()> {
        let group = frame.group;
        if chain.contains(&group.name) {
            return Err(TransformError::new(
                TransformErrorKind::CyclicInvocation,
                format!("group {} extends itself", group.name),
            ));
        }
        chain.push(group.name.clone());

        let scope = self.bind_parameters(frame, args)?;
        if let Some(parent) = &group.extends {
            let (owner, index) = self
                .find_group(parent)
                .ok_or_else(|| TransformError::unresolved_group(parent))?;
            let map = owner.map();
            let parent_group = &map.groups[index];
            if parent_group.parameters.len() != args.len() {
                return Err(arity_mismatch(parent_group, args.len()));
            }
            self.run_group(Frame { map, group: parent_group }, args, chain)?;
        }
        self.run_rules(frame, &group.rules, &scope)
    }

    fn bind_parameters(&self, frame: Frame<'_>, args: &[Item]) -> EvalResult<Scope> {
        let mut scope = Scope::with_capacity(args.len());
        for (param, arg) in frame.group.parameters.iter().zip(args) {
            let mut item = arg.clone();
            if item.context.is_none() {
                if let Some(declared) = &param.type_name {
                    if let Some((name, context)) = self.resolve_declared(frame.map, declared)? {
                        item = item.with_type(name, context);
                    }
                }
            }
            scope.insert(param.name.clone(), item);
        }
        Ok(scope)
    }

    pub fn run_rules(&mut self, frame: Frame<'_>, rules: &[Rule], scope: &Scope) -> EvalResult<()> {
        for rule in rules {
            if let Err(err) = self.run_rule(frame, rule, scope) {
                let err = err.at(&frame.group.name, Some(&rule.name));
                if self.options.error_policy == ErrorPolicy::Rule {
                    self.record(err);
                } else {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn run_rule(&mut self, frame: Frame<'_>, rule: &Rule, scope: &Scope) -> EvalResult<()> {
        let mut domains = Vec::with_capacity(rule.sources.len());
        for source in &rule.sources {
            let items = self.source_items(frame, source, scope)?;
            if items.is_empty() {
                return Ok(());
            }
            domains.push(items);
        }
        log::debug!("Rule {}.{} fires", frame.group.name, rule.name);

        for binding in cartesian(&domains) {
            let mut local = scope.clone();
            for (source, item) in rule.sources.iter().zip(&binding) {
                if let Some(variable) = &source.variable {
                    local.insert(variable.clone(), item.clone());
                }
            }
            match self.apply_binding(frame, rule, &binding, &mut local) {
                Err(err)
                    if err.kind == TransformErrorKind::TerminologyFailure
                        && self.options.terminology_failure
                            == TerminologyFailureMode::SkipAssignment =>
                {
                    self.record(err.at(&frame.group.name, Some(&rule.name)));
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Targets, then dependent invocations, then nested rules
    fn apply_binding(
        &mut self,
        frame: Frame<'_>,
        rule: &Rule,
        binding: &[Item],
        local: &mut Scope,
    ) -> EvalResult<()> {
        for target in &rule.targets {
            self.apply_target(frame, rule, target, binding.first(), local)?;
        }
        for dependent in &rule.dependents {
            let args = dependent
                .arguments
                .iter()
                .map(|name| {
                    local
                        .get(name)
                        .cloned()
                        .or_else(|| frame.map.constant(name).map(|c| Item::primitive(c.into())))
                        .ok_or_else(|| TransformError::unbound_variable(name))
                })
                .collect::<EvalResult<Vec<_>>>()?;
            self.invoke(&dependent.name, args)?;
        }
        self.run_rules(frame, &rule.rules, local)
    }

    /// Items a source binds, after defaults, type filter, conditions, list
    /// mode, `while` and cardinality
    fn source_items(&self, frame: Frame<'_>, source: &RuleSource, scope: &Scope) -> EvalResult<Vec<Item>> {
        let context = scope
            .get(&source.context)
            .ok_or_else(|| TransformError::unbound_variable(&source.context))?;
        let mut items = match &source.element {
            Some(element) => navigate(&*self.tree, self.types, context, element)?,
            None => vec![context.clone()],
        };
        if items.is_empty() {
            if let Some(default) = &source.default_value {
                items = self.expressions(frame.map, scope).evaluate(default, &[])?;
            }
        }

        if let Some(type_name) = &source.type_name {
            let declared = self.resolve_declared(frame.map, type_name)?;
            let tree = &*self.tree;
            items = items
                .into_iter()
                .filter_map(|item| match item.type_name(tree) {
                    Some(actual) if actual != type_name => None,
                    Some(_) => Some(item),
                    None => Some(item.with_type(
                        type_name.clone(),
                        declared.as_ref().and_then(|(_, context)| context.clone()),
                    )),
                })
                .collect();
        }

        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let mut variables = scope.clone();
            if let Some(variable) = &source.variable {
                variables.insert(variable.clone(), item.clone());
            }
            let expressions = self.expressions(frame.map, &variables);
            let focus = std::slice::from_ref(&item);
            if let Some(condition) = &source.condition {
                if !expressions.is_true(condition, focus)? {
                    continue;
                }
            }
            if let Some(check) = &source.check {
                if !expressions.is_true(check, focus)? {
                    return Err(TransformError::new(
                        TransformErrorKind::CheckFailed,
                        format!("check on {} failed", describe(source)),
                    ));
                }
            }
            if let Some(log_expr) = &source.log {
                let logged = expressions.evaluate(log_expr, focus)?;
                let text: Vec<String> = logged.iter().filter_map(|i| i.text(&*self.tree)).collect();
                log::info!("{}: {}", describe(source), text.join(", "));
            }
            kept.push(item);
        }

        match source.list_mode {
            Some(SourceListMode::First) => kept.truncate(1),
            Some(SourceListMode::NotFirst) if !kept.is_empty() => {
                kept.remove(0);
            }
            Some(SourceListMode::Last) => {
                let last = kept.pop();
                kept = last.into_iter().collect();
            }
            Some(SourceListMode::NotLast) => {
                kept.pop();
            }
            Some(SourceListMode::OnlyOne) if kept.len() > 1 => {
                return Err(TransformError::new(
                    TransformErrorKind::ListModeViolation,
                    format!("{} has {} values but only_one was required", describe(source), kept.len()),
                ));
            }
            _ => {}
        }

        if let Some(condition) = &source.while_condition {
            let mut looped = Vec::with_capacity(kept.len());
            for item in kept {
                let mut variables = scope.clone();
                if let Some(variable) = &source.variable {
                    variables.insert(variable.clone(), item.clone());
                }
                if !self
                    .expressions(frame.map, &variables)
                    .is_true(condition, std::slice::from_ref(&item))?
                {
                    break;
                }
                looped.push(item);
            }
            kept = looped;
        }

        if let Some(cardinality) = source.cardinality {
            if kept.len() < cardinality.min as usize {
                return Ok(Vec::new());
            }
            if !cardinality.admits(kept.len()) {
                return Err(TransformError::new(
                    TransformErrorKind::ListModeViolation,
                    format!("{} has {} values, more than {cardinality} allows", describe(source), kept.len()),
                ));
            }
        }
        Ok(kept)
    }

    fn apply_target(
        &mut self,
        frame: Frame<'_>,
        rule: &Rule,
        target: &RuleTarget,
        first: Option<&Item>,
        local: &mut Scope,
    ) -> EvalResult<()> {
        let parent = match &target.context {
            Some(name) => Some(
                local
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TransformError::unbound_variable(name))?,
            ),
            None => None,
        };
        let Some(element) = target.element.as_deref() else {
            return self.apply_unplaced(frame, target, parent, local);
        };
        let Some(parent) = parent else {
            return self.apply_unplaced(frame, target, None, local);
        };
        let parent_id = parent.node_id().ok_or_else(|| {
            TransformError::invalid_argument(
                "target",
                format!("{} is a primitive and cannot hold {element}", target.context.as_deref().unwrap_or("")),
            )
        })?;
        let resolved = match &parent.context {
            Some(context) => context.element(element, self.types)?,
            None => None,
        };

        if let Some(TargetListMode::Share(id)) = &target.list_mode {
            if let Some(&shared) = self.shares.get(&(Some(parent_id), id.clone())) {
                let item = self.node_item(shared, resolved.as_ref());
                let name = child_name(element, resolved.as_ref(), item.type_name.as_deref());
                self.tree.append_child(parent_id, &name, shared);
                self.mark_repeating(parent_id, &name, resolved.as_ref());
                bind(local, target, item);
                return Ok(());
            }
        }
        if target.list_mode == Some(TargetListMode::Collate) {
            if let Some(existing) = self.tree.first_child(parent_id, element) {
                let item = self.node_item(existing, resolved.as_ref());
                bind(local, target, item);
                return Ok(());
            }
        }

        let produced = match &target.transform {
            Some(transform) => self.run_transform(frame, transform, local, resolved.as_ref())?,
            None => self.implicit_value(rule, first, resolved.as_ref())?,
        };
        let Some(produced) = produced else {
            return Ok(());
        };
        let (node, item) = self.materialize(produced, resolved.as_ref());
        let name = child_name(element, resolved.as_ref(), item.type_name.as_deref());
        match target.list_mode {
            Some(TargetListMode::First) => self.tree.prepend_child(parent_id, &name, node),
            Some(TargetListMode::Single) => self.tree.replace_child(parent_id, &name, node),
            _ => self.tree.append_child(parent_id, &name, node),
        }
        self.mark_repeating(parent_id, &name, resolved.as_ref());
        if let Some(TargetListMode::Share(id)) = &target.list_mode {
            self.shares.insert((Some(parent_id), id.clone()), node);
        }
        bind(local, target, item);
        Ok(())
    }

    /// A target without a parent element: `create(...) as v`, or a plain
    /// variable binding
    fn apply_unplaced(
        &mut self,
        frame: Frame<'_>,
        target: &RuleTarget,
        parent: Option<Item>,
        local: &mut Scope,
    ) -> EvalResult<()> {
        let Some(transform) = &target.transform else {
            if let Some(parent) = parent {
                bind(local, target, parent);
            }
            return Ok(());
        };
        if let Some(TargetListMode::Share(id)) = &target.list_mode {
            if let Some(&shared) = self.shares.get(&(None, id.clone())) {
                let item = self.node_item(shared, None);
                bind(local, target, item);
                return Ok(());
            }
        }
        let Some(produced) = self.run_transform(frame, transform, local, None)? else {
            return Ok(());
        };
        let (node, item) = self.materialize(produced, None);
        if parent.is_none() && !self.outputs.contains(&node) {
            self.outputs.push(node);
        }
        if let Some(TargetListMode::Share(id)) = &target.list_mode {
            self.shares.insert((None, id.clone()), node);
        }
        bind(local, target, item);
        Ok(())
    }

    /// Value of a target without a transform
    ///
    /// In a rule without dependents the first source is copied: primitives
    /// directly, complex values through a matching type-mode group or as a
    /// deep copy. Otherwise the target is a new empty element.
    fn implicit_value(
        &mut self,
        rule: &Rule,
        first: Option<&Item>,
        resolved: Option<&ResolvedElement>,
    ) -> EvalResult<Option<Item>> {
        let declared_type = resolved.and_then(|r| r.type_code.clone());
        let declared_context = resolved.and_then(|r| r.context.clone());
        if let (false, Some(source)) = (rule.has_dependents(), first) {
            if !source.is_complex(&*self.tree) {
                return Ok(self.copy_item(source));
            }
            let source_type = source.type_name(&*self.tree).map(str::to_string);
            if let Some(source_type) = source_type {
                let target_type = declared_type.clone().unwrap_or_else(|| source_type.clone());
                if let Some(group) = self.dispatch_group(&source_type, &target_type) {
                    log::debug!("Dispatching {source_type} -> {target_type} to group {group}");
                    let node = self.tree.create(Some(&target_type));
                    let target = Item::node(node).with_type(target_type, declared_context);
                    self.invoke(&group, vec![source.clone(), target.clone()])?;
                    return Ok(Some(target));
                }
            }
            return Ok(self.copy_item(source));
        }
        let node = self.tree.create(declared_type.as_deref());
        Ok(Some(Item {
            value: Value::Node(node),
            type_name: declared_type,
            context: declared_context,
        }))
    }

    /// First `<<types>>` group mapping `source` to `target`
    fn dispatch_group(&self, source: &str, target: &str) -> Option<String> {
        std::iter::once(self.map)
            .chain(self.imports.iter().map(Arc::as_ref))
            .flat_map(|map| map.groups.iter())
            .find(|group| match group.type_signature() {
                Some((s, t)) => s == source && t.is_none_or(|t| t == target),
                None => false,
            })
            .map(|group| group.name.clone())
    }

    /// A copy of `item` that is safe to place in an output: complex nodes are
    /// deep-copied, primitive nodes become free primitives
    pub fn copy_item(&mut self, item: &Item) -> Option<Item> {
        match &item.value {
            Value::Primitive(_) => Some(item.clone()),
            Value::Node(id) => match self.tree.value(*id).cloned() {
                Some(value) => Some(Item {
                    type_name: item.type_name(&*self.tree).map(str::to_string),
                    value: Value::Primitive(value),
                    context: None,
                }),
                None => {
                    let copy = self.tree.deep_clone(*id);
                    Some(Item {
                        value: Value::Node(copy),
                        type_name: item.type_name(&*self.tree).map(str::to_string),
                        context: item.context.clone(),
                    })
                }
            },
        }
    }

    /// Node for a produced value; primitives get a node typed by the target
    /// element when it declares a primitive type
    fn materialize(&mut self, item: Item, resolved: Option<&ResolvedElement>) -> (NodeId, Item) {
        match item.value {
            Value::Node(id) => (id, item),
            Value::Primitive(value) => {
                let type_name = resolved
                    .and_then(|r| r.type_code.clone())
                    .filter(|t| is_primitive_type(t))
                    .or(item.type_name)
                    .unwrap_or_else(|| value.type_name().to_string());
                let id = self.tree.create_typed_primitive(&type_name, coerce(value, &type_name));
                (id, Item::node(id).with_type(type_name, None))
            }
        }
    }

    fn node_item(&self, id: NodeId, resolved: Option<&ResolvedElement>) -> Item {
        let type_name = self
            .tree
            .type_name(id)
            .map(str::to_string)
            .or_else(|| resolved.and_then(|r| r.type_code.clone()));
        Item {
            value: Value::Node(id),
            type_name,
            context: resolved.and_then(|r| r.context.clone()),
        }
    }

    fn mark_repeating(&mut self, parent: NodeId, name: &str, resolved: Option<&ResolvedElement>) {
        if resolved.is_some_and(ResolvedElement::is_repeating) {
            self.tree.mark_list(parent, name);
        }
    }
}

fn arity_mismatch(group: &Group, given: usize) -> TransformError {
    TransformError::new(
        TransformErrorKind::ArityMismatch,
        format!(
            "group {} takes {} parameters, {given} given",
            group.name,
            group.parameters.len()
        ),
    )
}

fn bind(scope: &mut Scope, target: &RuleTarget, item: Item) {
    if let Some(variable) = &target.variable {
        scope.insert(variable.clone(), item);
    }
}

fn describe(source: &RuleSource) -> String {
    match &source.element {
        Some(element) => format!("{}.{element}", source.context),
        None => source.context.clone(),
    }
}

/// Element name to write: a choice element takes the value's type as suffix
fn child_name(element: &str, resolved: Option<&ResolvedElement>, type_name: Option<&str>) -> String {
    match (resolved, type_name) {
        (Some(resolved), Some(type_name)) if resolved.type_code.is_none() => {
            let mut chars = type_name.chars();
            match chars.next() {
                Some(first) => format!("{element}{}{}", first.to_uppercase(), chars.as_str()),
                None => element.to_string(),
            }
        }
        _ => element.to_string(),
    }
}

/// Temporal types keep their text in the matching variant
fn coerce(value: PrimitiveValue, type_name: &str) -> PrimitiveValue {
    match (value, type_name) {
        (PrimitiveValue::String(s), "date") => PrimitiveValue::Date(s),
        (PrimitiveValue::String(s), "dateTime" | "instant") => PrimitiveValue::DateTime(s),
        (PrimitiveValue::String(s), "time") => PrimitiveValue::Time(s),
        (value, _) => value,
    }
}

/// Every combination of one item per source, first source varying slowest
fn cartesian(domains: &[Vec<Item>]) -> Vec<Vec<Item>> {
    domains.iter().fold(vec![Vec::new()], |acc, domain| {
        acc.iter()
            .flat_map(|prefix| {
                domain.iter().map(move |item| {
                    let mut next = prefix.clone();
                    next.push(item.clone());
                    next
                })
            })
            .collect()
    })
}
