//! Transform implementations
//!
//! Grouped by concern:
//! - structural transforms (create, copy, cast, evaluate, reference, pointer, uuid) here
//! - text transforms (truncate, escape, append)
//! - coded-value constructors (cc, c, qty, id, cp)
//! - date arithmetic (dateOp)
//! - terminology (translate, code validation)

mod coded;
mod datetime;
mod terminology;
mod text;

use crate::engine::{Execution, Frame, Scope};
use crate::error::{EvalResult, TransformError};
use crate::value::{Item, Value};
use octofhir_fml_ast::{Parameter, Transform};
use octofhir_fml_model::{ResolvedElement, TypeContext};
use octofhir_fml_types::{NodeId, PrimitiveValue};

impl Execution<'_, '_> {
    /// Value produced by `transform`; `None` when there is nothing to assign
    ///
    /// `element` is the target element being written, when known.
    pub fn run_transform(
        &mut self,
        frame: Frame<'_>,
        transform: &Transform,
        scope: &Scope,
        element: Option<&ResolvedElement>,
    ) -> EvalResult<Option<Item>> {
        match transform {
            Transform::Create { type_name } => self.create(frame, scope, type_name.as_ref(), element).map(Some),
            Transform::Copy { value } => {
                let item = self.parameter(frame, scope, value)?;
                Ok(self.copy_item(&item))
            }
            Transform::Truncate { source, length } => self.truncate(frame, scope, source, length),
            Transform::Escape {
                source,
                format_in,
                format_out,
            } => self.escape(frame, scope, source, format_in, format_out.as_ref()),
            Transform::Cast { source, type_name } => self.cast(frame, scope, source, type_name.as_ref()),
            Transform::Append { values } => self.append(frame, scope, values),
            Transform::Translate {
                source,
                map_uri,
                output,
            } => self.translate(frame, scope, source, map_uri, output),
            Transform::Reference { source } => {
                let (type_name, id) = self.identity(frame, scope, source, "reference")?;
                Ok(Some(Item::primitive(PrimitiveValue::String(format!("{type_name}/{id}")))))
            }
            Transform::Pointer { source } => {
                let (_, id) = self.identity(frame, scope, source, "pointer")?;
                Ok(Some(typed("uri", PrimitiveValue::String(format!("urn:uuid:{id}")))))
            }
            Transform::DateOp {
                source,
                operation,
                argument,
            } => self.date_op(frame, scope, source, operation, argument.as_ref()),
            Transform::Uuid => Ok(Some(typed(
                "id",
                PrimitiveValue::String(uuid::Uuid::new_v4().to_string()),
            ))),
            Transform::Evaluate { expression } => {
                let result = self.expressions(frame.map, scope).evaluate(expression, &[])?;
                match result.as_slice() {
                    [] => Ok(None),
                    [item] => Ok(self.copy_item(item)),
                    _ => Err(TransformError::invalid_argument(
                        "evaluate",
                        format!("expression returned {} values, expected one", result.len()),
                    )),
                }
            }
            Transform::CodeableConcept(args) => self.codeable_concept(frame, scope, args).map(Some),
            Transform::Coding {
                system,
                code,
                display,
            } => self
                .coding(frame, scope, system, code, display.as_ref())
                .map(Some),
            Transform::Quantity(args) => self.quantity(frame, scope, args).map(Some),
            Transform::Identifier {
                system,
                value,
                type_code,
            } => self
                .identifier(frame, scope, system, value, type_code.as_ref())
                .map(Some),
            Transform::ContactPoint { system, value } => {
                self.contact_point(frame, scope, system.as_ref(), value).map(Some)
            }
        }
    }

    /// A variable, a constant or a literal
    pub fn parameter(&self, frame: Frame<'_>, scope: &Scope, parameter: &Parameter) -> EvalResult<Item> {
        match parameter {
            Parameter::Literal(literal) => Ok(Item::primitive(literal.into())),
            Parameter::Id(name) => scope
                .get(name)
                .cloned()
                .or_else(|| frame.map.constant(name).map(|c| Item::primitive(c.into())))
                .ok_or_else(|| TransformError::unbound_variable(name)),
        }
    }

    /// Text of a parameter; `None` for complex values
    pub fn parameter_text(&self, frame: Frame<'_>, scope: &Scope, parameter: &Parameter) -> EvalResult<Option<String>> {
        let item = self.parameter(frame, scope, parameter)?;
        Ok(item.text(&*self.tree))
    }

    /// Text of a parameter that must be primitive
    pub fn required_text(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        parameter: &Parameter,
        transform: &str,
    ) -> EvalResult<String> {
        self.parameter_text(frame, scope, parameter)?
            .ok_or_else(|| TransformError::invalid_argument(transform, "expected a primitive value"))
    }

    fn create(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        type_name: Option<&Parameter>,
        element: Option<&ResolvedElement>,
    ) -> EvalResult<Item> {
        let requested = match type_name {
            Some(parameter) => Some(self.required_text(frame, scope, parameter, "create")?),
            None => None,
        };
        let (name, context) = match requested {
            Some(requested) => match self.resolve_declared(frame.map, &requested)? {
                Some((name, context)) => (Some(name), context),
                None if self.options.fetch_policy.is_strict() => {
                    return Err(TransformError::unresolved_type(&requested));
                }
                None => {
                    log::debug!("create: type {requested} is unknown, creating it untyped");
                    (Some(requested), None)
                }
            },
            None => (
                element.and_then(|e| e.type_code.clone()),
                element.and_then(|e| e.context.clone()),
            ),
        };
        let node = self.tree.create(name.as_deref());
        Ok(Item {
            value: Value::Node(node),
            type_name: name,
            context,
        })
    }

    fn cast(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        type_name: Option<&Parameter>,
    ) -> EvalResult<Option<Item>> {
        let Some(text) = self.parameter_text(frame, scope, source)? else {
            return Err(TransformError::invalid_argument("cast", "only primitive values can be cast"));
        };
        let target = match type_name {
            Some(parameter) => self.required_text(frame, scope, parameter, "cast")?,
            None => "string".to_string(),
        };
        let invalid = |what: &str| {
            TransformError::invalid_argument("cast", format!("'{text}' is not a valid {what}"))
        };
        let value = match target.as_str() {
            "string" | "code" | "uri" | "id" | "markdown" => PrimitiveValue::String(text.clone()),
            "integer" | "positiveInt" | "unsignedInt" => {
                PrimitiveValue::Integer(text.trim().parse().map_err(|_| invalid("integer"))?)
            }
            "decimal" => PrimitiveValue::Decimal(text.trim().parse().map_err(|_| invalid("decimal"))?),
            "boolean" => match text.trim() {
                "true" => PrimitiveValue::Boolean(true),
                "false" => PrimitiveValue::Boolean(false),
                _ => return Err(invalid("boolean")),
            },
            "date" | "dateTime" | "time" => datetime::parse_temporal(&target, &text).ok_or_else(|| invalid(&target))?,
            other => {
                return Err(TransformError::invalid_argument(
                    "cast",
                    format!("cannot cast to {other}"),
                ));
            }
        };
        Ok(Some(typed(&target, value)))
    }

    /// Resource type and id of a node, giving the node an id if it has none
    fn identity(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        transform: &str,
    ) -> EvalResult<(String, String)> {
        let item = self.parameter(frame, scope, source)?;
        let Some(node) = item.node_id().filter(|_| item.is_complex(&*self.tree)) else {
            return Err(TransformError::invalid_argument(transform, "expected a resource"));
        };
        let type_name = item
            .type_name(&*self.tree)
            .map(str::to_string)
            .ok_or_else(|| TransformError::invalid_argument(transform, "the resource has no type"))?;
        let id = self.ensure_id(node);
        Ok((type_name, id))
    }

    fn ensure_id(&mut self, node: NodeId) -> String {
        if let Some(id) = self
            .tree
            .first_child(node, "id")
            .and_then(|id| self.tree.value(id))
        {
            return id.to_string();
        }
        let id = uuid::Uuid::new_v4().to_string();
        let child = self
            .tree
            .create_typed_primitive("id", PrimitiveValue::String(id.clone()));
        self.tree.prepend_child(node, "id", child);
        id
    }

    /// A complex node with primitive fields, typed and ready to navigate
    pub fn build(&mut self, type_name: &str, fields: &[(&str, &str, Option<PrimitiveValue>)]) -> EvalResult<Item> {
        let node = self.tree.create(Some(type_name));
        for (name, field_type, value) in fields {
            if let Some(value) = value {
                let child = self.tree.create_typed_primitive(field_type, value.clone());
                self.tree.append_child(node, name, child);
            }
        }
        let context = self.types.resolve_core_type(type_name)?.map(TypeContext::new);
        Ok(Item::node(node).with_type(type_name, context))
    }
}

/// A primitive item carrying a FHIR type other than its value's default
fn typed(type_name: &str, value: PrimitiveValue) -> Item {
    Item {
        value: Value::Primitive(value),
        type_name: Some(type_name.to_string()),
        context: None,
    }
}
