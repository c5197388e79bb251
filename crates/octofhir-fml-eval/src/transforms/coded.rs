//! Coded-value constructors: cc, c, qty, id and cp

use crate::engine::{Execution, Frame, Scope};
use crate::error::{EvalResult, TransformError};
use crate::value::Item;
use octofhir_fml_ast::{CcArgs, Parameter, QtyArgs};
use octofhir_fml_types::PrimitiveValue;
use rust_decimal::Decimal;

/// Code system of `Identifier.type` codes
const IDENTIFIER_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";

impl Execution<'_, '_> {
    pub(super) fn codeable_concept(&mut self, frame: Frame<'_>, scope: &Scope, args: &CcArgs) -> EvalResult<Item> {
        match args {
            CcArgs::Text(text) => {
                let text = self.required_text(frame, scope, text, "cc")?;
                self.build("CodeableConcept", &[("text", "string", Some(text.into()))])
            }
            CcArgs::Coded {
                system,
                code,
                display,
            } => {
                let coding = self.coding(frame, scope, system, code, display.as_ref())?;
                let concept = self.build("CodeableConcept", &[])?;
                self.attach(&concept, "coding", &coding, true);
                Ok(concept)
            }
        }
    }

    /// A `Coding`, validated by the terminology service
    pub(super) fn coding(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        system: &Parameter,
        code: &Parameter,
        display: Option<&Parameter>,
    ) -> EvalResult<Item> {
        let system = self.required_text(frame, scope, system, "c")?;
        let code = self.required_text(frame, scope, code, "c")?;
        let display = match display {
            Some(display) => self.parameter_text(frame, scope, display)?,
            None => None,
        };
        let display = self.validate_code(Some(&system), &code, display)?;
        self.build(
            "Coding",
            &[
                ("system", "uri", Some(system.into())),
                ("code", "code", Some(code.into())),
                ("display", "string", display.map(Into::into)),
            ],
        )
    }

    pub(super) fn quantity(&mut self, frame: Frame<'_>, scope: &Scope, args: &QtyArgs) -> EvalResult<Item> {
        let (value, unit, system, code) = match args {
            QtyArgs::Text(text) => {
                let text = self.required_text(frame, scope, text, "qty")?;
                let (value, unit) = match text.trim().split_once(char::is_whitespace) {
                    Some((value, unit)) => (value.to_string(), Some(unit.trim().to_string())),
                    None => (text.trim().to_string(), None),
                };
                (value, unit, None, None)
            }
            QtyArgs::ValueUnit { value, unit } => (
                self.required_text(frame, scope, value, "qty")?,
                Some(self.required_text(frame, scope, unit, "qty")?),
                None,
                None,
            ),
            QtyArgs::Coded {
                value,
                unit,
                system,
                code,
            } => (
                self.required_text(frame, scope, value, "qty")?,
                Some(self.required_text(frame, scope, unit, "qty")?),
                Some(self.required_text(frame, scope, system, "qty")?),
                Some(self.required_text(frame, scope, code, "qty")?),
            ),
        };
        let value: Decimal = value.parse().map_err(|_| {
            TransformError::invalid_argument("qty", format!("'{value}' is not a number"))
        })?;
        self.build(
            "Quantity",
            &[
                ("value", "decimal", Some(PrimitiveValue::Decimal(value))),
                ("unit", "string", unit.map(Into::into)),
                ("system", "uri", system.map(Into::into)),
                ("code", "code", code.map(Into::into)),
            ],
        )
    }

    pub(super) fn identifier(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        system: &Parameter,
        value: &Parameter,
        type_code: Option<&Parameter>,
    ) -> EvalResult<Item> {
        let system = self.required_text(frame, scope, system, "id")?;
        let value = self.required_text(frame, scope, value, "id")?;
        let type_code = match type_code {
            Some(code) => Some(self.required_text(frame, scope, code, "id")?),
            None => None,
        };
        let identifier = self.build(
            "Identifier",
            &[
                ("system", "uri", Some(system.into())),
                ("value", "string", Some(value.into())),
            ],
        )?;
        if let Some(code) = type_code {
            let coding = self.build(
                "Coding",
                &[
                    ("system", "uri", Some(IDENTIFIER_TYPE_SYSTEM.into())),
                    ("code", "code", Some(code.into())),
                ],
            )?;
            let concept = self.build("CodeableConcept", &[])?;
            self.attach(&concept, "coding", &coding, true);
            self.attach(&identifier, "type", &concept, false);
        }
        Ok(identifier)
    }

    /// `cp([system,] value)`; without a system it is read from a `mailto:`
    /// or `tel:` prefix, else from the shape of the value
    pub(super) fn contact_point(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        system: Option<&Parameter>,
        value: &Parameter,
    ) -> EvalResult<Item> {
        let value = self.required_text(frame, scope, value, "cp")?;
        let (system, value) = match system {
            Some(system) => (self.required_text(frame, scope, system, "cp")?, value),
            None => infer_contact_system(&value),
        };
        self.build(
            "ContactPoint",
            &[
                ("system", "code", Some(system.into())),
                ("value", "string", Some(value.into())),
            ],
        )
    }

    fn attach(&mut self, parent: &Item, name: &str, child: &Item, list: bool) {
        if let (Some(parent), Some(child)) = (parent.node_id(), child.node_id()) {
            self.tree.append_child(parent, name, child);
            if list {
                self.tree.mark_list(parent, name);
            }
        }
    }
}

fn infer_contact_system(value: &str) -> (String, String) {
    if let Some(address) = value.strip_prefix("mailto:") {
        ("email".into(), address.into())
    } else if let Some(number) = value.strip_prefix("tel:") {
        ("phone".into(), number.into())
    } else if value.contains('@') {
        ("email".into(), value.into())
    } else if value.starts_with("http://") || value.starts_with("https://") {
        ("url".into(), value.into())
    } else {
        ("phone".into(), value.into())
    }
}
