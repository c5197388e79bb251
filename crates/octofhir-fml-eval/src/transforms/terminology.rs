//! translate and code validation

use super::typed;
use crate::engine::{Execution, Frame, Scope};
use crate::error::{EvalResult, TransformError, TransformErrorKind};
use crate::value::Item;
use octofhir_fml_ast::Parameter;
use octofhir_fml_model::{Coding, ConceptMapResource};
use octofhir_fml_types::PrimitiveValue;
use std::sync::Arc;

impl Execution<'_, '_> {
    /// Check a code with the terminology service; returns the display to use
    pub(super) fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        display: Option<String>,
    ) -> EvalResult<Option<String>> {
        let result = self
            .terminology
            .validate_code(&self.options.terminology_options, system, code, display.as_deref())
            .map_err(|e| TransformError::new(TransformErrorKind::TerminologyFailure, e.to_string()))?;
        if !result.ok {
            return Err(TransformError::new(
                TransformErrorKind::TerminologyFailure,
                format!(
                    "{}#{code} is not valid: {}",
                    system.unwrap_or_default(),
                    result.message.as_deref().unwrap_or("rejected by the terminology service")
                ),
            ));
        }
        Ok(result.display_override.or(display))
    }

    /// `translate(source, map, output)`
    ///
    /// `map` is `#name` for a concept map embedded in the mapping, otherwise
    /// a canonical URL. The source is a code, a `Coding` or a
    /// `CodeableConcept` (its first coding). `output` selects `code`,
    /// `system`, `display`, `Coding` or `CodeableConcept`.
    pub(super) fn translate(
        &mut self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        map_uri: &Parameter,
        output: &Parameter,
    ) -> EvalResult<Option<Item>> {
        let item = self.parameter(frame, scope, source)?;
        let Some((system, code)) = self.source_code(&item) else {
            return Ok(None);
        };
        let map_uri = self.required_text(frame, scope, map_uri, "translate")?;
        let output = self.required_text(frame, scope, output, "translate")?;

        let concept_map = match map_uri.strip_prefix('#') {
            Some(name) => frame
                .map
                .concept_map(name)
                .map(|embedded| Arc::new(ConceptMapResource::from_embedded(embedded))),
            None => self
                .resources
                .fetch_as::<ConceptMapResource>(&map_uri, self.options.fetch_policy)?,
        };
        let Some(concept_map) = concept_map else {
            return Err(TransformError::new(
                TransformErrorKind::TerminologyFailure,
                format!("concept map {map_uri} not found"),
            ));
        };
        let Some(target) = concept_map.translate(system.as_deref(), &code).into_iter().next() else {
            return Err(TransformError::new(
                TransformErrorKind::TerminologyFailure,
                format!(
                    "{map_uri} has no translation for {}#{code}",
                    system.as_deref().unwrap_or_default()
                ),
            ));
        };
        log::debug!("translate {code} via {map_uri}: {}", target.code);

        match output.as_str() {
            "code" => Ok(Some(typed("code", target.code.into()))),
            "system" | "uri" => Ok(target.system.map(|s| typed("uri", s.into()))),
            "display" => Ok(target.display.map(|d| typed("string", d.into()))),
            "Coding" => self.coding_node(&target).map(Some),
            "CodeableConcept" => {
                let coding = self.coding_node(&target)?;
                let concept = self.build("CodeableConcept", &[])?;
                if let (Some(parent), Some(child)) = (concept.node_id(), coding.node_id()) {
                    self.tree.append_child(parent, "coding", child);
                    self.tree.mark_list(parent, "coding");
                }
                Ok(Some(concept))
            }
            other => Err(TransformError::invalid_argument(
                "translate",
                format!("unknown output {other}"),
            )),
        }
    }

    /// System and code of a code, `Coding` or `CodeableConcept`
    fn source_code(&self, item: &Item) -> Option<(Option<String>, String)> {
        let tree = &*self.tree;
        if let Some(code) = item.text(tree) {
            return Some((None, code));
        }
        let node = item.node_id()?;
        let coding = if tree.first_child(node, "code").is_some() {
            node
        } else {
            tree.first_child(node, "coding")?
        };
        let text = |name: &str| {
            tree.first_child(coding, name)
                .and_then(|child| tree.value(child))
                .map(PrimitiveValue::to_string)
        };
        Some((text("system"), text("code")?))
    }

    fn coding_node(&mut self, coding: &Coding) -> EvalResult<Item> {
        self.build(
            "Coding",
            &[
                ("system", "uri", coding.system.clone().map(Into::into)),
                ("code", "code", Some(coding.code.clone().into())),
                ("display", "string", coding.display.clone().map(Into::into)),
            ],
        )
    }
}
