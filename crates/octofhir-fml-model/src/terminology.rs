//! Terminology service trait and in-memory implementations

use crate::ModelError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A coded concept
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: String,
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: &str, code: &str, display: Option<&str>) -> Self {
        Self {
            system: Some(system.to_string()),
            code: code.to_string(),
            display: display.map(str::to_string),
        }
    }
}

/// Options passed with every terminology call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerminologyServiceOptions {
    /// Display language
    pub language: Option<String>,
    /// Look the code up in every known system when none is given
    pub guess_system: bool,
}

/// Outcome of a code validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// Preferred display when it differs from the one supplied
    pub display_override: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            ok: true,
            display_override: None,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            display_override: None,
            message: Some(message.into()),
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display_override = Some(display.into());
        self
    }
}

/// Expanded value set content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub value_set: String,
    pub contains: Vec<Coding>,
}

/// Trait for validating codes and expanding value sets
pub trait TerminologyService: Send + Sync {
    fn validate_code(
        &self,
        options: &TerminologyServiceOptions,
        system: Option<&str>,
        code: &str,
        display: Option<&str>,
    ) -> Result<ValidationResult, ModelError>;

    fn expand_value_set(
        &self,
        value_set: &str,
        options: &TerminologyServiceOptions,
    ) -> Result<ExpansionResult, ModelError>;
}

/// Terminology service that accepts every code and expands nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTerminology;

impl TerminologyService for NoopTerminology {
    fn validate_code(
        &self,
        _options: &TerminologyServiceOptions,
        _system: Option<&str>,
        _code: &str,
        _display: Option<&str>,
    ) -> Result<ValidationResult, ModelError> {
        Ok(ValidationResult::valid())
    }

    fn expand_value_set(
        &self,
        value_set: &str,
        _options: &TerminologyServiceOptions,
    ) -> Result<ExpansionResult, ModelError> {
        Err(ModelError::Expansion(format!(
            "no terminology available to expand {value_set}"
        )))
    }
}

type CodeTable = IndexMap<String, IndexMap<String, Option<String>>>;

/// Code systems and value sets held in memory
#[derive(Debug, Default)]
pub struct InMemoryTerminology {
    systems: RwLock<CodeTable>,
    value_sets: RwLock<IndexMap<String, Vec<Coding>>>,
}

impl InMemoryTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_code(&self, system: &str, code: &str, display: Option<&str>) {
        self.systems
            .write()
            .entry(system.to_string())
            .or_default()
            .insert(code.to_string(), display.map(str::to_string));
    }

    pub fn with_code(self, system: &str, code: &str, display: Option<&str>) -> Self {
        self.add_code(system, code, display);
        self
    }

    pub fn add_value_set(&self, url: &str, codes: Vec<Coding>) {
        self.value_sets.write().insert(url.to_string(), codes);
    }

    fn check_display(known: Option<&String>, display: Option<&str>) -> ValidationResult {
        match known {
            Some(known) if display != Some(known.as_str()) => {
                ValidationResult::valid().with_display(known.clone())
            }
            _ => ValidationResult::valid(),
        }
    }
}

impl TerminologyService for InMemoryTerminology {
    fn validate_code(
        &self,
        options: &TerminologyServiceOptions,
        system: Option<&str>,
        code: &str,
        display: Option<&str>,
    ) -> Result<ValidationResult, ModelError> {
        let systems = self.systems.read();
        let Some(system) = system else {
            if options.guess_system {
                if let Some(known) = systems.values().find_map(|codes| codes.get(code)) {
                    return Ok(Self::check_display(known.as_ref(), display));
                }
            }
            return Ok(ValidationResult::invalid(format!(
                "Code '{code}' has no system"
            )));
        };
        let Some(codes) = systems.get(system) else {
            return Ok(ValidationResult::invalid(format!(
                "Unknown code system {system}"
            )));
        };
        Ok(match codes.get(code) {
            Some(known) => Self::check_display(known.as_ref(), display),
            None => ValidationResult::invalid(format!("Unknown code '{code}' in system {system}")),
        })
    }

    fn expand_value_set(
        &self,
        value_set: &str,
        _options: &TerminologyServiceOptions,
    ) -> Result<ExpansionResult, ModelError> {
        let value_sets = self.value_sets.read();
        let contains = value_sets
            .get(value_set)
            .ok_or_else(|| ModelError::Expansion(format!("Unknown value set {value_set}")))?;
        Ok(ExpansionResult {
            value_set: value_set.to_string(),
            contains: contains.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const GENDER: &str = "http://hl7.org/fhir/administrative-gender";

    fn terminology() -> InMemoryTerminology {
        InMemoryTerminology::new()
            .with_code(GENDER, "male", Some("Male"))
            .with_code(GENDER, "female", Some("Female"))
    }

    #[rstest]
    #[case(Some(GENDER), "male", Some("Male"), true, None)]
    #[case(Some(GENDER), "male", None, true, Some("Male"))]
    #[case(Some(GENDER), "male", Some("man"), true, Some("Male"))]
    #[case(Some(GENDER), "unknown", None, false, None)]
    #[case(Some("http://other"), "male", None, false, None)]
    #[case(None, "male", None, false, None)]
    fn test_validate_code(
        #[case] system: Option<&str>,
        #[case] code: &str,
        #[case] display: Option<&str>,
        #[case] ok: bool,
        #[case] display_override: Option<&str>,
    ) {
        let result = terminology()
            .validate_code(&TerminologyServiceOptions::default(), system, code, display)
            .unwrap();
        assert_eq!(result.ok, ok);
        assert_eq!(result.display_override.as_deref(), display_override);
        assert_eq!(result.message.is_some(), !ok);
    }

    #[test]
    fn test_guess_system() {
        let options = TerminologyServiceOptions {
            guess_system: true,
            ..Default::default()
        };
        let result = terminology()
            .validate_code(&options, None, "female", Some("Female"))
            .unwrap();
        assert_eq!(result, ValidationResult::valid());
    }

    #[test]
    fn test_expand_value_set() {
        let terminology = terminology();
        terminology.add_value_set("urn:vs:gender", vec![Coding::new(GENDER, "male", None)]);
        let options = TerminologyServiceOptions::default();
        let expansion = terminology.expand_value_set("urn:vs:gender", &options).unwrap();
        assert_eq!(expansion.contains.len(), 1);
        assert!(terminology.expand_value_set("urn:vs:none", &options).is_err());
        assert!(NoopTerminology.expand_value_set("urn:vs:gender", &options).is_err());
    }
}
