//! Primitive values held by tree nodes

use octofhir_fml_ast::Literal;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// FHIR primitive type codes whose choice suffix is written capitalized
/// (`valueString` carries a `string`)
pub const PRIMITIVE_TYPES: &[&str] = &[
    "base64Binary",
    "boolean",
    "canonical",
    "code",
    "date",
    "dateTime",
    "decimal",
    "id",
    "instant",
    "integer",
    "integer64",
    "markdown",
    "oid",
    "positiveInt",
    "string",
    "time",
    "unsignedInt",
    "uri",
    "url",
    "uuid",
    "xhtml",
];

/// Whether `type_name` is a FHIR primitive type code
pub fn is_primitive_type(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name)
}

/// Type code carried by a choice element suffix (`String` → `string`,
/// `Quantity` → `Quantity`)
pub fn choice_type_code(suffix: &str) -> String {
    let mut chars = suffix.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let lowered: String = first.to_lowercase().chain(chars).collect();
    if is_primitive_type(&lowered) {
        lowered
    } else {
        suffix.to_string()
    }
}

/// Primitive value of a tree node
///
/// Temporal values keep their lexical form; FHIR allows partial dates and
/// the text is what round-trips through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(String),
    DateTime(String),
    Time(String),
}

impl PrimitiveValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Default FHIR type code for the value
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::DateTime(_) => "dateTime",
            Self::Time(_) => "time",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, with integers promoted
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Text of string-like values (strings and temporals)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Date(s) | Self::DateTime(s) | Self::Time(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Decimal(_))
    }

    /// Order two values of compatible kinds
    ///
    /// Numbers compare numerically across integer and decimal; strings and
    /// temporals of the same kind compare by text. Anything else is
    /// incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b))
            | (Self::Date(a), Self::Date(b))
            | (Self::DateTime(a), Self::DateTime(b))
            | (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::DateTime(b)) | (Self::DateTime(a), Self::Date(b)) => {
                let len = a.len().min(b.len());
                Some(a[..len].cmp(&b[..len]))
            }
            _ => match (self.as_decimal(), other.as_decimal()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }

    /// Equality with numeric promotion
    pub fn equals(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// JSON form of the value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map_or_else(|| serde_json::Value::String(d.to_string()), serde_json::Value::Number),
            Self::String(s) | Self::Date(s) | Self::DateTime(s) | Self::Time(s) => {
                serde_json::Value::String(s.clone())
            }
        }
    }

    /// Read a JSON scalar; `type_name` selects the temporal variants
    pub fn from_json(value: &serde_json::Value, type_name: Option<&str>) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) if type_name != Some("decimal") => Some(Self::Integer(i)),
                _ => Decimal::from_str(&n.to_string()).ok().map(Self::Decimal),
            },
            serde_json::Value::String(s) => Some(match type_name {
                Some("date") => Self::Date(s.clone()),
                Some("dateTime" | "instant") => Self::DateTime(s.clone()),
                Some("time") => Self::Time(s.clone()),
                _ => Self::String(s.clone()),
            }),
            _ => None,
        }
    }
}

impl From<&Literal> for PrimitiveValue {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Boolean(b) => Self::Boolean(*b),
            Literal::Integer(i) => Self::Integer(*i),
            Literal::Decimal(d) => Self::Decimal(*d),
            Literal::String(s) => Self::String(s.clone()),
            Literal::Date(s) => Self::Date(s.clone()),
            Literal::DateTime(s) => Self::DateTime(s.clone()),
            Literal::Time(s) => Self::Time(s.clone()),
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Plain text form, as `toString()` produces it
impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) | Self::Date(s) | Self::DateTime(s) | Self::Time(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("String", "string")]
    #[case("DateTime", "dateTime")]
    #[case("Quantity", "Quantity")]
    #[case("CodeableConcept", "CodeableConcept")]
    #[case("", "")]
    fn test_choice_type_code(#[case] suffix: &str, #[case] expected: &str) {
        assert_eq!(choice_type_code(suffix), expected);
    }

    #[test]
    fn test_numeric_comparison_promotes() {
        let one = PrimitiveValue::Integer(1);
        let one_point_five = PrimitiveValue::Decimal(Decimal::new(15, 1));
        assert_eq!(one.compare(&one_point_five), Some(Ordering::Less));
        assert!(PrimitiveValue::Integer(2).equals(&PrimitiveValue::Decimal(Decimal::new(20, 1))));
    }

    #[test]
    fn test_incomparable_kinds() {
        assert_eq!(
            PrimitiveValue::string("1").compare(&PrimitiveValue::Integer(1)),
            None
        );
    }

    #[test]
    fn test_date_against_datetime_uses_common_prefix() {
        let date = PrimitiveValue::Date("2024-01-15".into());
        let date_time = PrimitiveValue::DateTime("2024-01-15T10:00:00Z".into());
        assert_eq!(date.compare(&date_time), Some(Ordering::Equal));
    }

    #[rstest]
    #[case(json!(true), None, PrimitiveValue::Boolean(true))]
    #[case(json!(3), None, PrimitiveValue::Integer(3))]
    #[case(json!(3), Some("decimal"), PrimitiveValue::Decimal(Decimal::from(3)))]
    #[case(json!(1.25), None, PrimitiveValue::Decimal(Decimal::new(125, 2)))]
    #[case(json!("1990-02-03"), Some("date"), PrimitiveValue::Date("1990-02-03".into()))]
    #[case(json!("x"), None, PrimitiveValue::string("x"))]
    fn test_from_json(
        #[case] value: serde_json::Value,
        #[case] type_name: Option<&str>,
        #[case] expected: PrimitiveValue,
    ) {
        assert_eq!(PrimitiveValue::from_json(&value, type_name), Some(expected));
    }

    #[test]
    fn test_from_literal() {
        let literal = Literal::Date("2024-02".into());
        let value = PrimitiveValue::from(&literal);
        assert_eq!(value.type_name(), "date");
        assert_eq!(value.to_string(), "2024-02");
    }
}
