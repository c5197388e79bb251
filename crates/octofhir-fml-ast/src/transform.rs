//! Target transforms
//!
//! The transform set is closed: every function name the language accepts maps
//! to one variant here, and each variant holds exactly the arguments its arity
//! allows. A [`Transform`] value therefore cannot have a wrong argument count.

use crate::{Expression, Literal};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A transform argument: a bound variable or a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    Id(String),
    Literal(Literal),
}

impl Parameter {
    pub fn id(name: impl Into<String>) -> Self {
        Self::Id(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            Self::Id(name) => Some(name),
            Self::Literal(_) => None,
        }
    }

    pub fn into_expression(self) -> Expression {
        match self {
            Self::Id(name) => Expression::Identifier(name),
            Self::Literal(lit) => Expression::Literal(lit),
        }
    }
}

/// Arguments of `cc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CcArgs {
    /// `cc(text)`
    Text(Parameter),
    /// `cc(system, code)` or `cc(system, code, display)`
    Coded {
        system: Parameter,
        code: Parameter,
        display: Option<Parameter>,
    },
}

/// Arguments of `qty`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QtyArgs {
    /// `qty(text)` where text is `"<value> <unit>"`
    Text(Parameter),
    /// `qty(value, unit)`
    ValueUnit { value: Parameter, unit: Parameter },
    /// `qty(value, unit, system, code)`
    Coded {
        value: Parameter,
        unit: Parameter,
        system: Parameter,
        code: Parameter,
    },
}

/// A transform invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transform {
    Create { type_name: Option<Parameter> },
    Copy { value: Parameter },
    Truncate { source: Parameter, length: Parameter },
    Escape {
        source: Parameter,
        format_in: Parameter,
        format_out: Option<Parameter>,
    },
    Cast {
        source: Parameter,
        type_name: Option<Parameter>,
    },
    Append { values: Vec<Parameter> },
    Translate {
        source: Parameter,
        map_uri: Parameter,
        output: Parameter,
    },
    Reference { source: Parameter },
    DateOp {
        source: Parameter,
        operation: Parameter,
        argument: Option<Parameter>,
    },
    Uuid,
    Pointer { source: Parameter },
    Evaluate { expression: Expression },
    CodeableConcept(CcArgs),
    Coding {
        system: Parameter,
        code: Parameter,
        display: Option<Parameter>,
    },
    Quantity(QtyArgs),
    Identifier {
        system: Parameter,
        value: Parameter,
        type_code: Option<Parameter>,
    },
    ContactPoint {
        system: Option<Parameter>,
        value: Parameter,
    },
}

/// Accepted argument counts of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
    OneOf(&'static [usize]),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exact(n) => count == n,
            Self::Range(min, max) => (min..=max).contains(&count),
            Self::AtLeast(min) => count >= min,
            Self::OneOf(counts) => counts.contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Range(min, max) => write!(f, "{min} to {max}"),
            Self::AtLeast(min) => write!(f, "at least {min}"),
            Self::OneOf(counts) => {
                let parts: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" or "))
            }
        }
    }
}

/// Function names of the transform set with their arities
pub const TRANSFORM_ARITIES: &[(&str, Arity)] = &[
    ("create", Arity::Range(0, 1)),
    ("copy", Arity::Exact(1)),
    ("truncate", Arity::Exact(2)),
    ("escape", Arity::Range(2, 3)),
    ("cast", Arity::Range(1, 2)),
    ("append", Arity::AtLeast(1)),
    ("translate", Arity::Exact(3)),
    ("reference", Arity::Exact(1)),
    ("dateOp", Arity::Range(2, 3)),
    ("uuid", Arity::Exact(0)),
    ("pointer", Arity::Exact(1)),
    ("evaluate", Arity::Exact(1)),
    ("cc", Arity::Range(1, 3)),
    ("c", Arity::Range(2, 3)),
    ("qty", Arity::OneOf(&[1, 2, 4])),
    ("id", Arity::Range(2, 3)),
    ("cp", Arity::Range(1, 2)),
];

/// Arity of a transform function, `None` if the name is not a transform
pub fn transform_arity(name: &str) -> Option<Arity> {
    TRANSFORM_ARITIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, arity)| *arity)
}

/// Why a call could not be turned into a [`Transform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformBuildError {
    Unknown(String),
    Arity {
        name: &'static str,
        expected: Arity,
        found: usize,
    },
}

impl Transform {
    /// Build a transform from a function name and positional arguments.
    ///
    /// `evaluate` receives its argument as a parameter here; parsers that read
    /// a full expression build [`Transform::Evaluate`] directly.
    pub fn from_parameters(
        name: &str,
        args: Vec<Parameter>,
    ) -> Result<Self, TransformBuildError> {
        let (canonical, arity) = TRANSFORM_ARITIES
            .iter()
            .find(|(n, _)| *n == name)
            .copied()
            .ok_or_else(|| TransformBuildError::Unknown(name.to_string()))?;
        if !arity.accepts(args.len()) {
            return Err(TransformBuildError::Arity {
                name: canonical,
                expected: arity,
                found: args.len(),
            });
        }

        let count = args.len();
        let mut it = args.into_iter();
        // Arity is checked above, so every required argument is present.
        let mut next = || it.next().unwrap_or(Parameter::Literal(Literal::String(String::new())));

        Ok(match canonical {
            "create" => Self::Create {
                type_name: (count == 1).then(&mut next),
            },
            "copy" => Self::Copy { value: next() },
            "truncate" => Self::Truncate {
                source: next(),
                length: next(),
            },
            "escape" => Self::Escape {
                source: next(),
                format_in: next(),
                format_out: (count == 3).then(&mut next),
            },
            "cast" => Self::Cast {
                source: next(),
                type_name: (count == 2).then(&mut next),
            },
            "append" => Self::Append {
                values: (0..count).map(|_| next()).collect(),
            },
            "translate" => Self::Translate {
                source: next(),
                map_uri: next(),
                output: next(),
            },
            "reference" => Self::Reference { source: next() },
            "dateOp" => Self::DateOp {
                source: next(),
                operation: next(),
                argument: (count == 3).then(&mut next),
            },
            "uuid" => Self::Uuid,
            "pointer" => Self::Pointer { source: next() },
            "evaluate" => Self::Evaluate {
                expression: next().into_expression(),
            },
            "cc" => Self::CodeableConcept(if count == 1 {
                CcArgs::Text(next())
            } else {
                CcArgs::Coded {
                    system: next(),
                    code: next(),
                    display: (count == 3).then(&mut next),
                }
            }),
            "c" => Self::Coding {
                system: next(),
                code: next(),
                display: (count == 3).then(&mut next),
            },
            "qty" => Self::Quantity(match count {
                1 => QtyArgs::Text(next()),
                2 => QtyArgs::ValueUnit {
                    value: next(),
                    unit: next(),
                },
                _ => QtyArgs::Coded {
                    value: next(),
                    unit: next(),
                    system: next(),
                    code: next(),
                },
            }),
            "id" => Self::Identifier {
                system: next(),
                value: next(),
                type_code: (count == 3).then(&mut next),
            },
            "cp" => {
                if count == 1 {
                    Self::ContactPoint {
                        system: None,
                        value: next(),
                    }
                } else {
                    Self::ContactPoint {
                        system: Some(next()),
                        value: next(),
                    }
                }
            }
            other => return Err(TransformBuildError::Unknown(other.to_string())),
        })
    }

    /// Function name used in source
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Copy { .. } => "copy",
            Self::Truncate { .. } => "truncate",
            Self::Escape { .. } => "escape",
            Self::Cast { .. } => "cast",
            Self::Append { .. } => "append",
            Self::Translate { .. } => "translate",
            Self::Reference { .. } => "reference",
            Self::DateOp { .. } => "dateOp",
            Self::Uuid => "uuid",
            Self::Pointer { .. } => "pointer",
            Self::Evaluate { .. } => "evaluate",
            Self::CodeableConcept(_) => "cc",
            Self::Coding { .. } => "c",
            Self::Quantity(_) => "qty",
            Self::Identifier { .. } => "id",
            Self::ContactPoint { .. } => "cp",
        }
    }

    /// Parameters in canonical positional order (empty for `evaluate`)
    pub fn parameters(&self) -> SmallVec<[&Parameter; 4]> {
        let mut out = SmallVec::new();
        match self {
            Self::Create { type_name } => out.extend(type_name.as_ref()),
            Self::Copy { value } => out.push(value),
            Self::Truncate { source, length } => out.extend([source, length]),
            Self::Escape {
                source,
                format_in,
                format_out,
            } => {
                out.extend([source, format_in]);
                out.extend(format_out.as_ref());
            }
            Self::Cast { source, type_name } => {
                out.push(source);
                out.extend(type_name.as_ref());
            }
            Self::Append { values } => out.extend(values.iter()),
            Self::Translate {
                source,
                map_uri,
                output,
            } => out.extend([source, map_uri, output]),
            Self::Reference { source } | Self::Pointer { source } => out.push(source),
            Self::DateOp {
                source,
                operation,
                argument,
            } => {
                out.extend([source, operation]);
                out.extend(argument.as_ref());
            }
            Self::Uuid | Self::Evaluate { .. } => {}
            Self::CodeableConcept(CcArgs::Text(text)) => out.push(text),
            Self::CodeableConcept(CcArgs::Coded {
                system,
                code,
                display,
            })
            | Self::Coding {
                system,
                code,
                display,
            } => {
                out.extend([system, code]);
                out.extend(display.as_ref());
            }
            Self::Quantity(QtyArgs::Text(text)) => out.push(text),
            Self::Quantity(QtyArgs::ValueUnit { value, unit }) => out.extend([value, unit]),
            Self::Quantity(QtyArgs::Coded {
                value,
                unit,
                system,
                code,
            }) => out.extend([value, unit, system, code]),
            Self::Identifier {
                system,
                value,
                type_code,
            } => {
                out.extend([system, value]);
                out.extend(type_code.as_ref());
            }
            Self::ContactPoint { system, value } => {
                out.extend(system.as_ref());
                out.push(value);
            }
        }
        out
    }

    /// Whether this transform may appear on a rule that has dependents
    pub const fn introduces_element(&self) -> bool {
        matches!(self, Self::Create { .. })
    }
}
