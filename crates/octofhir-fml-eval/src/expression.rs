//! FHIRPath-subset evaluation
//!
//! Expressions appear in source conditions (`where`, `check`, `log`,
//! `while`), in `default (...)` values and in `evaluate` transforms. Every
//! expression yields a collection of [`Item`]s; an empty collection plays the
//! part of a missing value.

use crate::error::{EvalResult, TransformError};
use crate::value::{Item, navigate};
use indexmap::IndexMap;
use octofhir_fml_ast::{BinaryOp, Expression, MappingDefinition, UnaryOp};
use octofhir_fml_model::TypeProvider;
use octofhir_fml_types::{ElementTree, PrimitiveValue};
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// What an expression can see: the tree, bound variables and map constants
pub struct ExpressionContext<'a> {
    pub tree: &'a ElementTree,
    pub types: &'a dyn TypeProvider,
    pub variables: &'a IndexMap<String, Item>,
    /// Map whose `let` constants are visible after the variables
    pub map: Option<&'a MappingDefinition>,
}

impl ExpressionContext<'_> {
    /// Evaluate `expr` with `focus` as `$this`
    pub fn evaluate(&self, expr: &Expression, focus: &[Item]) -> EvalResult<Vec<Item>> {
        match expr {
            Expression::Literal(literal) => Ok(vec![Item::primitive(literal.into())]),
            Expression::Empty => Ok(Vec::new()),
            Expression::This => Ok(focus.to_vec()),
            Expression::Identifier(name) => {
                if let Some(item) = self.lookup(name) {
                    return Ok(vec![item]);
                }
                self.members(focus, name)
            }
            Expression::Constant(name) => self
                .lookup(name)
                .map(|item| vec![item])
                .ok_or_else(|| TransformError::expression(format!("%{name} is not defined"))),
            Expression::Member { target, name } => {
                let input = self.evaluate(target, focus)?;
                self.members(&input, name)
            }
            Expression::Function { target, name, args } => {
                let input = match target {
                    Some(target) => self.evaluate(target, focus)?,
                    None => focus.to_vec(),
                };
                self.call(name, &input, args, focus)
            }
            Expression::Index { target, index } => {
                let input = self.evaluate(target, focus)?;
                let index = self.evaluate(index, focus)?;
                match self.singleton(&index)?.and_then(|v| v.as_integer()) {
                    Some(i) if i >= 0 => Ok(input.into_iter().skip(i as usize).take(1).collect()),
                    Some(_) => Ok(Vec::new()),
                    None => Err(TransformError::expression("index must be an integer")),
                }
            }
            Expression::Unary {
                op: UnaryOp::Negate,
                operand,
            } => {
                let operand = self.evaluate(operand, focus)?;
                match self.singleton(&operand)? {
                    None => Ok(Vec::new()),
                    Some(PrimitiveValue::Integer(i)) => Ok(value(PrimitiveValue::Integer(-i))),
                    Some(PrimitiveValue::Decimal(d)) => Ok(value(PrimitiveValue::Decimal(-d))),
                    Some(other) => Err(TransformError::expression(format!(
                        "cannot negate a {}",
                        other.type_name()
                    ))),
                }
            }
            Expression::Binary { op, left, right } => self.binary(*op, left, right, focus),
        }
    }

    /// Evaluate a condition; an empty result counts as false
    pub fn is_true(&self, expr: &Expression, focus: &[Item]) -> EvalResult<bool> {
        let result = self.evaluate(expr, focus)?;
        Ok(self.truth(&result)?.unwrap_or(false))
    }

    fn lookup(&self, name: &str) -> Option<Item> {
        if let Some(item) = self.variables.get(name) {
            return Some(item.clone());
        }
        self.map
            .and_then(|map| map.constant(name))
            .map(|literal| Item::primitive(literal.into()))
    }

    fn members(&self, input: &[Item], name: &str) -> EvalResult<Vec<Item>> {
        let mut out = Vec::new();
        for item in input {
            out.extend(navigate(&*self.tree, self.types, item, name)?);
        }
        Ok(out)
    }

    /// The single primitive of a collection, `None` when empty
    fn singleton(&self, items: &[Item]) -> EvalResult<Option<PrimitiveValue>> {
        match items {
            [] => Ok(None),
            [item] => Ok(item.primitive_value(&*self.tree).cloned()),
            _ => Err(TransformError::expression(format!(
                "expected a single value, found {}",
                items.len()
            ))),
        }
    }

    fn string_arg(&self, items: &[Item]) -> EvalResult<Option<String>> {
        Ok(self.singleton(items)?.map(|v| v.to_string()))
    }

    /// Boolean reading of a collection: empty is unknown, a lone non-boolean
    /// value is true
    fn truth(&self, items: &[Item]) -> EvalResult<Option<bool>> {
        match items {
            [] => Ok(None),
            [item] => Ok(Some(
                item.primitive_value(&*self.tree)
                    .and_then(PrimitiveValue::as_bool)
                    .unwrap_or(true),
            )),
            _ => Err(TransformError::expression(
                "a collection of several items has no boolean value",
            )),
        }
    }

    fn call(
        &self,
        name: &str,
        input: &[Item],
        args: &[Expression],
        focus: &[Item],
    ) -> EvalResult<Vec<Item>> {
        let arity = |min: usize, max: usize| {
            if args.len() < min || args.len() > max {
                Err(TransformError::expression(format!(
                    "{name}() takes {min}..{max} arguments, found {}",
                    args.len()
                )))
            } else {
                Ok(())
            }
        };
        match name {
            "exists" => {
                arity(0, 1)?;
                let found = match args.first() {
                    Some(criteria) => !self.filter(input, criteria)?.is_empty(),
                    None => !input.is_empty(),
                };
                Ok(boolean(found))
            }
            "empty" => {
                arity(0, 0)?;
                Ok(boolean(input.is_empty()))
            }
            "not" => {
                arity(0, 0)?;
                Ok(self.truth(input)?.map(|b| boolean(!b)).unwrap_or_default())
            }
            "count" => {
                arity(0, 0)?;
                Ok(value(PrimitiveValue::Integer(input.len() as i64)))
            }
            "first" => {
                arity(0, 0)?;
                Ok(input.first().cloned().into_iter().collect())
            }
            "last" => {
                arity(0, 0)?;
                Ok(input.last().cloned().into_iter().collect())
            }
            "hasValue" => {
                arity(0, 0)?;
                Ok(boolean(matches!(input, [item] if item.primitive_value(&*self.tree).is_some())))
            }
            "where" => {
                arity(1, 1)?;
                self.filter(input, &args[0])
            }
            "iif" => {
                arity(2, 3)?;
                if self.is_true(&args[0], input)? {
                    self.evaluate(&args[1], focus)
                } else {
                    match args.get(2) {
                        Some(otherwise) => self.evaluate(otherwise, focus),
                        None => Ok(Vec::new()),
                    }
                }
            }
            "toString" => {
                arity(0, 0)?;
                Ok(self
                    .string_arg(input)?
                    .map(|s| value(PrimitiveValue::String(s)))
                    .unwrap_or_default())
            }
            "toInteger" => {
                arity(0, 0)?;
                Ok(match self.singleton(input)? {
                    Some(PrimitiveValue::Integer(i)) => value(PrimitiveValue::Integer(i)),
                    Some(PrimitiveValue::Boolean(b)) => value(PrimitiveValue::Integer(i64::from(b))),
                    Some(PrimitiveValue::String(s)) => s
                        .trim()
                        .parse::<i64>()
                        .map(|i| value(PrimitiveValue::Integer(i)))
                        .unwrap_or_default(),
                    _ => Vec::new(),
                })
            }
            _ => self.string_function(name, input, args, focus),
        }
    }

    fn string_function(
        &self,
        name: &str,
        input: &[Item],
        args: &[Expression],
        focus: &[Item],
    ) -> EvalResult<Vec<Item>> {
        let expected = match name {
            "length" | "upper" | "lower" => 0..=0,
            "startsWith" | "endsWith" | "matches" => 1..=1,
            "substring" => 1..=2,
            _ => return Err(TransformError::expression(format!("unknown function {name}()"))),
        };
        if !expected.contains(&args.len()) {
            return Err(TransformError::expression(format!(
                "{name}() takes {:?} arguments, found {}",
                expected,
                args.len()
            )));
        }
        let Some(text) = self.string_arg(input)? else {
            return Ok(Vec::new());
        };
        let mut params = Vec::with_capacity(args.len());
        for arg in args {
            params.push(self.evaluate(arg, focus)?);
        }
        let result = match name {
            "length" => PrimitiveValue::Integer(text.chars().count() as i64),
            "upper" => PrimitiveValue::String(text.to_uppercase()),
            "lower" => PrimitiveValue::String(text.to_lowercase()),
            "startsWith" | "endsWith" | "matches" => {
                let Some(arg) = self.string_arg(&params[0])? else {
                    return Ok(Vec::new());
                };
                PrimitiveValue::Boolean(match name {
                    "startsWith" => text.starts_with(&arg),
                    "endsWith" => text.ends_with(&arg),
                    _ => Regex::new(&arg)
                        .map_err(|e| TransformError::expression(format!("invalid regex: {e}")))?
                        .is_match(&text),
                })
            }
            _ => {
                let start = self.singleton(&params[0])?.and_then(|v| v.as_integer());
                let length = match params.get(1) {
                    Some(p) => self.singleton(p)?.and_then(|v| v.as_integer()),
                    None => None,
                };
                let count = text.chars().count() as i64;
                match start {
                    Some(start) if (0..count).contains(&start) => {
                        let take = length.map_or(usize::MAX, |l| l.max(0) as usize);
                        PrimitiveValue::String(text.chars().skip(start as usize).take(take).collect())
                    }
                    _ => return Ok(Vec::new()),
                }
            }
        };
        Ok(value(result))
    }

    /// Items of `input` for which `criteria` holds, each evaluated as `$this`
    fn filter(&self, input: &[Item], criteria: &Expression) -> EvalResult<Vec<Item>> {
        let mut out = Vec::new();
        for item in input {
            if self.is_true(criteria, std::slice::from_ref(item))? {
                out.push(item.clone());
            }
        }
        Ok(out)
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        focus: &[Item],
    ) -> EvalResult<Vec<Item>> {
        let lhs = self.evaluate(left, focus)?;
        let rhs = self.evaluate(right, focus)?;
        if op.is_logical() {
            let (a, b) = (self.truth(&lhs)?, self.truth(&rhs)?);
            let result = match op {
                BinaryOp::And => match (a, b) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
                BinaryOp::Or => match (a, b) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
                BinaryOp::Xor => a.zip(b).map(|(a, b)| a != b),
                _ => match (a, b) {
                    (Some(false), _) | (_, Some(true)) => Some(true),
                    (Some(true), b) => b,
                    (None, _) => None,
                },
            };
            return Ok(result.map(boolean).unwrap_or_default());
        }
        match op {
            BinaryOp::Equal | BinaryOp::NotEqual => {
                if lhs.is_empty() || rhs.is_empty() {
                    return Ok(Vec::new());
                }
                let equal = lhs.len() == rhs.len()
                    && lhs.iter().zip(&rhs).all(|(a, b)| a.equals(b, self.tree));
                Ok(boolean(equal == (op == BinaryOp::Equal)))
            }
            BinaryOp::Equivalent => {
                let equivalent = lhs.len() == rhs.len()
                    && lhs.iter().zip(&rhs).all(|(a, b)| self.equivalent(a, b));
                Ok(boolean(equivalent))
            }
            BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
                let (Some(a), Some(b)) = (self.singleton(&lhs)?, self.singleton(&rhs)?) else {
                    return Ok(Vec::new());
                };
                let ordering = a.compare(&b).ok_or_else(|| {
                    TransformError::expression(format!(
                        "cannot compare {} with {}",
                        a.type_name(),
                        b.type_name()
                    ))
                })?;
                Ok(boolean(match op {
                    BinaryOp::Less => ordering == Ordering::Less,
                    BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                    BinaryOp::Greater => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::Union => {
                let mut out: Vec<Item> = Vec::with_capacity(lhs.len() + rhs.len());
                for item in lhs.into_iter().chain(rhs) {
                    if !out.iter().any(|seen| seen.equals(&item, self.tree)) {
                        out.push(item);
                    }
                }
                Ok(out)
            }
            BinaryOp::In | BinaryOp::Contains => {
                let (needle, haystack) = if op == BinaryOp::In { (lhs, rhs) } else { (rhs, lhs) };
                match needle.as_slice() {
                    [] => Ok(Vec::new()),
                    [item] => Ok(boolean(haystack.iter().any(|h| h.equals(item, self.tree)))),
                    _ => Err(TransformError::expression(format!(
                        "'{}' needs a single item",
                        op.symbol()
                    ))),
                }
            }
            BinaryOp::Concatenate => {
                let a = self.string_arg(&lhs)?.unwrap_or_default();
                let b = self.string_arg(&rhs)?.unwrap_or_default();
                Ok(value(PrimitiveValue::String(a + &b)))
            }
            _ => {
                let (Some(a), Some(b)) = (self.singleton(&lhs)?, self.singleton(&rhs)?) else {
                    return Ok(Vec::new());
                };
                Ok(arithmetic(op, &a, &b)?.map(value).unwrap_or_default())
            }
        }
    }

    fn equivalent(&self, a: &Item, b: &Item) -> bool {
        match (a.primitive_value(&*self.tree), b.primitive_value(&*self.tree)) {
            (Some(PrimitiveValue::String(x)), Some(PrimitiveValue::String(y))) => {
                x.trim().to_lowercase() == y.trim().to_lowercase()
            }
            _ => a.equals(b, self.tree),
        }
    }
}

fn value(value: PrimitiveValue) -> Vec<Item> {
    vec![Item::primitive(value)]
}

fn boolean(b: bool) -> Vec<Item> {
    value(PrimitiveValue::Boolean(b))
}

/// Numeric operators; `None` when the result is empty (division by zero)
fn arithmetic(op: BinaryOp, a: &PrimitiveValue, b: &PrimitiveValue) -> EvalResult<Option<PrimitiveValue>> {
    let overflow = || TransformError::expression(format!("arithmetic overflow in '{}'", op.symbol()));
    if let (BinaryOp::Add, PrimitiveValue::String(x), PrimitiveValue::String(y)) = (op, a, b) {
        return Ok(Some(PrimitiveValue::String(format!("{x}{y}"))));
    }
    if let (PrimitiveValue::Integer(x), PrimitiveValue::Integer(y)) = (a, b) {
        let (x, y) = (*x, *y);
        let result = match op {
            BinaryOp::Add => Some(x.checked_add(y)),
            BinaryOp::Subtract => Some(x.checked_sub(y)),
            BinaryOp::Multiply => Some(x.checked_mul(y)),
            BinaryOp::Div | BinaryOp::Mod if y == 0 => return Ok(None),
            BinaryOp::Div => Some(x.checked_div(y)),
            BinaryOp::Mod => Some(x.checked_rem(y)),
            // `/` always yields a decimal
            _ => None,
        };
        if let Some(result) = result {
            return result.map(|i| Some(PrimitiveValue::Integer(i))).ok_or_else(overflow);
        }
    }
    let (Some(x), Some(y)) = (a.as_decimal(), b.as_decimal()) else {
        return Err(TransformError::expression(format!(
            "'{}' is not defined for {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        )));
    };
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Subtract => x.checked_sub(y),
        BinaryOp::Multiply => x.checked_mul(y),
        BinaryOp::Divide | BinaryOp::Div | BinaryOp::Mod if y.is_zero() => return Ok(None),
        BinaryOp::Divide => x.checked_div(y),
        BinaryOp::Div => {
            return x
                .checked_div(y)
                .map(|q| q.trunc())
                .and_then(|q| i64::try_from(q).ok())
                .map(|q| Some(PrimitiveValue::Integer(q)))
                .ok_or_else(overflow);
        }
        BinaryOp::Mod => x.checked_rem(y),
        _ => return Err(TransformError::expression(format!("'{}' is not arithmetic", op.symbol()))),
    };
    result
        .map(|d: Decimal| Some(PrimitiveValue::Decimal(d.normalize())))
        .ok_or_else(overflow)
}
