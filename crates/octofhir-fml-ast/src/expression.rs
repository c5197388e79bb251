//! FHIRPath-subset expression nodes
//!
//! Used by source conditions (`where`, `check`, `log`, `while`), source
//! defaults and the `evaluate` transform. Parentheses are not kept: grouping
//! is implied by the tree shape.

use crate::{BinaryOp, Literal, UnaryOp};
use serde::{Deserialize, Serialize};

/// Expression tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    /// `{}`
    Empty,
    /// Variable or member of `$this`
    Identifier(String),
    /// `%name`
    Constant(String),
    /// `$this`
    This,
    /// `target.name`
    Member {
        target: Box<Expression>,
        name: String,
    },
    /// `name(args)` or `target.name(args)`
    Function {
        target: Option<Box<Expression>>,
        name: String,
        args: Vec<Expression>,
    },
    /// `target[index]`
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(value: Literal) -> Self {
        Self::Literal(value)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn member(target: Expression, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(target),
            name: name.into(),
        }
    }

    pub fn call(target: Option<Expression>, name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Function {
            target: target.map(Box::new),
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Root identifiers the expression reads, in first-use order.
    ///
    /// Identifiers inside function arguments that evaluate against an item
    /// (the `where` criteria) are included too; callers decide whether an
    /// unknown root is a variable error or a member of `$this`.
    pub fn root_identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_roots(&mut out);
        out
    }

    fn collect_roots<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Identifier(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Member { target, .. } => target.collect_roots(out),
            Self::Function { target, args, .. } => {
                if let Some(target) = target {
                    target.collect_roots(out);
                }
                for arg in args {
                    arg.collect_roots(out);
                }
            }
            Self::Index { target, index } => {
                target.collect_roots(out);
                index.collect_roots(out);
            }
            Self::Unary { operand, .. } => operand.collect_roots(out),
            Self::Binary { left, right, .. } => {
                left.collect_roots(out);
                right.collect_roots(out);
            }
            Self::Literal(_) | Self::Empty | Self::Constant(_) | Self::This => {}
        }
    }
}

impl From<Literal> for Expression {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}
