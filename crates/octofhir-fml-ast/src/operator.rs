//! Expression operators with precedence information

use serde::{Deserialize, Serialize};

/// Binary operators of the expression sublanguage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Precedence 1 (lowest), right-associative
    Implies,

    // Precedence 2
    Or,
    Xor,

    // Precedence 3
    And,

    // Precedence 4
    /// Membership test (element in collection)
    In,
    /// Containment test (collection contains element)
    Contains,

    // Precedence 5
    Equal,
    NotEqual,
    /// Equivalence (case and whitespace insensitive for strings)
    Equivalent,

    // Precedence 6
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // Precedence 7
    /// Union of collections
    Union,

    // Precedence 8
    Add,
    Subtract,
    /// String concatenation treating empty as ''
    Concatenate,

    // Precedence 9
    Multiply,
    Divide,
    /// Integer division
    Div,
    Mod,
}

impl BinaryOp {
    /// Precedence level (1-9, higher binds tighter)
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Implies => 1,
            Self::Or | Self::Xor => 2,
            Self::And => 3,
            Self::In | Self::Contains => 4,
            Self::Equal | Self::NotEqual | Self::Equivalent => 5,
            Self::Less | Self::LessOrEqual | Self::Greater | Self::GreaterOrEqual => 6,
            Self::Union => 7,
            Self::Add | Self::Subtract | Self::Concatenate => 8,
            Self::Multiply | Self::Divide | Self::Div | Self::Mod => 9,
        }
    }

    pub const fn is_right_associative(&self) -> bool {
        matches!(self, Self::Implies)
    }

    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Equivalent
                | Self::Less
                | Self::LessOrEqual
                | Self::Greater
                | Self::GreaterOrEqual
        )
    }

    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Implies)
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Implies => "implies",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::And => "and",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Union => "|",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Concatenate => "&",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }

    /// Keyword operators (`and`, `div`, ...) by their spelling
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "implies" => Self::Implies,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "and" => Self::And,
            "in" => Self::In,
            "contains" => Self::Contains,
            "div" => Self::Div,
            "mod" => Self::Mod,
            _ => return None,
        })
    }
}

/// Unary operators (bind tighter than any binary operator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
}

impl UnaryOp {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Negate => "-",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Multiply.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(BinaryOp::Equal.precedence() > BinaryOp::In.precedence());
        assert!(BinaryOp::Implies.is_right_associative());
    }

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(BinaryOp::from_keyword("div"), Some(BinaryOp::Div));
        assert_eq!(BinaryOp::from_keyword("where"), None);
    }
}
