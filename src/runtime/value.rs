use core::fmt;

use crate::parser::BinOpKind;

/// An entry in a program's constant pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Str(Box<str>),
    Func(BinOpKind),
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Box::from(value))
    }
}

impl From<BinOpKind> for Value {
    fn from(value: BinOpKind) -> Self {
        Self::Func(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Func(op) => write!(f, "#<builtin {op}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::Value;
    use crate::parser::BinOpKind;

    #[test]
    fn display() {
        check!(Value::from(-4).to_string() == "-4");
        check!(Value::from("a b").to_string() == "\"a b\"");
        check!(Value::from(BinOpKind::Sub).to_string() == "#<builtin sub>");
    }
}
