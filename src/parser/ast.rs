//! The tree the parser produces.
//!
//! Nodes own their children outright, so dropping a [`Module`] frees the whole tree.
//! Equality is structural and ignores source locations, which lets parsed trees be
//! compared against trees built by hand with the constructors below.
use core::fmt;

use arbitrary::Arbitrary;

use crate::lexer::SourceLocation;

/// Operators that are recognized by name and compiled to their own instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum BinOpKind {
    Add,
    Sub,
}

impl BinOpKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
        }
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Add => lhs.wrapping_add(rhs),
            Self::Sub => lhs.wrapping_sub(rhs),
        }
    }
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Root of a parsed source: its statements, in order
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub location: SourceLocation,
    pub stmts: Vec<Stmt>,
}

impl Module {
    pub fn new(stmts: impl IntoIterator<Item = Stmt>) -> Self {
        Self {
            location: SourceLocation::INVALID,
            stmts: stmts.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.stmts == other.stmts
    }
}

/// A `;`-terminated expression
#[derive(Debug, Clone)]
pub struct Stmt {
    pub location: SourceLocation,
    pub expr: Expr,
}

impl Stmt {
    pub fn new(expr: Expr) -> Self {
        Self {
            location: SourceLocation::INVALID,
            expr,
        }
    }
}

impl PartialEq for Stmt {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub location: SourceLocation,
    pub name: Box<str>,
}

impl Ident {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            location: SourceLocation::INVALID,
            name: Box::from(name.as_ref()),
        }
    }

    /// The operator this identifier names, if it is a builtin
    pub fn builtin(&self) -> Option<BinOpKind> {
        BinOpKind::from_name(&self.name)
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i32),
    Str(Box<str>),
    Id(Ident),
    /// `def dst src`
    Assign { dst: Ident, src: Box<Expr> },
    BinOp {
        op: BinOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn at(location: SourceLocation, kind: ExprKind) -> Self {
        Self { location, kind }
    }

    fn unlocated(kind: ExprKind) -> Self {
        Self::at(SourceLocation::INVALID, kind)
    }

    pub fn int(value: i32) -> Self {
        Self::unlocated(ExprKind::Int(value))
    }

    pub fn str(value: impl AsRef<str>) -> Self {
        Self::unlocated(ExprKind::Str(Box::from(value.as_ref())))
    }

    pub fn id(name: impl AsRef<str>) -> Self {
        Self::unlocated(ExprKind::Id(Ident::new(name)))
    }

    pub fn assign(dst: impl AsRef<str>, src: Expr) -> Self {
        Self::unlocated(ExprKind::Assign {
            dst: Ident::new(dst),
            src: Box::new(src),
        })
    }

    pub fn binop(op: BinOpKind, lhs: Expr, rhs: Expr) -> Self {
        Self::unlocated(ExprKind::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn call(callee: Expr, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::unlocated(ExprKind::Call {
            callee: Box::new(callee),
            args: args.into_iter().collect(),
        })
    }
}

// Display renders nodes back into source that parses to an equal tree.

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.stmts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.expr)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(value) => write!(f, "{value}"),
            // strings have no escapes
            ExprKind::Str(value) => write!(f, "\"{value}\""),
            ExprKind::Id(ident) => write!(f, "{ident}"),
            ExprKind::Assign { dst, src } => write!(f, "def {dst} {src}"),
            ExprKind::BinOp { op, lhs, rhs } => write!(f, "({op} {lhs} {rhs})"),
            ExprKind::Call { callee, args } => {
                write!(f, "({callee}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{BinOpKind, Expr, Module, Stmt};
    use crate::lexer::SourceLocation;

    #[test]
    fn equality_is_deep_and_ignores_locations() {
        let lhs = Expr::binop(BinOpKind::Add, Expr::int(2), Expr::id("x"));
        let mut rhs = lhs.clone();
        rhs.location = SourceLocation::new(1, 1);
        check!(lhs == rhs);

        let different = Expr::binop(BinOpKind::Sub, Expr::int(2), Expr::id("x"));
        check!(lhs != different);
        let different = Expr::binop(BinOpKind::Add, Expr::int(2), Expr::id("y"));
        check!(lhs != different);
        check!(Expr::int(2) != Expr::str("2"));
        check!(Expr::call(Expr::id("f"), []) != Expr::call(Expr::id("f"), [Expr::int(1)]));
    }

    #[test]
    fn display_renders_source() {
        let module = Module::new([
            Stmt::new(Expr::assign("x", Expr::str("hi there"))),
            Stmt::new(Expr::binop(
                BinOpKind::Sub,
                Expr::id("x"),
                Expr::call(Expr::id("f"), [Expr::int(1), Expr::int(2)]),
            )),
            Stmt::new(Expr::call(Expr::id("g"), [])),
        ]);
        check!(module.to_string() == "def x \"hi there\";\n(sub x (f 1 2));\n(g);");
    }

    #[test]
    fn builtins_by_name() {
        check!(BinOpKind::from_name("add") == Some(BinOpKind::Add));
        check!(BinOpKind::from_name("sub") == Some(BinOpKind::Sub));
        check!(BinOpKind::from_name("mul").is_none());
        check!(BinOpKind::Sub.apply(4, 7) == -3);
        check!(BinOpKind::Add.apply(i64::MAX, 1) == i64::MIN);
    }
}
