//! Runs the lexer, parser, emitter and evaluator over one source at a time.

use crate::{
    compiler::{EmitError, Emitter, Program},
    lexer::{self, LexError, Token},
    parser::{self, Module, ParseError},
    runtime::Evaluator,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("there is no parsed module to emit")]
    NoModule,
    #[error("expected at most one value to be left over, found {}", values.len())]
    ResidualStack { values: Vec<i64> },
}

/// Holds the output of every pipeline stage for the most recent source.
///
/// Each stage replaces what that stage produced before, and [`Session::compile`]
/// starts from a clean slate, so nothing from one compilation is visible in the
/// next.
#[derive(Debug, Default)]
pub struct Session {
    tokens: Vec<Token>,
    module: Option<Module>,
    emitter: Emitter,
    evaluator: Evaluator,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
        self.module = None;
        self.emitter.reset();
        self.evaluator.reset();
    }

    pub fn lex(&mut self, source: &str) -> Result<&[Token], LexError> {
        self.tokens = lexer::scan(source)?;
        Ok(&self.tokens)
    }

    /// Parse the tokens from the last [`Session::lex`].
    pub fn parse(&mut self) -> Result<&Module, ParseError> {
        self.module = None;
        let module = parser::parse(&self.tokens)?;
        Ok(self.module.insert(module))
    }

    /// Emit the module from the last [`Session::parse`] into a fresh program.
    pub fn emit(&mut self) -> Result<&Program, CompileError> {
        self.emitter.reset();
        let module = self.module.as_ref().ok_or(CompileError::NoModule)?;
        self.emitter.emit(module)?;
        Ok(self.emitter.program())
    }

    /// Run the last emitted program on a fresh evaluator, returning the final stack.
    pub fn evaluate(&mut self) -> &[i64] {
        self.evaluator.reset();
        self.evaluator.run(self.emitter.program());
        self.evaluator.stack()
    }

    /// Run every stage over `source`.
    ///
    /// Returns the single value left on the stack, or `None` if the program left
    /// nothing behind.
    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn compile(&mut self, source: &str) -> Result<Option<i64>, CompileError> {
        self.reset();
        self.lex(source)?;
        self.parse()?;
        self.emit()?;
        match *self.evaluate() {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            ref values => Err(CompileError::ResidualStack {
                values: values.to_vec(),
            }),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    pub fn program(&self) -> &Program {
        self.emitter.program()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    use super::{CompileError, Session};
    use crate::{
        lexer::{LexError, SourceLocation},
        parser::{BinOpKind, Expr, ExprKind, Module, ParseErrorKind, Stmt},
    };

    #[test]
    fn scenarios() {
        let mut session = Session::new();
        check!(session.compile("(add 2 (sub 4 2));") == Ok(Some(4)));
        check!(session.compile("def x 2;") == Ok(None));
        check!(session.compile("def x 2; (add x 5);") == Ok(Some(7)));

        let_assert!(Err(CompileError::Parse(err)) = session.compile("(add 2 3"));
        check!(err.kind == ParseErrorKind::NoRPar);
        check!(err.location == SourceLocation::new(0, 7));

        let_assert!(Err(CompileError::Parse(err)) = session.compile(")"));
        check!(err.kind == ParseErrorKind::NoLPar);
        check!(err.location == SourceLocation::new(0, 0));

        check!(
            session.compile("#")
                == Err(CompileError::Lex(LexError::UnrecognizedCharacter {
                    location: SourceLocation::new(0, 0),
                    character: '#',
                }))
        );
    }

    #[test]
    fn stages_keep_their_output() {
        let mut session = Session::new();
        check!(session.compile("def x 2;") == Ok(None));
        check!(session.tokens().len() == 4);
        check!(
            session.module()
                == Some(&Module::new([Stmt::new(Expr::assign("x", Expr::int(2)))]))
        );
        let slot = session.program().symbols().slot("x").unwrap();
        check!(session.evaluator().variable(slot) == Some(2));
        check!(session.evaluator().stack().is_empty());
    }

    #[test]
    fn stage_by_stage() {
        let mut session = Session::new();
        check!(session.emit().err() == Some(CompileError::NoModule));

        let_assert!(Ok(tokens) = session.lex("(sub 10 3);"));
        check!(tokens.len() == 6);
        let_assert!(Ok(_) = session.parse());
        let_assert!(Ok(program) = session.emit());
        check!(program.code().len() == 5);
        check!(session.evaluate() == [7]);
        // running again starts over instead of stacking up results
        check!(session.evaluate() == [7]);
    }

    #[test]
    fn nothing_leaks_between_compilations() {
        let mut session = Session::new();
        check!(session.compile("def y 5; y;") == Ok(Some(5)));
        check!(matches!(session.compile("y;"), Err(CompileError::Emit(_))));

        session.reset();
        check!(session.tokens().is_empty());
        check!(session.module().is_none());
        check!(session.program().code().is_empty());
        check!(session.program().symbols().is_empty());
        check!(session.evaluator().stack().is_empty());

        // a failed parse does not leave the previous module behind
        check!(session.compile("1;") == Ok(Some(1)));
        check!(session.compile("(add 1").is_err());
        check!(session.module().is_none());
    }

    #[test]
    fn empty_input() {
        let mut session = Session::new();
        check!(session.compile("") == Ok(None));
        check!(session.module().is_some_and(Module::is_empty));
        check!(session.compile("  \n\t ") == Ok(None));
    }

    #[test]
    fn several_residual_values() {
        let mut session = Session::new();
        check!(
            session.compile("1; (add 1 1); 3;")
                == Err(CompileError::ResidualStack {
                    values: vec![1, 2, 3]
                })
        );
    }

    #[test]
    fn slots_start_at_zero() {
        let mut session = Session::new();
        check!(session.compile("def x x; x;") == Ok(Some(0)));
        check!(session.compile("def x (add x 4); x;") == Ok(Some(4)));
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let levels = 100_000;
        let source = format!("{}1{};", "(add 1 ".repeat(levels), ")".repeat(levels));
        let mut session = Session::new();
        let_assert!(Err(CompileError::Parse(err)) = session.compile(&source));
        check!(err.kind == ParseErrorKind::TooDeep);
        check!(session.module().is_none());
    }

    #[test]
    fn compiling_is_deterministic() {
        let source = "def a 3; def b (sub a 10); (add b (add a a));";
        let mut first = Session::new();
        let mut second = Session::new();
        check!(first.compile(source) == Ok(Some(-1)));
        check!(second.compile(source) == first.compile(source));
        check!(first.program().code() == second.program().code());
    }

    fn arithmetic(u: &mut arbitrary::Unstructured, depth: u32) -> arbitrary::Result<Expr> {
        if depth == 0 || u.ratio(1u8, 3u8)? {
            return Ok(Expr::int(u.int_in_range(0..=i32::MAX)?));
        }
        Ok(Expr::binop(
            u.arbitrary()?,
            arithmetic(u, depth - 1)?,
            arithmetic(u, depth - 1)?,
        ))
    }

    fn value_of(expr: &Expr) -> i64 {
        match &expr.kind {
            ExprKind::Int(value) => i64::from(*value),
            ExprKind::BinOp { op, lhs, rhs } => op.apply(value_of(lhs), value_of(rhs)),
            _ => unreachable!("only arithmetic is generated"),
        }
    }

    #[test]
    fn arithmetic_matches_direct_evaluation() {
        arbtest(|u| {
            let expr = arithmetic(u, 6)?;
            let expected = value_of(&expr);
            let source = Module::new([Stmt::new(expr)]).to_string();

            let mut session = Session::new();
            check!(session.compile(&source) == Ok(Some(expected)));
            Ok(())
        });
    }

    #[test]
    fn variables_match_direct_evaluation() {
        arbtest(|u| {
            let lhs = arithmetic(u, 3)?;
            let rhs = arithmetic(u, 3)?;
            let op: BinOpKind = u.arbitrary()?;
            let expected = op.apply(value_of(&lhs), value_of(&rhs));
            let module = Module::new([
                Stmt::new(Expr::assign("a", lhs)),
                Stmt::new(Expr::assign("b", rhs)),
                Stmt::new(Expr::binop(op, Expr::id("a"), Expr::id("b"))),
            ]);

            let mut session = Session::new();
            check!(session.compile(&module.to_string()) == Ok(Some(expected)));
            Ok(())
        });
    }
}
