//! Lower a parsed [`Module`] into bytecode for the stack machine in
//! [`crate::runtime`].
//!
//! For example:
//!
//! def x 2;
//! (add x 5);
//!
//! compiles to
//!
//! == CONSTANTS ==
//! == SYMBOLS ==
//! 0: x
//! == CODE ==
//! 0000 PUSH 0
//! 0002 PUSH 2
//! 0004 STORE
//! 0005 LOAD 0
//! 0007 PUSH 5
//! 0009 ADD
//!
//! Every program this emits runs without faulting: names are declared before they
//! are read, builtins are only ever applied to two operands, and calls to anything
//! else are rejected here instead of at runtime.

use crate::{
    lexer::SourceLocation,
    parser::{BinOpKind, Expr, ExprKind, Ident, Module, Stmt},
    runtime::Value,
};

pub use bytecode::{decode, ByteCode, DecodeError, Instruction, Instructions, Opcode, Program};
pub use symbols::{SlotId, SymbolLimit, SymbolTable};

pub mod bytecode;
pub mod symbols;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("variable `{name}` is used before it is defined at {location}")]
    UndefinedVariable {
        location: SourceLocation,
        name: Box<str>,
    },
    #[error("builtin `{op}` cannot be used as a value at {location}")]
    BuiltinAsValue {
        location: SourceLocation,
        op: BinOpKind,
    },
    #[error("cannot redefine builtin `{op}` at {location}")]
    ReservedName {
        location: SourceLocation,
        op: BinOpKind,
    },
    #[error("only `add` and `sub` can be called, at {location}")]
    UnsupportedCallee { location: SourceLocation },
    #[error("builtin `{op}` takes 2 arguments, but {found} were given at {location}")]
    BuiltinArity {
        location: SourceLocation,
        op: BinOpKind,
        found: usize,
    },
    #[error("`def` does not produce a value at {location}")]
    DefineInExpression { location: SourceLocation },
    #[error("{source} at {location}")]
    SymbolLimit {
        location: SourceLocation,
        source: SymbolLimit,
    },
    #[error("constant pool is full at {location}")]
    ConstantLimit { location: SourceLocation },
}

impl EmitError {
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::UndefinedVariable { location, .. }
            | Self::BuiltinAsValue { location, .. }
            | Self::ReservedName { location, .. }
            | Self::UnsupportedCallee { location }
            | Self::BuiltinArity { location, .. }
            | Self::DefineInExpression { location }
            | Self::SymbolLimit { location, .. }
            | Self::ConstantLimit { location } => *location,
        }
    }
}

type EmitResult<T = ()> = Result<T, EmitError>;

/// Accumulates the bytecode for one module. [`Emitter::reset`] discards everything,
/// including slot assignments.
#[derive(Debug, Default)]
pub struct Emitter {
    program: Program,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    pub fn reset(&mut self) {
        self.program = Program::default();
    }

    /// Append the code for every statement of `module`.
    ///
    /// On failure the program holds whatever was emitted before the failing
    /// statement, so callers should reset before reusing the emitter.
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = module.stmts.len()))]
    pub fn emit(&mut self, module: &Module) -> EmitResult {
        for stmt in &module.stmts {
            self.emit_stmt(stmt)?;
        }
        tracing::debug!(
            cells = self.program.code.len(),
            constants = self.program.constants.len(),
            symbols = self.program.symbols.len(),
            "emitted module"
        );
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> EmitResult {
        match &stmt.expr.kind {
            // the only place a `def` may appear
            ExprKind::Assign { dst, src } => self.emit_assign(dst, src),
            _ => self.emit_value(&stmt.expr),
        }
    }

    fn emit_assign(&mut self, dst: &Ident, src: &Expr) -> EmitResult {
        if let Some(op) = dst.builtin() {
            return Err(EmitError::ReservedName {
                location: dst.location,
                op,
            });
        }
        let slot = self
            .program
            .symbols
            .declare(&dst.name)
            .map_err(|source| EmitError::SymbolLimit {
                location: dst.location,
                source,
            })?;

        self.instr(Opcode::Push);
        self.raw(slot.into());
        self.emit_value(src)?;
        self.instr(Opcode::Store);
        Ok(())
    }

    /// Emit code that leaves exactly one value on the stack
    fn emit_value(&mut self, expr: &Expr) -> EmitResult {
        match &expr.kind {
            ExprKind::Int(value) => {
                self.instr(Opcode::Push);
                self.raw(i64::from(*value));
            }
            ExprKind::Str(value) => {
                let index = self.constant(Value::from(&**value), expr.location)?;
                self.instr(Opcode::Push);
                self.raw(index);
            }
            ExprKind::Id(ident) => self.emit_load(ident)?,
            ExprKind::Assign { .. } => {
                return Err(EmitError::DefineInExpression {
                    location: expr.location,
                })
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                self.emit_value(lhs)?;
                self.emit_value(rhs)?;
                self.binop(*op);
            }
            ExprKind::Call { callee, args } => self.emit_call(expr.location, callee, args)?,
        }
        Ok(())
    }

    fn emit_load(&mut self, ident: &Ident) -> EmitResult {
        if let Some(op) = ident.builtin() {
            return Err(EmitError::BuiltinAsValue {
                location: ident.location,
                op,
            });
        }
        let Some(slot) = self.program.symbols.slot(&ident.name) else {
            return Err(EmitError::UndefinedVariable {
                location: ident.location,
                name: ident.name.clone(),
            });
        };
        self.instr(Opcode::Load);
        self.raw(slot.into());
        Ok(())
    }

    fn emit_call(&mut self, location: SourceLocation, callee: &Expr, args: &[Expr]) -> EmitResult {
        let op = match &callee.kind {
            ExprKind::Id(ident) => ident.builtin(),
            _ => None,
        };
        let Some(op) = op else {
            return Err(EmitError::UnsupportedCallee { location });
        };

        let [lhs, rhs] = args else {
            return Err(EmitError::BuiltinArity {
                location,
                op,
                found: args.len(),
            });
        };
        self.emit_value(lhs)?;
        self.emit_value(rhs)?;
        self.binop(op);
        Ok(())
    }

    fn constant(&mut self, value: Value, location: SourceLocation) -> EmitResult<i64> {
        let index = i64::try_from(self.program.constants.len())
            .map_err(|_| EmitError::ConstantLimit { location })?;
        self.program.constants.push(value);
        Ok(index)
    }

    fn binop(&mut self, op: BinOpKind) {
        self.instr(match op {
            BinOpKind::Add => Opcode::Add,
            BinOpKind::Sub => Opcode::Sub,
        });
    }

    fn instr(&mut self, opcode: Opcode) {
        self.program.code.push(ByteCode::Instr(opcode));
    }

    fn raw(&mut self, value: i64) {
        self.program.code.push(ByteCode::Value(value));
    }
}

/// Compile a module with a fresh emitter.
pub fn emit(module: &Module) -> Result<Program, EmitError> {
    let mut emitter = Emitter::new();
    emitter.emit(module)?;
    Ok(emitter.into_program())
}
