//! The flat bytecode the emitter produces and the evaluator runs.
//!
//! A program is a sequence of cells. Each cell is either an instruction or a raw
//! 64-bit value, and which one a cell is follows from its position: an instruction
//! is followed by as many raw cells as [`Opcode::operands`] says.
//!
//! `(add 2 (sub 4 2));` compiles to
//!
//! ```text
//! == CODE ==
//! 0000 PUSH 2
//! 0002 PUSH 4
//! 0004 PUSH 2
//! 0006 SUB
//! 0007 ADD
//! ```
use core::fmt;

use crate::{compiler::symbols::SymbolTable, runtime::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push the following raw value onto the evaluation stack
    Push,
    /// Pop two values, push their sum
    Add,
    /// Pop two values, push `lhs - rhs`
    Sub,
    /// Reserved, never emitted
    Call,
    /// Pop a value, then a slot id, and write the value into the slot
    Store,
    /// Push the value held by the slot named by the following raw value
    Load,
}

impl Opcode {
    /// How many raw cells follow this instruction
    pub fn operands(self) -> usize {
        match self {
            Self::Push | Self::Load => 1,
            Self::Add | Self::Sub | Self::Call | Self::Store => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "PUSH",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Call => "CALL",
            Self::Store => "STORE",
            Self::Load => "LOAD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteCode {
    Instr(Opcode),
    Value(i64),
}

/// One decoded instruction together with its operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Push(i64),
    Load(i64),
    Add,
    Sub,
    Store,
    Call,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push(value) => write!(f, "{} {value}", Opcode::Push),
            Self::Load(slot) => write!(f, "{} {slot}", Opcode::Load),
            Self::Add => write!(f, "{}", Opcode::Add),
            Self::Sub => write!(f, "{}", Opcode::Sub),
            Self::Store => write!(f, "{}", Opcode::Store),
            Self::Call => write!(f, "{}", Opcode::Call),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no instruction at {pc}, past the end of the code")]
    OutOfBounds { pc: usize },
    #[error("expected an instruction at {pc}, found raw value {value}")]
    NotAnInstruction { pc: usize, value: i64 },
    #[error("`{opcode}` at {pc} is missing its operand")]
    MissingOperand { pc: usize, opcode: Opcode },
    #[error("`{opcode}` at {pc} takes a raw value, found `{found}`")]
    OperandIsInstruction {
        pc: usize,
        opcode: Opcode,
        found: Opcode,
    },
}

/// Decode the instruction starting at `pc`, returning it with the number of cells it
/// spans.
pub fn decode(code: &[ByteCode], pc: usize) -> Result<(Instruction, usize), DecodeError> {
    let opcode = match code.get(pc) {
        Some(ByteCode::Instr(opcode)) => *opcode,
        Some(ByteCode::Value(value)) => {
            return Err(DecodeError::NotAnInstruction { pc, value: *value })
        }
        None => return Err(DecodeError::OutOfBounds { pc }),
    };

    let operand = || match code.get(pc + 1) {
        Some(ByteCode::Value(value)) => Ok(*value),
        Some(ByteCode::Instr(found)) => Err(DecodeError::OperandIsInstruction {
            pc,
            opcode,
            found: *found,
        }),
        None => Err(DecodeError::MissingOperand { pc, opcode }),
    };

    let instruction = match opcode {
        Opcode::Push => Instruction::Push(operand()?),
        Opcode::Load => Instruction::Load(operand()?),
        Opcode::Add => Instruction::Add,
        Opcode::Sub => Instruction::Sub,
        Opcode::Store => Instruction::Store,
        Opcode::Call => Instruction::Call,
    };
    Ok((instruction, 1 + opcode.operands()))
}

/// Walks a cell sequence instruction by instruction, yielding each with its offset.
/// Stops after the first malformed position.
pub struct Instructions<'c> {
    code: &'c [ByteCode],
    pc: usize,
    failed: bool,
}

impl<'c> Instructions<'c> {
    pub fn new(code: &'c [ByteCode]) -> Self {
        Self {
            code,
            pc: 0,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pc >= self.code.len() {
            return None;
        }
        match decode(self.code, self.pc) {
            Ok((instruction, width)) => {
                let pc = self.pc;
                self.pc += width;
                Some(Ok((pc, instruction)))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Everything emitted for one module: the code and the two tables it refers to
#[derive(Debug, Default)]
pub struct Program {
    pub(crate) code: Vec<ByteCode>,
    pub(crate) constants: Vec<Value>,
    pub(crate) symbols: SymbolTable,
}

impl Program {
    pub fn code(&self) -> &[ByteCode] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.code)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== CONSTANTS ==")?;
        for (idx, constant) in self.constants.iter().enumerate() {
            writeln!(f, "{idx}: {constant}")?;
        }
        writeln!(f, "== SYMBOLS ==")?;
        for (slot, name) in self.symbols.iter() {
            writeln!(f, "{slot}: {name}")?;
        }
        writeln!(f, "== CODE ==")?;
        for instruction in self.instructions() {
            match instruction {
                Ok((pc, instruction)) => writeln!(f, "{pc:04} {instruction}")?,
                Err(err) => writeln!(f, "<{err}>")?,
            }
        }
        Ok(())
    }
}
