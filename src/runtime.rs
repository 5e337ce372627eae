//! A stack machine that executes the bytecode produced by [`crate::compiler`].
//!
//! The machine holds an evaluation stack of `i64`s and one storage cell per declared
//! variable. Strings never reach the stack, only their index in the constant pool.
//! Bytecode that the emitter could not have produced (underflow, unknown slots,
//! `CALL`, malformed cells) is a bug in whoever built it, so the evaluator panics
//! instead of returning an error.

use crate::compiler::{decode, ByteCode, Instruction, Program, SlotId};

pub use value::Value;

pub mod value;

#[derive(Debug, Default)]
pub struct Evaluator {
    stack: Vec<i64>,
    variables: Vec<i64>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the variable slots of `program`. Every slot starts at 0.
    ///
    /// The evaluation stack is left alone.
    pub fn load(&mut self, program: &Program) {
        self.variables = vec![0; program.symbols().len()];
    }

    /// Load `program` and execute all of its code.
    pub fn run(&mut self, program: &Program) {
        self.load(program);
        self.interpret(program.code());
    }

    /// Execute `code` from the first cell to the last.
    #[tracing::instrument(level = "debug", skip_all, fields(cells = code.len()))]
    pub fn interpret(&mut self, code: &[ByteCode]) {
        let mut pc = 0;
        while pc < code.len() {
            let (instruction, width) = match decode(code, pc) {
                Ok(decoded) => decoded,
                Err(err) => panic!("malformed bytecode: {err}"),
            };
            tracing::trace!(pc, %instruction, depth = self.stack.len());

            match instruction {
                Instruction::Push(value) => self.stack.push(value),
                Instruction::Load(slot) => {
                    let value = *self.slot_mut(pc, slot);
                    self.stack.push(value);
                }
                Instruction::Add => {
                    let (lhs, rhs) = self.pop_pair(pc, instruction);
                    self.stack.push(lhs.wrapping_add(rhs));
                }
                Instruction::Sub => {
                    let (lhs, rhs) = self.pop_pair(pc, instruction);
                    self.stack.push(lhs.wrapping_sub(rhs));
                }
                Instruction::Store => {
                    let (slot, value) = self.pop_pair(pc, instruction);
                    *self.slot_mut(pc, slot) = value;
                }
                Instruction::Call => panic!("`CALL` at {pc} is not supported"),
            }
            pc += width;
        }
        tracing::debug!(depth = self.stack.len(), "finished executing");
    }

    /// Pop the top two values, returning them in push order.
    fn pop_pair(&mut self, pc: usize, instruction: Instruction) -> (i64, i64) {
        match (self.stack.pop(), self.stack.pop()) {
            (Some(top), Some(below)) => (below, top),
            _ => panic!("stack underflow executing `{instruction}` at {pc}"),
        }
    }

    fn slot_mut(&mut self, pc: usize, raw: i64) -> &mut i64 {
        match SlotId::from_raw(raw).and_then(|slot| self.variables.get_mut(slot.index())) {
            Some(cell) => cell,
            None => panic!("unknown variable slot {raw} at {pc}"),
        }
    }

    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn variable(&self, slot: SlotId) -> Option<i64> {
        self.variables.get(slot.index()).copied()
    }

    pub fn variables(&self) -> &[i64] {
        &self.variables
    }

    /// Drop the stack and variables.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.variables.clear();
    }
}
