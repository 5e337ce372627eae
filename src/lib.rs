pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod session;

pub use compiler::{emit, EmitError, Emitter, Program};
pub use lexer::{scan, LexError, SourceLocation, Token, TokenKind};
pub use parser::{parse, ParseError, ParseErrorKind};
pub use runtime::{Evaluator, Value};
pub use session::{CompileError, Session};
