// Output first so `tprintln!` is in scope for the runtime
#[macro_use]
pub mod output;

// Assembling
mod lexer;
mod parser;
pub use parser::{Layout, SymbolPass};
mod encoder;
pub use encoder::{assemble, Encoder, Program};
mod space;
pub use space::{AddressSpace, MEMORY_CELLS};
mod symbol;
pub use symbol::{Instr, Mnemonic, Mode, Span, SrcOffset, SymbolTables};

// Running
pub mod binary;
mod runtime;
pub use runtime::{Exit, Vm};

mod error;
pub use error::{AsmError, LoadError, RunError};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
