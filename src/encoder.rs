use crate::{
    error::AsmError,
    lexer::{cursor::Cursor, parse_literal, Stmt},
    parser::{Layout, SymbolPass},
    space::AddressSpace,
    symbol::{Mode, SymbolTables},
};

/// A fully assembled program, ready to be written out or run.
#[derive(Clone, Debug)]
pub struct Program {
    pub symbols: SymbolTables,
    pub space: AddressSpace,
}

/// Run both assembler passes over `src`.
pub fn assemble(src: &str) -> Result<Program, AsmError> {
    let Layout { symbols, space } = SymbolPass::new(src).run()?;
    let space = Encoder::new(src, &symbols).encode(space)?;
    Ok(Program { symbols, space })
}

/// Second assembler pass. Resolves operands and writes one word per instruction.
pub struct Encoder<'a> {
    cur: Cursor<'a>,
    symbols: &'a SymbolTables,
}

impl<'a> Encoder<'a> {
    pub fn new(src: &'a str, symbols: &'a SymbolTables) -> Self {
        Encoder {
            cur: Cursor::new(src),
            symbols,
        }
    }

    /// Encode every instruction into `space`, whose data cells were laid out by the first pass.
    pub fn encode(mut self, mut space: AddressSpace) -> Result<AddressSpace, AsmError> {
        let mut pc: u8 = 0;
        while let Some(stmt) = self.cur.next_stmt()? {
            match stmt {
                // Already known from the first pass
                Stmt::Label { .. } => continue,
                Stmt::DataBlock => self.cur.skip_data_block(),
                Stmt::Instr { mnemonic, span } => {
                    let operand = match mnemonic.mode() {
                        Mode::None => 0,
                        Mode::Immediate => {
                            let (lit, lit_span) = self
                                .cur
                                .operand()
                                .ok_or(AsmError::MissingOperand { mnemonic, span })?;
                            parse_literal(lit, lit_span, 0, u8::MAX as i32)? as u8
                        }
                        Mode::Memory => {
                            let (name, name_span) = self
                                .cur
                                .operand()
                                .ok_or(AsmError::MissingOperand { mnemonic, span })?;
                            self.symbols.resolve(name, name_span)?
                        }
                    };
                    self.cur.end_of_line()?;

                    space.set_code(pc, mnemonic.encode(operand));
                    pc = pc.wrapping_add(1);
                }
            }
        }
        Ok(space)
    }
}
