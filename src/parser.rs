use crate::{
    error::AsmError,
    lexer::{cursor::Cursor, parse_literal, Stmt},
    space::AddressSpace,
    symbol::SymbolTables,
};

/// Data literals may be written signed or unsigned, and are stored as 16-bit words.
const DATA_MIN: i32 = i16::MIN as i32;
const DATA_MAX: i32 = u16::MAX as i32;

/// Result of the first pass: every symbol is known and data cells are already filled in.
#[derive(Clone, Debug)]
pub struct Layout {
    pub symbols: SymbolTables,
    pub space: AddressSpace,
}

/// First assembler pass. Finds label addresses and lays out data blocks without encoding any
/// instruction.
pub struct SymbolPass<'a> {
    cur: Cursor<'a>,
    symbols: SymbolTables,
    space: AddressSpace,
}

impl<'a> SymbolPass<'a> {
    pub fn new(src: &'a str) -> Self {
        SymbolPass {
            cur: Cursor::new(src),
            symbols: SymbolTables::new(),
            space: AddressSpace::new(),
        }
    }

    pub fn run(mut self) -> Result<Layout, AsmError> {
        // Labels take the address of the next instruction
        let mut pc: u8 = 0;
        while let Some(stmt) = self.cur.next_stmt()? {
            match stmt {
                Stmt::Label { name, span } => self.symbols.insert_label(name, pc, span)?,
                Stmt::Instr { span, .. } => {
                    // Operands are resolved in the second pass
                    self.cur.skip_line();
                    pc = self.space.reserve_code(span)?.wrapping_add(1);
                }
                Stmt::DataBlock => self.data_block()?,
            }
        }
        Ok(Layout {
            symbols: self.symbols,
            space: self.space,
        })
    }

    /// Parse `{ name = value ... }` following the `BEGINDATA` keyword.
    fn data_block(&mut self) -> Result<(), AsmError> {
        self.cur.expect('{')?;
        while !matches!(self.cur.peek_blank(), Some('}') | None) {
            let (name, name_span) = self.cur.data_ident();
            if name.is_empty() {
                // Either another entry or the closing brace was due here
                return Err(AsmError::ExpectedChar {
                    expected: '}',
                    found: self.cur.first(),
                    span: name_span,
                });
            }
            self.cur.expect('=')?;
            let (lit, lit_span) = self.cur.data_literal();
            let val = parse_literal(lit, lit_span, DATA_MIN, DATA_MAX)?;

            let addr = self.space.push_data(name, val as u16, name_span)?;
            self.symbols.insert_data(name, addr, name_span)?;
        }
        self.cur.expect('}')
    }
}
