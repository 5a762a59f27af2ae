use std::{fmt, ops::Range, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

use crate::error::AsmError;

// Symbol table of symbol -> memory address, kept in definition order
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SrcOffset(pub usize);

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn dummy() -> Self {
        Span {
            offs: SrcOffset(0),
            len: 0,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.offs.0..self.offs.0 + self.len
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn offs(&self) -> usize {
        self.offs.0
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

/// How an instruction takes its operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// No operand, encoded as zero.
    None,
    /// Literal value used as-is.
    Immediate,
    /// Label or data identifier resolved to an address.
    Memory,
}

/// The fixed instruction set. Discriminants are the opcode bytes; `0x00` is reserved for empty
/// cells.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum Mnemonic {
    Addi = 0x01,
    Add = 0x02,
    Subi = 0x03,
    Sub = 0x04,
    Clac = 0x05,
    Bnz = 0x06,
    Bz = 0x07,
    Ucb = 0x08,
    Str = 0x09,
}

impl Mnemonic {
    pub const ALL: [Mnemonic; 9] = [
        Mnemonic::Addi,
        Mnemonic::Add,
        Mnemonic::Subi,
        Mnemonic::Sub,
        Mnemonic::Clac,
        Mnemonic::Bnz,
        Mnemonic::Bz,
        Mnemonic::Ucb,
        Mnemonic::Str,
    ];

    pub fn mode(self) -> Mode {
        match self {
            Mnemonic::Addi | Mnemonic::Subi => Mode::Immediate,
            Mnemonic::Clac => Mode::None,
            Mnemonic::Add
            | Mnemonic::Sub
            | Mnemonic::Bnz
            | Mnemonic::Bz
            | Mnemonic::Ucb
            | Mnemonic::Str => Mode::Memory,
        }
    }

    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<Mnemonic> {
        Self::ALL.get(opcode.checked_sub(1)? as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Addi => "ADDI",
            Mnemonic::Add => "ADD",
            Mnemonic::Subi => "SUBI",
            Mnemonic::Sub => "SUB",
            Mnemonic::Clac => "CLAC",
            Mnemonic::Bnz => "BNZ",
            Mnemonic::Bz => "BZ",
            Mnemonic::Ucb => "UCB",
            Mnemonic::Str => "STR",
        }
    }

    /// Opcode in the high byte, operand in the low byte.
    pub fn encode(self, operand: u8) -> u16 {
        u16::from_be_bytes([self.opcode(), operand])
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.name() == s).ok_or(())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded memory cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instr {
    pub mnemonic: Mnemonic,
    pub operand: u8,
}

impl Instr {
    /// `None` for empty cells and unknown opcodes.
    pub fn decode(word: u16) -> Option<Instr> {
        let [opcode, operand] = word.to_be_bytes();
        Mnemonic::from_opcode(opcode).map(|mnemonic| Instr { mnemonic, operand })
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic.mode() {
            Mode::None => write!(f, "{}", self.mnemonic),
            Mode::Immediate => write!(f, "{} {}", self.mnemonic, self.operand),
            Mode::Memory => write!(f, "{} 0x{:02X}", self.mnemonic, self.operand),
        }
    }
}

/// Label and data symbol tables. A name may live in at most one of them.
#[derive(Clone, Default, Debug)]
pub struct SymbolTables {
    labels: FxMap<String, u8>,
    data: FxMap<String, u8>,
}

impl SymbolTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_label(&mut self, name: &str, addr: u8, span: Span) -> Result<(), AsmError> {
        if self.data.contains_key(name) {
            return Err(AsmError::MultipleDefinition {
                name: name.to_string(),
                span,
            });
        }
        if self.labels.contains_key(name) {
            return Err(AsmError::DuplicateSymbol {
                name: name.to_string(),
                span,
            });
        }
        self.labels.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn insert_data(&mut self, name: &str, addr: u8, span: Span) -> Result<(), AsmError> {
        if self.labels.contains_key(name) {
            return Err(AsmError::MultipleDefinition {
                name: name.to_string(),
                span,
            });
        }
        if self.data.contains_key(name) {
            return Err(AsmError::DuplicateSymbol {
                name: name.to_string(),
                span,
            });
        }
        self.data.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn label(&self, name: &str) -> Option<u8> {
        self.labels.get(name).copied()
    }

    pub fn data(&self, name: &str) -> Option<u8> {
        self.data.get(name).copied()
    }

    /// Resolve a memory operand against both tables.
    pub fn resolve(&self, name: &str, span: Span) -> Result<u8, AsmError> {
        match (self.label(name), self.data(name)) {
            (Some(_), Some(_)) => Err(AsmError::MultipleDefinition {
                name: name.to_string(),
                span,
            }),
            (Some(addr), None) | (None, Some(addr)) => Ok(addr),
            (None, None) => Err(AsmError::UnresolvedSymbol {
                name: name.to_string(),
                span,
            }),
        }
    }

    /// Labels in definition order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, u8)> {
        self.labels.iter().map(|(name, addr)| (name.as_str(), *addr))
    }

    /// Data variables in definition order.
    pub fn data_vars(&self) -> impl Iterator<Item = (&str, u8)> {
        self.data.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}
