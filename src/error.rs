use std::{error::Error, fmt, io};

use miette::{Diagnostic, LabeledSpan, Severity};

use crate::symbol::{Mnemonic, Span};

/// Error raised while assembling source text. Every variant is fatal for the assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    // Syntax
    ExpectedChar {
        expected: char,
        found: Option<char>,
        span: Span,
    },
    MalformedLabel {
        span: Span,
    },
    UnknownInstr {
        word: String,
        span: Span,
    },
    MissingOperand {
        mnemonic: Mnemonic,
        span: Span,
    },
    TrailingInput {
        span: Span,
    },
    InvalidLiteral {
        text: String,
        min: i32,
        max: i32,
        span: Span,
    },
    DuplicateSymbol {
        name: String,
        span: Span,
    },
    // Resolution
    UnresolvedSymbol {
        name: String,
        span: Span,
    },
    MultipleDefinition {
        name: String,
        span: Span,
    },
    // Capacity
    DataOverflow {
        name: String,
        span: Span,
    },
    ProgramTooLarge {
        span: Span,
    },
}

impl AsmError {
    pub fn span(&self) -> Span {
        match self {
            Self::ExpectedChar { span, .. }
            | Self::MalformedLabel { span }
            | Self::UnknownInstr { span, .. }
            | Self::MissingOperand { span, .. }
            | Self::TrailingInput { span }
            | Self::InvalidLiteral { span, .. }
            | Self::DuplicateSymbol { span, .. }
            | Self::UnresolvedSymbol { span, .. }
            | Self::MultipleDefinition { span, .. }
            | Self::DataOverflow { span, .. }
            | Self::ProgramTooLarge { span } => *span,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::ExpectedChar { .. } => "unexpected character",
            Self::MalformedLabel { .. } => "malformed label",
            Self::UnknownInstr { .. } => "unknown instruction",
            Self::MissingOperand { .. } => "operand missing",
            Self::TrailingInput { .. } => "unexpected token",
            Self::InvalidLiteral { .. } => "incorrect literal",
            Self::DuplicateSymbol { .. } => "duplicate definition",
            Self::UnresolvedSymbol { .. } => "unresolved symbol",
            Self::MultipleDefinition { .. } => "defined as label and data",
            Self::DataOverflow { .. } => "no room left",
            Self::ProgramTooLarge { .. } => "no room left",
        }
    }
}

impl Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedChar {
                expected,
                found: Some(found),
                ..
            } => write!(f, "Expected `{}`, found `{}`", expected, found.escape_default()),
            Self::ExpectedChar {
                expected,
                found: None,
                ..
            } => write!(f, "Expected `{}`, found end of file", expected),
            Self::MalformedLabel { .. } => write!(f, "Label is not terminated with `:`"),
            Self::UnknownInstr { word, .. } => write!(f, "Unknown instruction `{}`", word),
            Self::MissingOperand { mnemonic, .. } => {
                write!(f, "Instruction `{}` is missing its operand", mnemonic)
            }
            Self::TrailingInput { .. } => write!(f, "Unexpected input after instruction"),
            Self::InvalidLiteral { text, .. } => write!(f, "Encountered an invalid literal `{}`", text),
            Self::DuplicateSymbol { name, .. } => write!(f, "Symbol `{}` is defined twice", name),
            Self::UnresolvedSymbol { name, .. } => write!(f, "Unresolved symbol `{}`", name),
            Self::MultipleDefinition { name, .. } => {
                write!(f, "Multiple definition of `{}`", name)
            }
            Self::DataOverflow { name, .. } => {
                write!(f, "Data section overflow while allocating `{}`", name)
            }
            Self::ProgramTooLarge { .. } => write!(f, "Program is too large to fit in memory"),
        }
    }
}

impl Diagnostic for AsmError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Self::ExpectedChar { .. } => "parse::expected_char",
            Self::MalformedLabel { .. } => "parse::label",
            Self::UnknownInstr { .. } => "parse::unknown_instr",
            Self::MissingOperand { .. } => "parse::missing_operand",
            Self::TrailingInput { .. } => "parse::unexpected_token",
            Self::InvalidLiteral { .. } => "parse::bad_lit",
            Self::DuplicateSymbol { .. } => "parse::duplicate_symbol",
            Self::UnresolvedSymbol { .. } => "resolve::unresolved_symbol",
            Self::MultipleDefinition { .. } => "resolve::multiple_definition",
            Self::DataOverflow { .. } => "capacity::data_overflow",
            Self::ProgramTooLarge { .. } => "capacity::program_too_large",
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help: Box<dyn fmt::Display + 'a> = match self {
            Self::ExpectedChar { .. } => {
                Box::new("data blocks look like `BEGINDATA { name = 5 }`")
            }
            Self::MalformedLabel { .. } => Box::new("labels look like `.name:`"),
            Self::UnknownInstr { .. } => {
                Box::new("available instructions: ADDI ADD SUBI SUB CLAC BNZ BZ UCB STR")
            }
            Self::MissingOperand { mnemonic, .. } => Box::new(format!(
                "`{}` expects an operand on the same line",
                mnemonic
            )),
            Self::TrailingInput { .. } => Box::new("only one instruction is allowed per line"),
            Self::InvalidLiteral { min, max, .. } => {
                Box::new(format!("decimal values from {} to {} are allowed", min, max))
            }
            Self::DuplicateSymbol { .. } => Box::new("labels and data names must be unique"),
            Self::UnresolvedSymbol { .. } => {
                Box::new("declare it as a `.label:` or inside a BEGINDATA block")
            }
            Self::MultipleDefinition { .. } => {
                Box::new("a name cannot be both a label and a data variable")
            }
            Self::DataOverflow { .. } | Self::ProgramTooLarge { .. } => {
                Box::new("code and data share 255 memory cells")
            }
        };
        Some(help)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::at(
            self.span(),
            self.label(),
        ))))
    }
}

/// Failure to load an assembled binary. Memory is never handed out partially loaded.
#[derive(Debug)]
pub enum LoadError {
    StreamOpen(io::Error),
    PreambleRead(io::Error),
    MalformedPreamble { found: Vec<u8> },
    ContentRead(io::Error),
    Allocation { bytes: usize },
    MisalignedBody { len: usize },
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StreamOpen(e) | Self::PreambleRead(e) | Self::ContentRead(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamOpen(_) => write!(f, "failed to initialize stream"),
            Self::PreambleRead(_) => write!(f, "failed to read preamble"),
            Self::MalformedPreamble { found } => {
                write!(f, "malformed preamble `{}`", found.escape_ascii())
            }
            Self::ContentRead(_) => write!(f, "failed to read contents from a file"),
            Self::Allocation { bytes } => write!(f, "failed to allocate {} bytes of memory", bytes),
            Self::MisalignedBody { len } => {
                write!(f, "file body of {} bytes is not aligned to 16 bits", len)
            }
        }
    }
}

impl Diagnostic for LoadError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Self::StreamOpen(_) => "load::stream_open",
            Self::PreambleRead(_) => "load::preamble_read",
            Self::MalformedPreamble { .. } => "load::malformed_preamble",
            Self::ContentRead(_) => "load::content_read",
            Self::Allocation { .. } => "load::allocation",
            Self::MisalignedBody { .. } => "load::misaligned",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Self::PreambleRead(_) | Self::MalformedPreamble { .. } | Self::MisalignedBody { .. } => {
                Some(Box::new("make sure the file was produced by `metasm compile`"))
            }
            _ => None,
        }
    }
}

/// Fault raised by the virtual machine while executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunError {
    InvalidOpcode { opcode: u8, pc: u8 },
    AddressOutOfRange { addr: u8, pc: u8, len: usize },
}

impl Error for RunError {}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode { opcode, pc } => {
                write!(f, "invalid opcode 0x{:02X} at pc 0x{:02X}", opcode, pc)
            }
            Self::AddressOutOfRange { addr, pc, len } => write!(
                f,
                "address 0x{:02X} at pc 0x{:02X} is outside of {} cells of memory",
                addr, pc, len
            ),
        }
    }
}

impl Diagnostic for RunError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Self::InvalidOpcode { .. } => "run::invalid_opcode",
            Self::AddressOutOfRange { .. } => "run::address_out_of_range",
        };
        Some(Box::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SrcOffset;

    #[test]
    fn expected_char_message() {
        let err = AsmError::ExpectedChar {
            expected: '=',
            found: Some('\n'),
            span: Span::new(SrcOffset(4), 1),
        };
        assert_eq!(err.to_string(), "Expected `=`, found `\\n`");
        let err = AsmError::ExpectedChar {
            expected: '}',
            found: None,
            span: Span::dummy(),
        };
        assert_eq!(err.to_string(), "Expected `}`, found end of file");
    }

    #[test]
    fn diagnostic_carries_code_and_span() {
        let err = AsmError::UnresolvedSymbol {
            name: "nowhere".into(),
            span: Span::new(SrcOffset(4), 7),
        };
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("resolve::unresolved_symbol")
        );
        let labels: Vec<_> = err.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 4);
        assert_eq!(labels[0].len(), 7);
    }

    #[test]
    fn load_error_source() {
        let err = LoadError::ContentRead(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.source().is_some());
        assert!(LoadError::Allocation { bytes: 10 }.source().is_none());
    }
}
