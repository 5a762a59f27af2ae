use crate::error::AsmError;
use crate::lexer::cursor::Cursor;
use crate::symbol::{Mnemonic, Span, SrcOffset};

pub mod cursor;

/// Keyword opening a `BEGINDATA { name = value ... }` block.
pub const DATA_KEYWORD: &str = "BEGINDATA";

/// A statement-level item found by the scanner. Operands are left in the source so each pass can
/// decide whether to read or skip them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stmt<'a> {
    /// `.name:` marker; span covers the name only.
    Label { name: &'a str, span: Span },
    /// Mnemonic at a whitespace boundary, cursor left right after it.
    Instr { mnemonic: Mnemonic, span: Span },
    /// `BEGINDATA` keyword, cursor left right after it.
    DataBlock,
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t' | '\r')
}

/// Whitespace that does not end the current line.
fn is_line_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

/// Decode signed decimal literal text and check it lies in `min..=max`.
pub(crate) fn parse_literal(text: &str, span: Span, min: i32, max: i32) -> Result<i32, AsmError> {
    match text.parse::<i32>() {
        Ok(val) if (min..=max).contains(&val) => Ok(val),
        _ => Err(AsmError::InvalidLiteral {
            text: text.to_string(),
            min,
            max,
            span,
        }),
    }
}

impl<'a> Cursor<'a> {
    fn span_from(&self, start: usize) -> Span {
        Span::new(SrcOffset(start), self.curr_pt() - start)
    }

    /// Skip whitespace, line breaks and `;` comments.
    pub fn skip_blank(&mut self) {
        loop {
            self.take_while(is_whitespace);
            if self.first() == Some(';') {
                self.skip_line();
            } else {
                break;
            }
        }
    }

    /// Move to the end of the current line. The newline itself is left unconsumed.
    pub fn skip_line(&mut self) {
        self.take_while(|c| c != '\n');
    }

    /// Maximal run of characters that are neither whitespace nor `stop`, and never a comment.
    fn word_until(&mut self, stop: char) -> &'a str {
        self.take_while(|c| !is_whitespace(c) && c != ';' && c != stop)
    }

    /// Scan up to the next statement-level item. Both assembler passes drive the source through
    /// this so that they recognise exactly the same instructions.
    pub fn next_stmt(&mut self) -> Result<Option<Stmt<'a>>, AsmError> {
        self.skip_blank();
        let start = self.curr_pt();
        match self.first() {
            None => Ok(None),
            Some('.') => {
                self.bump();
                let name = self.take_while(|c| c != ':' && c != ';' && !is_whitespace(c));
                if name.is_empty() || self.first() != Some(':') {
                    return Err(AsmError::MalformedLabel {
                        span: self.span_from(start),
                    });
                }
                let span = Span::new(SrcOffset(start + 1), name.len());
                self.bump();
                Ok(Some(Stmt::Label { name, span }))
            }
            Some(_) => {
                let word = self.word_until(';');
                let span = self.span_from(start);
                if word == DATA_KEYWORD {
                    return Ok(Some(Stmt::DataBlock));
                }
                match word.parse::<Mnemonic>() {
                    Ok(mnemonic) => Ok(Some(Stmt::Instr { mnemonic, span })),
                    Err(()) => Err(AsmError::UnknownInstr {
                        word: word.to_string(),
                        span,
                    }),
                }
            }
        }
    }

    /// Read the operand following a mnemonic. Must be on the same line.
    pub fn operand(&mut self) -> Option<(&'a str, Span)> {
        self.take_while(is_line_space);
        let start = self.curr_pt();
        let word = self.word_until(';');
        if word.is_empty() {
            None
        } else {
            Some((word, self.span_from(start)))
        }
    }

    /// Only whitespace or a comment may follow until the end of the line.
    pub fn end_of_line(&mut self) -> Result<(), AsmError> {
        self.take_while(is_line_space);
        match self.first() {
            None | Some('\n') | Some(';') => {
                self.skip_line();
                Ok(())
            }
            Some(_) => {
                let start = self.curr_pt();
                self.word_until(';');
                Err(AsmError::TrailingInput {
                    span: self.span_from(start),
                })
            }
        }
    }

    /// Consume `expected` after optional blanks.
    pub fn expect(&mut self, expected: char) -> Result<(), AsmError> {
        self.skip_blank();
        let start = self.curr_pt();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            found => Err(AsmError::ExpectedChar {
                expected,
                found,
                span: self.span_from(start),
            }),
        }
    }

    /// Peek past blanks for the next meaningful character.
    pub fn peek_blank(&mut self) -> Option<char> {
        self.skip_blank();
        self.first()
    }

    /// Name on the left side of a data entry. Never includes the block's closing brace.
    pub fn data_ident(&mut self) -> (&'a str, Span) {
        self.skip_blank();
        let start = self.curr_pt();
        let ident = self.take_while(|c| !is_whitespace(c) && !matches!(c, ';' | '=' | '}'));
        (ident, self.span_from(start))
    }

    /// Literal on the right side of a data entry.
    pub fn data_literal(&mut self) -> (&'a str, Span) {
        self.skip_blank();
        let start = self.curr_pt();
        let lit = self.word_until('}');
        (lit, self.span_from(start))
    }

    /// Step over a data block that has already been validated, up to and including its `}`.
    pub fn skip_data_block(&mut self) {
        loop {
            self.skip_blank();
            match self.bump() {
                None | Some('}') => break,
                Some(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(src: &str) -> Result<Vec<Stmt>, AsmError> {
        let mut cur = Cursor::new(src);
        let mut res = Vec::new();
        while let Some(stmt) = cur.next_stmt()? {
            if let Stmt::Instr { .. } = stmt {
                cur.skip_line();
            }
            res.push(stmt);
        }
        Ok(res)
    }

    #[test]
    fn label_then_instr_on_same_line() {
        let res = stmts(".loop: ADDI 1").unwrap();
        assert_eq!(res.len(), 2);
        assert!(matches!(res[0], Stmt::Label { name: "loop", .. }));
        assert!(matches!(
            res[1],
            Stmt::Instr {
                mnemonic: Mnemonic::Addi,
                ..
            }
        ));
    }

    #[test]
    fn instr_at_eof_is_recognised() {
        let res = stmts("CLAC").unwrap();
        assert!(matches!(
            res[0],
            Stmt::Instr {
                mnemonic: Mnemonic::Clac,
                ..
            }
        ));
    }

    #[test]
    fn comments_are_skipped() {
        let res = stmts("; header\n  CLAC ; clear\n; trailer").unwrap();
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn glued_mnemonic_is_unknown() {
        let err = stmts("ADDI5").unwrap_err();
        assert!(matches!(err, AsmError::UnknownInstr { ref word, .. } if word == "ADDI5"));
    }

    #[test]
    fn unterminated_label() {
        assert!(matches!(
            stmts(".loop ADDI 1"),
            Err(AsmError::MalformedLabel { .. })
        ));
        assert!(matches!(stmts(".end"), Err(AsmError::MalformedLabel { .. })));
        assert!(matches!(stmts(".:"), Err(AsmError::MalformedLabel { .. })));
        assert!(matches!(
            stmts(".a;b: CLAC"),
            Err(AsmError::MalformedLabel { .. })
        ));
    }

    #[test]
    fn operand_stays_on_line() {
        let mut cur = Cursor::new("BNZ\nloop");
        cur.next_stmt().unwrap();
        assert_eq!(cur.operand(), None);

        let mut cur = Cursor::new("BNZ   loop ; back");
        cur.next_stmt().unwrap();
        let (op, span) = cur.operand().unwrap();
        assert_eq!(op, "loop");
        assert_eq!(span.range(), 6..10);
        assert!(cur.end_of_line().is_ok());
    }

    #[test]
    fn trailing_input_is_rejected() {
        let mut cur = Cursor::new("ADDI 1 2");
        cur.next_stmt().unwrap();
        cur.operand().unwrap();
        assert!(matches!(
            cur.end_of_line(),
            Err(AsmError::TrailingInput { .. })
        ));
    }

    #[test]
    fn expect_reports_found_char() {
        let mut cur = Cursor::new("  ( ");
        assert_eq!(
            cur.expect('{'),
            Err(AsmError::ExpectedChar {
                expected: '{',
                found: Some('('),
                span: Span::new(SrcOffset(2), 1),
            })
        );
        let mut cur = Cursor::new("   ");
        assert!(matches!(
            cur.expect('}'),
            Err(AsmError::ExpectedChar { found: None, .. })
        ));
    }

    #[test]
    fn skip_data_block_ignores_commented_braces() {
        let mut cur = Cursor::new("{ a = 1 ; }\n b = 2 }\nCLAC");
        cur.skip_data_block();
        assert!(matches!(
            cur.next_stmt().unwrap(),
            Some(Stmt::Instr {
                mnemonic: Mnemonic::Clac,
                ..
            })
        ));
    }

    #[test]
    fn data_ident_stops_at_brace() {
        let mut cur = Cursor::new(" x}y = 1 }");
        let (ident, span) = cur.data_ident();
        assert_eq!(ident, "x");
        assert_eq!(span.range(), 1..2);
        assert_eq!(cur.first(), Some('}'));
    }

    #[test]
    fn literal_range() {
        let span = Span::dummy();
        assert_eq!(parse_literal("-7", span, -10, 10), Ok(-7));
        assert!(parse_literal("11", span, -10, 10).is_err());
        assert!(parse_literal("x30", span, -10, 10).is_err());
    }
}
