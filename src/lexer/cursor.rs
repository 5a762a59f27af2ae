// Heavily inspired and referenced from `rustc_lexer` and adapted to suit the project.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

/// Peekable cursor over an immutable source text.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// Index that the cursor is pointing to in the source
    curr_pt: usize,
    /// Full source text
    chars: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            curr_pt: 0,
            chars: input,
        }
    }

    /// Peek the next character without consuming it.
    pub fn first(&self) -> Option<char> {
        self.at_curr_pt().chars().next()
    }

    /// Return slice of input starting at the current point of the cursor
    pub fn at_curr_pt(&self) -> &'a str {
        &self.chars[self.curr_pt..]
    }

    /// Consume one character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.first()?;
        self.curr_pt += c.len_utf8();
        Some(c)
    }

    /// Consume characters while `pred` holds, returning the consumed slice.
    pub fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.curr_pt;
        while let Some(c) = self.first() {
            if !pred(c) {
                break;
            }
            self.curr_pt += c.len_utf8();
        }
        &self.chars[start..self.curr_pt]
    }

    /// Returns current cursor position
    pub fn curr_pt(&self) -> usize {
        self.curr_pt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_while_stops_at_predicate() {
        let mut cur = Cursor::new("ADDI 5");
        assert_eq!(cur.take_while(|c| c != ' '), "ADDI");
        assert_eq!(cur.curr_pt(), 4);
        assert_eq!(cur.first(), Some(' '));
    }

    #[test]
    fn bump_until_eof() {
        let mut cur = Cursor::new("ab");
        assert_eq!(cur.bump(), Some('a'));
        assert_eq!(cur.bump(), Some('b'));
        assert_eq!(cur.first(), None);
        assert_eq!(cur.bump(), None);
        assert_eq!(cur.take_while(|_| true), "");
    }
}
