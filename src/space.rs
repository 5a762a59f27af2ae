use crate::error::AsmError;
use crate::symbol::Span;

/// Number of 16-bit cells shared by code and data.
pub const MEMORY_CELLS: usize = 0xFF;

/// The assembled memory image.
///
/// Code is laid out upward from address `0` and data downward from address `0xFE`, so the first
/// data variable lives at the top of memory. When both regions are in use, one empty cell is kept
/// between them so execution halts before reaching data. An entry that would break this is
/// rejected with a capacity error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AddressSpace {
    cells: Box<[u16; MEMORY_CELLS]>,
    code_len: usize,
    data_len: usize,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            cells: Box::new([0; MEMORY_CELLS]),
            code_len: 0,
            data_len: 0,
        }
    }

    /// Whether `code_len` code cells and `data_len` data cells fit, counting the empty cell that
    /// separates the regions.
    fn fits(code_len: usize, data_len: usize) -> bool {
        let guard = (code_len > 0 && data_len > 0) as usize;
        code_len + data_len + guard <= MEMORY_CELLS
    }

    /// Claim the next code cell, returning its address.
    pub fn reserve_code(&mut self, span: Span) -> Result<u8, AsmError> {
        if !Self::fits(self.code_len + 1, self.data_len) {
            return Err(AsmError::ProgramTooLarge { span });
        }
        let addr = self.code_len as u8;
        self.code_len += 1;
        Ok(addr)
    }

    /// Claim the next data cell from the top of memory and store `value` in it.
    pub fn push_data(&mut self, name: &str, value: u16, span: Span) -> Result<u8, AsmError> {
        if !Self::fits(self.code_len, self.data_len + 1) {
            return Err(AsmError::DataOverflow {
                name: name.to_string(),
                span,
            });
        }
        let addr = MEMORY_CELLS - 1 - self.data_len;
        self.cells[addr] = value;
        self.data_len += 1;
        Ok(addr as u8)
    }

    /// Write an encoded instruction into a previously reserved code cell.
    pub fn set_code(&mut self, addr: u8, word: u16) {
        debug_assert!((addr as usize) < self.code_len, "code cell was never reserved");
        self.cells[addr as usize] = word;
    }

    pub fn get(&self, addr: u8) -> Option<u16> {
        self.cells.get(addr as usize).copied()
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells[..]
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Hand the image over as VM memory.
    pub fn into_memory(self) -> Box<[u16]> {
        self.cells
    }
}
