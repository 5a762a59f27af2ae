use std::path::Path;

use crate::{
    binary,
    error::{LoadError, RunError},
    symbol::Instr,
};

/// How a call to [`Vm::run`] ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Exit {
    /// Ran off the end of memory or reached an empty cell.
    Halted,
    /// The caller's step cap was reached first.
    StepLimit,
}

/// Complete machine state during runtime.
pub struct Vm {
    /// Loaded memory, owned for the whole life of the machine
    mem: Box<[u16]>,
    /// Accumulator, the only arithmetic register
    acc: u16,
    /// Program counter
    pc: u8,
    /// Zero flag
    zf: bool,
    halted: bool,
    steps: u64,
}

impl Vm {
    pub fn new(mem: Box<[u16]>) -> Vm {
        Vm {
            mem,
            acc: 0,
            pc: 0,
            zf: false,
            halted: false,
            steps: 0,
        }
    }

    /// Load an assembled binary from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Vm, LoadError> {
        binary::load(path).map(Vm::new)
    }

    /// Load an assembled binary already held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Vm, LoadError> {
        binary::from_bytes(bytes).map(Vm::new)
    }

    // Indexed by opcode; 0x00 marks an empty cell and stops the machine
    const OP_TABLE: [fn(&mut Vm, u8) -> Result<(), RunError>; 10] = [
        Self::end,  // 0x0
        Self::addi, // 0x1
        Self::add,  // 0x2
        Self::subi, // 0x3
        Self::sub,  // 0x4
        Self::clac, // 0x5
        Self::bnz,  // 0x6
        Self::bz,   // 0x7
        Self::ucb,  // 0x8
        Self::str,  // 0x9
    ];

    /// Run until the machine halts or `max_steps` instructions have executed in total.
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<Exit, RunError> {
        loop {
            if self.halted {
                return Ok(Exit::Halted);
            }
            if max_steps.is_some_and(|max| self.steps >= max) {
                return Ok(Exit::StepLimit);
            }
            self.step()?;
        }
    }

    /// Fetch, decode and execute a single instruction.
    pub fn step(&mut self) -> Result<(), RunError> {
        if self.halted {
            return Ok(());
        }
        let pc = self.pc;
        let Some(&word) = self.mem.get(pc as usize) else {
            // Ran past the end of loaded memory
            self.halted = true;
            return Ok(());
        };
        let [opcode, operand] = word.to_be_bytes();
        let op = Self::OP_TABLE
            .get(opcode as usize)
            .ok_or(RunError::InvalidOpcode { opcode, pc })?;
        op(self, operand)?;

        // Empty cells do not count as executed instructions
        let Some(instr) = Instr::decode(word) else {
            return Ok(());
        };
        self.steps += 1;
        tprintln!(
            "{:>4}  0x{:02X}  {:<10} acc=0x{:04X} zf={}",
            self.steps,
            pc,
            instr.to_string(),
            self.acc,
            self.zf as u8
        );
        Ok(())
    }

    pub fn acc(&self) -> u16 {
        self.acc
    }

    pub fn pc(&self) -> u8 {
        self.pc
    }

    pub fn zero_flag(&self) -> bool {
        self.zf
    }

    pub fn memory(&self) -> &[u16] {
        &self.mem
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    fn mem(&mut self, addr: u8) -> Result<&mut u16, RunError> {
        let (pc, len) = (self.pc, self.mem.len());
        self.mem
            .get_mut(addr as usize)
            .ok_or(RunError::AddressOutOfRange { addr, pc, len })
    }

    #[inline]
    fn set_acc(&mut self, val: u16) {
        self.acc = val;
        self.zf = val == 0;
    }

    /// Move to the next cell, stopping if the program counter would wrap.
    #[inline]
    fn advance(&mut self) {
        match self.pc.checked_add(1) {
            Some(pc) => self.pc = pc,
            None => self.halted = true,
        }
    }

    fn end(&mut self, _operand: u8) -> Result<(), RunError> {
        self.halted = true;
        Ok(())
    }

    fn addi(&mut self, operand: u8) -> Result<(), RunError> {
        self.set_acc(self.acc.wrapping_add(operand as u16));
        self.advance();
        Ok(())
    }

    fn add(&mut self, operand: u8) -> Result<(), RunError> {
        let val = *self.mem(operand)?;
        self.set_acc(self.acc.wrapping_add(val));
        self.advance();
        Ok(())
    }

    fn subi(&mut self, operand: u8) -> Result<(), RunError> {
        self.set_acc(self.acc.wrapping_sub(operand as u16));
        self.advance();
        Ok(())
    }

    fn sub(&mut self, operand: u8) -> Result<(), RunError> {
        let val = *self.mem(operand)?;
        self.set_acc(self.acc.wrapping_sub(val));
        self.advance();
        Ok(())
    }

    fn clac(&mut self, _operand: u8) -> Result<(), RunError> {
        self.set_acc(0);
        self.advance();
        Ok(())
    }

    fn bnz(&mut self, operand: u8) -> Result<(), RunError> {
        if !self.zf {
            self.pc = operand;
        } else {
            self.advance();
        }
        Ok(())
    }

    fn bz(&mut self, operand: u8) -> Result<(), RunError> {
        if self.zf {
            self.pc = operand;
        } else {
            self.advance();
        }
        Ok(())
    }

    fn ucb(&mut self, operand: u8) -> Result<(), RunError> {
        self.pc = operand;
        Ok(())
    }

    fn str(&mut self, operand: u8) -> Result<(), RunError> {
        let acc = self.acc;
        *self.mem(operand)? = acc;
        self.advance();
        Ok(())
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("acc", &self.acc)
            .field("pc", &self.pc)
            .field("zf", &self.zf)
            .field("halted", &self.halted)
            .field("steps", &self.steps)
            .field("mem_len", &self.mem.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;
    use crate::space::MEMORY_CELLS;

    fn boot(src: &str) -> Vm {
        Vm::new(assemble(src).unwrap().space.into_memory())
    }

    const CAP: Option<u64> = Some(10_000);

    #[test]
    fn sums_literals_and_stores() {
        let program = assemble("BEGINDATA { result = 0 }\nADDI 5\nADDI 10\nSTR result").unwrap();
        let addr = program.symbols.data("result").unwrap();
        let mut vm = Vm::new(program.space.into_memory());

        assert_eq!(vm.run(CAP), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 15);
        assert_eq!(vm.memory()[addr as usize], 15);
        assert_eq!(vm.steps(), 3);
        assert_eq!(vm.pc(), 3);
    }

    #[test]
    fn subtraction_wraps() {
        let mut vm = boot("ADDI 3\nSUBI 5");
        vm.run(CAP).unwrap();
        assert_eq!(vm.acc(), 0xFFFE);
        assert!(!vm.zero_flag());

        let mut vm = boot("BEGINDATA { max = 65535 }\nADD max\nADDI 1");
        vm.run(CAP).unwrap();
        assert_eq!(vm.acc(), 0);
        assert!(vm.zero_flag());
    }

    #[test]
    fn memory_operands() {
        let mut vm = boot(r#"
            BEGINDATA {
                a = 100
                b = 40
                out = 0
            }
            ADD a
            SUB b
            STR out
        "#);
        vm.run(CAP).unwrap();
        assert_eq!(vm.acc(), 60);
        assert_eq!(vm.memory()[0xFC], 60);
    }

    #[test]
    fn clac_then_bz_always_jumps() {
        let mut vm = boot("ADDI 9\nCLAC\nBZ target\nADDI 1\n.target: ADDI 2");
        vm.run(CAP).unwrap();
        assert_eq!(vm.acc(), 2);
    }

    #[test]
    fn nonzero_bz_never_jumps() {
        let mut vm = boot("ADDI 1\nBZ target\nADDI 1\n.target: ADDI 2");
        vm.run(CAP).unwrap();
        assert_eq!(vm.acc(), 4);
    }

    #[test]
    fn bnz_branches_on_clear_flag() {
        let mut vm = boot("ADDI 1\nBNZ target\nADDI 100\n.target: CLAC\nBNZ target");
        assert_eq!(vm.run(CAP), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 0);
        assert_eq!(vm.steps(), 4);
    }

    #[test]
    fn infinite_loop_hits_step_cap() {
        let mut vm = boot(".loop: ADDI 1\nBNZ loop");
        assert_eq!(vm.run(Some(1000)), Ok(Exit::StepLimit));
        assert!(!vm.is_halted());
        assert_eq!(vm.steps(), 1000);
        assert_eq!(vm.acc(), 500);
    }

    #[test]
    fn countdown_loop_terminates() {
        let mut vm = boot(r#"
            BEGINDATA {
                counter = 3
                total = 0
            }
            .loop:  CLAC
                    ADD counter
                    SUBI 1
                    STR counter
                    BZ done
                    CLAC
                    ADD total
                    ADDI 10
                    STR total
                    UCB loop
            .done:  CLAC
                    ADD total
        "#);
        assert_eq!(vm.run(CAP), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 20);
        assert_eq!(vm.memory()[0xFE], 0);
    }

    #[test]
    fn halts_at_end_of_memory() {
        let mut vm = Vm::new(vec![0x0101, 0x0101].into_boxed_slice());
        assert_eq!(vm.run(None), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 2);

        // Full code region: pc wraps past the last cell
        let mut vm = Vm::new(vec![0x0101; MEMORY_CELLS + 1].into_boxed_slice());
        assert_eq!(vm.run(None), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 256);
    }

    #[test]
    fn full_program_stops_before_data() {
        // 0x0105 would decode as `ADDI 5` if execution reached it
        let src = format!("BEGINDATA {{ x = 261 }}\n{}", "CLAC\n".repeat(253));
        let mut vm = boot(&src);
        assert_eq!(vm.run(CAP), Ok(Exit::Halted));
        assert_eq!(vm.acc(), 0);
        assert_eq!(vm.steps(), 253);
        assert_eq!(vm.pc(), 253);
        assert_eq!(vm.memory()[0xFE], 0x0105);

        let src = format!("BEGINDATA {{ x = 261 }}\n{}", "CLAC\n".repeat(254));
        assert!(matches!(
            assemble(&src),
            Err(crate::AsmError::ProgramTooLarge { .. })
        ));
    }

    #[test]
    fn faults() {
        let mut vm = Vm::new(vec![0x0101, 0x0A00].into_boxed_slice());
        assert_eq!(
            vm.run(CAP),
            Err(RunError::InvalidOpcode { opcode: 0x0A, pc: 1 })
        );

        let mut vm = Vm::new(vec![0x0910].into_boxed_slice());
        assert_eq!(
            vm.run(CAP),
            Err(RunError::AddressOutOfRange {
                addr: 0x10,
                pc: 0,
                len: 1
            })
        );
    }

    #[test]
    fn step_after_halt_is_noop() {
        let mut vm = boot("ADDI 1");
        vm.run(None).unwrap();
        let steps = vm.steps();
        vm.step().unwrap();
        assert_eq!(vm.steps(), steps);
        assert!(vm.is_halted());
    }
}
