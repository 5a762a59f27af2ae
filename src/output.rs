use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::runtime::Vm;
use crate::symbol::SymbolTables;

/// Print one line of execution trace to stderr, if tracing is on.
#[macro_export]
macro_rules! tprintln {
    ( $fmt:literal $($tt:tt)* ) => {{
        if $crate::output::Output::is_trace() {
            let s = format!(
                concat!($fmt, "\n")
                $($tt)*
            );
            $crate::output::Output::Trace.print_str(&s);
        }
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program results, to stdout
    Normal,
    /// Execution trace, to stderr
    Trace,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
        static IS_TRACE: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }
    pub fn set_trace(new_value: bool) -> bool {
        Self::IS_TRACE.with(|value| value.replace(new_value))
    }
    pub fn is_trace() -> bool {
        Self::IS_TRACE.with(|value| *value.borrow())
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => print!("{}", string),
            // Always remove color if `--minimal`
            Self::Trace if Self::is_minimal() => eprint_colorless(string),
            Self::Trace => eprint!("{}", ColoredString::from(string).blue()),
        }
    }

    /// Final register state of the machine.
    pub fn print_registers(&self, vm: &Vm) {
        if Self::is_minimal() {
            self.print_str(&format!("ACC {}\n", vm.acc()));
            self.print_str(&format!("PC {}\n", vm.pc()));
            self.print_str(&format!("ZF {}\n", vm.zero_flag() as u8));
            return;
        }

        self.print_str("\x1b[2m┌─────────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│         \x1b[3mhex     int    uint\x1b[0m\x1b[2m │\x1b[0m\n");
        self.print_str("\x1b[2m│\x1b[0m \x1b[1mACC\x1b[0m  ");
        self.print_integer(vm.acc());
        self.print_str("\x1b[2m│\x1b[0m\n");
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m   0x{:02x}      \x1b[1mZF\x1b[0m  {}       \x1b[2m│\x1b[0m\n",
            vm.pc(),
            vm.zero_flag() as u8
        ));
        self.print_str("\x1b[2m└─────────────────────────────┘\x1b[0m\n");
    }

    /// Values of every data variable, read back from machine memory.
    pub fn print_data(&self, vm: &Vm, symbols: &SymbolTables) {
        for (name, addr) in symbols.data_vars() {
            let Some(&value) = vm.memory().get(addr as usize) else {
                continue;
            };
            if Self::is_minimal() {
                self.print_str(&format!("{} {}\n", name, value));
            } else {
                self.print_str(&format!("{:>12} \x1b[2m@ 0x{:02x}\x1b[0m  ", name, addr));
                self.print_integer(value);
                self.print_str("\n");
            }
        }
    }

    pub fn print_integer(&self, value: u16) {
        if Self::is_minimal() {
            self.print_str(&format!("{}", value));
            return;
        }
        self.print_str(&format!("0x{:04x}  ", value));
        self.print_str(&format!("{:-6}  ", value as i16));
        self.print_str(&format!("{:-6} ", value));
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl Iterator for Decolored<'_> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    for ch in Decolored::new(string) {
        eprint!("{}", ch);
    }
}
