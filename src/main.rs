use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use metasm::output::Output;
use metasm::{binary, AsmError, Exit, Instr, Program, Vm};

/// metasm assembles and runs programs for a tiny accumulator machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file directly and output to terminal
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Stop after this many instructions [default: $METASM_MAX_STEPS or 1000000]
        #[arg(short = 's', long)]
        max_steps: Option<u64>,
        /// Print every executed instruction to stderr
        #[arg(short, long)]
        trace: bool,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create binary `.bin` file to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Disassemble a binary `.bin` file
    Dump {
        /// `.bin` file to inspect
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    metasm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(metasm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                max_steps,
                trace,
                minimal,
            } => run(&name, max_steps, trace, minimal),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let program = assemble(&name)?;

                let out_file_name = match dest {
                    Some(dest) => dest,
                    None => name.with_extension("bin"),
                };
                let file = File::create(&out_file_name).into_diagnostic()?;
                binary::write_to(&program.space, BufWriter::new(file)).into_diagnostic()?;

                message(
                    Green,
                    "Finished",
                    &format!(
                        "emit binary ({} instructions, {} data cells)",
                        program.space.code_len(),
                        program.space.data_len()
                    ),
                );
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let _ = assemble(&name)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Dump { name } => {
                file_message(Green, "Loading", &name);
                let mem = binary::load(&name)?;
                for (addr, word) in mem.iter().enumerate().filter(|(_, word)| **word != 0) {
                    let text = match Instr::decode(*word) {
                        Some(instr) => instr.to_string(),
                        None => format!(".word {}", word),
                    };
                    println!("0x{:02X}  0x{:04X}  {}", addr, word, text);
                }
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, None, false, false)
    } else {
        println!("\n~ metasm v{VERSION} ~");
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, max_steps: Option<u64>, trace: bool, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    Output::set_trace(trace || metasm::env::is_trace_enabled());
    let max_steps = max_steps.unwrap_or_else(metasm::env::max_steps);

    let (mut vm, program) = match name.extension().and_then(|ext| ext.to_str()) {
        Some("bin") => {
            file_message(MsgColor::Green, "Loading", name);
            (Vm::load(name)?, None)
        }
        Some("asm") => {
            file_message(MsgColor::Green, "Assembling", name);
            let program = assemble(name)?;
            let vm = Vm::new(program.space.clone().into_memory());
            (vm, Some(program))
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    message(MsgColor::Green, "Running", "emitted binary");
    match vm.run(Some(max_steps))? {
        Exit::Halted => message(
            MsgColor::Cyan,
            "Halted",
            &format!("after {} steps", vm.steps()),
        ),
        Exit::StepLimit => {
            bail!(
                help = "raise the cap with `--max-steps` or METASM_MAX_STEPS",
                "Program did not halt within {} steps",
                max_steps
            )
        }
    }

    Output::Normal.print_registers(&vm);
    if let Some(program) = program {
        Output::Normal.print_data(&vm, &program.symbols);
    }

    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Read and assemble a source file, attaching the source to any diagnostic.
fn assemble(name: &Path) -> Result<Program> {
    let src = fs::read_to_string(name).into_diagnostic()?;
    metasm::assemble(&src).map_err(|err: AsmError| {
        Report::new(err).with_source_code(NamedSource::new(name.display().to_string(), src))
    })
}

const SHORT_INFO: &str = r"
metasm assembles `.asm` sources into `.bin` images and runs them on a
single-accumulator machine with 255 cells of memory.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
