//! LC-3 Emulator - CLI Entry Point
//!
//! `lc3-emu <image>...` loads each object image in order (later images
//! overwrite earlier ones) and runs from x3000 until HALT.

use clap::Parser;
use lc3::{disassemble, load_image, Cpu, CpuConfig, CpuError, Image, ImageError, RunExit};
use lc3::{RawModeGuard, StopFlag, StreamConsole, TerminalConsole};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

const EXIT_SUCCESS: u8 = 0;
/// Exit code for image errors, terminal setup failures and runtime faults.
const EXIT_FAILURE: u8 = 1;
/// Exit code when `--max-cycles` stops the run.
const EXIT_CYCLE_LIMIT: u8 = 3;
/// Exit code after an interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "lc3-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LC-3 16-bit educational computer")]
struct Cli {
    /// Object images to load, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Stop after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Fault on unknown trap vectors instead of ignoring them
    #[arg(long)]
    strict_traps: bool,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Print a listing of the images and exit
    #[arg(short, long)]
    disassemble: bool,

    /// Write the final machine state as JSON
    #[arg(long, value_name = "PATH")]
    dump_state: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Cpu(#[from] CpuError),

    #[error("failed to encode state: {0}")]
    Snapshot(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let mut cpu = Cpu::with_config(CpuConfig {
        max_cycles: cli.max_cycles,
        strict_traps: cli.strict_traps,
    });

    let images = match load_images(&cli.images, &mut cpu) {
        Ok(images) => images,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if cli.disassemble {
        for image in &images {
            println!("{}", disassemble(image.origin, &image.words));
        }
        return ExitCode::SUCCESS;
    }

    let stop = StopFlag::new();
    if let Err(e) = stop.install_signal_handler() {
        log::warn!("could not install signal handler: {}", e);
    }

    let outcome = run_on_host(&mut cpu, &stop);

    if let Some(path) = &cli.dump_state {
        if let Err(e) = dump_state(path, &cpu) {
            eprintln!("❌ {}", e);
        }
    }

    match &outcome {
        Ok(RunExit::Halted) => {}
        Ok(RunExit::Interrupted) => eprintln!("interrupted at x{:04X}", cpu.regs.pc),
        Ok(RunExit::CycleLimit) => eprintln!("⚠️  Reached max cycles limit ({}).", cpu.cycles),
        Err(e) => eprintln!("❌ {}", e),
    }
    ExitCode::from(exit_code(&outcome))
}

/// Process exit status for the way a run ended.
fn exit_code(outcome: &Result<RunExit, AppError>) -> u8 {
    match outcome {
        Ok(RunExit::Halted) => EXIT_SUCCESS,
        Ok(RunExit::Interrupted) => EXIT_INTERRUPTED,
        Ok(RunExit::CycleLimit) => EXIT_CYCLE_LIMIT,
        Err(_) => EXIT_FAILURE,
    }
}

/// Log to stderr, ending lines with CR LF so they survive raw mode.
fn init_logging(trace: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if trace {
        builder.filter_module("lc3", log::LevelFilter::Trace);
    }
    builder.format(|buf, record| {
        write!(buf, "[{} {}] {}\r\n", record.level(), record.target(), record.args())
    });
    builder.init();
}

fn load_images(paths: &[PathBuf], cpu: &mut Cpu) -> Result<Vec<Image>, ImageError> {
    paths
        .iter()
        .map(|path| {
            let image = load_image(path)?;
            image.load_into(&mut cpu.mem)?;
            Ok(image)
        })
        .collect()
}

/// Run against the host: raw-mode terminal when stdin is a TTY, otherwise
/// stdin read as a plain byte stream.
fn run_on_host(cpu: &mut Cpu, stop: &StopFlag) -> Result<RunExit, AppError> {
    if io::stdin().is_terminal() {
        match RawModeGuard::enter() {
            Ok(guard) => return run_in_raw_mode(cpu, stop, guard),
            Err(e) => log::warn!("raw mode unavailable, reading stdin as a stream: {}", e),
        }
    }
    let mut console = StreamConsole::stdio(stop.clone());
    Ok(cpu.run(&mut console, stop)?)
}

/// Run with the terminal in raw mode; the guard restores it on every path out.
fn run_in_raw_mode(
    cpu: &mut Cpu,
    stop: &StopFlag,
    mut guard: RawModeGuard,
) -> Result<RunExit, AppError> {
    let mut console = TerminalConsole::new(stop.clone());

    let result = cpu.run(&mut console, stop);

    if let Err(e) = guard.restore() {
        log::error!("failed to restore terminal: {}", e);
    }
    Ok(result?)
}

fn dump_state(path: &Path, cpu: &Cpu) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(&cpu.snapshot())?;
    std::fs::write(path, json)?;
    Ok(())
}
