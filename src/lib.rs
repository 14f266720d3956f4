//! # LC-3 Emulator
//!
//! An emulator of the LC-3, the 16-bit computer used to teach machine
//! organization. It runs big-endian object images, services the standard
//! TRAP routines, and maps the keyboard registers onto the host terminal.

pub mod cpu;
pub mod image;
pub mod term;

// Re-export commonly used types
pub use cpu::{Cpu, CpuConfig, CpuError, CpuState, Memory, Registers, RunExit, Instruction};
pub use image::{disassemble, load_image, Image, ImageError};
pub use term::{Console, RawModeGuard, ScriptedConsole, StopFlag, StreamConsole, TerminalConsole};
