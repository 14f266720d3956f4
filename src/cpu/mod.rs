//! CPU emulation for the LC-3.
//!
//! This module implements the complete LC-3 architecture:
//! - 65536 sixteen-bit memory words with keyboard device registers
//! - 8 general registers, PC and an N/Z/P condition code
//! - 16 opcodes and the built-in TRAP routines

pub mod memory;
pub mod registers;
pub mod decode;
pub mod trap;
pub mod execute;

pub use memory::{Bus, DeviceBus, Memory, MemoryError};
pub use registers::{Condition, Registers};
pub use decode::{decode, sign_extend, Instruction, Opcode, Operand};
pub use trap::TrapVector;
pub use execute::{Cpu, CpuConfig, CpuError, CpuState, RunExit, Snapshot, PC_START};
