//! Program images.
//!
//! This module provides:
//! - The big-endian object image loader
//! - A disassembler for listings and instruction traces

pub mod disasm;
pub mod loader;

pub use disasm::{disassemble, disassemble_instruction};
pub use loader::{load_image, save_image, Image, ImageError};
