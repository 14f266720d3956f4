//! Host terminal handling.
//!
//! This module provides:
//! - The `Console` trait the CPU uses for keyboard and display
//! - A raw-mode guard and terminal console built on crossterm
//! - A stream console for when standard input is not a terminal
//! - A stop flag shared with the host signal handler

pub mod console;
pub mod interrupt;
pub mod stream;
pub mod terminal;

pub use console::{Console, ConsoleError, ScriptedConsole};
pub use interrupt::StopFlag;
pub use stream::StreamConsole;
pub use terminal::{RawModeGuard, TerminalConsole};
