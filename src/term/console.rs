//! Console capability used by the CPU for keyboard and display I/O.

use std::collections::VecDeque;
use thiserror::Error;

/// Keyboard and display as seen by the emulated machine.
///
/// The CPU never touches the host terminal directly; every byte in or out
/// goes through an implementation of this trait.
pub trait Console {
    /// Report, without blocking, whether a key is waiting.
    fn poll_ready(&mut self) -> bool;

    /// Block until a key is available and return it.
    fn read_char(&mut self) -> Result<u8, ConsoleError>;

    /// Write raw bytes to the display.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ConsoleError>;

    /// Flush buffered display output.
    fn flush(&mut self) -> Result<(), ConsoleError>;

    /// Drain pending host events into the key queue.
    ///
    /// Called periodically by the run loop so that an interrupt key is
    /// noticed even when the program never reads the keyboard.
    fn pump(&mut self) {}
}

/// Errors raised by a console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted")]
    Interrupted,

    #[error("input closed")]
    InputClosed,
}

/// An in-memory console fed from a fixed input script.
///
/// Useful for tests and for running programs headless: keys come from
/// `input`, everything written lands in `output`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedConsole {
    /// Create a console that will deliver `input` one byte per read.
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for ScriptedConsole {
    fn poll_ready(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::InputClosed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_order() {
        let mut console = ScriptedConsole::new(b"ab");

        assert!(console.poll_ready());
        assert_eq!(console.read_char().unwrap(), b'a');
        assert_eq!(console.read_char().unwrap(), b'b');
        assert!(!console.poll_ready());
    }

    #[test]
    fn test_scripted_input_exhausted() {
        let mut console = ScriptedConsole::new(b"");
        assert!(matches!(console.read_char(), Err(ConsoleError::InputClosed)));
    }

    #[test]
    fn test_scripted_output() {
        let mut console = ScriptedConsole::default();
        console.write_bytes(b"hi").unwrap();
        console.write_bytes(b"!").unwrap();
        assert_eq!(console.output_string(), "hi!");
    }
}
