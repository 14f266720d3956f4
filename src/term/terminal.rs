//! Host terminal access through crossterm.

use crate::term::console::{Console, ConsoleError};
use crate::term::interrupt::StopFlag;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::Duration;

/// How long a blocking read waits between checks of the stop flag.
pub(crate) const READ_SLICE: Duration = Duration::from_millis(50);

/// Raw mode held for the lifetime of the guard.
///
/// Dropping the guard restores the saved terminal settings, so every exit
/// path that unwinds through the owner leaves the terminal usable.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Disable line buffering and echo on the controlling terminal.
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        log::debug!("terminal raw mode enabled");
        Ok(Self { active: true })
    }

    /// Reapply the saved settings. Safe to call more than once.
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        log::debug!("terminal restored");
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            eprintln!("failed to restore terminal: {}", e);
        }
    }
}

/// Console backed by the real terminal. Expects raw mode to be held.
pub struct TerminalConsole {
    out: Stdout,
    pending: VecDeque<u8>,
    stop: StopFlag,
}

impl TerminalConsole {
    pub fn new(stop: StopFlag) -> Self {
        Self {
            out: io::stdout(),
            pending: VecDeque::new(),
            stop,
        }
    }

    /// Turn a host event into a key byte, or record an interrupt request.
    fn accept(&mut self, ev: Event) -> Option<u8> {
        let Event::Key(key) = ev else { return None };
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if is_interrupt(&key) {
            log::debug!("interrupt key received");
            self.stop.request();
            return None;
        }
        key_to_byte(&key)
    }

    /// Move every event that is ready right now into the queue.
    fn drain(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let ev = event::read()?;
            if let Some(byte) = self.accept(ev) {
                self.pending.push_back(byte);
            }
        }
        Ok(())
    }
}

impl Console for TerminalConsole {
    fn poll_ready(&mut self) -> bool {
        if self.pending.is_empty() {
            if let Err(e) = self.drain() {
                log::warn!("keyboard poll failed: {}", e);
            }
        }
        !self.pending.is_empty()
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            if self.stop.is_requested() {
                return Err(ConsoleError::Interrupted);
            }
            if event::poll(READ_SLICE)? {
                let ev = event::read()?;
                if let Some(byte) = self.accept(ev) {
                    return Ok(byte);
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        // Raw mode turns off output post-processing, so LF needs its CR.
        for chunk in bytes.split_inclusive(|&b| b == b'\n') {
            match chunk.split_last() {
                Some((b'\n', body)) => {
                    self.out.write_all(body)?;
                    self.out.write_all(b"\r\n")?;
                }
                _ => self.out.write_all(chunk)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.out.flush()?;
        Ok(())
    }

    fn pump(&mut self) {
        if let Err(e) = self.drain() {
            log::warn!("keyboard poll failed: {}", e);
        }
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// Map a key press to the ASCII byte the machine sees.
pub fn key_to_byte(key: &KeyEvent) -> Option<u8> {
    match key.code {
        KeyCode::Char(c) if c.is_ascii() => {
            if key.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                Some(c.to_ascii_uppercase() as u8 & 0x1F)
            } else {
                Some(c as u8)
            }
        }
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x7F),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_printable_keys() {
        assert_eq!(key_to_byte(&key(KeyCode::Char('a'), KeyModifiers::NONE)), Some(b'a'));
        assert_eq!(key_to_byte(&key(KeyCode::Char('Z'), KeyModifiers::SHIFT)), Some(b'Z'));
        assert_eq!(key_to_byte(&key(KeyCode::Char(' '), KeyModifiers::NONE)), Some(b' '));
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(key_to_byte(&key(KeyCode::Enter, KeyModifiers::NONE)), Some(0x0A));
        assert_eq!(key_to_byte(&key(KeyCode::Tab, KeyModifiers::NONE)), Some(0x09));
        assert_eq!(key_to_byte(&key(KeyCode::Backspace, KeyModifiers::NONE)), Some(0x7F));
        assert_eq!(key_to_byte(&key(KeyCode::Esc, KeyModifiers::NONE)), Some(0x1B));
        assert_eq!(key_to_byte(&key(KeyCode::Left, KeyModifiers::NONE)), None);
        assert_eq!(key_to_byte(&key(KeyCode::Char('é'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(key_to_byte(&key(KeyCode::Char('d'), KeyModifiers::CONTROL)), Some(0x04));
        assert!(is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_restore_inactive_guard() {
        // Never entered raw mode, so restore must not touch the terminal.
        let mut guard = RawModeGuard { active: false };
        assert!(guard.restore().is_ok());
        assert!(guard.restore().is_ok());
        assert!(!guard.active);
    }
}
