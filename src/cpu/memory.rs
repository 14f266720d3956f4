//! LC-3 memory subsystem.
//!
//! 65536 sixteen-bit words. Addresses are `u16`, so every access is in
//! range and arithmetic on addresses wraps at 16 bits.
//!
//! Two addresses are keyboard device registers. Plain [`Memory`] treats
//! them as ordinary storage; only [`DeviceBus`], which holds a console,
//! gives the status register its polling side effect.

use crate::term::Console;

/// The number of addressable words.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 set when a key is latched.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. Holds the last latched key.
pub const KBDR: u16 = 0xFE02;

/// Status value meaning "a key is ready".
const KBSR_READY: u16 = 0x8000;

/// Word-addressed read/write access.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u16;
    fn write(&mut self, addr: u16, value: u16);
}

/// Plain LC-3 storage.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a word. No device side effects.
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Copy `words` into memory starting at `origin`.
    pub fn load(&mut self, origin: u16, words: &[u16]) -> Result<(), MemoryError> {
        let start = origin as usize;
        let available = MEMORY_SIZE - start;
        if words.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: words.len(),
                available,
            });
        }

        self.cells[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// `count` words starting at `start`, wrapping past the top of memory.
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        (0..count.min(MEMORY_SIZE))
            .map(|i| {
                let addr = start.wrapping_add(i as u16);
                (addr, self.read(addr))
            })
            .collect()
    }
}

impl Bus for Memory {
    fn read(&mut self, addr: u16) -> u16 {
        Memory::read(self, addr)
    }

    fn write(&mut self, addr: u16, value: u16) {
        Memory::write(self, addr, value);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Memory with the keyboard registers wired to a console.
pub struct DeviceBus<'a, C: Console + ?Sized> {
    mem: &'a mut Memory,
    console: &'a mut C,
}

impl<'a, C: Console + ?Sized> DeviceBus<'a, C> {
    pub fn new(mem: &'a mut Memory, console: &'a mut C) -> Self {
        Self { mem, console }
    }

    /// Poll the keyboard and latch a pending key into KBDR.
    fn poll_keyboard(&mut self) {
        if !self.console.poll_ready() {
            self.mem.write(KBSR, 0);
            return;
        }

        match self.console.read_char() {
            Ok(key) => {
                self.mem.write(KBSR, KBSR_READY);
                self.mem.write(KBDR, key as u16);
            }
            Err(e) => {
                log::warn!("keyboard read failed after poll: {}", e);
                self.mem.write(KBSR, 0);
            }
        }
    }
}

impl<C: Console + ?Sized> Bus for DeviceBus<'_, C> {
    fn read(&mut self, addr: u16) -> u16 {
        if addr == KBSR {
            self.poll_keyboard();
        }
        self.mem.read(addr)
    }

    fn write(&mut self, addr: u16, value: u16) {
        self.mem.write(addr, value);
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::ScriptedConsole;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(0x3000, 0xBEEF);
        assert_eq!(mem.read(0x3000), 0xBEEF);
        assert_eq!(mem.read(0x3001), 0);
    }

    #[test]
    fn test_top_of_memory() {
        let mut mem = Memory::new();
        mem.write(0xFFFF, 7);
        assert_eq!(mem.read(0xFFFF), 7);
        assert_eq!(mem.dump(0xFFFF, 2), vec![(0xFFFF, 7), (0x0000, 0)]);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load(0x3000, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0x3000), 1);
        assert_eq!(mem.read(0x3001), 2);
        assert_eq!(mem.read(0x3002), 3);
    }

    #[test]
    fn test_load_fills_to_the_last_word() {
        let mut mem = Memory::new();
        assert!(mem.load(0xFFFE, &[1, 2]).is_ok());
        assert_eq!(
            mem.load(0xFFFE, &[1, 2, 3]),
            Err(MemoryError::ProgramTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_plain_memory_has_no_device_effects() {
        let mut mem = Memory::new();
        mem.write(KBSR, 0x1234);
        assert_eq!(Bus::read(&mut mem, KBSR), 0x1234);
    }

    #[test]
    fn test_status_read_latches_key() {
        let mut mem = Memory::new();
        let mut console = ScriptedConsole::new(b"x");
        let mut bus = DeviceBus::new(&mut mem, &mut console);

        assert_eq!(bus.read(KBSR), 0x8000);
        assert_eq!(bus.read(KBDR), b'x' as u16);

        // Nothing left: status clears, data keeps the last key.
        assert_eq!(bus.read(KBSR), 0);
        assert_eq!(bus.read(KBDR), b'x' as u16);
    }

    #[test]
    fn test_data_read_does_not_poll() {
        let mut mem = Memory::new();
        let mut console = ScriptedConsole::new(b"q");
        let mut bus = DeviceBus::new(&mut mem, &mut console);

        assert_eq!(bus.read(KBDR), 0);
        assert!(console.poll_ready());
    }
}
