//! TRAP service routines.
//!
//! The LC-3 operating system normally implements these in machine code;
//! here they are built into the emulator and talk to the [`Console`].

use crate::cpu::execute::{Cpu, CpuError, CpuState};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::R7;
use crate::term::Console;

/// Prompt printed by the IN routine.
pub const IN_PROMPT: &[u8] = b"Enter a character: ";

/// Notice printed by the HALT routine.
pub const HALT_NOTICE: &[u8] = b"HALT\n";

/// Built-in trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapVector {
    /// Read a key into R0, no echo
    Getc = 0x20,
    /// Write the low byte of R0
    Out = 0x21,
    /// Write a string of one character per word at [R0]
    Puts = 0x22,
    /// Prompt, read and echo a key into R0
    In = 0x23,
    /// Write a string of two characters per word at [R0]
    Putsp = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TrapVector {
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }

    /// Assembler mnemonic for the vector.
    pub fn name(self) -> &'static str {
        match self {
            TrapVector::Getc => "GETC",
            TrapVector::Out => "OUT",
            TrapVector::Puts => "PUTS",
            TrapVector::In => "IN",
            TrapVector::Putsp => "PUTSP",
            TrapVector::Halt => "HALT",
        }
    }
}

impl Cpu {
    /// Run the routine for `vector`, then link R7 to the return address.
    ///
    /// R7 is written last so an interrupted read leaves registers untouched.
    pub(crate) fn service_trap(
        &mut self,
        vector: u8,
        console: &mut dyn Console,
    ) -> Result<(), CpuError> {
        let return_addr = self.regs.pc;

        match TrapVector::from_u8(vector) {
            Some(TrapVector::Getc) => {
                let key = console.read_char()?;
                self.regs.set_with_flags(0, key as u16);
            }
            Some(TrapVector::Out) => {
                let byte = self.regs.gpr[0] as u8;
                console.write_bytes(&[byte])?;
                console.flush()?;
            }
            Some(TrapVector::Puts) => {
                let text = self.collect_string(|word, out| out.push(word as u8));
                console.write_bytes(&text)?;
                console.flush()?;
            }
            Some(TrapVector::In) => {
                console.write_bytes(IN_PROMPT)?;
                console.flush()?;
                let key = console.read_char()?;
                console.write_bytes(&[key])?;
                console.flush()?;
                self.regs.set_with_flags(0, key as u16);
            }
            Some(TrapVector::Putsp) => {
                let text = self.collect_string(|word, out| {
                    out.push((word & 0xFF) as u8);
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        out.push(high);
                    }
                });
                console.write_bytes(&text)?;
                console.flush()?;
            }
            Some(TrapVector::Halt) => {
                console.write_bytes(HALT_NOTICE)?;
                console.flush()?;
                self.state = CpuState::Halted;
                log::debug!("halted after {} cycles", self.cycles + 1);
            }
            None if self.config.strict_traps => {
                return Err(CpuError::UnknownTrap {
                    vector,
                    pc: return_addr.wrapping_sub(1),
                });
            }
            None => {
                log::warn!(
                    "unknown trap vector x{:02X} at x{:04X}, ignoring",
                    vector,
                    return_addr.wrapping_sub(1)
                );
            }
        }

        self.regs.set(R7, return_addr);
        Ok(())
    }

    /// Walk memory from the address in R0 up to a zero word.
    ///
    /// Reads plain storage, so device registers inside the string are not polled.
    fn collect_string(&self, mut unpack: impl FnMut(u16, &mut Vec<u8>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut addr = self.regs.gpr[0];

        for _ in 0..MEMORY_SIZE {
            let word = self.mem.read(addr);
            if word == 0 {
                break;
            }
            unpack(word, &mut out);
            addr = addr.wrapping_add(1);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{ConsoleError, ScriptedConsole};

    fn cpu_with_string(addr: u16, words: &[u16]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.mem.load(addr, words).unwrap();
        cpu.regs.gpr[0] = addr;
        cpu
    }

    #[test]
    fn test_vector_names() {
        assert_eq!(TrapVector::from_u8(0x25), Some(TrapVector::Halt));
        assert_eq!(TrapVector::from_u8(0x26), None);
        assert_eq!(TrapVector::Putsp.name(), "PUTSP");
    }

    #[test]
    fn test_puts_stops_at_zero() {
        let mut cpu = cpu_with_string(0x4000, &[b'h' as u16, b'i' as u16, 0, b'x' as u16]);
        let mut console = ScriptedConsole::default();

        cpu.service_trap(0x22, &mut console).unwrap();

        assert_eq!(console.output(), b"hi");
    }

    #[test]
    fn test_putsp_packs_two_per_word() {
        // "abc": 'a' | 'b' << 8, then 'c' with a zero high byte.
        let words = [(b'b' as u16) << 8 | b'a' as u16, b'c' as u16, 0];
        let mut cpu = cpu_with_string(0x4000, &words);
        let mut console = ScriptedConsole::default();

        cpu.service_trap(0x24, &mut console).unwrap();

        assert_eq!(console.output(), b"abc");
    }

    #[test]
    fn test_out_writes_low_byte() {
        let mut cpu = Cpu::new();
        cpu.regs.gpr[0] = 0x1241; // low byte 'A'
        let mut console = ScriptedConsole::default();

        cpu.service_trap(0x21, &mut console).unwrap();

        assert_eq!(console.output(), b"A");
    }

    #[test]
    fn test_getc_sets_r0_and_flags() {
        let mut cpu = Cpu::new();
        cpu.regs.pc = 0x3001;
        let mut console = ScriptedConsole::new(b"k");

        cpu.service_trap(0x20, &mut console).unwrap();

        assert_eq!(cpu.regs.gpr[0], b'k' as u16);
        assert_eq!(cpu.regs.gpr[7], 0x3001);
        assert!(console.output().is_empty());
    }

    #[test]
    fn test_in_prompts_and_echoes() {
        let mut cpu = Cpu::new();
        let mut console = ScriptedConsole::new(b"z");

        cpu.service_trap(0x23, &mut console).unwrap();

        assert_eq!(cpu.regs.gpr[0], b'z' as u16);
        assert_eq!(console.output_string(), "Enter a character: z");
    }

    #[test]
    fn test_failed_read_leaves_r7() {
        let mut cpu = Cpu::new();
        cpu.regs.pc = 0x3001;
        cpu.regs.gpr[7] = 0x1234;
        let mut console = ScriptedConsole::new(b"");

        let err = cpu.service_trap(0x20, &mut console).unwrap_err();

        assert!(matches!(err, CpuError::Console(ConsoleError::InputClosed)));
        assert_eq!(cpu.regs.gpr[7], 0x1234);
    }

    #[test]
    fn test_unknown_vector_is_ignored_by_default() {
        let mut cpu = Cpu::new();
        let mut console = ScriptedConsole::default();

        assert!(cpu.service_trap(0x7F, &mut console).is_ok());
        assert_eq!(cpu.state, CpuState::Running);
    }

    #[test]
    fn test_unknown_vector_faults_when_strict() {
        let mut cpu = Cpu::new();
        cpu.config.strict_traps = true;
        cpu.regs.pc = 0x3001;
        let mut console = ScriptedConsole::default();

        let err = cpu.service_trap(0x7F, &mut console).unwrap_err();

        assert!(matches!(err, CpuError::UnknownTrap { vector: 0x7F, pc: 0x3000 }));
    }
}
