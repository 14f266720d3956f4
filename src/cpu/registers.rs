//! LC-3 register file.
//!
//! The LC-3 has:
//! - R0..R7: eight 16-bit general purpose registers
//! - PC: 16-bit program counter
//! - COND: condition code, exactly one of N, Z, P

use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const GPR_COUNT: usize = 8;

/// Slot index of the program counter in [`Registers::get`] / [`Registers::set`].
pub const PC: usize = 8;

/// Subroutine link register.
pub const R7: usize = 7;

/// Condition code.
///
/// The discriminants match the `n`, `z`, `p` bit positions in a BR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Positive = 0b001,
    Zero = 0b010,
    Negative = 0b100,
}

impl Condition {
    /// Classify a 16-bit value by its two's-complement sign.
    pub fn of(value: u16) -> Self {
        match value {
            0 => Condition::Zero,
            v if v & 0x8000 != 0 => Condition::Negative,
            _ => Condition::Positive,
        }
    }

    /// The condition as an `nzp` mask.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0..R7
    pub gpr: [u16; GPR_COUNT],

    /// Program counter
    pub pc: u16,

    /// Condition code, recomputed on every register-writing instruction
    pub cond: Condition,
}

impl Registers {
    /// Create a register file with everything zeroed and COND = Z.
    pub fn new() -> Self {
        Self {
            gpr: [0; GPR_COUNT],
            pc: 0,
            cond: Condition::Zero,
        }
    }

    /// Read slot `index`: 0..=7 are R0..R7, 8 is the PC.
    ///
    /// # Panics
    /// Panics if `index` is greater than 8.
    #[inline]
    pub fn get(&self, index: usize) -> u16 {
        match index {
            PC => self.pc,
            r => self.gpr[r],
        }
    }

    /// Write slot `index`: 0..=7 are R0..R7, 8 is the PC.
    ///
    /// # Panics
    /// Panics if `index` is greater than 8.
    #[inline]
    pub fn set(&mut self, index: usize, value: u16) {
        match index {
            PC => self.pc = value,
            r => self.gpr[r] = value,
        }
    }

    /// Recompute COND from the value in register `index`.
    pub fn update_flags(&mut self, index: usize) {
        self.cond = Condition::of(self.get(index));
    }

    /// Write a general register and recompute COND from it.
    pub fn set_with_flags(&mut self, index: usize, value: u16) {
        self.set(index, value);
        self.update_flags(index);
    }

    /// Increment the program counter by 1, wrapping at 16 bits.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// PC plus a sign-extended offset, wrapping at 16 bits.
    #[inline]
    pub fn pc_relative(&self, offset: u16) -> u16 {
        self.pc.wrapping_add(offset)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_starts_zero() {
        let regs = Registers::new();
        assert_eq!(regs.gpr, [0; 8]);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.cond, Condition::Zero);
    }

    #[test]
    fn test_pc_slot() {
        let mut regs = Registers::new();
        regs.set(PC, 0x3000);
        assert_eq!(regs.pc, 0x3000);
        assert_eq!(regs.get(PC), 0x3000);
    }

    #[test]
    fn test_flags_for_boundary_values() {
        let cases = [
            (0x0000, Condition::Zero),
            (0x0001, Condition::Positive),
            (0x7FFF, Condition::Positive),
            (0x8000, Condition::Negative),
            (0xFFFF, Condition::Negative),
        ];

        let mut regs = Registers::new();
        for (value, expected) in cases {
            regs.set_with_flags(3, value);
            assert_eq!(regs.cond, expected, "value {:#06x}", value);
        }
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFFFF;

        let old = regs.advance_pc();
        assert_eq!(old, 0xFFFF);
        assert_eq!(regs.pc, 0x0000);
    }

    #[test]
    fn test_pc_relative_negative_offset() {
        let mut regs = Registers::new();
        regs.pc = 0x3001;
        assert_eq!(regs.pc_relative(0xFFFF), 0x3000);
    }

    proptest! {
        #[test]
        fn prop_exactly_one_flag(value in any::<u16>()) {
            let mut regs = Registers::new();
            regs.set_with_flags(0, value);

            let bits = regs.cond.bits();
            prop_assert_eq!(bits.count_ones(), 1);
            prop_assert_eq!(regs.cond == Condition::Zero, value == 0);
            prop_assert_eq!(regs.cond == Condition::Negative, value & 0x8000 != 0);
        }
    }
}
