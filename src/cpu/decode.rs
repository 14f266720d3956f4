//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word with the opcode in bits 15..12.
//! The field extractors here are what the execution handlers use; the
//! [`Instruction`] enum is a decoded view for tracing and listings.

use serde::{Serialize, Deserialize};

/// Sign-extend the low `bit_count` bits of `value` to 16 bits.
///
/// If bit `bit_count - 1` is set, every bit above it is set too. Values
/// whose sign bit is clear are returned unchanged.
#[inline]
pub fn sign_extend(value: u16, bit_count: u32) -> u16 {
    debug_assert!((1..=16).contains(&bit_count));
    if (value >> (bit_count - 1)) & 1 != 0 {
        (value as u32 | (0xFFFF_u32 << bit_count)) as u16
    } else {
        value
    }
}

/// The sixteen opcodes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Br = 0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    Res,
    Lea,
    Trap,
}

impl Opcode {
    const ALL: [Opcode; 16] = [
        Opcode::Br, Opcode::Add, Opcode::Ld, Opcode::St,
        Opcode::Jsr, Opcode::And, Opcode::Ldr, Opcode::Str,
        Opcode::Rti, Opcode::Not, Opcode::Ldi, Opcode::Sti,
        Opcode::Jmp, Opcode::Res, Opcode::Lea, Opcode::Trap,
    ];

    /// The opcode of an instruction word. Total: every 4-bit value is an opcode.
    #[inline]
    pub fn of(instr: u16) -> Self {
        Self::ALL[opcode(instr)]
    }
}

// ==================== Field extraction ====================

/// Bits 15..12 as a table index.
#[inline]
pub fn opcode(instr: u16) -> usize {
    (instr >> 12) as usize
}

/// Bits 11..9: destination or source register of loads/stores/ALU ops.
#[inline]
pub fn dr(instr: u16) -> usize {
    ((instr >> 9) & 0x7) as usize
}

/// Bits 8..6: first source or base register.
#[inline]
pub fn sr1(instr: u16) -> usize {
    ((instr >> 6) & 0x7) as usize
}

/// Bits 2..0: second source register in register mode.
#[inline]
pub fn sr2(instr: u16) -> usize {
    (instr & 0x7) as usize
}

/// Bit 5: immediate mode for ADD/AND.
#[inline]
pub fn is_immediate(instr: u16) -> bool {
    (instr >> 5) & 1 != 0
}

/// Bit 11: PC-relative form of JSR.
#[inline]
pub fn is_jsr_relative(instr: u16) -> bool {
    (instr >> 11) & 1 != 0
}

/// Bits 11..9 as an `nzp` mask.
#[inline]
pub fn nzp(instr: u16) -> u16 {
    (instr >> 9) & 0x7
}

#[inline]
pub fn imm5(instr: u16) -> u16 {
    sign_extend(instr & 0x1F, 5)
}

#[inline]
pub fn offset6(instr: u16) -> u16 {
    sign_extend(instr & 0x3F, 6)
}

#[inline]
pub fn pc_offset9(instr: u16) -> u16 {
    sign_extend(instr & 0x1FF, 9)
}

#[inline]
pub fn pc_offset11(instr: u16) -> u16 {
    sign_extend(instr & 0x7FF, 11)
}

#[inline]
pub fn trap_vector(instr: u16) -> u8 {
    (instr & 0xFF) as u8
}

// ==================== Decoded view ====================

/// Second operand of ADD/AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Reg(u8),
    Imm(i16),
}

/// Decoded LC-3 instruction.
///
/// Offsets are already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Conditional branch: if COND & nzp then PC := PC + offset
    Br { n: bool, z: bool, p: bool, offset: i16 },

    /// DR := SR1 + operand
    Add { dr: u8, sr1: u8, operand: Operand },

    /// DR := SR1 & operand
    And { dr: u8, sr1: u8, operand: Operand },

    /// DR := !SR
    Not { dr: u8, sr: u8 },

    /// DR := mem[PC + offset]
    Ld { dr: u8, offset: i16 },

    /// DR := mem[mem[PC + offset]]
    Ldi { dr: u8, offset: i16 },

    /// DR := mem[BaseR + offset]
    Ldr { dr: u8, base: u8, offset: i16 },

    /// DR := PC + offset
    Lea { dr: u8, offset: i16 },

    /// mem[PC + offset] := SR
    St { sr: u8, offset: i16 },

    /// mem[mem[PC + offset]] := SR
    Sti { sr: u8, offset: i16 },

    /// mem[BaseR + offset] := SR
    Str { sr: u8, base: u8, offset: i16 },

    /// PC := BaseR (RET when BaseR is R7)
    Jmp { base: u8 },

    /// R7 := PC; PC := PC + offset
    Jsr { offset: i16 },

    /// R7 := PC; PC := BaseR
    Jsrr { base: u8 },

    /// R7 := PC; run trap routine
    Trap { vector: u8 },

    /// Return from interrupt (unused here)
    Rti,

    /// Reserved opcode
    Reserved,
}

/// Decode an instruction word. Every word decodes to something.
pub fn decode(instr: u16) -> Instruction {
    let dr = dr(instr) as u8;
    let sr1 = sr1(instr) as u8;
    let alu_operand = || {
        if is_immediate(instr) {
            Operand::Imm(imm5(instr) as i16)
        } else {
            Operand::Reg(sr2(instr) as u8)
        }
    };

    match Opcode::of(instr) {
        Opcode::Br => Instruction::Br {
            n: instr & 0x0800 != 0,
            z: instr & 0x0400 != 0,
            p: instr & 0x0200 != 0,
            offset: pc_offset9(instr) as i16,
        },
        Opcode::Add => Instruction::Add { dr, sr1, operand: alu_operand() },
        Opcode::And => Instruction::And { dr, sr1, operand: alu_operand() },
        Opcode::Not => Instruction::Not { dr, sr: sr1 },
        Opcode::Ld => Instruction::Ld { dr, offset: pc_offset9(instr) as i16 },
        Opcode::Ldi => Instruction::Ldi { dr, offset: pc_offset9(instr) as i16 },
        Opcode::Ldr => Instruction::Ldr { dr, base: sr1, offset: offset6(instr) as i16 },
        Opcode::Lea => Instruction::Lea { dr, offset: pc_offset9(instr) as i16 },
        Opcode::St => Instruction::St { sr: dr, offset: pc_offset9(instr) as i16 },
        Opcode::Sti => Instruction::Sti { sr: dr, offset: pc_offset9(instr) as i16 },
        Opcode::Str => Instruction::Str { sr: dr, base: sr1, offset: offset6(instr) as i16 },
        Opcode::Jmp => Instruction::Jmp { base: sr1 },
        Opcode::Jsr if is_jsr_relative(instr) => Instruction::Jsr {
            offset: pc_offset11(instr) as i16,
        },
        Opcode::Jsr => Instruction::Jsrr { base: sr1 },
        Opcode::Trap => Instruction::Trap { vector: trap_vector(instr) },
        Opcode::Rti => Instruction::Rti,
        Opcode::Res => Instruction::Reserved,
    }
}

/// Encode an instruction back to a word.
///
/// Offsets and immediates are truncated to their field widths.
pub fn encode(instr: &Instruction) -> u16 {
    fn op(code: Opcode) -> u16 {
        (code as u16) << 12
    }
    fn reg(r: u8, shift: u32) -> u16 {
        ((r & 0x7) as u16) << shift
    }
    fn field(value: i16, bits: u32) -> u16 {
        value as u16 & ((1 << bits) - 1)
    }
    fn alu(operand: &Operand) -> u16 {
        match *operand {
            Operand::Reg(r) => reg(r, 0),
            Operand::Imm(v) => 0x20 | field(v, 5),
        }
    }

    match instr {
        Instruction::Br { n, z, p, offset } => {
            op(Opcode::Br)
                | (*n as u16) << 11
                | (*z as u16) << 10
                | (*p as u16) << 9
                | field(*offset, 9)
        }
        Instruction::Add { dr, sr1, operand } => {
            op(Opcode::Add) | reg(*dr, 9) | reg(*sr1, 6) | alu(operand)
        }
        Instruction::And { dr, sr1, operand } => {
            op(Opcode::And) | reg(*dr, 9) | reg(*sr1, 6) | alu(operand)
        }
        Instruction::Not { dr, sr } => op(Opcode::Not) | reg(*dr, 9) | reg(*sr, 6) | 0x3F,
        Instruction::Ld { dr, offset } => op(Opcode::Ld) | reg(*dr, 9) | field(*offset, 9),
        Instruction::Ldi { dr, offset } => op(Opcode::Ldi) | reg(*dr, 9) | field(*offset, 9),
        Instruction::Ldr { dr, base, offset } => {
            op(Opcode::Ldr) | reg(*dr, 9) | reg(*base, 6) | field(*offset, 6)
        }
        Instruction::Lea { dr, offset } => op(Opcode::Lea) | reg(*dr, 9) | field(*offset, 9),
        Instruction::St { sr, offset } => op(Opcode::St) | reg(*sr, 9) | field(*offset, 9),
        Instruction::Sti { sr, offset } => op(Opcode::Sti) | reg(*sr, 9) | field(*offset, 9),
        Instruction::Str { sr, base, offset } => {
            op(Opcode::Str) | reg(*sr, 9) | reg(*base, 6) | field(*offset, 6)
        }
        Instruction::Jmp { base } => op(Opcode::Jmp) | reg(*base, 6),
        Instruction::Jsr { offset } => op(Opcode::Jsr) | 0x0800 | field(*offset, 11),
        Instruction::Jsrr { base } => op(Opcode::Jsr) | reg(*base, 6),
        Instruction::Trap { vector } => op(Opcode::Trap) | *vector as u16,
        Instruction::Rti => op(Opcode::Rti),
        Instruction::Reserved => op(Opcode::Res),
    }
}
