//! Disassembler for LC-3 programs.
//!
//! Converts instruction words back to readable assembly.

use crate::cpu::decode::{decode, Instruction, Operand};
use crate::cpu::trap::TrapVector;

/// Disassemble a single instruction to text.
pub fn disassemble_instruction(word: u16) -> String {
    format_instruction(&decode(word))
}

/// Disassemble a program loaded at `origin`.
pub fn disassemble(origin: u16, words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str(&format!("; LC-3 disassembly, origin x{:04X}\n", origin));
    output.push_str("; ------------------------------\n\n");

    for (i, &word) in words.iter().enumerate() {
        let addr = origin.wrapping_add(i as u16);
        output.push_str(&format!(
            "x{:04X}: x{:04X}  {}\n",
            addr,
            word,
            disassemble_instruction(word)
        ));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Br { n, z, p, offset } => {
            if !(n || z || p) {
                return "NOP".to_string();
            }
            let mut flags = String::new();
            if n {
                flags.push('n');
            }
            if z {
                flags.push('z');
            }
            if p {
                flags.push('p');
            }
            format!("BR{} #{}", flags, offset)
        }

        // Operate
        Instruction::Add { dr, sr1, operand } => {
            format!("ADD R{}, R{}, {}", dr, sr1, format_operand(operand))
        }
        Instruction::And { dr, sr1, operand } => {
            format!("AND R{}, R{}, {}", dr, sr1, format_operand(operand))
        }
        Instruction::Not { dr, sr } => format!("NOT R{}, R{}", dr, sr),

        // Data movement
        Instruction::Ld { dr, offset } => format!("LD R{}, #{}", dr, offset),
        Instruction::Ldi { dr, offset } => format!("LDI R{}, #{}", dr, offset),
        Instruction::Ldr { dr, base, offset } => format!("LDR R{}, R{}, #{}", dr, base, offset),
        Instruction::Lea { dr, offset } => format!("LEA R{}, #{}", dr, offset),
        Instruction::St { sr, offset } => format!("ST R{}, #{}", sr, offset),
        Instruction::Sti { sr, offset } => format!("STI R{}, #{}", sr, offset),
        Instruction::Str { sr, base, offset } => format!("STR R{}, R{}, #{}", sr, base, offset),

        // Control
        Instruction::Jmp { base: 7 } => "RET".to_string(),
        Instruction::Jmp { base } => format!("JMP R{}", base),
        Instruction::Jsr { offset } => format!("JSR #{}", offset),
        Instruction::Jsrr { base } => format!("JSRR R{}", base),
        Instruction::Trap { vector } => match TrapVector::from_u8(vector) {
            Some(known) => known.name().to_string(),
            None => format!("TRAP x{:02X}", vector),
        },
        Instruction::Rti => "RTI".to_string(),
        Instruction::Reserved => "RESERVED".to_string(),
    }
}

fn format_operand(operand: Operand) -> String {
    match operand {
        Operand::Reg(r) => format!("R{}", r),
        Operand::Imm(v) => format!("#{}", v),
    }
}
