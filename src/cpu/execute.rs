//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle. Each opcode has one handler
//! in a 16-entry table indexed by the top four bits of the instruction.

use crate::cpu::decode::{self, Opcode};
use crate::cpu::memory::{Bus, DeviceBus, Memory, MemoryError};
use crate::cpu::registers::{Condition, Registers, R7};
use crate::term::{Console, ConsoleError, StopFlag};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Address where execution starts.
pub const PC_START: u16 = 0x3000;

/// How often, in instructions, the run loop lets the console drain host events.
const PUMP_INTERVAL: u64 = 4096;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has executed the HALT trap.
    Halted,
    /// CPU stopped on an unrecoverable error.
    Faulted,
}

/// Why [`Cpu::run`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Halted,
    /// A stop was requested by a signal or the interrupt key.
    Interrupted,
    /// The configured cycle limit was reached.
    CycleLimit,
}

/// Runtime options.
#[derive(Debug, Clone, Default)]
pub struct CpuConfig {
    /// Stop after this many instructions in total.
    pub max_cycles: Option<u64>,
    /// Treat an unknown trap vector as a fault instead of a warning.
    pub strict_traps: bool,
}

type Handler = fn(&mut Cpu, u16, &mut dyn Console) -> Result<(), CpuError>;

/// Opcode handlers, in encoding order.
const HANDLERS: [Handler; 16] = [
    Cpu::op_br,
    Cpu::op_add,
    Cpu::op_ld,
    Cpu::op_st,
    Cpu::op_jsr,
    Cpu::op_and,
    Cpu::op_ldr,
    Cpu::op_str,
    Cpu::op_unused,
    Cpu::op_not,
    Cpu::op_ldi,
    Cpu::op_sti,
    Cpu::op_jmp,
    Cpu::op_unused,
    Cpu::op_lea,
    Cpu::op_trap,
];

/// The LC-3 CPU.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed so far.
    pub cycles: u64,
    /// Runtime options.
    pub config: CpuConfig,
}

impl Cpu {
    /// Create a CPU with zeroed memory, PC at [`PC_START`] and COND = Z.
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let mut regs = Registers::new();
        regs.pc = PC_START;

        Self {
            regs,
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            config,
        }
    }

    /// Copy words into memory at `origin`.
    pub fn load_program(&mut self, origin: u16, words: &[u16]) -> Result<(), MemoryError> {
        self.mem.load(origin, words)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction word that was executed. On a console
    /// interrupt the PC is rewound so the instruction has not happened.
    pub fn step(&mut self, console: &mut dyn Console) -> Result<u16, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.advance_pc();
        let instr = DeviceBus::new(&mut self.mem, &mut *console).read(pc);
        log::trace!(
            "{:04X}: {:04X}  {}",
            pc,
            instr,
            crate::image::disasm::disassemble_instruction(instr)
        );

        let handler = HANDLERS[decode::opcode(instr)];
        match handler(self, instr, console) {
            Ok(()) => {
                self.cycles += 1;
                Ok(instr)
            }
            Err(CpuError::Console(ConsoleError::Interrupted)) => {
                self.regs.pc = pc;
                Err(CpuError::Console(ConsoleError::Interrupted))
            }
            Err(e) => {
                self.state = CpuState::Faulted;
                Err(e)
            }
        }
    }

    /// Run until halt, fault, a stop request, or the cycle limit.
    pub fn run(&mut self, console: &mut dyn Console, stop: &StopFlag) -> Result<RunExit, CpuError> {
        while self.state == CpuState::Running {
            if self.cycles % PUMP_INTERVAL == 0 {
                console.pump();
            }
            if stop.is_requested() {
                return Ok(RunExit::Interrupted);
            }
            if self.config.max_cycles.is_some_and(|limit| self.cycles >= limit) {
                return Ok(RunExit::CycleLimit);
            }

            match self.step(console) {
                Ok(_) => {}
                Err(CpuError::Console(ConsoleError::Interrupted)) => {
                    return Ok(RunExit::Interrupted);
                }
                Err(e) => return Err(e),
            }
        }

        match self.state {
            CpuState::Halted => Ok(RunExit::Halted),
            state => Err(CpuError::NotRunning(state)),
        }
    }

    /// Capture registers and execution state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.regs.clone(),
            state: self.state,
            cycles: self.cycles,
        }
    }

    // ==================== Handlers ====================

    fn op_br(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        if decode::nzp(instr) & self.regs.cond.bits() != 0 {
            self.regs.pc = self.regs.pc_relative(decode::pc_offset9(instr));
        }
        Ok(())
    }

    fn op_add(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        let lhs = self.regs.gpr[decode::sr1(instr)];
        let rhs = self.alu_operand(instr);
        self.regs.set_with_flags(decode::dr(instr), lhs.wrapping_add(rhs));
        Ok(())
    }

    fn op_and(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        let lhs = self.regs.gpr[decode::sr1(instr)];
        let rhs = self.alu_operand(instr);
        self.regs.set_with_flags(decode::dr(instr), lhs & rhs);
        Ok(())
    }

    fn op_not(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        let value = !self.regs.gpr[decode::sr1(instr)];
        self.regs.set_with_flags(decode::dr(instr), value);
        Ok(())
    }

    fn op_ld(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let addr = self.regs.pc_relative(decode::pc_offset9(instr));
        let value = DeviceBus::new(&mut self.mem, console).read(addr);
        self.regs.set_with_flags(decode::dr(instr), value);
        Ok(())
    }

    fn op_ldi(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let ptr = self.regs.pc_relative(decode::pc_offset9(instr));
        let mut bus = DeviceBus::new(&mut self.mem, console);
        let addr = bus.read(ptr);
        let value = bus.read(addr);
        self.regs.set_with_flags(decode::dr(instr), value);
        Ok(())
    }

    fn op_ldr(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let addr = self.base_plus_offset(instr);
        let value = DeviceBus::new(&mut self.mem, console).read(addr);
        self.regs.set_with_flags(decode::dr(instr), value);
        Ok(())
    }

    fn op_lea(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        let addr = self.regs.pc_relative(decode::pc_offset9(instr));
        self.regs.set_with_flags(decode::dr(instr), addr);
        Ok(())
    }

    fn op_st(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let addr = self.regs.pc_relative(decode::pc_offset9(instr));
        let value = self.regs.gpr[decode::dr(instr)];
        DeviceBus::new(&mut self.mem, console).write(addr, value);
        Ok(())
    }

    fn op_sti(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let ptr = self.regs.pc_relative(decode::pc_offset9(instr));
        let value = self.regs.gpr[decode::dr(instr)];
        let mut bus = DeviceBus::new(&mut self.mem, console);
        let addr = bus.read(ptr);
        bus.write(addr, value);
        Ok(())
    }

    fn op_str(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        let addr = self.base_plus_offset(instr);
        let value = self.regs.gpr[decode::dr(instr)];
        DeviceBus::new(&mut self.mem, console).write(addr, value);
        Ok(())
    }

    fn op_jmp(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        self.regs.pc = self.regs.gpr[decode::sr1(instr)];
        Ok(())
    }

    fn op_jsr(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        // Read the target before linking: JSRR R7 jumps to the old R7.
        let target = if decode::is_jsr_relative(instr) {
            self.regs.pc_relative(decode::pc_offset11(instr))
        } else {
            self.regs.gpr[decode::sr1(instr)]
        };
        self.regs.set(R7, self.regs.pc);
        self.regs.pc = target;
        Ok(())
    }

    fn op_trap(&mut self, instr: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        self.service_trap(decode::trap_vector(instr), console)
    }

    /// RTI and the reserved opcode do nothing.
    fn op_unused(&mut self, instr: u16, _console: &mut dyn Console) -> Result<(), CpuError> {
        log::debug!("ignoring {:?} instruction x{:04X}", Opcode::of(instr), instr);
        Ok(())
    }

    fn alu_operand(&self, instr: u16) -> u16 {
        if decode::is_immediate(instr) {
            decode::imm5(instr)
        } else {
            self.regs.gpr[decode::sr2(instr)]
        }
    }

    fn base_plus_offset(&self, instr: u16) -> u16 {
        self.regs.gpr[decode::sr1(instr)].wrapping_add(decode::offset6(instr))
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Current condition code.
    pub fn condition(&self) -> Condition {
        self.regs.cond
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Serializable view of the machine at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub regs: Registers,
    pub state: CpuState,
    pub cycles: u64,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("console error: {0}")]
    Console(#[from] ConsoleError),

    #[error("unknown trap vector x{vector:02X} at x{pc:04X}")]
    UnknownTrap { vector: u8, pc: u16 },
}
