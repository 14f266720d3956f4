//! Console over plain byte streams.
//!
//! Used when standard input is not a terminal (a pipe, a file, `/dev/null`):
//! there is no raw mode to enter and no key events to read, so a reader
//! thread forwards input bytes over a channel and the CPU polls that.

use crate::term::console::{Console, ConsoleError};
use crate::term::interrupt::StopFlag;
use crate::term::terminal::READ_SLICE;
use std::io::{self, Read, Stdout, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;

/// Console reading keys from any byte stream and writing to any sink.
///
/// Output is passed through untouched; there is no raw mode to undo.
pub struct StreamConsole<W: Write> {
    keys: Receiver<u8>,
    pending: Option<u8>,
    out: W,
    stop: StopFlag,
}

impl StreamConsole<Stdout> {
    /// Console over the process's standard input and output.
    pub fn stdio(stop: StopFlag) -> Self {
        Self::new(io::stdin(), io::stdout(), stop)
    }
}

impl<W: Write> StreamConsole<W> {
    /// Start forwarding `input` on a background thread.
    pub fn new<R: Read + Send + 'static>(input: R, out: W, stop: StopFlag) -> Self {
        let (tx, keys) = mpsc::channel();
        thread::spawn(move || forward(input, tx));
        Self {
            keys,
            pending: None,
            out,
            stop,
        }
    }

    /// The output sink.
    pub fn writer(&self) -> &W {
        &self.out
    }
}

/// Reader thread body. Dropping `keys` at EOF is what the console sees as
/// closed input.
fn forward<R: Read>(mut input: R, keys: Sender<u8>) {
    let mut buf = [0u8; 256];
    loop {
        match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for &byte in &buf[..n] {
                    if keys.send(byte).is_err() {
                        // Console gone
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("input read failed: {}", e);
                break;
            }
        }
    }
    log::debug!("input stream closed");
}

impl<W: Write> Console for StreamConsole<W> {
    fn poll_ready(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.keys.try_recv().ok();
        }
        self.pending.is_some()
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        loop {
            if let Some(byte) = self.pending.take() {
                return Ok(byte);
            }
            if self.stop.is_requested() {
                return Err(ConsoleError::Interrupted);
            }
            match self.keys.recv_timeout(READ_SLICE) {
                Ok(byte) => return Ok(byte),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(ConsoleError::InputClosed),
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        self.out.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Instruction, Operand};
    use crate::cpu::{Cpu, RunExit, PC_START};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn console_over(input: &[u8]) -> StreamConsole<Vec<u8>> {
        StreamConsole::new(Cursor::new(input.to_vec()), Vec::new(), StopFlag::new())
    }

    fn program(instructions: &[Instruction]) -> Cpu {
        let words: Vec<u16> = instructions.iter().map(encode).collect();
        let mut cpu = Cpu::new();
        cpu.load_program(PC_START, &words).unwrap();
        cpu
    }

    #[test]
    fn test_bytes_arrive_in_order_then_close() {
        let mut console = console_over(b"ab");

        assert_eq!(console.read_char().unwrap(), b'a');
        assert_eq!(console.read_char().unwrap(), b'b');
        assert!(matches!(console.read_char(), Err(ConsoleError::InputClosed)));
    }

    #[test]
    fn test_poll_sees_piped_key() {
        let mut console = console_over(b"x");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !console.poll_ready() {
            assert!(Instant::now() < deadline, "key never became ready");
            thread::sleep(Duration::from_millis(1));
        }

        // Polling again must not lose the buffered key.
        assert!(console.poll_ready());
        assert_eq!(console.read_char().unwrap(), b'x');
    }

    #[test]
    fn test_empty_input_is_closed() {
        let mut console = console_over(b"");
        assert!(matches!(console.read_char(), Err(ConsoleError::InputClosed)));
        assert!(!console.poll_ready());
    }

    #[test]
    fn test_stop_request_interrupts_read() {
        let stop = StopFlag::new();
        let mut console = StreamConsole::new(io::empty(), Vec::new(), stop.clone());
        stop.request();

        assert!(matches!(console.read_char(), Err(ConsoleError::Interrupted)));
    }

    #[test]
    fn test_output_is_not_translated() {
        let mut console = console_over(b"");
        console.write_bytes(b"a\nb").unwrap();
        console.flush().unwrap();
        assert_eq!(console.writer(), b"a\nb");
    }

    #[test]
    fn test_program_halts_without_input() {
        let mut cpu = program(&[
            Instruction::And { dr: 0, sr1: 0, operand: Operand::Imm(0) },
            Instruction::Add { dr: 0, sr1: 0, operand: Operand::Imm(5) },
            Instruction::Trap { vector: 0x25 },
        ]);
        let mut console = console_over(b"");

        assert_eq!(cpu.run(&mut console, &StopFlag::new()).unwrap(), RunExit::Halted);
        assert_eq!(cpu.regs.gpr[0], 5);
        assert_eq!(console.writer(), b"HALT\n");
    }

    #[test]
    fn test_getc_reads_piped_byte() {
        // GETC; OUT; HALT
        let mut cpu = program(&[
            Instruction::Trap { vector: 0x20 },
            Instruction::Trap { vector: 0x21 },
            Instruction::Trap { vector: 0x25 },
        ]);
        let mut console = console_over(b"A\n");

        assert_eq!(cpu.run(&mut console, &StopFlag::new()).unwrap(), RunExit::Halted);
        assert_eq!(cpu.regs.gpr[0], b'A' as u16);
        assert_eq!(console.writer(), b"AHALT\n");
    }
}
