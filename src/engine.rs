//! The fetch-execute loop.
//!
//! An [`Engine`] borrows a [`Program`] and its [`JumpTable`], owns a fresh
//! [`Tape`] for the duration of one run, and walks the program until the
//! instruction pointer runs off the end.
//!
//! - `>`/`<` move the data pointer; leaving the tape is an error.
//! - `+`/`-` wrap at 8 bits.
//! - `.` writes the current cell as one byte; `,` reads exactly one byte and
//!   fails on end-of-input.
//! - `[` jumps past its partner when the cell is 0; `]` jumps back to just
//!   after its partner when the cell is not 0.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::tape::DEFAULT_TAPE_SIZE;
use crate::{BracketKind, EngineError, Instruction, JumpTable, Program, Tape};

/// What one retired instruction did. Handed to the observer after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub step: usize,
    pub ip: usize,
    pub instruction: Instruction,
    pub ptr_before: usize,
    pub ptr_after: usize,
    pub cell_before: u8,
    pub cell_after: u8,
    /// Target position when a loop bracket took its jump.
    pub jump: Option<usize>,
}

type Observer<'a> = Box<dyn FnMut(&StepEvent) + 'a>;

/// A configurable single run of a program.
pub struct Engine<'a> {
    program: &'a Program,
    jumps: &'a JumpTable,
    tape_size: usize,
    max_steps: Option<usize>,
    cancel_flag: Option<Arc<AtomicBool>>,
    observer: Option<Observer<'a>>,
}

impl<'a> Engine<'a> {
    pub fn new(program: &'a Program, jumps: &'a JumpTable) -> Self {
        Self {
            program,
            jumps,
            tape_size: DEFAULT_TAPE_SIZE,
            max_steps: None,
            cancel_flag: None,
            observer: None,
        }
    }

    pub fn with_tape_size(mut self, tape_size: usize) -> Self {
        self.tape_size = tape_size;
        self
    }

    /// Abort with [`EngineError::StepLimitExceeded`] once `limit` instructions have retired.
    pub fn with_max_steps(mut self, limit: Option<usize>) -> Self {
        self.max_steps = limit;
        self
    }

    /// Checked once per step; raising it aborts with [`EngineError::Canceled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&StepEvent) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Run the program to completion and hand back the final tape.
    pub fn execute<R: Read, W: Write>(
        mut self,
        mut input: R,
        mut output: W,
    ) -> Result<Tape, EngineError> {
        self.check_jumps()?;

        let program = self.program;
        let code_len = program.len();
        let mut tape = Tape::new(self.tape_size);
        let mut code_ptr = 0;
        let mut step: usize = 0;

        while let Some(instr) = program.get(code_ptr) {
            if let Some(flag) = self.cancel_flag.as_ref() {
                if flag.load(Ordering::Relaxed) {
                    return Err(EngineError::Canceled);
                }
            }
            if let Some(limit) = self.max_steps {
                if step >= limit {
                    return Err(EngineError::StepLimitExceeded { limit });
                }
            }

            let (ptr_before, cell_before) = (tape.pointer(), tape.get());
            let mut jump = None;

            match instr {
                Instruction::MoveRight => {
                    if !tape.move_right() {
                        return Err(self.out_of_bounds(code_ptr, &tape, instr));
                    }
                }
                Instruction::MoveLeft => {
                    if !tape.move_left() {
                        return Err(self.out_of_bounds(code_ptr, &tape, instr));
                    }
                }
                Instruction::Increment => tape.increment(),
                Instruction::Decrement => tape.decrement(),
                Instruction::Output => {
                    output
                        .write_all(&[tape.get()])
                        .map_err(|source| EngineError::Io { ip: code_ptr, source })?;
                }
                Instruction::Input => tape.set(read_byte(&mut input, code_ptr)?),
                Instruction::LoopStart => {
                    if tape.get() == 0 {
                        jump = Some(self.partner(code_ptr, BracketKind::Open)?);
                    }
                }
                Instruction::LoopEnd => {
                    if tape.get() != 0 {
                        jump = Some(self.partner(code_ptr, BracketKind::Close)?);
                    }
                }
            }

            if let Some(observer) = self.observer.as_mut() {
                observer(&StepEvent {
                    step,
                    ip: code_ptr,
                    instruction: instr,
                    ptr_before,
                    ptr_after: tape.pointer(),
                    cell_before,
                    cell_after: tape.get(),
                    jump,
                });
            }

            if let Some(target) = jump {
                code_ptr = target;
            }
            step += 1;
            code_ptr += 1;
        }

        output
            .flush()
            .map_err(|source| EngineError::Io { ip: code_len, source })?;
        Ok(tape)
    }

    /// Every bracket must have a partner of the opposite kind that points back.
    fn check_jumps(&self) -> Result<(), EngineError> {
        for (ip, instr) in self.program.instructions().iter().enumerate() {
            let (kind, partner_instr) = match instr {
                Instruction::LoopStart => (BracketKind::Open, Instruction::LoopEnd),
                Instruction::LoopEnd => (BracketKind::Close, Instruction::LoopStart),
                _ => continue,
            };
            let paired = self.jumps.get(ip).is_some_and(|q| {
                self.program.get(q) == Some(partner_instr) && self.jumps.get(q) == Some(ip)
            });
            if !paired {
                return Err(EngineError::UnbalancedBrackets { ip, kind });
            }
        }
        Ok(())
    }

    fn partner(&self, ip: usize, kind: BracketKind) -> Result<usize, EngineError> {
        self.jumps
            .get(ip)
            .ok_or(EngineError::UnbalancedBrackets { ip, kind })
    }

    fn out_of_bounds(&self, ip: usize, tape: &Tape, instruction: Instruction) -> EngineError {
        EngineError::TapeBoundsExceeded {
            ip,
            ptr: tape.pointer(),
            instruction,
        }
    }
}

/// Read exactly one byte, retrying interrupted reads.
fn read_byte<R: Read>(input: &mut R, ip: usize) -> Result<u8, EngineError> {
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Err(EngineError::InputExhausted { ip }),
            Ok(_) => return Ok(buf[0]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(EngineError::Io { ip, source }),
        }
    }
}

/// Run `program` with a default engine and discard the final tape.
pub fn run<R: Read, W: Write>(
    program: &Program,
    jumps: &JumpTable,
    input: R,
    output: W,
) -> Result<(), EngineError> {
    Engine::new(program, jumps).execute(input, output).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_brackets;
    use std::cell::RefCell;

    const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

    fn exec(code: &str, input: &[u8], tape_size: usize) -> (Result<Tape, EngineError>, Vec<u8>) {
        let program = Program::parse(code);
        let jumps = match_brackets(&program).expect("balanced program");
        let mut out = Vec::new();
        let result = Engine::new(&program, &jumps)
            .with_tape_size(tape_size)
            .execute(input, &mut out);
        (result, out)
    }

    #[test]
    fn empty_program_leaves_tape_untouched() {
        let (result, out) = exec("", b"", 10);
        let tape = result.unwrap();
        assert!(out.is_empty());
        assert_eq!(tape.pointer(), 0);
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn increments_then_outputs() {
        let (result, out) = exec("++.", b"", 10);
        assert!(result.is_ok());
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn loop_runs_until_cell_is_zero() {
        let (result, out) = exec("+[-]", b"", 10);
        let tape = result.unwrap();
        assert_eq!(tape.cells()[0], 0);
        assert!(out.is_empty());
    }

    #[test]
    fn echoes_input_byte() {
        let (result, out) = exec(",.", b"A", 10);
        assert!(result.is_ok());
        assert_eq!(out, b"A");
    }

    #[test]
    fn output_reads_origin_after_moving_back() {
        let (result, out) = exec(">+<.", b"", 10);
        let tape = result.unwrap();
        assert_eq!(out, vec![0]);
        assert_eq!(tape.cells()[1], 1);
    }

    #[test]
    fn empty_loop_on_zero_cell_is_skipped() {
        let (result, _) = exec("[]", b"", 10);
        assert!(result.is_ok());
    }

    #[test]
    fn nested_loops_print_hello_world() {
        let (result, out) = exec(HELLO_WORLD, b"", 30_000);
        assert!(result.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "Hello World!\n");
    }

    #[test]
    fn same_input_gives_same_output() {
        let code = ",[.,]";
        let (_, first) = exec(code, b"abc", 10);
        let (_, second) = exec(code, b"abc", 10);
        assert_eq!(first, second);
    }

    #[test]
    fn wrapping_subtraction() {
        let (result, _) = exec("-", b"", 1);
        assert_eq!(result.unwrap().cells()[0], 255);
    }

    #[test]
    fn wrapping_addition() {
        let code = "+".repeat(256);
        let (result, _) = exec(&code, b"", 1);
        assert_eq!(result.unwrap().cells()[0], 0);
    }

    #[test]
    fn left_of_origin_is_out_of_bounds() {
        let (result, _) = exec("<", b"", 10);
        assert!(matches!(
            result,
            Err(EngineError::TapeBoundsExceeded { ip: 0, ptr: 0, instruction: Instruction::MoveLeft })
        ));
    }

    #[test]
    fn right_past_last_cell_is_out_of_bounds() {
        // With 3 cells (0..=2), the 3rd '>' attempts to move beyond index 2.
        let (result, _) = exec(&">".repeat(3), b"", 3);
        assert!(matches!(
            result,
            Err(EngineError::TapeBoundsExceeded { ip: 2, ptr: 2, instruction: Instruction::MoveRight })
        ));
    }

    #[test]
    fn input_at_eof_is_an_error() {
        let (result, _) = exec("+,", b"", 10);
        assert!(matches!(result, Err(EngineError::InputExhausted { ip: 1 })));
    }

    #[test]
    fn failing_sink_surfaces_io_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let program = Program::parse("+.");
        let jumps = match_brackets(&program).unwrap();
        let result = run(&program, &jumps, io::empty(), Broken);
        assert!(matches!(result, Err(EngineError::Io { ip: 1, .. })));
    }

    #[test]
    fn interrupted_read_is_retried() {
        struct InterruptOnce {
            interrupted: bool,
        }
        impl Read for InterruptOnce {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                buf[0] = b'k';
                Ok(1)
            }
        }

        let program = Program::parse(",");
        let jumps = match_brackets(&program).unwrap();
        let tape = Engine::new(&program, &jumps)
            .execute(InterruptOnce { interrupted: false }, io::sink())
            .unwrap();
        assert_eq!(tape.cells()[0], b'k');
    }

    #[test]
    fn failing_source_surfaces_io_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device gone"))
            }
        }

        let program = Program::parse("+>,");
        let jumps = match_brackets(&program).unwrap();
        let result = run(&program, &jumps, Broken, io::sink());
        match result {
            Err(EngineError::Io { ip, source }) => {
                assert_eq!(ip, 2);
                assert_eq!(source.kind(), io::ErrorKind::Other);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_jump_table_is_rejected_before_running() {
        let program = Program::parse("+.[-]");
        let mut out = Vec::new();
        let result = run(&program, &JumpTable::default(), io::empty(), &mut out);
        assert!(matches!(
            result,
            Err(EngineError::UnbalancedBrackets { ip: 2, kind: BracketKind::Open })
        ));
        assert!(out.is_empty(), "nothing should run before validation fails");
    }

    #[test]
    fn step_limit_stops_infinite_loop() {
        let program = Program::parse("+[]");
        let jumps = match_brackets(&program).unwrap();
        let result = Engine::new(&program, &jumps)
            .with_max_steps(Some(50))
            .execute(io::empty(), io::sink());
        assert!(matches!(result, Err(EngineError::StepLimitExceeded { limit: 50 })));
    }

    #[test]
    fn raised_cancel_flag_aborts() {
        let program = Program::parse("+[]");
        let jumps = match_brackets(&program).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let result = Engine::new(&program, &jumps)
            .with_cancel_flag(flag)
            .execute(io::empty(), io::sink());
        assert!(matches!(result, Err(EngineError::Canceled)));
    }

    #[test]
    fn observer_sees_every_step() {
        let program = Program::parse("+[-]");
        let jumps = match_brackets(&program).unwrap();
        let events = RefCell::new(Vec::new());
        Engine::new(&program, &jumps)
            .with_observer(|e| events.borrow_mut().push(*e))
            .execute(io::empty(), io::sink())
            .unwrap();

        let events = events.into_inner();
        // '+', '[', '-', ']'
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].cell_after, 1);
        assert_eq!(events[1].jump, None);
        assert_eq!(events[2].cell_before, 1);
        assert_eq!(events[2].cell_after, 0);
        assert_eq!(events[3].instruction, Instruction::LoopEnd);
        assert_eq!(events[3].jump, None);
        assert!(events.iter().enumerate().all(|(i, e)| e.step == i));
    }

    #[test]
    fn observer_reports_taken_jumps() {
        let program = Program::parse("[-]");
        let jumps = match_brackets(&program).unwrap();
        let events = RefCell::new(Vec::new());
        Engine::new(&program, &jumps)
            .with_observer(|e| events.borrow_mut().push(*e))
            .execute(io::empty(), io::sink())
            .unwrap();

        let events = events.into_inner();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].jump, Some(2));
    }
}
