//! A tiny virtual machine for the eight-instruction tape language.
//!
//! The crate is split the way a run flows:
//! - [`Program::parse`] filters source text down to `><+-.,[]`.
//! - [`match_brackets`] pairs every loop bracket, failing fast on imbalance.
//! - [`run`] (or a configured [`Engine`]) executes the program against any
//!   [`std::io::Read`] input and [`std::io::Write`] output.
//!
//! Behaviors:
//! - Memory tape of 30,000 8-bit cells by default, initialized to 0, wrapping
//!   on overflow.
//! - Strict pointer bounds: moving left from cell 0 or right past the end
//!   returns an error.
//! - Input `,` reads a single byte; end-of-input is an error rather than a
//!   silent zero.
//! - Output `.` writes the current cell as a single byte.
//!
//! Quick start:
//!
//! ```
//! use bfvm::{match_brackets, run, Program};
//!
//! let program = Program::parse("++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.");
//! let jumps = match_brackets(&program).expect("balanced");
//! let mut out = Vec::new();
//! run(&program, &jumps, std::io::empty(), &mut out).expect("program should run");
//! assert_eq!(out, b"Hello World!\n");
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod matcher;
pub mod repl;
pub mod tape;

pub use engine::{Engine, StepEvent, run};
pub use error::{BracketKind, EngineError};
pub use instruction::{Instruction, Program};
pub use matcher::{JumpTable, match_brackets};
pub use tape::Tape;
