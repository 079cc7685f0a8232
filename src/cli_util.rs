use std::io::{self, IsTerminal, Write};

use nu_ansi_term::{Color, Style};

use crate::{EngineError, StepEvent};

/// Error label colour (Catppuccin Mocha red).
const ERROR_RED: Color = Color::Rgb(243, 139, 168);

/// Pretty-print an `EngineError` with caret positioning.
/// If `program` is `Some("bfvm")`, prefix messages with "bfvm: ..." for CLI run mode.
pub fn print_engine_error(program: Option<&str>, code: &str, err: &EngineError) {
    eprintln!("{}", render_error_header(program, err, io::stderr().is_terminal()));
    if let Some(ip) = err.ip() {
        print_context(code, ip);
    }
    let _ = io::stderr().flush();
}

/// First line of an error report: category label plus the error's message.
pub fn render_error_header(program: Option<&str>, err: &EngineError, styled: bool) -> String {
    let label = match err {
        EngineError::UnbalancedBrackets { .. } => "Parse error",
        EngineError::TapeBoundsExceeded { .. } | EngineError::InputExhausted { .. } => "Runtime error",
        EngineError::Io { .. } => "I/O error",
        EngineError::StepLimitExceeded { .. } | EngineError::Canceled => "Aborted",
    };
    let label = if styled {
        Style::new().fg(ERROR_RED).bold().paint(label).to_string()
    } else {
        label.to_string()
    };

    match program {
        Some(p) => format!("{p}: {label}: {err}"),
        None => format!("{label}: {err}"),
    }
}

fn print_context(code: &str, pos: usize) {
    let (slice, caret) = context_window(code, pos);
    eprintln!("  {slice}");
    eprintln!("  {caret}");
}

/// A short window of `code` around `pos` and a caret line pointing at it.
/// Works on chars so multi-byte text never splits.
pub fn context_window(code: &str, pos: usize) -> (String, String) {
    const WINDOW_CHARS: usize = 32;

    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let slice: String = code
        .chars()
        .skip(start_char)
        .take(pos - start_char + WINDOW_CHARS + 1)
        .collect();

    let mut underline = " ".repeat(pos - start_char);
    underline.push('^');
    (slice, underline)
}

pub fn debug_table_header() -> &'static str {
    "STEP | IP  | PTR | CELL | INSTR | ACTION\n\
     -----+-----+-----+------+-------+------------------------------------------------"
}

/// One row of the `--debug` step table.
pub fn debug_table_row(event: &StepEvent) -> String {
    format!(
        "{:<4} | {:<3} | {:<3} | {:<4} |  {}    | {}",
        event.step,
        event.ip,
        event.ptr_before,
        event.cell_before,
        event.instruction,
        describe_step(event)
    )
}

fn describe_step(e: &StepEvent) -> String {
    use crate::Instruction::*;

    match e.instruction {
        MoveRight | MoveLeft => format!("Moved pointer head to index {}", e.ptr_after),
        Increment => format!("Increment cell[{}] from {} to {}", e.ptr_before, e.cell_before, e.cell_after),
        Decrement => format!("Decrement cell[{}] from {} to {}", e.ptr_before, e.cell_before, e.cell_after),
        Output => format!("Output byte {} (suppressed in debug)", e.cell_after),
        Input => format!("Read byte from stdin -> {}", e.cell_after),
        LoopStart => match e.jump {
            Some(j) => format!("Cell is 0; jump forward to matching ']' at IP {j}"),
            None => "Enter loop (cell != 0)".to_string(),
        },
        LoopEnd => match e.jump {
            Some(j) => format!("Cell != 0; jump back to matching '[' at IP {j}"),
            None => "Exit loop (cell is 0)".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BracketKind, Instruction};

    #[test]
    fn caret_points_at_position() {
        let (slice, caret) = context_window("+++]", 3);
        assert_eq!(slice, "+++]");
        assert_eq!(caret, "   ^");
    }

    #[test]
    fn window_is_clipped_on_long_programs() {
        let code = "+".repeat(100);
        let (slice, caret) = context_window(&code, 50);
        assert_eq!(slice.len(), 65);
        assert_eq!(caret.len(), 33);
    }

    #[test]
    fn header_has_program_prefix_and_category() {
        let err = EngineError::UnbalancedBrackets { ip: 0, kind: BracketKind::Open };
        let header = render_error_header(Some("bfvm"), &err, false);
        assert_eq!(header, "bfvm: Parse error: unmatched bracket '[' at instruction 0");
    }

    #[test]
    fn debug_row_describes_move() {
        let event = StepEvent {
            step: 0,
            ip: 0,
            instruction: Instruction::MoveRight,
            ptr_before: 0,
            ptr_after: 1,
            cell_before: 0,
            cell_after: 0,
            jump: None,
        };
        assert!(debug_table_row(&event).contains("Moved pointer head to index 1"));
    }
}
