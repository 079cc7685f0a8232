use std::io::{self, IsTerminal, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use std::{env, thread};
use reedline::{Signal, DefaultPrompt, DefaultPromptSegment, HistoryItem, Highlighter, StyledText};
use nu_ansi_term::{Color, Style};
use crate::config::Settings;
use crate::{cli_util, match_brackets, Engine, EngineError, Program};

pub fn repl_loop(settings: Settings) -> io::Result<()> {
    let mut editor = init_line_editor()?;

    loop {
        let Some(submission) = read_submission_interactive(&mut editor)? else {
            // EOF or editor closed. End the session cleanly to avoid hanging when stdin is closed
            println!();
            io::stdout().flush()?;
            return Ok(());
        };

        let program = Program::parse(&submission);
        if program.is_empty() {
            continue;
        }

        // Errors are already reported; the session keeps going.
        let _ = execute_program(&program, settings, io::stdin().lock(), &mut io::stdout().lock());

        // Test hook: if BF_REPL_ONCE=1, exit after one execution
        if env::var("BF_REPL_ONCE").ok().as_deref() == Some("1") {
            return Ok(());
        }
    }
}

fn init_line_editor() -> io::Result<reedline::Reedline> {
    use reedline::{
        default_emacs_keybindings, EditCommand, Emacs, KeyCode, KeyModifiers, Reedline, ReedlineEvent,
    };

    // Start from default emacs-like bindings and adjust:
    // - Enter -> InsertNewLine (do not submit)
    // - Ctrl+D -> Submit
    // - Ctrl+Z -> Submit (Windows)
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Edit(vec![EditCommand::InsertNewline]));
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('z'), ReedlineEvent::Submit);

    // Up/down move within the current multiline buffer; Alt/Ctrl + Up/Down walk history.
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Down, ReedlineEvent::NextHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Down, ReedlineEvent::NextHistory);

    let history = reedline::FileBackedHistory::new(1_000)
        .map_err(|e| io::Error::other(e.to_string()))?;

    let editor = Reedline::create()
        .with_highlighter(Box::new(ProgramHighlighter::new_catppuccin_mocha()))
        .with_history(Box::new(history))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    Ok(editor)
}

/// Collect all lines until EOF. `None` when nothing was read.
pub fn read_submission<R: io::BufRead>(stdin: &mut R) -> Option<String> {
    let mut buffer = String::new();

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.push_str(&line),
            Err(_) => return None,
        }
    }

    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}

fn read_submission_interactive(editor: &mut reedline::Reedline) -> io::Result<Option<String>> {
    let prompt = DefaultPrompt::new(DefaultPromptSegment::Basic("bfvm".to_string()), DefaultPromptSegment::Empty);

    match editor.read_line(&prompt) {
        Ok(Signal::Success(buffer)) => {
            // One history item per submitted program
            if !buffer.trim().is_empty() {
                let _ = editor.history_mut().save(HistoryItem::from_command_line(buffer.clone()));
            }
            Ok(Some(buffer))
        }
        // Ctrl+C / Ctrl+D end the session
        Ok(_) => Ok(None),
        Err(e) => {
            eprintln!("repl: editor error: {e}");
            let _ = io::stderr().flush();
            Ok(None)
        }
    }
}

/// Executes one submitted program with a fresh tape.
/// - Program output goes to `output`; `,` reads from `input`.
/// - Errors are printed concisely to stderr and handed back.
/// - A newline is always written after execution (success or error)
///   so that the prompt begins at column 0 on the next iteration.
/// - `settings.timeout_ms` arms a watchdog that cancels the run.
pub fn execute_program<R: Read, W: Write>(
    program: &Program,
    settings: Settings,
    input: R,
    output: &mut W,
) -> Result<(), EngineError> {
    let listing = program.to_string();
    let cancel = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = mpsc::channel::<()>();
    if let Some(ms) = settings.timeout_ms {
        let flag = cancel.clone();
        thread::spawn(move || {
            // Disconnected means the run finished first
            if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(Duration::from_millis(ms)) {
                flag.store(true, Ordering::Relaxed);
            }
        });
    }

    let result = match_brackets(program).and_then(|jumps| {
        Engine::new(program, &jumps)
            .with_tape_size(settings.tape_size)
            .with_max_steps(settings.max_steps)
            .with_cancel_flag(cancel)
            .execute(input, &mut *output)
            .map(|_| ())
    });
    drop(done_tx);

    match &result {
        Err(EngineError::Canceled) => {
            eprintln!(
                "execution aborted: wall-clock timeout exceeded ({} ms)",
                settings.timeout_ms.unwrap_or_default()
            );
            let _ = io::stderr().flush();
        }
        Err(err) => cli_util::print_engine_error(None, &listing, err),
        Ok(()) => {}
    }
    let _ = writeln!(output);
    let _ = output.flush();
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Bare,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlagOverride {
    None,
    Bare,
    Editor,
}

/// Determine mode: flags -> env -> auto-detect via is_terminal()
pub fn select_mode(flag: ModeFlagOverride) -> Result<ReplMode, String> {
    let stdin_is_tty = io::stdin().is_terminal();
    resolve_mode(flag, env::var("BF_REPL_MODE").ok().as_deref(), stdin_is_tty)
}

pub fn resolve_mode(flag: ModeFlagOverride, env_mode: Option<&str>, stdin_is_tty: bool) -> Result<ReplMode, String> {
    match flag {
        ModeFlagOverride::Bare => return Ok(ReplMode::Bare),
        ModeFlagOverride::Editor => {
            if !stdin_is_tty {
                return Err("cannot start editor: stdin is not a TTY (use --bare or BF_REPL_MODE=bare)".to_string());
            }
            return Ok(ReplMode::Editor);
        }
        ModeFlagOverride::None => {}
    }

    if let Some(val) = env_mode {
        let v = val.trim().to_ascii_lowercase();
        return match v.as_str() {
            "bare" => Ok(ReplMode::Bare),
            "editor" => {
                if !stdin_is_tty {
                    return Err("cannot start editor: stdin is not a TTY (use BF_REPL_MODE=bare)".to_string());
                }
                Ok(ReplMode::Editor)
            }
            _ => Err(format!("invalid BF_REPL_MODE value: {val}, must be 'bare' or 'editor'")),
        };
    }

    if stdin_is_tty {
        Ok(ReplMode::Editor)
    } else {
        Ok(ReplMode::Bare)
    }
}

/// Bare mode: read stdin until EOF and execute it once.
///
/// Stdin carries the program itself, so `,` sees an empty input source.
pub fn execute_bare_once(settings: Settings) -> Result<(), EngineError> {
    let mut locked = io::BufReader::new(io::stdin().lock());
    if let Some(s) = read_submission(&mut locked) {
        let program = Program::parse(&s);
        if !program.is_empty() {
            return execute_program(&program, settings, io::empty(), &mut io::stdout().lock());
        }
    }
    Ok(())
}

// Catppuccin Mocha accents
const SKY: Color = Color::Rgb(137, 220, 235);
const TEAL: Color = Color::Rgb(148, 226, 213);
const GREEN: Color = Color::Rgb(166, 227, 161);
const RED: Color = Color::Rgb(243, 139, 168);
const YELLOW: Color = Color::Rgb(249, 226, 175);
const PEACH: Color = Color::Rgb(250, 179, 135);
const MAUVE: Color = Color::Rgb(203, 166, 247);
const SURFACE2: Color = Color::Rgb(108, 112, 134);

#[derive(Default)]
struct ProgramHighlighter {
    map_plus: Style,
    map_minus: Style,
    map_lt: Style,
    map_gt: Style,
    map_dot: Style,
    map_comma: Style,
    map_bracket: Style,
    map_other: Style,
}

impl ProgramHighlighter {
    fn new_catppuccin_mocha() -> Self {
        // > <   => SKY/TEAL (movement)
        // + -   => GREEN/RED (data modification)
        // . ,   => YELLOW/PEACH (I/O)
        // [ ]   => MAUVE (flow control)
        Self {
            map_gt: Style::new().fg(SKY).bold(),
            map_lt: Style::new().fg(TEAL).bold(),
            map_plus: Style::new().fg(GREEN).bold(),
            map_minus: Style::new().fg(RED).bold(),
            map_dot: Style::new().fg(YELLOW).bold(),
            map_comma: Style::new().fg(PEACH).bold(),
            map_bracket: Style::new().fg(MAUVE).bold(),
            map_other: Style::new().fg(SURFACE2),
        }
    }

    #[inline]
    fn style_for(&self, ch: char) -> Style {
        use crate::Instruction::*;

        match crate::Instruction::from_char(ch) {
            Some(MoveRight) => self.map_gt,
            Some(MoveLeft) => self.map_lt,
            Some(Increment) => self.map_plus,
            Some(Decrement) => self.map_minus,
            Some(Output) => self.map_dot,
            Some(Input) => self.map_comma,
            Some(LoopStart) | Some(LoopEnd) => self.map_bracket,
            None => self.map_other,
        }
    }
}

impl Highlighter for ProgramHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut out: StyledText = StyledText::new();
        let mut current_style: Option<Style> = None;
        let mut buffer = String::new();

        for ch in line.chars() {
            let style = self.style_for(ch);

            match current_style {
                Some(s) if s == style => buffer.push(ch),
                Some(s) => {
                    out.push((s, std::mem::take(&mut buffer)));
                    current_style = Some(style);
                    buffer.push(ch);
                }
                None => {
                    current_style = Some(style);
                    buffer.push(ch);
                }
            }
        }

        if let Some(s) = current_style {
            if !buffer.is_empty() {
                out.push((s, buffer));
            }
        }
        out
    }
}
