use clap::Args;
use std::cell::Cell;
use std::{fs, thread};
use std::io::{self, Write};
use std::sync::{mpsc, Arc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use crate::cli_util::{debug_table_header, debug_table_row, print_engine_error};
use crate::config::{Overrides, Settings};
use crate::{match_brackets, Engine, EngineError, JumpTable, Program};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Print a step-by-step table of operations instead of program output
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Read the program from PATH
    #[arg(value_name = "FILE")]
    pub file: Option<String>,

    /// Inline program text instead of FILE (parts are concatenated; must come last)
    #[arg(short = 'e', long = "code", value_name = "CODE", num_args = 1.., allow_hyphen_values = true)]
    pub code: Vec<String>,

    /// Number of tape cells (fallback BF_TAPE_SIZE; default 30_000)
    #[arg(long = "tape-size", value_name = "N")]
    pub tape_size: Option<usize>,

    /// Maximum interpreter steps before abort (fallback BF_MAX_STEPS; default unlimited)
    #[arg(long = "max-steps", value_name = "N")]
    pub max_steps: Option<usize>,

    /// Wall-clock timeout in milliseconds (fallback BF_TIMEOUT_MS; default none)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let RunArgs {
        debug,
        file,
        code,
        tape_size,
        max_steps,
        timeout_ms,
        ..
    } = args;

    if file.is_none() && code.is_empty() {
        usage_and_exit(program, 2);
    }

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use FILE together with --code");
        usage_and_exit(program, 2);
    }

    let source = if let Some(path) = file {
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                eprintln!("{program}: failed to read {path}: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        }
    } else {
        code.join("")
    };

    let bf = Program::parse(&source);
    let listing = bf.to_string();
    let jumps = match match_brackets(&bf) {
        Ok(j) => j,
        Err(err) => {
            print_engine_error(Some(program), &listing, &err);
            return 1;
        }
    };

    let settings = Settings::resolve(Overrides { tape_size, max_steps, timeout_ms });

    // Execute on a worker thread with cooperative cancellation
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<Result<(), EngineError>>();
    let cancel_clone = cancel.clone();

    thread::spawn(move || {
        let res = execute(&bf, &jumps, settings, debug, cancel_clone);
        let _ = tx.send(res);
    });

    let outcome = match settings.timeout_ms {
        Some(ms) => match rx.recv_timeout(Duration::from_millis(ms)) {
            Ok(res) => Some(res),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => return 1,
        },
        None => match rx.recv() {
            Ok(res) => Some(res),
            Err(_) => return 1,
        },
    };

    match outcome {
        Some(Ok(())) => 0,
        Some(Err(EngineError::Canceled)) | None => {
            cancel.store(true, Ordering::Relaxed);
            eprintln!(
                "{program}: execution aborted: wall-clock timeout exceeded ({} ms)",
                settings.timeout_ms.unwrap_or_default()
            );
            let _ = io::stderr().flush();
            1
        }
        Some(Err(err)) => {
            print_engine_error(Some(program), &listing, &err);
            1
        }
    }
}

fn execute(
    bf: &Program,
    jumps: &JumpTable,
    settings: Settings,
    debug: bool,
    cancel: Arc<AtomicBool>,
) -> Result<(), EngineError> {
    let stop = cancel.clone();
    let engine = Engine::new(bf, jumps)
        .with_tape_size(settings.tape_size)
        .with_max_steps(settings.max_steps)
        .with_cancel_flag(cancel);

    let stdin = io::stdin().lock();
    let mut out = io::stdout().lock();
    if debug {
        // Program output is swallowed; the table is the output.
        if writeln!(out, "{}", debug_table_header()).is_err() {
            return Ok(());
        }
        // A closed stdout (e.g. `| head`) stops the run quietly
        let closed = Cell::new(false);
        let result = engine
            .with_observer(|event| {
                if !closed.get() && writeln!(out, "{}", debug_table_row(event)).is_err() {
                    closed.set(true);
                    stop.store(true, Ordering::Relaxed);
                }
            })
            .execute(stdin, io::sink());
        let _ = out.flush();
        match result {
            Err(EngineError::Canceled) if closed.get() => Ok(()),
            other => other.map(|_| ()),
        }
    } else {
        let result = engine.execute(stdin, &mut out);
        // Flush partial output too, so it lands before any error report
        let _ = out.flush();
        result.map(|_| ())
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] <FILE>
  {0} run [OPTIONS] --code "<code>"...

Options:
  --code,  -e <CODE>  Run CODE instead of reading FILE (parts are concatenated; put it last)
  --debug, -d         Print a step-by-step table of operations instead of program output
  --tape-size <N>     Number of tape cells (env BF_TAPE_SIZE; default 30000)
  --max-steps <N>     Abort after N instructions (env BF_MAX_STEPS; default unlimited)
  --timeout <MS>      Abort after MS milliseconds (env BF_TIMEOUT_MS; default none)
  --help,  -h         Show this help

Notes:
- Characters outside of ><+-.,[] are ignored.
- Input (`,`) reads a single byte from stdin; running out of input is an error.
- Limits may also be set under [engine] in $XDG_CONFIG_HOME/bfvm.toml.

Examples:
- Run a program file:
    {0} run ./program.bf
- Feed a file to `,`:
    {0} run --code ",[.,]" < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
