use std::io::{self, IsTerminal, Write};
use clap::Args;

use crate::config::{Overrides, Settings};
use crate::repl::{execute_bare_once, repl_loop, select_mode, ReplMode, ModeFlagOverride};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct ReplArgs {
    /// Read all of stdin as one program, run it, and exit
    #[arg(long = "bare", conflicts_with = "editor")]
    pub bare: bool,

    /// Line editor session (errors if stdin is not a TTY)
    #[arg(long = "editor", conflicts_with = "bare")]
    pub editor: bool,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

impl ReplArgs {
    pub fn mode_flag(&self) -> ModeFlagOverride {
        match (self.bare, self.editor) {
            (true, _) => ModeFlagOverride::Bare,
            (_, true) => ModeFlagOverride::Editor,
            _ => ModeFlagOverride::None,
        }
    }
}

pub fn run(program: &str, args: ReplArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let mode = match select_mode(args.mode_flag()) {
        Ok(m) => m,
        Err(msg) => {
            eprintln!("{program}: {msg}");
            let _ = io::stderr().flush();
            return 1;
        }
    };

    // Ctrl+C ends the whole session, even mid-run
    if let Err(e) = ctrlc::set_handler(|| {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        std::process::exit(0);
    }) {
        eprintln!("{program}: failed to set ctrl+c handler: {e}");
        let _ = io::stderr().flush();
        return 1;
    }

    let settings = Settings::resolve(Overrides::default());

    match mode {
        ReplMode::Editor => {
            if io::stderr().is_terminal() {
                eprintln!("bfvm repl: Ctrl+D runs the buffer, Ctrl+C quits");
            }
            match repl_loop(settings) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("{program}: editor error: {e}");
                    let _ = io::stderr().flush();
                    1
                }
            }
        }
        // The engine error has already been reported
        ReplMode::Bare => match execute_bare_once(settings) {
            Ok(()) => 0,
            Err(_) => 1,
        },
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} repl [--bare|--editor]

Modes:
  --editor   Line editor. Ctrl+D (Ctrl+Z on Windows) runs the buffer; `,` reads stdin.
             Errors are reported and the session continues.
  --bare     stdin is the program: run it once, exit 1 on any error. `,` has no input.
  Default: editor when stdin is a TTY, else bare. BF_REPL_MODE=bare|editor sets it too.

Each run gets a fresh tape. Limits come from BF_TAPE_SIZE, BF_MAX_STEPS,
BF_TIMEOUT_MS or the [engine] section of bfvm.toml. BF_REPL_ONCE=1 stops
the editor after one run.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
