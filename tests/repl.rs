use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;

fn make_cmd() -> Command {
    Command::cargo_bin("bfvm").expect("bfvm binary")
}

#[test]
fn repl_bare_runs_piped_program_once() {
    make_cmd()
        .timeout(Duration::from_secs(2))
        .arg("repl")
        .write_stdin("+++.")
        .assert()
        .success()
        // the REPL adds a newline after each execution
        .stdout("\u{3}\n")
        .stderr(predicate::str::is_empty());
}

#[test]
fn repl_empty_submission_exits_cleanly() {
    make_cmd()
        .arg("repl")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn repl_invalid_program_reports_error_and_exits_1() {
    make_cmd()
        .arg("repl")
        .write_stdin("]")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Parse error: unmatched bracket"))
        .stdout(predicate::str::contains("\n"));
}

#[test]
fn repl_input_instruction_has_no_bytes() {
    make_cmd()
        .arg("repl")
        .write_stdin(",")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("input exhausted"));
}

#[test]
fn repl_bare_runtime_error_exits_1() {
    make_cmd()
        .args(["repl", "--bare"])
        .write_stdin("<")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("data pointer out of bounds at instruction 0"));
}

#[test]
fn repl_bare_timeout_aborts_infinite_loop() {
    make_cmd()
        .timeout(Duration::from_secs(2))
        .env_remove("BF_MAX_STEPS")
        .env("BF_TIMEOUT_MS", "100")
        .args(["repl", "--bare"])
        .write_stdin("+[]")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("wall-clock timeout exceeded (100 ms)"));
}

#[test]
fn repl_editor_on_non_tty_is_error_exit_1() {
    make_cmd()
        .arg("repl")
        .arg("--editor")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stdin is not a TTY"));
}

#[test]
fn repl_flag_overrides_env_mode() {
    make_cmd()
        .env("BF_REPL_MODE", "editor")
        .arg("repl")
        .arg("--bare")
        .write_stdin("+++.")
        .assert()
        .success()
        .stdout(predicate::str::contains("\u{3}"));
}

#[test]
fn repl_invalid_env_mode_is_rejected() {
    make_cmd()
        .env("BF_REPL_MODE", "vim")
        .arg("repl")
        .write_stdin("+")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid BF_REPL_MODE"));
}
