use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;

fn cargo_bin() -> Command { Command::cargo_bin("bfvm").unwrap() }

fn infinite_bf() -> &'static str {
    "+[]" // increments to 1, then [] spins forever
}

#[test]
fn test_step_limit_flag() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .env_remove("BF_TIMEOUT_MS")
        .args(["run", "--max-steps", "50", "--code", infinite_bf()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step limit exceeded (50)"))
        .stdout(predicate::str::contains("aborted").not());
}

#[test]
fn test_step_limit_env() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .env("BF_MAX_STEPS", "50")
        .env_remove("BF_TIMEOUT_MS")
        .args(["run", "--code", infinite_bf()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step limit exceeded (50)"));
}

#[test]
fn test_step_limit_flag_beats_env() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .env("BF_MAX_STEPS", "50")
        .args(["run", "--max-steps", "7", "--code", infinite_bf()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step limit exceeded (7)"));
}

#[test]
fn test_timeout_flag() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .env_remove("BF_MAX_STEPS")
        .args(["run", "--timeout", "100", "--code", infinite_bf()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("wall-clock timeout exceeded (100 ms)"))
        .stdout(predicate::str::contains("aborted").not());
}

#[test]
fn test_timeout_env() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .env_remove("BF_MAX_STEPS")
        .env("BF_TIMEOUT_MS", "100")
        .args(["run", "--code", infinite_bf()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn test_finishing_program_beats_timeout() {
    cargo_bin()
        .timeout(Duration::from_secs(2))
        .args(["run", "--timeout", "1000", "--code", "+++."])
        .assert()
        .success()
        .stdout(vec![3u8]);
}
