//! Process-level checks for the `workitem-agent` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir()
        .join("workitem-agent-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_agent(dir: &Path, args: &[&str], vars: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_workitem-agent"));
    cmd.current_dir(dir)
        .args(args)
        .env("RUST_LOG", "info")
        .env("WORK_DIR", dir)
        .env("DATABASE_URL", "")
        .env("WORKITEM_TIMEOUT_SECS", "")
        .env("OTEL_ENDPOINT", "");
    for (name, value) in vars {
        cmd.env(name, value);
    }
    cmd.output().unwrap()
}

fn logged(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn invalid_config_logs_and_exits_zero() {
    let dir = scratch_dir();
    let output = run_agent(
        &dir,
        &["run", "--backend", "local"],
        &[("WORKITEM_TIMEOUT_SECS", "soon")],
    );

    assert!(output.status.success(), "status: {:?}", output.status);
    assert!(logged(&output).contains("startup failed"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn pgmq_backend_without_database_url_exits_zero() {
    let dir = scratch_dir();
    let output = run_agent(&dir, &["run", "--backend", "pgmq"], &[]);

    assert!(output.status.success(), "status: {:?}", output.status);
    assert!(logged(&output).contains("DATABASE_URL"));

    std::fs::remove_dir_all(&dir).unwrap();
}
