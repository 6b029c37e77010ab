//! The `weft` binary.

use std::io::Write;
use std::process::{Command, Output};

fn weft(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weft"))
        .args(args)
        .env_remove("WEFT_NUM_THREADS")
        .output()
        .expect("Failed to spawn weft binary")
}

fn weft_with_threads_env(
    value: &str,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weft"))
        .args(args)
        .env("WEFT_NUM_THREADS", value)
        .output()
        .expect("Failed to spawn weft binary")
}

fn info_workers(output: &Output) -> u64 {
    let info: serde_json::Value = serde_json::from_str(&stdout(output)).unwrap();
    assert_eq!(info["stats"]["num_workers"], info["config"]["num_workers"]);
    info["config"]["num_workers"].as_u64().unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "weft failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_cli_kernels() {
    assert_eq!(stdout(&weft(&["--threads", "2", "factorial", "5"])), "120");
    assert_eq!(stdout(&weft(&["factorial", "--chain", "6"])), "720");
    assert_eq!(stdout(&weft(&["sum", "1", "2", "3", "-4"])), "2");
    assert_eq!(stdout(&weft(&["sort", "3", "-1", "2"])), "-1 2 3");
    assert_eq!(
        stdout(&weft(&["matmul", "--a", "1,2;3,4", "--b", "5;6"])),
        "17\n39"
    );
}

#[test]
fn test_cli_reports_errors() {
    let output = weft(&["factorial", "21"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("overflow"));

    let output = weft(&["matmul", "--a", "1,2,3;4,5,6", "--b", "1,2;3,4"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("dimension mismatch"));
}

#[test]
fn test_cli_info_with_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "num_workers": 3, "thresholds": {{ "factorial": 5 }} }}"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let info: serde_json::Value =
        serde_json::from_str(&stdout(&weft(&["--config", &path, "info", "--json"]))).unwrap();
    assert_eq!(info["name"], "weft");
    assert_eq!(info["config"]["num_workers"], 3);
    assert_eq!(info["config"]["thresholds"]["factorial"], 5);
    assert_eq!(info["stats"]["num_workers"], 3);

    // --threads wins over the file.
    let info: serde_json::Value = serde_json::from_str(&stdout(&weft(&[
        "--config", &path, "--threads", "1", "info", "--json",
    ])))
    .unwrap();
    assert_eq!(info["config"]["num_workers"], 1);
}

#[test]
fn test_cli_threads_from_environment() {
    let output = weft_with_threads_env("3", &["info", "--json"]);
    assert_eq!(info_workers(&output), 3);
    assert!(!String::from_utf8_lossy(&output.stderr).contains("ignoring invalid"));
}

#[test]
fn test_cli_invalid_threads_environment_is_ignored() {
    let hardware = std::thread::available_parallelism()
        .map(|n| n.get() as u64)
        .unwrap_or(4);
    for value in ["0", "abc"] {
        let output = weft_with_threads_env(value, &["info", "--json"]);
        assert_eq!(info_workers(&output), hardware, "WEFT_NUM_THREADS={}", value);
        assert!(
            String::from_utf8_lossy(&output.stderr).contains("ignoring invalid WEFT_NUM_THREADS"),
            "no warning for WEFT_NUM_THREADS={}",
            value
        );
    }
}

#[test]
fn test_cli_threads_flag_beats_environment() {
    let output = weft_with_threads_env("5", &["--threads", "2", "info", "--json"]);
    assert_eq!(info_workers(&output), 2);
}
