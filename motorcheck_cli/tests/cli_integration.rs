use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config; every omitted key takes its default
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[bus]
ports = 21

[runner]
tick_ms = 3
max_run_ms = 20000
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--motors", "1", "--virtual-time"], 0, "PASS", "stdout")]
#[case(&["run", "--motors", "1,4", "--fault", "4=stalled", "--virtual-time"], 3, "NR ERR", "stdout")]
#[case(&["run", "--motors", "2", "--fault", "2=dead-current", "--virtual-time"], 3, "C ERR", "stdout")]
#[case(&["run", "--motors", "5", "--fault", "5=weak-brake", "--virtual-time"], 3, "B ERR", "stdout")]
#[case(&["run", "--virtual-time"], 2, "required", "stderr")]
#[case(&["run", "--motors", "30", "--virtual-time"], 1, "outside", "stderr")]
#[case(&["run", "--motors", "1", "--fault", "1=smoking"], 2, "unknown fault", "stderr")]
#[case(&["run", "--motors", "1", "--virtual-time", "--max-run-ms", "100"], 3, "INCOMPLETE", "stdout")]
#[case(&["self-check"], 0, "ok", "stdout")]
#[case(&["references"], 0, "12000", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("motorcheck").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn healthy_run_prints_fleet_baselines() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("motorcheck").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["run", "--motors", "1,2,3", "--virtual-time", "--stats"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("fleet: 3 session(s)"))
        .stdout(predicate::str::contains("test point 4"))
        .stderr(predicate::str::contains("Missed deadlines"));
}

#[rstest]
fn cli_reports_bad_reference_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("refs.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "drive,speed,current").unwrap();
    writeln!(f, "6000,117,70").unwrap();

    let mut cmd = Command::cargo_bin("motorcheck").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--references")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn reference_csv_replaces_builtin_table() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let csv = dir.path().join("refs.csv");
    fs::write(
        &csv,
        "drive_mv,settle_speed,settle_current\n3000,58.5,40\n-3000,-58.5,41\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("motorcheck").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--references")
        .arg(&csv)
        .arg("references");

    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2, "{text}");
    assert!(text.contains("-3000"));
    assert!(!text.contains("12000"));
}

#[rstest]
#[case("[admission]\ncapacity = 0\n", "admission.capacity")]
#[case("[bus]\nports = \"many\"\n", "not valid TOML")]
fn invalid_config_is_explained(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    let mut cmd = Command::cargo_bin("motorcheck").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn explicit_missing_config_is_an_error() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("motorcheck").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("self-check");
    cmd.assert().code(1).stderr(predicate::str::contains("absent.toml"));
}
