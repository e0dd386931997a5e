use std::path::Path;
use std::process::{Command, Output};

const REPORT: &str = env!("CARGO_BIN_EXE_filament-report");
const NOTIFY: &str = env!("CARGO_BIN_EXE_filament-notify");

fn run(bin: &str, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary")
}

/// configuration pointing at a port nothing listens on
fn write_config(dir: &Path) -> String {
    let path = dir.join("config.ini");
    std::fs::write(
        &path,
        format!(
            "[Spoolman]\nSPOOLMAN_URL = http://127.0.0.1:9/api/v1/filament/\nTIMEOUT = 1\n\n\
             [Klipper]\nGCODE_PATH = {}\n\n\
             [Moonraker]\nMOONRAKER_URL = http://127.0.0.1:9\nTIMEOUT = 1\n",
            dir.display()
        ),
    )
    .unwrap();

    path.display().to_string()
}

#[test]
fn report_without_argument_exits_1() {
    let output = run(REPORT, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}

#[test]
fn notify_without_argument_exits_1() {
    let output = run(NOTIFY, &[]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn notify_rejects_non_numeric_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(NOTIFY, &["--config", &config, "seven"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_exits_0() {
    assert_eq!(run(REPORT, &["--help"]).status.code(), Some(0));
    assert_eq!(run(NOTIFY, &["--help"]).status.code(), Some(0));
}

#[test]
fn missing_config_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("missing.ini").display().to_string();

    let output = run(REPORT, &["--config", &config, "cube.gcode"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));

    let output = run(NOTIFY, &["--config", &config, "7"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn missing_key_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.ini");
    std::fs::write(&config, "[Spoolman]\nSPOOLMAN_URL = http://127.0.0.1:9/\n").unwrap();

    let output = run(REPORT, &["-c", config.to_str().unwrap(), "cube.gcode"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[Klipper]"));
}

#[test]
fn report_without_markers_exits_0() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    std::fs::write(dir.path().join("cube.gcode"), "G28\nG1 X10 Y10\n").unwrap();

    let output = run(REPORT, &["--config", &config, "cube.gcode"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(
        String::from_utf8_lossy(&output.stdout)
            .contains("No ASSERT_ACTIVE_FILAMENT commands or filament changes found.")
    );
}

#[test]
fn report_missing_gcode_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(REPORT, &["--config", &config, "missing.gcode"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.gcode"));
}

#[test]
fn report_survives_unreachable_spoolman() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    std::fs::write(
        dir.path().join("cube.gcode"),
        "ASSERT_ACTIVE_FILAMENT ID=1\nASSERT_ACTIVE_FILAMENT ID=2\n",
    )
    .unwrap();

    let output = run(REPORT, &["--config", &config, "cube.gcode"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout.contains("Change 1: ID=1 | Name=Connection Error"));
    assert!(stdout.contains("Change 2: ID=2 | Name=Connection Error"));
}

#[test]
fn notify_fails_when_printer_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(NOTIFY, &["--config", &config, "7"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to send filament 7"));
}
