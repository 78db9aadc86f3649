//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const LINEAR_CONFIG: &str = r#"
cpu = "300m"
extra_cpu = "1"
memory = "30Mi"
extra_memory = "1Mi"
threshold = 10
"#;

const EXPONENTIAL_CONFIG: &str = r#"
cpu = "300m"
extra_cpu = "1"
estimator = "exponential"
"#;

fn nannyctl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "nanny-cli", "--"])
        .args(args)
        .env_remove("NANNY_CONFIG_FILE")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create config file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config file");
    file
}

fn json_output(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Output should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = nannyctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("pod nanny"), "Should show app description");
    assert!(stdout.contains("estimate"), "Should show estimate command");
    assert!(stdout.contains("ladder"), "Should show ladder command");
    assert!(stdout.contains("check"), "Should show check command");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("NANNY_CONFIG_FILE"), "Should show env var");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = nannyctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("nannyctl"), "Should show binary name");
}

/// Test check subcommand help
#[test]
fn test_check_help() {
    let output = nannyctl(&["check", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Check help should succeed");
    for option in ["--nodes", "--cpu", "--memory", "--storage", "--threshold"] {
        assert!(stdout.contains(option), "Should show {} option", option);
    }
}

/// Test linear estimate as JSON
#[test]
fn test_estimate_json() {
    let config = config_file(LINEAR_CONFIG);
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&["--config", path, "--format", "json", "estimate", "--nodes", "16"]);
    let report = json_output(&output);

    assert_eq!(report["nodes"], 16);
    assert_eq!(report["estimator"], "linear");
    assert_eq!(report["expected"]["requests"]["cpu"], "16300m");
    assert_eq!(report["expected"]["limits"]["memory"], "46Mi");
    assert_eq!(report["acceptable"]["requests"]["cpu"], "17300m");
    assert_eq!(report["acceptable"]["requests"]["memory"], "47Mi");
}

/// Test estimate table output
#[test]
fn test_estimate_table() {
    let config = config_file(LINEAR_CONFIG);
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&["--config", path, "estimate", "--nodes", "3"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Estimate should succeed");
    assert!(stdout.contains("3300m"), "Should show expected cpu");
    assert!(stdout.contains("4300m"), "Should show acceptable cpu");
    assert!(stdout.contains("33Mi"), "Should show expected memory");
}

/// Test the exponential ladder
#[test]
fn test_ladder_json() {
    let config = config_file(EXPONENTIAL_CONFIG);
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&["--config", path, "--format", "json", "ladder", "--count", "3"]);
    let rungs = json_output(&output);

    let nodes: Vec<u64> = rungs
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["nodes"].as_u64().unwrap())
        .collect();
    assert_eq!(nodes, vec![16, 24, 36]);
    assert_eq!(rungs[1]["resources"]["requests"]["cpu"], "24300m");
}

/// Test that the ladder requires the exponential estimator
#[test]
fn test_ladder_rejects_linear_estimator() {
    let config = config_file(LINEAR_CONFIG);
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&["--config", path, "ladder"]);

    assert!(!output.status.success(), "Linear ladder should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exponential"), "Should name the required estimator");
}

/// Test a drift check that triggers a resize
#[test]
fn test_check_reports_resize() {
    let config = config_file("cpu = \"300m\"\nextra_cpu = \"1\"\nthreshold = 10\n");
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&[
        "--config", path, "--format", "json", "check", "--nodes", "3", "--cpu", "1",
    ]);
    let report = json_output(&output);

    assert_eq!(report["would_resize"], true);
    assert_eq!(report["threshold"], 10);
    assert_eq!(report["dimensions"][0]["resource"], "cpu");
    assert_eq!(report["dimensions"][0]["field"], "requests");
    assert_eq!(report["dimensions"][0]["drifted"], true);
    assert_eq!(report["expected"]["requests"]["cpu"], "3300m");
}

/// Test a drift check inside the tolerance band
#[test]
fn test_check_within_bounds() {
    let config = config_file("cpu = \"300m\"\nextra_cpu = \"1\"\n");
    let path = config.path().to_str().unwrap();

    let output = nannyctl(&[
        "--config", path, "check", "--nodes", "3", "--cpu", "3.5", "--threshold", "10",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Check should succeed");
    assert!(stdout.contains("within bounds"), "Should report no resize");
    assert!(stdout.contains("threshold 10%"), "Should use the flag threshold");
}

/// Test threshold range validation
#[test]
fn test_check_rejects_threshold_above_100() {
    let output = nannyctl(&["check", "--nodes", "3", "--threshold", "150"]);

    assert!(!output.status.success(), "Threshold 150 should fail");
}

/// Test invalid quantity error handling
#[test]
fn test_check_rejects_invalid_quantity() {
    let output = nannyctl(&["check", "--nodes", "3", "--cpu", "lots"]);

    assert!(!output.status.success(), "Invalid quantity should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--cpu"), "Should name the bad argument");
}

/// Test status subcommand help
#[test]
fn test_status_help() {
    let output = nannyctl(&["status", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Status help should succeed");
    assert!(stdout.contains("--pod"), "Should show pod option");
    assert!(stdout.contains("--kubeconfig"), "Should show kubeconfig option");
}

/// Test that status needs the target identity before touching the cluster
#[test]
fn test_status_requires_deployment() {
    let config = config_file(LINEAR_CONFIG);
    let path = config.path().to_str().unwrap();

    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "nanny-cli", "--", "--config", path, "status"])
        .env_remove("NANNY_CONFIG_FILE")
        .env_remove("NANNY_DEPLOYMENT")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Status without a deployment should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("deployment must be set"), "Should name the missing setting");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = nannyctl(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = nannyctl(&["estimate"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("--nodes"),
        "Should show error about missing argument"
    );
}
