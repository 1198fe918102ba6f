//! CLI integration tests.

use std::net::UdpSocket;
use std::process::Command;
use std::time::Duration;

fn cli_command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pinba-send"));
    command.args(args);
    for (key, _) in std::env::vars() {
        if key.starts_with("PINBA_") {
            command.env_remove(key);
        }
    }
    command
}

fn run_cli(args: &[&str]) -> std::io::Result<std::process::Output> {
    cli_command(args).output()
}

#[test]
fn cli_version_runs() -> std::io::Result<()> {
    let output = run_cli(&["--version"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.starts_with("pinba-send "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_dry_run_prints_message_json() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_cli(&[
        "--dry-run",
        "--hostname",
        "cli-host",
        "--script-name",
        "/dry",
        "--tag",
        "tag1=value1",
        "--timer",
        "tag1=value1:0.1",
        "--timer",
        "tag1=value1:0.2",
    ])?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "dry run failed: {stderr}");

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["message"]["hostname"], "cli-host");
    assert_eq!(json["message"]["script_name"], "/dry");
    assert_eq!(json["message"]["timer_hit_count"], serde_json::json!([2]));
    assert_eq!(json["message"]["dictionary"], serde_json::json!(["tag1", "value1"]));
    Ok(())
}

#[test]
fn cli_env_overrides_apply() -> Result<(), Box<dyn std::error::Error>> {
    let output = cli_command(&["--dry-run"])
        .env("PINBA_SCRIPT_NAME", "/from-env")
        .env("PINBA_SCHEMA_VERSION", "v1")
        .output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["message"]["script_name"], "/from-env");
    assert_eq!(json["schemaVersion"], "v1");
    Ok(())
}

#[test]
fn cli_prints_merged_config_as_toml() -> std::io::Result<()> {
    let output = cli_command(&["--print-config", "toml", "--hostname", "cli-host"])
        .env("PINBA_PORT", "31000")
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("pinbaPort = 31000"));
    assert!(stdout.contains("hostname = \"cli-host\""));
    assert!(stdout.contains("schemaVersion = \"v2\""));
    Ok(())
}

#[test]
fn cli_rejects_malformed_tag_with_exit_code_2() -> std::io::Result<()> {
    let output = run_cli(&["--dry-run", "--tag", "novalue"])?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("invalid input"));
    Ok(())
}

#[test]
fn cli_rejects_bad_env_with_exit_code_2() -> std::io::Result<()> {
    let output = cli_command(&["--dry-run"])
        .env("PINBA_PORT", "not-a-port")
        .output()?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("config:invalid_env_int"));
    Ok(())
}

#[test]
fn cli_sends_datagram_to_local_collector() -> Result<(), Box<dyn std::error::Error>> {
    let collector = UdpSocket::bind("127.0.0.1:0")?;
    collector.set_read_timeout(Some(Duration::from_secs(5)))?;
    let port = collector.local_addr()?.port().to_string();

    let output = run_cli(&[
        "--pinba-server",
        "127.0.0.1",
        "--pinba-port",
        &port,
        "--script-name",
        "/udp",
        "--timer",
        "group=db:0.05",
    ])?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "send failed: {stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: ok"));

    let mut buf = [0u8; 2048];
    let (len, _) = collector.recv_from(&mut buf)?;
    let datagram = buf.get(..len).ok_or("short read")?;
    assert!(datagram.windows(4).any(|window| window == b"/udp"));
    Ok(())
}
