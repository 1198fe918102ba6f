//! CLI binary entrypoint.

mod error;
mod input;

use clap::{Parser, ValueEnum};
use error::{CliError, ExitCode};
use input::{TimerArg, parse_tag, parse_timer};
use pinba_facade::{
    FlushOptions, MessageOverrides, Request, TimerData, ValidatedPinbaConfig,
    load_pinba_config_std_env, to_pretty_json, to_pretty_toml,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pinba-send",
    version,
    about = "Send one pinba request built from the command line",
    long_about = None
)]
struct Cli {
    /// Optional config file path (JSON/TOML). `PINBA_*` env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host name reported with the request.
    #[arg(long)]
    hostname: Option<String>,
    /// Virtual server name.
    #[arg(long)]
    server_name: Option<String>,
    /// Script name.
    #[arg(long)]
    script_name: Option<String>,
    /// Request scheme (e.g. `https`).
    #[arg(long)]
    schema: Option<String>,
    /// Collector host.
    #[arg(long)]
    pinba_server: Option<String>,
    /// Collector port.
    #[arg(long)]
    pinba_port: Option<u16>,
    /// Request tag as KEY=VALUE. Repeatable.
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<String>,
    /// Pre-measured timer as KEY=VALUE[,KEY=VALUE]:SECONDS. Repeatable.
    #[arg(long = "timer", value_name = "TAGS:SECONDS")]
    timers: Vec<String>,
    /// Print the message as JSON and its encoded size instead of sending.
    #[arg(long)]
    dry_run: bool,
    /// Print the effective config (file, env and flags merged) and exit.
    #[arg(long, value_enum, value_name = "FORMAT")]
    print_config: Option<ConfigFormat>,
    /// Log filter (overrides `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigFormat {
    Json,
    Toml,
}

struct CliOutput {
    stdout: String,
    exit_code: ExitCode,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_tracing(cli.log_level.as_deref()) {
        return exit_with_error(&error);
    }

    match run(&cli).await {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn init_tracing(log_level: Option<&str>) -> Result<(), CliError> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|error| CliError::InvalidInput(format!("invalid --log-level: {error}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| CliError::InvalidInput(format!("failed to install logger: {error}")))
}

async fn run(cli: &Cli) -> Result<CliOutput, CliError> {
    let tags = cli
        .tags
        .iter()
        .map(|raw| parse_tag(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let timers = cli
        .timers
        .iter()
        .map(|raw| parse_timer(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = load_pinba_config_std_env(cli.config.as_deref())?;
    let config = apply_flags(config, cli)?;
    if let Some(format) = cli.print_config {
        return Ok(CliOutput {
            stdout: format_config(&config, format)?,
            exit_code: ExitCode::Ok,
        });
    }
    let mut request = build_request(config, tags, timers)?;

    let stdout = if cli.dry_run {
        format_dry_run(&request)?
    } else {
        let endpoint = request.endpoint();
        let flushed = request.flush(FlushOptions::default())?;
        let bytes = flushed.payload_len();
        flushed.wait().await?;
        tracing::info!(%endpoint, bytes, "pinba request sent");
        format!("status: ok\nendpoint: {endpoint}\nbytes: {bytes}\n")
    };

    Ok(CliOutput {
        stdout,
        exit_code: ExitCode::Ok,
    })
}

/// Command-line flags win over config file and env.
fn apply_flags(config: ValidatedPinbaConfig, cli: &Cli) -> Result<ValidatedPinbaConfig, CliError> {
    let mut config = config.into_inner();
    if let Some(hostname) = &cli.hostname {
        config.hostname = Some(hostname.clone());
    }
    if let Some(server_name) = &cli.server_name {
        config.server_name.clone_from(server_name);
    }
    if let Some(script_name) = &cli.script_name {
        config.script_name.clone_from(script_name);
    }
    if let Some(schema) = &cli.schema {
        config.schema.clone_from(schema);
    }
    if let Some(pinba_server) = &cli.pinba_server {
        config.pinba_server.clone_from(pinba_server);
    }
    if let Some(pinba_port) = cli.pinba_port {
        config.pinba_port = pinba_port;
    }

    config
        .validate_and_normalize()
        .map_err(|error| CliError::Pinba(error.into()))
}

fn format_config(config: &ValidatedPinbaConfig, format: ConfigFormat) -> Result<String, CliError> {
    let output = match format {
        ConfigFormat::Json => to_pretty_json(config.as_ref())?,
        ConfigFormat::Toml => to_pretty_toml(config.as_ref())?,
    };
    Ok(output)
}

fn build_request(
    config: ValidatedPinbaConfig,
    tags: Vec<(String, String)>,
    timers: Vec<TimerArg>,
) -> Result<Request, CliError> {
    let mut request = Request::from_config(config);
    for (name, value) in tags {
        request.tag_set(name, value);
    }
    for timer in timers {
        request.timer_add(timer.tags, timer.seconds, TimerData::new())?;
    }
    Ok(request)
}

fn format_dry_run(request: &Request) -> Result<String, CliError> {
    let overrides = MessageOverrides::default();
    let message = request.message_data(&overrides);
    let payload = request.encode(&overrides)?;
    let output = serde_json::json!({
        "status": "ok",
        "endpoint": request.endpoint().to_string(),
        "schemaVersion": request.schema_version(),
        "bytes": payload.len(),
        "message": message,
    });
    let mut output = serde_json::to_string_pretty(&output)?;
    output.push('\n');
    Ok(output)
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
