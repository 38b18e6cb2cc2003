//! minder daemon (minderd)
//!
//! Single-instance background process that owns the agent cycle loop:
//! a chained one-shot timer runs the supervisor, which replaces the
//! timer with whatever delay the cycle computed.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use minder_daemon::{lifecycle, DaemonPaths, LifecycleError};
use minder_engine::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("minderd {}", env!("CARGO_PKG_VERSION"));
    println!("Personal assistant agent-cycle daemon");
    println!();
    println!("USAGE:");
    println!("    minderd");
    println!();
    println!("Configuration comes from MINDER_* environment variables and");
    println!("an optional minder.toml in the MINDER_HOME directory.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("minderd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: minderd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let paths = DaemonPaths::resolve();
    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "minderd.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let config = Config::from_env();
    info!(
        base_dir = %paths.base_dir.display(),
        interval_s = config.loop_interval.as_secs(),
        timezone = %config.timezone,
        "starting minderd"
    );

    let daemon = match lifecycle::startup(&paths, config) {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed) => {
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("minderd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    lifecycle::run(&daemon).await?;
    info!("minderd stopped");
    Ok(())
}
