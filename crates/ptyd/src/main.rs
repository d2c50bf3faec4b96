//! `ptyd` — stdio façade over `pty-core`'s session manager.
//!
//! Reads newline-delimited JSON requests on stdin, dispatches each to a
//! `SessionManager`, and writes one newline-delimited JSON response per
//! request on stdout. This is the glue layer the core treats as an external
//! collaborator; it exists here only so the crate is runnable end-to-end.

mod config;
mod facade;

use clap::Parser;
use config::ManagerConfig;
use pty_core::manager::SessionManager;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "ptyd")]
#[command(about = "PTY session daemon driven over stdio")]
struct Cli {
    /// Path to a ptyd.toml config file. Overridden by PTYD_* env vars.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ptyd=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match ManagerConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::from(2);
        }
    };

    if let Some(dir) = &config.log_dir {
        if !dir.is_dir() {
            eprintln!("log_dir does not exist: {}", dir.display());
            return ExitCode::from(2);
        }
    }

    let manager = SessionManager::new(config.max_sessions, config.log_dir.clone());

    let code = run(&manager).await;
    manager.shutdown().await;
    code
}

async fn run(manager: &SessionManager) -> ExitCode {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                return ExitCode::from(1);
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<facade::Request>(&line) {
            Ok(req) => facade::dispatch(manager, req).await,
            Err(e) => facade::Response::from_parse_error(e),
        };

        let mut out = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                continue;
            }
        };
        out.push(b'\n');
        if stdout.write_all(&out).await.is_err() || stdout.flush().await.is_err() {
            tracing::error!("stdout write failed");
            return ExitCode::from(1);
        }
    }
}
