//! `tern-ide` - terminal host for the Tern language server shell.
//!
//! # Architecture
//!
//! ```text
//! main() -> parse_args() -> Fleet::new(settings, TerminalHost)
//!                                |
//!                                v
//!            FolderAdded per CLI folder -> signal loop
//!              Ctrl-C  -> drop sender  -> fleet teardown
//!              SIGHUP  -> reload config -> ConfigChanged
//!              SIGUSR1 -> RestartRequested
//! ```
//!
//! The binary owns nothing but the event sender: every connection,
//! install, and diagnostic lives inside the fleet loop.

mod host;
mod watch;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::env;

use anyhow::{Context, Result};
use tern_config::Settings;
use tern_host::WorkspaceFolder;
use tern_lsp::{Fleet, FleetEvent};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::host::TerminalHost;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No usable log file: fall back to stderr so diagnostics on stdout
    // stay machine-readable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let candidates = log_file_candidates();
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.tern/logs/tern-ide.log, next to the config file.
    if let Some(config_path) = Settings::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("tern-ide.log"));
    }

    // Fallback: ./.tern/logs/tern-ide.log (useful in constrained environments)
    candidates.push(PathBuf::from(".tern").join("logs").join("tern-ide.log"));

    candidates
}

const USAGE: &str = "\
Usage: tern-ide [OPTIONS] [FOLDER]...

Run Tern language servers for the given workspace folders
(default: the current directory).

Options:
  -y, --yes        Answer install and update prompts with yes
  -V, --version    Print version
  -h, --help       Print this help";

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    folders: Vec<PathBuf>,
    assume_yes: bool,
}

/// Parse command-line arguments. `Ok(None)` means a `--help` or
/// `--version` style flag already printed its output.
fn parse_args(args: impl Iterator<Item = String>) -> Result<Option<CliArgs>> {
    let mut folders = Vec::new();
    let mut assume_yes = false;

    for arg in args {
        match arg.as_str() {
            "-y" | "--yes" => assume_yes = true,
            "-V" | "--version" => {
                println!("tern-ide {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(None);
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown option {other:?}\n{USAGE}");
            }
            folder => folders.push(PathBuf::from(folder)),
        }
    }

    if folders.is_empty() {
        folders.push(PathBuf::from("."));
    }

    Ok(Some(CliArgs {
        folders,
        assume_yes,
    }))
}

fn load_settings() -> Settings {
    match Settings::load() {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            tracing::warn!("ignoring config at {}: {e}", e.path().display());
            Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let Some(args) = parse_args(env::args().skip(1))? else {
        return Ok(());
    };

    let mut folders = Vec::with_capacity(args.folders.len());
    for folder in &args.folders {
        let absolute = fs::canonicalize(folder)
            .with_context(|| format!("workspace folder {} does not exist", folder.display()))?;
        folders.push(WorkspaceFolder::new(absolute));
    }

    let host = Arc::new(TerminalHost::new(args.assume_yes));
    let (fleet, events) = Fleet::new(load_settings(), host);
    let fleet_task = tokio::spawn(fleet.run());

    for folder in folders {
        if events.send(FleetEvent::FolderAdded(folder)).await.is_err() {
            anyhow::bail!("fleet stopped before startup finished");
        }
    }

    signal_loop(&events).await?;

    // Closing the channel is the shutdown signal; the fleet tears every
    // connection down before its task resolves.
    drop(events);
    fleet_task.await.context("fleet task panicked")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Block until Ctrl-C. On Unix, SIGHUP reloads configuration and SIGUSR1
/// restarts the running servers.
#[cfg(unix)]
async fn signal_loop(events: &mpsc::Sender<FleetEvent>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    let mut user1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                tracing::info!("interrupt received, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reloading configuration");
                if events.send(FleetEvent::ConfigChanged(load_settings())).await.is_err() {
                    return Ok(());
                }
            }
            _ = user1.recv() => {
                tracing::info!("SIGUSR1 received, restarting servers");
                if events.send(FleetEvent::RestartRequested).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn signal_loop(_events: &mpsc::Sender<FleetEvent>) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("interrupt received, shutting down");
    Ok(())
}
