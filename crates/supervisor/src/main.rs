// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harvesterd` — the edge-agent supervisor binary.

use clap::Parser;
use harv_supervisor::cli::SupervisorArgs;
use harv_supervisor::{once, supervisor};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_PATH: &str = "harvesterd.log";
const MAX_ROTATED_LOGS: u32 = 5;

fn main() {
    let args = SupervisorArgs::parse();

    if args.rotate_log {
        rotate_log(Path::new(LOG_PATH));
    }
    let _log_guard = setup_logging();

    let started = once::ensure_started(|| {
        if let Err(err) = supervisor::execute(&args) {
            tracing::error!(%err, "supervisor failed to start");
            std::process::exit(1);
        }
    });
    if !started {
        tracing::warn!("ensure_started: a supervisor is already running in this process");
    }
}

/// File sink + env filter, matching the daemon crate's `setup_logging`
/// (non-blocking rolling-never file appender, `RUST_LOG`-driven filter).
fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let path = Path::new(LOG_PATH);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new(LOG_PATH));

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
    guard
}

/// Shift `LOG_PATH.1..N-1` up by one and move the current log to `.1`,
/// matching the daemon crate's rotation scheme but triggered by `--rotate_log`
/// rather than a size threshold (SPEC_FULL §6.1: rotate before the subscriber
/// for the new process generation is installed).
fn rotate_log(log_path: &Path) {
    if !log_path.exists() {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}
