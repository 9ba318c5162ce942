// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harvesterd` command-line surface. Derive-style clap, matching the
//! `oj` CLI crate's `#[derive(Args)]` idiom in this workspace.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "harvesterd", about = "Edge-agent process-lifecycle supervisor")]
pub struct SupervisorArgs {
    /// Pidfile path (daemon mode only).
    #[arg(long)]
    pub pid: Option<PathBuf>,

    /// Single-shot: each stage runs one iteration and exits.
    #[arg(long)]
    pub single: bool,

    /// Write the FQDN to this path before starting.
    #[arg(long)]
    pub hostname_file: Option<PathBuf>,

    /// Rotate all log handlers before starting.
    #[arg(long)]
    pub rotate_log: bool,

    /// Run under a sampling profiler and write results to this path.
    #[arg(long)]
    pub profile_output: Option<PathBuf>,
}
