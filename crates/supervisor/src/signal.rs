// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates OS signals into the shared stop signal.
//!
//! SIGTERM/SIGUSR2 request a graceful drain (`StopEvent::set`). SIGINT/SIGHUP
//! are operator intent to stop *now*: this kills the process group directly
//! rather than waiting for stages to notice. Grounded on the signal-hook
//! dedicated-thread pattern (`Signals::new([...]).forever()` dispatched by
//! signal kind), not `tokio::signal`, since the agent's own main loop is a
//! synchronous stop-signal poll, not an async runtime.

use harv_core::StopEvent;
use nix::sys::signal::{self, Signal};
use nix::unistd::getpgrp;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR2};
use signal_hook::iterator::Signals;
use std::thread::{self, JoinHandle};

/// Spawn the signal-handling thread. Returns its handle so the caller can
/// join it alongside the stage workers (it exits once `stop` is set and the
/// underlying `Signals` iterator is told to stop delivering, or immediately
/// for SIGINT/SIGHUP since those terminate the process directly).
pub fn spawn(stop: StopEvent) -> std::io::Result<JoinHandle<()>> {
    let mut signals = Signals::new([SIGTERM, SIGUSR2, SIGINT, SIGHUP])?;
    thread::Builder::new()
        .name("signal-coordinator".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                match sig {
                    SIGTERM | SIGUSR2 => {
                        tracing::info!(signal = sig, "graceful drain requested");
                        stop.set();
                        break;
                    }
                    SIGINT | SIGHUP => {
                        tracing::warn!(signal = sig, "immediate process-group kill requested");
                        hard_kill();
                    }
                    _ => unreachable!("Signals was only registered for the four above"),
                }
            }
        })
}

/// SIGINT/SIGHUP: kill this process's own group immediately. Whether
/// plug-in-spawned children share this group is not established (SPEC_FULL
/// §9 open question) — this preserves the documented behavior as-is.
fn hard_kill() -> ! {
    let pgrp = getpgrp();
    let _ = signal::killpg(pgrp, Signal::SIGKILL);
    std::process::exit(130);
}
