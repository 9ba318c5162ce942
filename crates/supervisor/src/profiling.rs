// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--profile_output`: run the supervisor under a sampling profiler for its
//! whole lifetime and write the collected samples out as a flamegraph when
//! it stops. Grounded on `pprof`'s guard-based sampling API (the closest
//! ecosystem equivalent to `master.py`'s `cProfile.Profile().enable()`/
//! `.dump_stats(path)` pair, which samples for the process's whole run and
//! writes a report at the end).

use std::fs::File;
use std::path::{Path, PathBuf};

const SAMPLE_HZ: i32 = 99;

/// Holds the profiler open for as long as it's alive. Dropping it stops
/// sampling and writes the flamegraph to the configured path; any failure
/// along the way is logged, never propagated, since a profiling run going
/// wrong should not take the supervisor down with it.
pub struct ProfilerGuard {
    inner: pprof::ProfilerGuard<'static>,
    output: PathBuf,
}

/// Start sampling. Returns `None` (and logs) if the profiler itself
/// couldn't start; callers treat that the same as not having asked for
/// profiling at all.
pub fn start(output: &Path) -> Option<ProfilerGuard> {
    match pprof::ProfilerGuardBuilder::default().frequency(SAMPLE_HZ).blocklist(&["libc", "libgcc", "pthread", "vdso"]).build() {
        Ok(inner) => {
            tracing::info!(path = %output.display(), hz = SAMPLE_HZ, "sampling profiler started");
            Some(ProfilerGuard { inner, output: output.to_path_buf() })
        }
        Err(err) => {
            tracing::error!(%err, "failed to start sampling profiler; continuing without one");
            None
        }
    }
}

impl Drop for ProfilerGuard {
    fn drop(&mut self) {
        let report = match self.inner.report().build() {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(%err, "failed to build profiler report");
                return;
            }
        };
        let file = match File::create(&self.output) {
            Ok(file) => file,
            Err(err) => {
                tracing::error!(%err, path = %self.output.display(), "failed to create profile output file");
                return;
            }
        };
        if let Err(err) = report.flamegraph(file) {
            tracing::error!(%err, path = %self.output.display(), "failed to write flamegraph");
        } else {
            tracing::info!(path = %self.output.display(), "wrote profiler flamegraph");
        }
    }
}
