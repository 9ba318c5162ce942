// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide once-guard (SPEC_FULL §5 "re-entrancy of daemonization",
//! §9 "global singleton via import side-effect"). When this crate is used
//! as a library entry point rather than run as the `harvesterd` binary, the
//! first call to `ensure_started` starts the supervisor; later calls are
//! no-ops rather than a second competing instance.

use std::sync::OnceLock;

static STARTED: OnceLock<()> = OnceLock::new();

/// Run `start` exactly once for the life of this process. Returns `true` if
/// this call was the one that ran it, `false` if a previous call already did.
pub fn ensure_started(start: impl FnOnce()) -> bool {
    let mut started_now = false;
    STARTED.get_or_init(|| {
        start();
        started_now = true;
    });
    started_now
}
