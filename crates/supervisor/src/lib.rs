// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harv-supervisor: wires the shared pools and the eleven stage pools,
//! owns the signal-to-stop translation, and exposes the `harvesterd` binary
//! entry point.

pub mod cli;
pub mod once;
pub mod pid;
pub mod profiling;
pub mod signal;
pub mod supervisor;

pub use cli::SupervisorArgs;
pub use pid::{PidError, PidFile};
pub use supervisor::{Supervisor, SupervisorError};
