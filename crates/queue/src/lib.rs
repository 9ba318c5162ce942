// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! harv-queue: the queue-config mapper every stage consults to pick
//! per-queue policy and plug-in selectors. Frozen after `load()`.

pub mod config;
pub mod mapper;

pub use config::{MapType, PluginSpec, QueueConfig};
pub use mapper::{QueueConfigError, QueueConfigMapper};
