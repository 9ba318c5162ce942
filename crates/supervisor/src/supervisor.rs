// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Brings the agent up: wires the shared pools, launches the eleven stage
//! pools with per-stage parallelism from config, blocks until stop, then
//! drains (SPEC_FULL §4.2).

use crate::cli::SupervisorArgs;
use crate::pid::{PidError, PidFile};
use crate::profiling;
use crate::signal;
use harv_comm::{CommunicatorPool, Communicator, HttpCommunicator};
use harv_config::{ConfigError, ConfigRegistry, MasterSettings};
use harv_core::{StopEvent, SystemClock};
use harv_queue::{QueueConfigError, QueueConfigMapper};
use harv_stage::{
    Cacher, CommandManager, CredentialManager, EventFeeder, JobFetcher, Monitor, NoopRefresher, PluginRegistry, Preparator, Propagator,
    Stage, StageWorker, Stager, Submitter, Sweeper,
};
use harv_storage::{DbProxyPool, Store};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    QueueConfig(#[from] QueueConfigError),
    #[error(transparent)]
    Pid(#[from] PidError),
    #[error("startup I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

const DEFAULT_COMM_POOL_SIZE: usize = 4;
const DEFAULT_DB_POOL_SIZE: usize = 4;
const DEFAULT_DISPATCHER_URL: &str = "http://localhost:25080";

const DEMAND_CAP: u32 = 50;
const LEASE_MS: u64 = 30_000;
const CLAIM_LIMIT: usize = 20;
const SUBMIT_ATTEMPT_CAP: u32 = 5;
const KILL_ATTEMPT_CAP: u32 = 3;
const RETENTION_MS: u64 = 3_600_000;

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Owns the shared resources built during startup steps 1-3: the
/// communicator pool, the frozen queue-config mapper, and the store (with
/// its DB proxy pool, constructed to honor §4.4's pool-sizing role even
/// though individual stages below hold the store directly — see DESIGN.md).
pub struct Supervisor {
    config: ConfigRegistry,
    mapper: Arc<QueueConfigMapper>,
    comm: Arc<CommunicatorPool>,
    store: Arc<Store>,
    db_pool: DbProxyPool,
    stop: StopEvent,
}

impl Supervisor {
    /// Startup steps 1-3: communicator pool, queue-config mapper, DB pool +
    /// `ensure_schema`. Step order matters for end-to-end scenario 5: a
    /// malformed queue-config file must fail before the DB pool is built.
    pub fn bootstrap() -> Result<Self, SupervisorError> {
        let config = ConfigRegistry::load(None)?;

        let pool_size = env_usize("HARVESTER_COMM_POOL_SIZE", DEFAULT_COMM_POOL_SIZE);
        let dispatcher_url = std::env::var("HARVESTER_DISPATCHER_URL").unwrap_or_else(|_| DEFAULT_DISPATCHER_URL.to_string());
        let clients: Vec<Arc<dyn Communicator>> =
            (0..pool_size).map(|_| Arc::new(HttpCommunicator::new(dispatcher_url.clone())) as Arc<dyn Communicator>).collect();
        let comm = Arc::new(CommunicatorPool::new(clients));

        let mapper = Arc::new(QueueConfigMapper::load(&config.qconf().config_file)?);

        let store = Arc::new(Store::new());
        let db_pool = DbProxyPool::new(Arc::clone(&store), env_usize("HARVESTER_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE));
        let queue_names: Vec<String> = mapper.queue_names().cloned().collect();
        store.ensure_schema(&queue_names);

        Ok(Self { config, mapper, comm, store, db_pool, stop: StopEvent::new() })
    }

    pub fn master_settings(&self) -> &MasterSettings {
        self.config.master()
    }

    /// Steps 4-7: install signal handlers, spawn the stage pools (steps 5,
    /// with execute-first handling for credential manager and cacher),
    /// block on stop at 1 s granularity (step 6), then join (step 7).
    pub fn run(self, single_shot: bool, rt: tokio::runtime::Handle) -> Result<(), SupervisorError> {
        let Supervisor { config, mapper, comm, store, db_pool: _db_pool, stop } = self;

        let signal_thread = signal::spawn(stop.clone())?;

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        {
            let settings = config.stage_settings("credential_manager", 3600);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, true, settings.n_threads, |_| {
                CredentialManager::new(Arc::new(NoopRefresher))
            })?;
        }

        {
            let settings = config.stage_settings("cacher", 300);
            let keys: Vec<String> = mapper.queue_names().cloned().collect();
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, true, settings.n_threads, |_| {
                Cacher::new(Arc::clone(&comm), Arc::clone(&store), SystemClock, rt.clone(), keys.clone())
            })?;
        }

        {
            let settings = config.stage_settings("command_manager", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |_| {
                CommandManager::new(Arc::clone(&comm), Arc::clone(&store), SystemClock, rt.clone())
            })?;
        }

        {
            let settings = config.stage_settings("job_fetcher", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |_| {
                JobFetcher::new(Arc::clone(&comm), Arc::clone(&store), Arc::clone(&mapper), rt.clone(), DEMAND_CAP)
            })?;
        }

        {
            let settings = config.stage_settings("preparator", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Preparator::new(
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    PluginRegistry::new(),
                    SystemClock,
                    format!("preparator-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                )
            })?;
        }

        {
            let settings = config.stage_settings("submitter", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Submitter::new(
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    PluginRegistry::new(),
                    SystemClock,
                    format!("submitter-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                    SUBMIT_ATTEMPT_CAP,
                )
            })?;
        }

        {
            let settings = config.stage_settings("monitor", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Monitor::new(
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    PluginRegistry::new(),
                    SystemClock,
                    format!("monitor-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                )
            })?;
        }

        {
            let settings = config.stage_settings("propagator", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Propagator::new(Arc::clone(&comm), Arc::clone(&store), SystemClock, rt.clone(), format!("propagator-{i}"), LEASE_MS, CLAIM_LIMIT)
            })?;
        }

        {
            let settings = config.stage_settings("stager", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Stager::new(
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    PluginRegistry::new(),
                    SystemClock,
                    format!("stager-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                )
            })?;
        }

        {
            let settings = config.stage_settings("event_feeder", 30);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                EventFeeder::new(
                    Arc::clone(&comm),
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    SystemClock,
                    rt.clone(),
                    format!("event_feeder-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                )
            })?;
        }

        {
            let settings = config.stage_settings("sweeper", 60);
            spawn_stage(&mut handles, &stop, settings.sleep_time, single_shot, false, settings.n_threads, |i| {
                Sweeper::new(
                    Arc::clone(&store),
                    Arc::clone(&mapper),
                    PluginRegistry::new(),
                    SystemClock,
                    format!("sweeper-{i}"),
                    LEASE_MS,
                    CLAIM_LIMIT,
                    KILL_ATTEMPT_CAP,
                    RETENTION_MS,
                )
            })?;
        }

        if !single_shot {
            while !stop.wait(Duration::from_secs(1)) {}
        }

        for handle in handles {
            let _ = handle.join();
        }
        if stop.is_set() {
            let _ = signal_thread.join();
        }

        Ok(())
    }
}

/// Spawn `n` workers of one stage. `execute_first` stages get worker 0's
/// `execute()` run synchronously here, before any thread for this stage is
/// spawned, so dependent stages find usable state (SPEC_FULL §4.2 step 5).
/// In single-shot mode that pre-execution *is* worker 0's one iteration, so
/// it is not also given a `run()` thread (§8: "executed exactly once").
fn spawn_stage<S>(
    handles: &mut Vec<JoinHandle<()>>,
    stop: &StopEvent,
    cycle_period: Duration,
    single_shot: bool,
    execute_first: bool,
    n: usize,
    mut make: impl FnMut(usize) -> S,
) -> std::io::Result<()>
where
    S: Stage + 'static,
{
    let mut workers: Vec<StageWorker<S>> = (0..n).map(|i| StageWorker::new(make(i), i, stop.clone(), single_shot, cycle_period)).collect();
    if execute_first {
        if let Some(first) = workers.first_mut() {
            first.execute_once();
        }
    }
    for (i, mut worker) in workers.into_iter().enumerate() {
        if execute_first && i == 0 && single_shot {
            continue;
        }
        let handle = thread::Builder::new().name(format!("{}-{}", S::NAME, i)).spawn(move || worker.run())?;
        handles.push(handle);
    }
    Ok(())
}

/// Ties the CLI surface to [`Supervisor`]: pidfile acquisition, privilege
/// drop, and the hostname file, around the bootstrap/run sequence.
pub fn execute(args: &SupervisorArgs) -> Result<(), SupervisorError> {
    let rt = tokio::runtime::Runtime::new()?;

    let supervisor = Supervisor::bootstrap()?;

    let _pid_file = match &args.pid {
        Some(path) => Some(PidFile::acquire(path)?),
        None => None,
    };

    if let Some(path) = &args.hostname_file {
        write_hostname_file(path);
    }

    let _profiler_guard = args.profile_output.as_deref().and_then(profiling::start);

    drop_privileges(supervisor.master_settings());

    supervisor.run(args.single, rt.handle().clone())
}

/// `master.uname`/`master.gname` → `setgid`/`setuid` (gid first, since
/// dropping uid first would forfeit the privilege needed to change gid).
/// Unix-only; this whole agent targets Unix back-ends (SPEC_FULL §6.1).
fn drop_privileges(master: &MasterSettings) {
    if let Some(gname) = &master.gname {
        match nix::unistd::Group::from_name(gname) {
            Ok(Some(group)) => {
                if let Err(err) = nix::unistd::setgid(group.gid) {
                    tracing::error!(%err, gname, "failed to drop to configured gid");
                }
            }
            Ok(None) => tracing::error!(gname, "configured group not found"),
            Err(err) => tracing::error!(%err, gname, "group lookup failed"),
        }
    }
    if let Some(uname) = &master.uname {
        match nix::unistd::User::from_name(uname) {
            Ok(Some(user)) => {
                if let Err(err) = nix::unistd::setuid(user.uid) {
                    tracing::error!(%err, uname, "failed to drop to configured uid");
                }
            }
            Ok(None) => tracing::error!(uname, "configured user not found"),
            Err(err) => tracing::error!(%err, uname, "user lookup failed"),
        }
    }
}

fn write_hostname_file(path: &Path) {
    match Command::new("hostname").arg("-f").output() {
        Ok(output) => {
            let fqdn = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if let Err(err) = std::fs::write(path, fqdn) {
                tracing::error!(%err, path = %path.display(), "failed to write hostname file");
            }
        }
        Err(err) => tracing::error!(%err, "failed to resolve FQDN via `hostname -f`"),
    }
}
