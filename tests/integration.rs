// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios that exercise the stage agents, the store, and the
//! supervisor together rather than one module in isolation.

use harv_comm::{CommunicatorPool, FakeCommunicator, JobPayload};
use harv_core::{FakeClock, JobSpec, JobSpecStatus, PandaId, StopEvent, WorkSpec, WorkSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_stage::{
    JobFetcher, Monitor, PluginRegistry, Preparator, Propagator, Stage, StageWorker, Stager, Submitter, Sweeper, SweeperPlugin, VerbResult,
};
use harv_storage::Store;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn mapper_with_one_queue() -> Arc<QueueConfigMapper> {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(json!({"Q1": {}}).to_string().as_bytes()).unwrap();
    Arc::new(QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap())
}

/// Scenario 1: cold start against an empty DB. One queue, one fetcher
/// worker; the dispatcher has nothing to offer, so the cycle is a no-op and
/// the worker returns promptly.
#[test]
fn cold_start_with_empty_db_is_a_quick_no_op() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fake = Arc::new(FakeCommunicator::new());
    let comm = Arc::new(CommunicatorPool::new(vec![fake]));
    let store = Arc::new(Store::new());
    let mapper = mapper_with_one_queue();
    let stop = StopEvent::new();

    let stage = JobFetcher::new(comm, Arc::clone(&store), mapper, rt.handle().clone(), 50);
    let mut worker = StageWorker::new(stage, 0, stop, true, Duration::from_secs(30));

    let started = Instant::now();
    worker.run();

    assert!(started.elapsed() < Duration::from_secs(2), "an empty-DB cycle must not block");
    assert!(store.jobs_by_queue("Q1").is_empty());
}

/// Scenario 2: one job for `Q1`, carried by hand through every stage in
/// order. Asserts the full new -> fetched -> prepared -> submitted ->
/// finished -> swept walk, the WorkSpec's submitted -> finished walk, and
/// that both rows are gone once the sweeper's retention window has passed.
#[test]
fn single_job_happy_path_runs_the_full_lifecycle_and_is_retired() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fake = Arc::new(FakeCommunicator::new());
    fake.seed_jobs("Q1", vec![JobPayload { panda_id: 101, payload: json!({}) }]);
    let comm = Arc::new(CommunicatorPool::new(vec![fake]));
    let store = Arc::new(Store::new());
    let mapper = mapper_with_one_queue();
    let clock = FakeClock::new();

    let mut fetcher = JobFetcher::new(Arc::clone(&comm), Arc::clone(&store), Arc::clone(&mapper), rt.handle().clone(), 50);
    fetcher.execute().unwrap();
    assert_eq!(store.jobs_by_queue("Q1")[0].status, JobSpecStatus::Fetched);

    let mut preparator =
        Preparator::new(Arc::clone(&store), Arc::clone(&mapper), PluginRegistry::new(), clock.clone(), "prep-1".into(), 5_000, 10);
    preparator.execute().unwrap();
    assert_eq!(store.jobs_by_queue("Q1")[0].status, JobSpecStatus::Prepared);

    let mut submitter =
        Submitter::new(Arc::clone(&store), Arc::clone(&mapper), PluginRegistry::new(), clock.clone(), "sub-1".into(), 5_000, 10, 3);
    submitter.execute().unwrap();
    let job_after_submit = store.jobs_by_queue("Q1").remove(0);
    assert_eq!(job_after_submit.status, JobSpecStatus::Submitted);
    let worker_id = job_after_submit.worker_id.clone().expect("submitted job must be linked to a worker");
    assert_eq!(store.work_by_queue("Q1")[0].status, WorkSpecStatus::Submitted);

    let mut monitor = Monitor::new(Arc::clone(&store), Arc::clone(&mapper), PluginRegistry::new(), clock.clone(), "mon-1".into(), 5_000, 10);
    monitor.execute().unwrap();
    let work_after_monitor = store.get_work(&worker_id).unwrap();
    assert_eq!(work_after_monitor.status, WorkSpecStatus::Finished, "the noop monitor plug-in reports workers finished");

    let mut propagator = Propagator::new(Arc::clone(&comm), Arc::clone(&store), clock.clone(), rt.handle().clone(), "prop-1".into(), 5_000, 10);
    propagator.execute().unwrap();
    assert_eq!(store.jobs_by_queue("Q1")[0].status, JobSpecStatus::Swept, "a confirmed-finished job is marked swept");

    let mut stager = Stager::new(Arc::clone(&store), Arc::clone(&mapper), PluginRegistry::new(), clock.clone(), "stg-1".into(), 5_000, 10);
    stager.execute().unwrap();

    // Past the retention window: both rows are swept away together.
    let mut sweeper =
        Sweeper::new(Arc::clone(&store), Arc::clone(&mapper), PluginRegistry::new(), clock.clone(), "swp-1".into(), 5_000, 10, 3, 0);
    clock.advance_ms(1);
    sweeper.execute().unwrap();

    assert!(store.jobs_by_queue("Q1").is_empty(), "the swept job must be physically removed");
    assert!(store.work_by_queue("Q1").is_empty(), "the finished work row must be physically removed");
}

/// Scenario 3: two submitter workers race for the same ready JobSpec. The
/// store's claim is the only synchronization point; exactly one of them
/// must produce a WorkSpec, the other must be a no-op.
#[test]
fn submit_claim_contention_only_one_worker_wins() {
    let store = Arc::new(Store::new());
    let mut job = JobSpec::new(PandaId(1), "Q1", json!({}));
    job.advance_to(JobSpecStatus::Prepared);
    store.insert_job(job);
    let mapper = mapper_with_one_queue();

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let store = Arc::clone(&store);
            let mapper = Arc::clone(&mapper);
            std::thread::spawn(move || {
                let mut stage =
                    Submitter::new(store, mapper, PluginRegistry::new(), FakeClock::new(), format!("sub-{i}"), 5_000, 10, 3);
                stage.execute().unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let jobs = store.jobs_by_queue("Q1");
    assert_eq!(jobs.len(), 1, "contention must not duplicate or drop the job row");
    assert_eq!(jobs[0].status, JobSpecStatus::Submitted);
    assert!(jobs[0].worker_id.is_some());
    assert_eq!(store.work_by_queue("Q1").len(), 1, "exactly one worker must have created a WorkSpec");
}

/// Scenario 4: stop is raised while a worker is mid-cycle. The worker
/// finishes the iteration it already started (so the job's update is never
/// half-applied) and the supervisor-level join sees it exit cleanly.
#[test]
fn graceful_shutdown_lets_the_in_flight_iteration_finish_before_joining() {
    let store = Arc::new(Store::new());
    let mut job = JobSpec::new(PandaId(7), "Q1", json!({}));
    job.advance_to(JobSpecStatus::Prepared);
    store.insert_job(job);
    let mapper = mapper_with_one_queue();
    let stop = StopEvent::new();

    let stage = Submitter::new(Arc::clone(&store), mapper, PluginRegistry::new(), FakeClock::new(), "sub-1".into(), 5_000, 10, 3);
    let mut worker = StageWorker::new(stage, 0, stop.clone(), false, Duration::from_millis(20));

    let handle = std::thread::spawn(move || worker.run());
    stop.set();

    let started = Instant::now();
    handle.join().expect("worker thread must not panic on shutdown");
    assert!(started.elapsed() < Duration::from_secs(2), "the worker must join promptly once stop is observed");

    assert_eq!(store.jobs_by_queue("Q1")[0].status, JobSpecStatus::Submitted, "the in-flight iteration must complete, not abort midway");
}

/// Scenario 5: a malformed queue-config document must fail startup before
/// any DB connection is opened, and must never leave a pidfile behind.
#[test]
#[serial_test::serial]
fn malformed_queue_config_fails_before_the_db_opens_and_leaves_no_pidfile() {
    let home = tempfile::tempdir().unwrap();
    let qconf_path = home.path().join("queue_config.json");
    std::fs::write(&qconf_path, "{ this is not valid json").unwrap();

    let harvester_toml = home.path().join("etc/harvester");
    std::fs::create_dir_all(&harvester_toml).unwrap();
    std::fs::write(
        harvester_toml.join("harvester.toml"),
        format!("[qconf]\nconfigFile = {:?}\n", qconf_path.to_str().unwrap()),
    )
    .unwrap();

    std::env::set_var("HARVESTER_HOME", home.path());
    let pid_path = home.path().join("agent.pid");

    let args = harv_supervisor::SupervisorArgs {
        pid: Some(pid_path.clone()),
        single: true,
        hostname_file: None,
        rotate_log: false,
        profile_output: None,
    };
    let result = harv_supervisor::supervisor::execute(&args);
    std::env::remove_var("HARVESTER_HOME");

    assert!(result.is_err(), "a malformed queue-config document must fail startup");
    assert!(
        matches!(result.unwrap_err(), harv_supervisor::SupervisorError::QueueConfig(_)),
        "failure must come from the queue-config load, not some later step"
    );
    assert!(!pid_path.exists(), "bootstrap failure must never leave a pidfile behind");
}

/// Scenario 6: a queue's sweeper plug-in can't kill a cancelled worker. The
/// row is kept (not deleted) and retried until the kill-attempt cap, after
/// which it is marked `unreachable` for audit — while, in the same cycle, an
/// unrelated worker that finished cleanly and is past its retention window
/// is swept away normally.
#[test]
fn kill_verb_failure_is_retried_then_marked_unreachable_while_unrelated_work_is_still_swept() {
    struct AlwaysFailsKill;
    impl SweeperPlugin for AlwaysFailsKill {
        fn kill_worker(&self, _work: &WorkSpec) -> VerbResult {
            VerbResult::failed("dispatcher timeout")
        }
        fn sweep_worker(&self, _work: &WorkSpec) -> VerbResult {
            VerbResult::ok()
        }
    }

    let store = Arc::new(Store::new());

    let mut stuck = WorkSpec::new("Q1", "ap1", 0);
    stuck.status = WorkSpecStatus::Cancelled;
    let stuck_id = stuck.worker_id.clone();
    store.insert_work(stuck);

    let mut clean = WorkSpec::new("Q1", "ap2", 0);
    clean.status = WorkSpecStatus::Finished;
    clean.monitor_time_ms = 0;
    let clean_job = JobSpec::new(PandaId(2), "Q1", json!({}));
    clean.job_ids.push(clean_job.job_id.clone());
    store.insert_job(clean_job);
    store.insert_work(clean);

    let mut registry: PluginRegistry<dyn SweeperPlugin> = PluginRegistry::new();
    registry.register("Broken", |_spec| Arc::new(AlwaysFailsKill) as Arc<dyn SweeperPlugin>);
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(json!({"Q1": {"sweeper": {"module": "m", "class": "Broken"}}}).to_string().as_bytes()).unwrap();
    let mapper = Arc::new(QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap());
    let clock = FakeClock::new();

    let mut sweeper = Sweeper::new(Arc::clone(&store), mapper, registry, clock.clone(), "swp-1".into(), 1, 10, 2, 0);

    sweeper.execute().unwrap();
    assert_eq!(store.get_work(&stuck_id).unwrap().status, WorkSpecStatus::KillFailed);
    assert!(store.jobs_by_queue("Q1").is_empty(), "the clean job was already retired this cycle");
    assert!(store.work_by_queue("Q1").iter().any(|w| w.worker_id == stuck_id), "the clean work row is gone, the stuck one remains");

    clock.advance_ms(10_000);
    sweeper.execute().unwrap();
    assert_eq!(store.get_work(&stuck_id).unwrap().status, WorkSpecStatus::Unreachable, "cap reached, the row is marked unreachable");
    assert!(store.get_work(&stuck_id).is_some(), "unreachable rows are kept for audit, not deleted");
}
