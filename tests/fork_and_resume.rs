//! Execution-context handoff and completion-handle edge cases.

#[macro_use]
mod common;

use common::*;
use eventual::runtime::{ExecutionContext, Job, PoolConfig, Rejected, WorkerPool};
use eventual::{Completion, Error, ErrorKind, Outcome, Task};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

#[test]
fn fork_onto_shut_down_pool_is_rejected() {
    init_test_logging();
    test_phase!("fork_onto_shut_down_pool_is_rejected");

    let pool = test_pool(1);
    let handle = pool.handle();
    assert!(pool.shutdown_and_wait(Duration::from_secs(5)));

    match Task::spawn(handle, || 1).attempt_run() {
        Outcome::Err(err) => {
            assert_with_log!(err.kind() == ErrorKind::Rejected, "kind", ErrorKind::Rejected, err.kind());
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    test_complete!("fork_onto_shut_down_pool_is_rejected");
}

#[test]
fn rejection_is_recoverable() {
    init_test_logging();
    test_phase!("rejection_is_recoverable");

    struct Closed;
    impl ExecutionContext for Closed {
        fn submit(&self, _job: Job) -> Result<(), Rejected> {
            Err(Rejected::shutdown())
        }
    }

    let task = Task::spawn(Closed, || 1).handle(|failure| match failure {
        eventual::OutcomeError::Err(err) if err.kind() == ErrorKind::Rejected => Some(-1),
        _ => None,
    });
    let value = task.run().expect("recovered");
    assert_with_log!(value == -1, "recovered value", -1, value);

    test_complete!("rejection_is_recoverable");
}

#[test]
fn forked_work_runs_on_pool_threads_only() {
    init_test_logging();
    test_phase!("forked_work_runs_on_pool_threads_only");

    let pool = WorkerPool::new(PoolConfig::fixed(2).thread_name_prefix("fork-check")).expect("pool");
    let caller = thread::current().id();
    let names = Task::spawn(pool.handle(), || thread::current().name().map(str::to_owned))
        .map(move |name| (name, thread::current().id() != caller));
    let (name, off_caller) = names.run().expect("forked run");

    assert!(name.is_some_and(|n| n.starts_with("fork-check")));
    // The continuation runs on the thread that finished the forked pass.
    assert_with_log!(off_caller, "continuation thread", true, off_caller);

    test_complete!("forked_work_runs_on_pool_threads_only");
}

#[test]
fn dropped_completion_is_abandoned_not_hung() {
    init_test_logging();
    test_phase!("dropped_completion_is_abandoned_not_hung");

    let task = Task::async_callback(|done: Completion<u32>| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(done);
        });
    });
    match task.attempt_run() {
        Outcome::Err(err) => {
            assert_with_log!(err.kind() == ErrorKind::Abandoned, "kind", ErrorKind::Abandoned, err.kind());
        }
        other => panic!("expected abandonment, got {other:?}"),
    }

    test_complete!("dropped_completion_is_abandoned_not_hung");
}

#[test]
fn run_wakes_when_another_thread_completes() {
    init_test_logging();
    test_phase!("run_wakes_when_another_thread_completes");

    let (handle_tx, handle_rx) = mpsc::channel::<Completion<String>>();
    let handle_tx = parking_lot::Mutex::new(handle_tx);
    let task = Task::async_callback(move |done| {
        let _ = handle_tx.lock().send(done);
    })
    .map(|s: String| s.len());

    let completer = thread::spawn(move || {
        let done = handle_rx.recv().expect("registrar ran");
        thread::sleep(Duration::from_millis(30));
        done.succeed("woken".to_string());
    });

    let len = task.run().expect("completed by another thread");
    completer.join().expect("completer thread");
    assert_with_log!(len == 5, "value length", 5, len);

    test_complete!("run_wakes_when_another_thread_completes");
}

#[test]
fn each_run_repeats_effects() {
    init_test_logging();
    test_phase!("each_run_repeats_effects");

    let pool = test_pool(1);
    let ctx = CountingContext::new(pool.handle());
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let task = Task::spawn(ctx.clone(), move || counter.fetch_add(1, Ordering::SeqCst));

    for expected in 0..3 {
        let seen = task.run().expect("run succeeds");
        assert_with_log!(seen == expected, "run index", expected, seen);
    }
    assert_with_log!(ctx.submitted() == 3, "submissions", 3, ctx.submitted());

    test_complete!("each_run_repeats_effects");
}

#[test]
fn run_async_callback_fires_once() {
    init_test_logging();
    test_phase!("run_async_callback_fires_once");

    let pool = test_pool(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let counter = Arc::clone(&calls);
    Task::spawn(pool.handle(), || 9)
        .flat_map(|x| Task::<i32>::fail(Error::msg(format!("after {x}"))))
        .run_async(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome.is_err());
        });

    let was_err = rx.recv_timeout(Duration::from_secs(5)).expect("callback ran");
    assert!(was_err);
    thread::sleep(Duration::from_millis(20));
    assert_with_log!(calls.load(Ordering::SeqCst) == 1, "callback count", 1, calls.load(Ordering::SeqCst));

    test_complete!("run_async_callback_fires_once");
}
