//! A worker thread pool implementing [`ExecutionContext`].
//!
//! The task engine only ever sees the [`ExecutionContext`] trait; this pool is
//! the stock implementation callers construct and own.
//!
//! - **Capacity**: threads are spawned lazily up to `max_threads`; threads
//!   above `min_threads` retire after `idle_timeout` without work
//! - **Queue**: a lock-free FIFO shared by all workers
//! - **Shutdown**: new submissions are rejected, queued jobs still run
//!
//! The pool is split into an owning [`WorkerPool`], which shuts the threads
//! down when dropped, and cloneable [`WorkerPoolHandle`]s that tasks hold. A
//! task never owns the pool, so the last reference is never dropped on one of
//! the pool's own threads.

use super::config::{ConfigError, PoolConfig};
use super::context::{ExecutionContext, Job, Rejected};
use crate::tracing_compat::{error, trace, warn};
use crate::types::PanicPayload;
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct PoolInner {
    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
    thread_name_prefix: String,
    /// Threads currently alive.
    active_threads: AtomicUsize,
    /// Threads currently running a job.
    busy_threads: AtomicUsize,
    /// Jobs queued but not yet picked up.
    pending_count: AtomicUsize,
    /// Jobs accepted since creation.
    submitted: AtomicU64,
    next_thread_id: AtomicUsize,
    queue: SegQueue<Job>,
    shutdown: AtomicBool,
    /// Guards the park/notify handshake; workers re-check the queue under it.
    parking: Mutex<()>,
    condvar: Condvar,
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// An owned worker pool.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

/// A cloneable handle used to submit work to a [`WorkerPool`].
#[derive(Clone)]
pub struct WorkerPoolHandle {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool, spawning `min_threads` threads eagerly.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            min_threads: config.min_threads,
            max_threads: config.max_threads,
            idle_timeout: config.idle_timeout,
            thread_name_prefix: config.thread_name_prefix,
            active_threads: AtomicUsize::new(0),
            busy_threads: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            submitted: AtomicU64::new(0),
            next_thread_id: AtomicUsize::new(0),
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            parking: Mutex::new(()),
            condvar: Condvar::new(),
            thread_handles: Mutex::new(Vec::with_capacity(config.max_threads)),
        });

        for _ in 0..inner.min_threads {
            spawn_thread(&inner);
        }

        Ok(Self { inner })
    }

    /// Creates a pool from [`PoolConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(PoolConfig::from_env()?)
    }

    /// Returns a cloneable handle to this pool.
    #[must_use]
    pub fn handle(&self) -> WorkerPoolHandle {
        WorkerPoolHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns the number of jobs waiting in the queue.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Returns the number of live threads.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Relaxed)
    }

    /// Returns the number of jobs accepted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::Relaxed)
    }

    /// Returns `true` if the pool is shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stops accepting jobs. Jobs already queued still run.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.notify_all();
    }

    /// Shuts down and waits for every thread to exit.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();
        let deadline = Instant::now() + timeout;

        while self.inner.active_threads.load(Ordering::Acquire) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    active = self.inner.active_threads.load(Ordering::Relaxed),
                    "worker pool shutdown timed out"
                );
                return false;
            }
            self.inner.notify_all();
            thread::sleep(Duration::from_millis(5).min(remaining));
        }

        let handles = std::mem::take(&mut *self.inner.thread_handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown_and_wait(Duration::from_secs(5));
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("min_threads", &self.inner.min_threads)
            .field("max_threads", &self.inner.max_threads)
            .field("active_threads", &self.active_threads())
            .field("pending_tasks", &self.pending_count())
            .finish()
    }
}

impl WorkerPoolHandle {
    /// Returns the number of jobs waiting in the queue.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Returns `true` if the pool is shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

impl ExecutionContext for WorkerPoolHandle {
    fn submit(&self, job: Job) -> Result<(), Rejected> {
        if self.is_shutdown() {
            warn!("job submitted to a shut down worker pool");
            return Err(Rejected::shutdown());
        }
        self.inner.queue.push(job);
        self.inner.pending_count.fetch_add(1, Ordering::Relaxed);
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);

        maybe_spawn_thread(&self.inner);
        self.inner.notify_one();
        Ok(())
    }
}

impl fmt::Debug for WorkerPoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolHandle")
            .field(
                "active_threads",
                &self.inner.active_threads.load(Ordering::Relaxed),
            )
            .field("pending_tasks", &self.pending_count())
            .finish()
    }
}

impl PoolInner {
    fn notify_one(&self) {
        let _guard = self.parking.lock();
        self.condvar.notify_one();
    }

    fn notify_all(&self) {
        let _guard = self.parking.lock();
        self.condvar.notify_all();
    }

    /// Gives up one thread slot if that keeps at least `min_threads` alive.
    fn try_retire(&self) -> bool {
        self.active_threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active > self.min_threads).then(|| active - 1)
            })
            .is_ok()
    }
}

fn spawn_thread(inner: &Arc<PoolInner>) {
    let thread_inner = Arc::clone(inner);
    let thread_id = inner.next_thread_id.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-worker-{thread_id}", inner.thread_name_prefix);
    inner.active_threads.fetch_add(1, Ordering::AcqRel);

    let spawned = thread::Builder::new().name(name).spawn(move || {
        trace!("worker thread started");
        if worker_loop(&thread_inner) {
            thread_inner.active_threads.fetch_sub(1, Ordering::AcqRel);
        }
        trace!("worker thread stopped");
    });

    match spawned {
        Ok(handle) => {
            let mut handles = inner.thread_handles.lock();
            // Retired threads leave finished handles behind.
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
        Err(err) => {
            inner.active_threads.fetch_sub(1, Ordering::AcqRel);
            error!(error = %err, "failed to spawn worker thread");
        }
    }
}

fn maybe_spawn_thread(inner: &Arc<PoolInner>) {
    let active = inner.active_threads.load(Ordering::Relaxed);
    let busy = inner.busy_threads.load(Ordering::Relaxed);
    let pending = inner.pending_count.load(Ordering::Relaxed);

    if active < inner.max_threads && busy >= active && pending > 0 {
        spawn_thread(inner);
    }
}

/// Runs jobs until shutdown or retirement.
///
/// Returns `true` if the caller still has to release its thread slot, which
/// is the case on shutdown; a retiring thread has already released it.
fn worker_loop(inner: &PoolInner) -> bool {
    loop {
        if let Some(job) = inner.queue.pop() {
            inner.pending_count.fetch_sub(1, Ordering::Relaxed);
            inner.busy_threads.fetch_add(1, Ordering::Relaxed);
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                error!(
                    panic = %PanicPayload::from_unwind(payload.as_ref()),
                    "job panicked on worker thread"
                );
            }
            inner.busy_threads.fetch_sub(1, Ordering::Relaxed);
            continue;
        }

        let mut guard = inner.parking.lock();
        if !inner.queue.is_empty() {
            continue;
        }
        if inner.shutdown.load(Ordering::Acquire) {
            return true;
        }

        if inner.active_threads.load(Ordering::Relaxed) > inner.min_threads {
            let timed_out = inner
                .condvar
                .wait_for(&mut guard, inner.idle_timeout)
                .timed_out();
            if timed_out && inner.queue.is_empty() && inner.try_retire() {
                // A submitter that saw this thread as alive did not spawn a
                // replacement, so take back the slot if work slipped in.
                if inner.queue.is_empty() {
                    return false;
                }
                inner.active_threads.fetch_add(1, Ordering::AcqRel);
            }
        } else {
            inner.condvar.wait(&mut guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::collections::HashSet;
    use std::sync::mpsc;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn runs_submitted_jobs() {
        init_test("runs_submitted_jobs");
        let pool = WorkerPool::new(PoolConfig::default().min_threads(1).max_threads(4))
            .expect("valid config");
        let handle = pool.handle();
        let (tx, rx) = mpsc::channel();

        for i in 0..16 {
            let tx = tx.clone();
            handle
                .submit(Box::new(move || {
                    let _ = tx.send(i);
                }))
                .expect("pool accepts work");
        }
        drop(tx);

        let mut seen: Vec<i32> = rx.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
        assert_eq!(pool.submitted(), 16);
        crate::test_complete!("runs_submitted_jobs");
    }

    #[test]
    fn jobs_run_on_named_pool_threads() {
        init_test("jobs_run_on_named_pool_threads");
        let pool = WorkerPool::new(PoolConfig::fixed(2).thread_name_prefix("named"))
            .expect("valid config");
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let tx = tx.clone();
            pool.handle()
                .submit(Box::new(move || {
                    let name = thread::current().name().map(str::to_owned);
                    let _ = tx.send(name);
                }))
                .expect("pool accepts work");
        }
        drop(tx);
        let names: HashSet<Option<String>> = rx.iter().collect();
        assert!(names
            .iter()
            .all(|n| n.as_deref().is_some_and(|n| n.starts_with("named-worker-"))));
        crate::test_complete!("jobs_run_on_named_pool_threads");
    }

    #[test]
    fn rejects_after_shutdown() {
        init_test("rejects_after_shutdown");
        let pool = WorkerPool::new(PoolConfig::fixed(1)).expect("valid config");
        let handle = pool.handle();
        assert!(pool.shutdown_and_wait(Duration::from_secs(5)));
        let result = handle.submit(Box::new(|| {}));
        assert!(result.is_err());
        assert!(handle.is_shutdown());
        crate::test_complete!("rejects_after_shutdown");
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        init_test("panicking_job_keeps_worker_alive");
        let pool = WorkerPool::new(PoolConfig::fixed(1)).expect("valid config");
        let handle = pool.handle();
        handle
            .submit(Box::new(|| panic!("job failure")))
            .expect("pool accepts work");

        let (tx, rx) = mpsc::channel();
        handle
            .submit(Box::new(move || {
                let _ = tx.send(7);
            }))
            .expect("pool accepts work");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
        crate::test_complete!("panicking_job_keeps_worker_alive");
    }

    #[test]
    fn idle_threads_retire_to_minimum() {
        init_test("idle_threads_retire_to_minimum");
        let pool = WorkerPool::new(
            PoolConfig::default()
                .min_threads(0)
                .max_threads(2)
                .idle_timeout(Duration::from_millis(20)),
        )
        .expect("valid config");
        let (tx, rx) = mpsc::channel();
        pool.handle()
            .submit(Box::new(move || {
                let _ = tx.send(());
            }))
            .expect("pool accepts work");
        rx.recv_timeout(Duration::from_secs(5)).expect("job ran");

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.active_threads() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.active_threads(), 0);
        crate::test_complete!("idle_threads_retire_to_minimum");
    }

    #[test]
    fn retired_thread_handles_are_pruned() {
        init_test("retired_thread_handles_are_pruned");
        let pool = WorkerPool::new(
            PoolConfig::default()
                .min_threads(0)
                .max_threads(1)
                .idle_timeout(Duration::from_millis(5)),
        )
        .expect("valid config");

        for round in 0..20 {
            let (tx, rx) = mpsc::channel();
            pool.handle()
                .submit(Box::new(move || {
                    let _ = tx.send(round);
                }))
                .expect("pool accepts work");
            assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(round));

            let deadline = Instant::now() + Duration::from_secs(5);
            while pool.active_threads() > 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }
        }

        // At most the thread spawned last, plus one whose exit had not yet
        // been observed when that thread's handle was pushed.
        let kept = pool.inner.thread_handles.lock().len();
        assert!(kept <= 2, "kept {kept} handles after 20 spawn/retire rounds");
        crate::test_complete!("retired_thread_handles_are_pruned", kept = kept);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = WorkerPool::new(PoolConfig::default().max_threads(0));
        assert!(matches!(result, Err(ConfigError::NoThreads)));
    }
}
