//! Bounded, on-demand worker pool for background dispatch.
//!
//! Submissions go through a zero-capacity hand-off channel: a job is either
//! taken by an idle worker, runs on a freshly spawned worker (while below
//! `max_threads`), or the submitting thread blocks until a worker frees up.
//! There is no queue to buffer work in.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use log::debug;
use log::error;
use log::trace;

use crate::config::PoolConfig;
use crate::error::BusError;

/// A unit of work run on a pool worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    config: PoolConfig,
    live_workers: AtomicUsize,
    next_thread_id: AtomicUsize,
}

pub struct WorkerPool {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    state: Arc<PoolState>,
}

impl WorkerPool {
    /// Creates the pool and eagerly starts one worker.
    pub fn new(config: PoolConfig) -> Result<Self, BusError> {
        config.validate()?;
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(0);
        let pool = Self {
            sender,
            receiver,
            state: Arc::new(PoolState {
                config,
                live_workers: AtomicUsize::new(0),
                next_thread_id: AtomicUsize::new(1),
            }),
        };

        if pool.try_reserve_worker() {
            pool.spawn_worker(None)?;
        }
        debug!(
            "Worker pool started (core={}, max={}, keep_alive={:?})",
            pool.state.config.core_threads,
            pool.state.config.max_threads,
            pool.state.config.keep_alive
        );
        Ok(pool)
    }

    /// Hands `job` to a worker. Blocks while every worker is busy and the
    /// pool is already at `max_threads`.
    pub fn submit<F>(&self, job: F) -> Result<(), BusError>
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let job = match self.sender.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Disconnected(_)) => return Err(BusError::PoolClosed),
        };

        if self.try_reserve_worker() {
            return self.spawn_worker(Some(job));
        }

        trace!("Worker pool saturated, blocking on hand-off");
        self.sender.send(job).map_err(|_| BusError::PoolClosed)
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.state.live_workers.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.state.config
    }

    fn try_reserve_worker(&self) -> bool {
        let max = self.state.config.max_threads;
        self.state
            .live_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    fn spawn_worker(&self, first_job: Option<Job>) -> Result<(), BusError> {
        let id = self.state.next_thread_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{}", self.state.config.thread_prefix, id);
        let receiver = self.receiver.clone();
        let state = self.state.clone();

        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(state, receiver, first_job));

        match spawned {
            Ok(_) => {
                debug!("Spawned worker {name}");
                Ok(())
            }
            Err(e) => {
                self.state.live_workers.fetch_sub(1, Ordering::SeqCst);
                error!("Failed to spawn worker {name}: {e}");
                Err(BusError::WorkerSpawn { source: e })
            }
        }
    }
}

fn worker_loop(state: Arc<PoolState>, receiver: Receiver<Job>, first_job: Option<Job>) {
    if let Some(job) = first_job {
        run_job(job);
    }

    let core = state.config.core_threads;
    loop {
        // Workers within the core count never time out, so they block outright.
        if state.live_workers.load(Ordering::SeqCst) <= core {
            match receiver.recv() {
                Ok(job) => run_job(job),
                Err(_) => break,
            }
            continue;
        }

        match receiver.recv_timeout(state.config.keep_alive) {
            Ok(job) => run_job(job),
            Err(RecvTimeoutError::Timeout) => {
                let retired = state
                    .live_workers
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n > core).then_some(n - 1)
                    })
                    .is_ok();
                if retired {
                    debug!("Idle worker exiting after {:?}", state.config.keep_alive);
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    state.live_workers.fetch_sub(1, Ordering::SeqCst);
}

fn run_job(job: Job) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
        let thread = std::thread::current();
        error!(
            "Job panicked on worker {}: {:?}",
            thread.name().unwrap_or("<unnamed>"),
            panic_message(&*panic)
        );
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
