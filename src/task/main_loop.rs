//! Main-thread execution.
//!
//! The bus never owns the main thread. It hands main-routed work to a
//! [`MainExecutor`] supplied by the host. [`MainLoop`] is a minimal executor
//! for hosts without a UI toolkit of their own: whichever thread drives
//! [`MainLoop::run`] becomes the main thread.

use std::thread::ThreadId;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use log::debug;
use log::warn;

use crate::task::worker_pool::Job;

/// Runs tasks on one fixed thread, in submission order.
#[cfg_attr(test, mockall::automock)]
pub trait MainExecutor: Send + Sync {
    fn execute(&self, task: Job);
}

/// Cloneable submission side of a [`MainLoop`].
#[derive(Clone)]
pub struct MainHandle {
    sender: Sender<Job>,
}

impl MainExecutor for MainHandle {
    fn execute(&self, task: Job) {
        if self.sender.send(task).is_err() {
            warn!("Main loop is gone, dropping main-thread task");
        }
    }
}

pub struct MainLoop {
    receiver: Receiver<Job>,
    sender: Sender<Job>,
}

impl MainLoop {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { receiver, sender }
    }

    /// Returns a new submission handle.
    pub fn handle(&self) -> MainHandle {
        MainHandle {
            sender: self.sender.clone(),
        }
    }

    /// Runs queued tasks on the calling thread until every [`MainHandle`]
    /// has been dropped.
    pub fn run(self) {
        let Self { receiver, sender } = self;
        drop(sender);
        debug!("Main loop running on {:?}", std::thread::current().id());
        while let Ok(task) = receiver.recv() {
            task();
        }
        debug!("Main loop finished: all handles dropped");
    }

    /// Runs whatever is queued right now on the calling thread and returns
    /// how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Spawns a dedicated, named thread that drives the loop.
    ///
    /// Returns the handle to submit with and the id of the main thread.
    pub fn spawn(name: &str) -> Result<(MainHandle, ThreadId), crate::error::BusError> {
        let main_loop = Self::new();
        let handle = main_loop.handle();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || main_loop.run())?;
        Ok((handle, thread.thread().id()))
    }
}
