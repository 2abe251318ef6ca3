//! Fixed-size worker pool draining a shared command queue.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::queue::CommandQueue;
use crate::result::Outcome;
use crate::runner::ProcessRunner;

/// Running pool. Each worker keeps its own result list until [`Scheduler::join`].
pub struct Scheduler {
    workers: Vec<JoinHandle<Vec<Outcome>>>,
}

impl Scheduler {
    /// Spawn `worker_count` threads (at least one) that pull from `queue` until
    /// it is drained and closed.
    pub fn start(
        queue: CommandQueue,
        runner: Arc<dyn ProcessRunner>,
        worker_count: usize,
    ) -> io::Result<Self> {
        let worker_count = worker_count.max(1);
        info!(threads = worker_count, queued = queue.len(), "Starting worker(s)");
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let queue = queue.clone();
            let runner = Arc::clone(&runner);
            let handle = thread::Builder::new()
                .name(format!("k2-worker-{index}"))
                .spawn(move || worker_loop(index, queue, runner))?;
            workers.push(handle);
        }
        Ok(Self { workers })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker, then concatenate their results in spawn order.
    pub fn join(self) -> Vec<Outcome> {
        let mut results = Vec::new();
        for (index, handle) in self.workers.into_iter().enumerate() {
            match handle.join() {
                Ok(outcomes) => results.extend(outcomes),
                Err(_) => error!(worker = index, "Worker panicked; its results are lost"),
            }
        }
        info!(results = results.len(), "All workers complete");
        results
    }

    /// Start a pool and wait for it.
    pub fn run(
        queue: CommandQueue,
        runner: Arc<dyn ProcessRunner>,
        worker_count: usize,
    ) -> io::Result<Vec<Outcome>> {
        Ok(Self::start(queue, runner, worker_count)?.join())
    }
}

fn worker_loop(index: usize, queue: CommandQueue, runner: Arc<dyn ProcessRunner>) -> Vec<Outcome> {
    debug!(worker = index, "Worker started");
    let mut results = Vec::new();
    while let Some(item) = queue.recv() {
        debug!(worker = index, item = item.id, query = %item.command.query(), "Executing");
        results.push(item.command.execute(runner.as_ref()));
    }
    debug!(worker = index, executed = results.len(), "Worker finished");
    results
}
