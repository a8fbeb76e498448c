//! Parallel Dispatcher - GC Worker Threads
//!
//! Owns the pool of GC worker threads. The dispatcher is sized with the tuned
//! thread count; the thread that calls [`ParallelDispatcher::run_task`]
//! participates as worker 0, so `startup` spawns `thread_count - 1` threads.
//!
//! ## Task Flow
//!
//! ```text
//! run_task(task)
//!   ├─▶ worker 1..N: Run { task, done }   (one channel per worker)
//!   ├─▶ caller runs task(0)
//!   └─▶ wait until every worker reports on `done`
//! ```
//!
//! Threads are never shut down across a checkpoint/restore; the pool only
//! stops in [`ParallelDispatcher::kill`].

use crate::error::{FgcError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Unit of parallel work; receives the worker id
pub type DispatcherTask = Arc<dyn Fn(usize) + Send + Sync>;

enum WorkerMessage {
    Run { task: DispatcherTask, done: Sender<usize> },
    Shutdown,
}

struct WorkerHandle {
    id: usize,
    sender: Sender<WorkerMessage>,
    handle: JoinHandle<()>,
}

/// GC worker pool
pub struct ParallelDispatcher {
    thread_count_maximum: usize,
    stack_size: usize,
    workers: Vec<WorkerHandle>,
    started: bool,
}

impl ParallelDispatcher {
    /// Create a dispatcher for `thread_count` workers
    ///
    /// # Arguments
    /// * `thread_count` - Workers including the calling thread
    /// * `stack_size` - Worker stack size in bytes; 0 uses the platform default
    pub fn new_instance(thread_count: usize, stack_size: usize) -> Result<Self> {
        if thread_count == 0 {
            return Err(FgcError::allocation("parallel dispatcher", "zero worker threads"));
        }
        let mut workers = Vec::new();
        workers.try_reserve_exact(thread_count - 1)?;
        Ok(Self {
            thread_count_maximum: thread_count,
            stack_size,
            workers,
            started: false,
        })
    }

    /// Spawn the worker threads
    pub fn startup(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        for id in 1..self.thread_count_maximum {
            let (sender, receiver) = channel::unbounded();
            let mut builder = thread::Builder::new().name(format!("gc-worker-{}", id));
            if self.stack_size > 0 {
                builder = builder.stack_size(self.stack_size);
            }

            match builder.spawn(move || worker_loop(id, receiver)) {
                Ok(handle) => self.workers.push(WorkerHandle { id, sender, handle }),
                Err(e) => {
                    self.shutdown_workers();
                    return Err(FgcError::allocation(
                        "GC worker thread",
                        format!("gc-worker-{}: {}", id, e),
                    ));
                }
            }
        }

        self.started = true;
        log::debug!(
            "dispatcher started with {} threads",
            self.thread_count_maximum
        );
        Ok(())
    }

    /// Run `task` on every thread and wait for all of them
    ///
    /// Returns how many threads ran the task.
    pub fn run_task(&self, task: DispatcherTask) -> Result<usize> {
        if !self.started {
            return Err(FgcError::InvalidState {
                expected: "dispatcher started".to_string(),
                actual: "not started".to_string(),
            });
        }

        let (done_tx, done_rx) = channel::unbounded();
        for worker in &self.workers {
            worker
                .sender
                .send(WorkerMessage::Run {
                    task: Arc::clone(&task),
                    done: done_tx.clone(),
                })
                .map_err(|_| FgcError::Internal(format!("GC worker {} is gone", worker.id)))?;
        }
        drop(done_tx);

        task(0);

        let completed = done_rx.iter().count();
        if completed != self.workers.len() {
            return Err(FgcError::Internal(format!(
                "{} of {} GC workers did not finish",
                self.workers.len() - completed,
                self.workers.len()
            )));
        }
        Ok(completed + 1)
    }

    /// Thread count the dispatcher was sized with
    pub fn thread_count_maximum(&self) -> usize {
        self.thread_count_maximum
    }

    /// Threads currently able to run tasks
    pub fn active_thread_count(&self) -> usize {
        if self.started {
            self.workers.len() + 1
        } else {
            0
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn shutdown_workers(&mut self) {
        for worker in &self.workers {
            let _ = worker.sender.send(WorkerMessage::Shutdown);
        }
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                log::error!("[GC Worker {}] panicked before shutdown", worker.id);
            }
        }
        self.started = false;
    }

    /// Stop and join every worker
    pub fn kill(mut self) {
        self.shutdown_workers();
        log::trace!("dispatcher destroyed");
    }
}

impl std::fmt::Debug for ParallelDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelDispatcher")
            .field("thread_count_maximum", &self.thread_count_maximum)
            .field("workers", &self.workers.len())
            .field("started", &self.started)
            .finish()
    }
}

fn worker_loop(id: usize, receiver: Receiver<WorkerMessage>) {
    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Run { task, done } => {
                task(id);
                let _ = done.send(id);
            }
            WorkerMessage::Shutdown => break,
        }
    }
    log::trace!("[GC Worker {}] exiting", id);
}
