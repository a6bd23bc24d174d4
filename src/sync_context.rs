//! A single-writer serial task queue: the synchronization context every
//! balancer and picker-state-change callback runs inside, so that
//! concurrent connectivity events never interleave.
//!
//! Grounded on the multiplexer's own single-I/O-context-task discipline
//! (`transport::multiplexer::Multiplexer::run`): one consumer task drains
//! an unbounded channel in order, so callers enqueue work instead of
//! synchronizing with locks.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

type Task = Box<dyn FnOnce() + Send>;

/// A handle used to enqueue work onto a [`SyncContext`]'s single consumer
/// task. Cloning is cheap; every clone feeds the same FIFO.
#[derive(Clone)]
pub struct SyncContextHandle {
    tasks: mpsc::UnboundedSender<Task>,
}

impl SyncContextHandle {
    /// Enqueues `task` to run next, after everything already queued.
    ///
    /// A task that panics is caught at the consumer loop and logged; it
    /// does not corrupt the context or stop later tasks from running.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.tasks.send(Box::new(task));
    }

    /// Arranges for `task` to be enqueued (via [`Self::execute`]) no sooner
    /// than `delay` from now.
    ///
    /// The wait happens on an independently spawned timer, not inside the
    /// consumer loop: an external timer source fires and re-enqueues the
    /// task, so a scheduled task's delay never stalls whatever else is
    /// already queued behind it.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + Send + 'static) {
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tasks.send(Box::new(task));
        });
    }
}

/// Owns the consumer task that drains a [`SyncContextHandle`]'s queue.
///
/// Dropping every [`SyncContextHandle`] closes the channel and lets the
/// consumer task end; `shutdown` awaits that explicitly instead. A
/// timer spawned by [`SyncContextHandle::schedule`] holds its own sender
/// clone, so it can still deliver its task after every handle the caller
/// holds has been dropped.
pub struct SyncContext {
    handle: SyncContextHandle,
    worker: JoinHandle<()>,
}

impl SyncContext {
    /// Spawns the consumer task on the current Tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let worker = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                run_task(task);
            }
        });
        Self {
            handle: SyncContextHandle { tasks: tx },
            worker,
        }
    }

    /// A cloneable handle for submitting work to this context.
    #[must_use]
    pub fn handle(&self) -> SyncContextHandle {
        self.handle.clone()
    }

    /// Drops the submission handle and waits for the consumer task to
    /// drain and exit.
    pub async fn shutdown(self) {
        drop(self.handle);
        let _ = self.worker.await;
    }
}

fn run_task(task: Task) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
        tracing::warn!(?panic, "sync context task panicked; continuing with the next queued task");
    }
}
