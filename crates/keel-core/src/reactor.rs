//! Single-worker reactor loop.
//!
//! The reactor owns a [`TaskQueue`] and dispatches its tasks on exactly one
//! thread, the one that calls [`Reactor::run`]. `post`, `stop` and `drain`
//! are thread-safe and may be called from anywhere, including from inside a
//! running task. Suspension happens only between tasks: once a task starts it
//! runs to completion.
//!
//! # Work holds
//!
//! With no pending tasks and no outstanding [`WorkHold`], `run` returns. An
//! embedder that wants the loop to idle until an explicit stop (the normal
//! `exec` shape) takes a hold for the duration:
//!
//! ```rust,ignore
//! let reactor = Reactor::new();
//! let hold = reactor.hold();
//! // other threads: reactor.post(...); reactor.stop();
//! reactor.run()?;
//! drop(hold);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{BoxError, ReactorError, ReactorResult};
use crate::priority::Priority;
use crate::queue::{Task, TaskQueue};

struct ReactorInner {
    queue: TaskQueue,
    /// Countdown handed to the queue as the FIFO tie-breaker.
    sequence: AtomicI64,
    /// Set by `stop`; `run` returns at the next task boundary.
    stopped: AtomicBool,
    /// Set by `drain`; posts are discarded from then on.
    discarding: AtomicBool,
    holds: AtomicUsize,
    /// Guards against a second concurrent driver.
    running: AtomicBool,
    idle: Mutex<()>,
    wakeup: Condvar,
}

/// Handle to the single-worker dispatcher. Cloning is cheap and all clones
/// address the same loop.
#[derive(Clone)]
pub struct Reactor {
    inner: Arc<ReactorInner>,
}

impl Reactor {
    /// Creates a reactor with an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ReactorInner {
                queue: TaskQueue::new(),
                sequence: AtomicI64::new(0),
                stopped: AtomicBool::new(false),
                discarding: AtomicBool::new(false),
                holds: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                idle: Mutex::new(()),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Enqueues a task at the given priority.
    ///
    /// Callable from any thread, including from a task already running on the
    /// worker. Returns `false` when the reactor has been stopped or drained;
    /// the task is then discarded without running.
    pub fn post<F>(&self, priority: Priority, task: F) -> bool
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.post_task(priority, Box::new(task))
    }

    fn post_task(&self, priority: Priority, task: Task) -> bool {
        let inner = &self.inner;
        if inner.stopped.load(Ordering::SeqCst) || inner.discarding.load(Ordering::SeqCst) {
            debug!("task discarded: reactor is shut down");
            return false;
        }
        let sequence = inner.sequence.fetch_sub(1, Ordering::SeqCst);
        inner.queue.push(priority.weight(), sequence, task);
        // Notify under the idle lock so a worker that just found the queue
        // empty cannot miss the wakeup.
        let _idle = inner.idle.lock();
        inner.wakeup.notify_one();
        true
    }

    /// Drives the loop on the calling thread.
    ///
    /// Returns `Ok(())` once [`stop`](Self::stop) has been observed, or once
    /// the queue is empty with no outstanding [`WorkHold`]. A task error or
    /// contained panic stops the reactor and is returned immediately; pending
    /// tasks stay queued for the caller to [`drain`](Self::drain).
    pub fn run(&self) -> ReactorResult<()> {
        let inner = &self.inner;
        if inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ReactorError::AlreadyRunning);
        }
        let result = self.run_loop();
        inner.running.store(false, Ordering::SeqCst);
        result
    }

    fn run_loop(&self) -> ReactorResult<()> {
        let inner = &self.inner;
        loop {
            if inner.stopped.load(Ordering::SeqCst) {
                trace!("reactor stopped");
                return Ok(());
            }
            if inner.queue.is_empty() {
                let mut idle = inner.idle.lock();
                // Re-check under the lock posters notify under.
                if inner.stopped.load(Ordering::SeqCst) {
                    return Ok(());
                }
                if inner.queue.is_empty() {
                    if inner.holds.load(Ordering::SeqCst) == 0 {
                        trace!("queue empty and no holds remain");
                        return Ok(());
                    }
                    inner.wakeup.wait(&mut idle);
                }
                continue;
            }
            if let Err(error) = inner.queue.execute_highest() {
                inner.stopped.store(true, Ordering::SeqCst);
                return Err(error);
            }
        }
    }

    /// Requests that [`run`](Self::run) return at the next task boundary.
    /// Thread-safe; idempotent.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let _idle = self.inner.idle.lock();
        self.inner.wakeup.notify_all();
    }

    /// Discards every queued task and puts the reactor into a discarding
    /// state: later posts (for example from a plugin stop hook) never execute.
    pub fn drain(&self) {
        self.inner.discarding.store(true, Ordering::SeqCst);
        let dropped = self.inner.queue.clear();
        if dropped > 0 {
            debug!(dropped, "drained pending tasks");
        }
        let _idle = self.inner.idle.lock();
        self.inner.wakeup.notify_all();
    }

    /// Keeps [`run`](Self::run) alive across an empty queue until the guard
    /// is dropped.
    pub fn hold(&self) -> WorkHold {
        self.inner.holds.fetch_add(1, Ordering::SeqCst);
        WorkHold {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether `stop` (or a failing task) has already shut the loop down.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`Reactor::hold`].
pub struct WorkHold {
    inner: Arc<ReactorInner>,
}

impl Drop for WorkHold {
    fn drop(&mut self) {
        if self.inner.holds.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _idle = self.inner.idle.lock();
            self.inner.wakeup.notify_all();
        }
    }
}
