//! Insertion-ordered priority queue of pending tasks.
//!
//! Items are keyed by `(priority, sequence)`. The sequence number is assigned
//! by the poster and is strictly decreasing over the queue's lifetime, so the
//! max-heap comparison yields FIFO order within a priority band: of two items
//! at the same priority, the one posted first carries the larger sequence and
//! pops first.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;

use crate::error::{BoxError, ReactorError, ReactorResult};

/// A unit of deferred work submitted to the dispatcher.
pub type Task = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

struct QueuedTask {
    priority: i32,
    sequence: i64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

/// Internally synchronized priority queue of [`Task`]s.
///
/// The queue is priority-agnostic: it orders by raw integers and leaves the
/// meaning of the bands to the caller.
#[derive(Default)]
pub struct TaskQueue {
    items: Mutex<BinaryHeap<QueuedTask>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task.
    ///
    /// `sequence` must be strictly decreasing across all pushes to this queue;
    /// the reactor hands out sequence numbers from a shared countdown counter.
    pub fn push(&self, priority: i32, sequence: i64, task: Task) {
        self.items.lock().push(QueuedTask {
            priority,
            sequence,
            task,
        });
    }

    /// Pops the highest-priority task and invokes it.
    ///
    /// The task runs outside the queue lock, so it may push further items.
    /// A task error (or contained panic) is propagated to the caller after
    /// the item has been removed. Returns whether items remain queued.
    pub fn execute_highest(&self) -> ReactorResult<bool> {
        let Some(item) = self.items.lock().pop() else {
            return Ok(false);
        };
        let QueuedTask { task, .. } = item;
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || task()));
        let remaining = !self.is_empty();
        match outcome {
            Ok(Ok(())) => Ok(remaining),
            Ok(Err(source)) => Err(ReactorError::TaskFailed(source)),
            Err(payload) => Err(ReactorError::TaskPanic(panic_message(payload))),
        }
    }

    /// Drops every pending task without invoking it. Returns how many tasks
    /// were discarded.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
