#![forbid(unsafe_code)]

//! Deferred-call scheduling.
//!
//! A [`Scheduler`] accepts [`Task`]s from any thread and runs them later, in
//! submission order, on a single consumer. Two implementations ship:
//!
//! - [`GuiThread`](crate::gui_thread::GuiThread) / [`GuiHandle`](crate::gui_thread::GuiHandle):
//!   a dedicated event-processing thread.
//! - [`LocalQueue`]: a FIFO drained explicitly with [`LocalQueue::run_pending`]
//!   on whichever thread acts as the GUI thread (headless mode, tests).
//!
//! Scheduling never blocks on the consumer; both queues are unbounded.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A deferred call.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors from scheduling a deferred call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The consumer is not running (never started, shut down, or died).
    Closed,
    /// The consumer thread could not be spawned.
    Spawn(String),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("event loop is not running"),
            Self::Spawn(msg) => write!(f, "failed to spawn event loop thread: {msg}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Multi-producer, single-consumer FIFO of deferred calls.
pub trait Scheduler: Send + Sync {
    /// Enqueue `task`. Returns once it is enqueued; never waits for it to run.
    fn schedule(&self, task: Task) -> Result<(), ScheduleError>;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, task: Task) -> Result<(), ScheduleError> {
        (**self).schedule(task)
    }
}

#[derive(Default)]
struct LocalState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// A scheduler drained on demand by the thread that owns the "GUI" role.
#[derive(Default)]
pub struct LocalQueue {
    state: Mutex<LocalState>,
}

impl fmt::Debug for LocalQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("LocalQueue")
            .field("pending", &state.tasks.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl LocalQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of queued calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Reject further scheduling. Already queued calls still run on the next
    /// [`run_pending`](Self::run_pending).
    pub fn close(&self) {
        self.lock().closed = true;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Run queued calls in FIFO order on the current thread until the queue
    /// is empty, including calls scheduled by the calls being run. Returns the
    /// number executed.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            // The lock is released before running the task so it can schedule.
            let next = self.lock().tasks.pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            executed += 1;
        }
        if executed > 0 {
            tracing::trace!(executed, "local queue drained");
        }
        executed
    }
}

impl Scheduler for LocalQueue {
    fn schedule(&self, task: Task) -> Result<(), ScheduleError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ScheduleError::Closed);
        }
        state.tasks.push_back(task);
        Ok(())
    }
}
