#![forbid(unsafe_code)]

//! Dedicated GUI/event-processing thread.
//!
//! [`GuiThread`] owns the single consumer of the deferred-call queue. Any
//! number of producers hold a [`GuiHandle`] and enqueue calls; the thread
//! runs them one at a time in enqueue order.
//!
//! # Lifecycle
//!
//! - [`GuiThread::start`] spawns the thread.
//! - [`GuiThread::shutdown`] (or drop) closes the queue: calls already
//!   enqueued still run, later `schedule` calls fail with
//!   [`ScheduleError::Closed`], and the thread is joined.
//!
//! # Panics in handlers
//!
//! With [`LoopConfig::catch_panics`] (the default) a panicking call is
//! logged, reported through [`GuiThread::check_panic`], and the loop keeps
//! going. Without it the panic ends the thread and the queue reports
//! `Closed` from then on.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crate::scheduler::{ScheduleError, Scheduler, Task};

/// Default name of the event-processing thread.
pub const DEFAULT_THREAD_NAME: &str = "propel-gui";

/// Event loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub thread_name: String,
    /// Catch panics raised by deferred calls instead of ending the loop.
    pub catch_panics: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            catch_panics: true,
        }
    }
}

impl LoopConfig {
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }
}

struct Shared {
    /// `None` once the loop has been shut down. Dropping the sender
    /// disconnects the channel after everything already sent.
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    thread_id: ThreadId,
}

impl Shared {
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<Task>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> bool {
        self.sender().take().is_some()
    }
}

/// Cloneable producer side of the GUI queue.
#[derive(Clone)]
pub struct GuiHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for GuiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuiHandle")
            .field("thread_id", &self.shared.thread_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl GuiHandle {
    /// Whether the current thread is the GUI thread.
    #[must_use]
    pub fn is_gui_thread(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    /// Whether the queue still accepts calls.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.sender().is_some()
    }
}

impl Scheduler for GuiHandle {
    fn schedule(&self, task: Task) -> Result<(), ScheduleError> {
        let guard = self.shared.sender();
        let sender = guard.as_ref().ok_or(ScheduleError::Closed)?;
        sender.send(task).map_err(|_| ScheduleError::Closed)
    }
}

/// The GUI thread and its queue.
pub struct GuiThread {
    handle: GuiHandle,
    join: Option<JoinHandle<()>>,
    panic_rx: mpsc::Receiver<String>,
}

impl fmt::Debug for GuiThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuiThread")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl GuiThread {
    /// Spawn the event-processing thread.
    pub fn start(config: LoopConfig) -> Result<Self, ScheduleError> {
        let (tx, rx) = mpsc::channel::<Task>();
        let (panic_tx, panic_rx) = mpsc::channel::<String>();
        let catch_panics = config.catch_panics;

        let join = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || event_loop(rx, panic_tx, catch_panics))
            .map_err(|e| ScheduleError::Spawn(e.to_string()))?;

        tracing::debug!(thread = %config.thread_name, "gui loop started");

        let shared = Arc::new(Shared {
            sender: Mutex::new(Some(tx)),
            thread_id: join.thread().id(),
        });
        Ok(Self {
            handle: GuiHandle { shared },
            join: Some(join),
            panic_rx,
        })
    }

    /// A producer handle. Handles outlive the thread; once it is shut down
    /// they report [`ScheduleError::Closed`].
    #[must_use]
    pub fn handle(&self) -> GuiHandle {
        self.handle.clone()
    }

    /// The handle as a shared trait object, ready for a dispatcher.
    #[must_use]
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.handle())
    }

    /// Next panic message reported by the loop, if any. Never blocks.
    pub fn check_panic(&self) -> Option<String> {
        self.panic_rx.try_recv().ok()
    }

    /// Close the queue, let already enqueued calls finish, and join.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.handle.shared.close() {
            tracing::debug!("gui loop shutdown requested");
        }
        if let Some(join) = self.join.take() {
            // Joining from inside a deferred call would wait on ourselves.
            if thread::current().id() != join.thread().id() {
                let _ = join.join();
            }
        }
    }
}

impl Drop for GuiThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn event_loop(rx: mpsc::Receiver<Task>, panic_tx: mpsc::Sender<String>, catch_panics: bool) {
    let mut executed: u64 = 0;
    while let Ok(task) = rx.recv() {
        if catch_panics {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, "deferred call panicked");
                let _ = panic_tx.send(message);
            }
        } else {
            task();
        }
        executed += 1;
    }
    tracing::debug!(executed, "gui loop stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
