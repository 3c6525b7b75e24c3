#![forbid(unsafe_code)]

//! Runtime: property-change dispatch onto a single GUI thread.
//!
//! # Role in Propel
//! Observables report property writes; the [`Dispatcher`] turns each write
//! into deferred calls of the observer's conventionally named handlers and
//! hands them to a [`Scheduler`]. The [`GuiThread`] is the single consumer
//! that runs those calls in order.
//!
//! # Modules
//! - [`observer`]: the `Observable`/`PropertyObserver` traits and handler tables.
//! - [`dispatcher`]: handler resolution and scheduling.
//! - [`scheduler`]: the deferred-call queue abstraction and [`LocalQueue`].
//! - [`gui_thread`]: the dedicated event-processing thread.
//! - [`properties`]: property storage and observer registration.

pub mod dispatcher;
pub mod gui_thread;
pub mod observer;
pub mod properties;
pub mod scheduler;

pub use dispatcher::{DispatchError, Dispatcher};
pub use gui_thread::{GuiHandle, GuiThread, LoopConfig};
pub use observer::{HandlerTable, HandlerTableBuilder, Observable, PropertyObserver};
pub use properties::{PropertySupport, RegistrationId};
pub use scheduler::{LocalQueue, ScheduleError, Scheduler, Task};

pub use propel_core::value::PropertyValue;
