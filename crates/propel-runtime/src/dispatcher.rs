#![forbid(unsafe_code)]

//! Property-change notification dispatcher.
//!
//! Given a property change and an observer, the dispatcher resolves which of
//! the observer's handlers apply and schedules one deferred call per handler
//! on the injected [`Scheduler`].
//!
//! # Resolution
//!
//! [`Dispatcher::notify`] probes, in this order:
//!
//! 1. `property_<property>_changed`
//! 2. `property_<snake_case(type)>_<property>_changed`
//!
//! [`Dispatcher::notify_named`] probes only
//! `property_<alias>_<property>_changed`.
//!
//! A name the observer does not respond to is skipped silently, and so is a
//! handler registered for a different observable type.
//!
//! # Invariants
//!
//! 1. Calls scheduled by one invocation run in probe order.
//! 2. Every candidate is resolved and validated before the first call is
//!    scheduled; a malformed name or a value type mismatch schedules nothing.
//!    Scheduling itself is not atomic: if the queue closes between two calls
//!    of one invocation, the calls already enqueued stay enqueued and
//!    `SchedulerUnavailable` is returned.
//! 3. Deferred calls hold the observer and observable weakly and do nothing
//!    if either has been dropped by the time they run.
//! 4. The dispatcher has no mutable state; it is `Clone` and shareable across
//!    threads.

use std::fmt;
use std::sync::{Arc, Weak};

use propel_core::naming::{self, NameError};
use propel_core::value::PropertyValue;

use crate::observer::{Observable, PropertyObserver};
use crate::scheduler::{ScheduleError, Scheduler};

/// Errors surfaced synchronously by [`Dispatcher::notify`] and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A property name, type name or alias is not a valid identifier.
    InvalidIdentifier(NameError),
    /// The event loop is not accepting calls.
    SchedulerUnavailable(ScheduleError),
    /// A handler exists for this observable but expects another value type.
    ValueTypeMismatch {
        handler: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The property was never initialized on the observable.
    UnknownProperty(String),
    /// A write changed the stored type of a property.
    PropertyTypeMismatch {
        property: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::SchedulerUnavailable(err) => write!(f, "cannot schedule handler: {err}"),
            Self::ValueTypeMismatch {
                handler,
                expected,
                found,
            } => write!(f, "handler {handler} expects {expected} values, got {found}"),
            Self::UnknownProperty(name) => write!(f, "unknown property: {name}"),
            Self::PropertyTypeMismatch {
                property,
                expected,
                found,
            } => write!(f, "property {property} holds {expected}, cannot store {found}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            Self::SchedulerUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NameError> for DispatchError {
    fn from(err: NameError) -> Self {
        Self::InvalidIdentifier(err)
    }
}

impl From<ScheduleError> for DispatchError {
    fn from(err: ScheduleError) -> Self {
        Self::SchedulerUnavailable(err)
    }
}

/// Resolves handlers and schedules them on the GUI thread.
#[derive(Clone)]
pub struct Dispatcher {
    scheduler: Arc<dyn Scheduler>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Schedule the generic and type-qualified handlers of `observer` for a
    /// change of `property` on `observable`.
    pub fn notify<O, B>(
        &self,
        observer: &Arc<O>,
        observable: &Arc<B>,
        property: &str,
        new_value: &PropertyValue,
        old_value: &PropertyValue,
    ) -> Result<(), DispatchError>
    where
        O: PropertyObserver,
        B: Observable,
    {
        let candidates = [
            naming::generic_handler_name(property)?,
            naming::type_handler_name(B::type_name(), property)?,
        ];
        self.dispatch(observer, observable, candidates, new_value, old_value)
    }

    /// Schedule the alias-qualified handler of `observer` for a change of
    /// `property` on the observable registered as `alias`.
    pub fn notify_named<O, B>(
        &self,
        observer: &Arc<O>,
        alias: &str,
        observable: &Arc<B>,
        property: &str,
        new_value: &PropertyValue,
        old_value: &PropertyValue,
    ) -> Result<(), DispatchError>
    where
        O: PropertyObserver,
        B: Observable,
    {
        let candidates = [naming::alias_handler_name(alias, property)?];
        self.dispatch(observer, observable, candidates, new_value, old_value)
    }

    fn dispatch<O, B, const N: usize>(
        &self,
        observer: &Arc<O>,
        observable: &Arc<B>,
        candidates: [String; N],
        new_value: &PropertyValue,
        old_value: &PropertyValue,
    ) -> Result<(), DispatchError>
    where
        O: PropertyObserver,
        B: Observable,
    {
        let table = observer.handlers();
        let mut resolved = Vec::with_capacity(N);
        for name in candidates {
            let Some(entry) = table.get(&name) else {
                continue;
            };
            if !entry.accepts_source::<B>() {
                tracing::trace!(
                    handler = %name,
                    registered_for = entry.source_name(),
                    "handler registered for another observable type"
                );
                continue;
            }
            for value in [new_value, old_value] {
                if !entry.accepts_value(value) {
                    return Err(DispatchError::ValueTypeMismatch {
                        handler: name,
                        expected: entry.value_name(),
                        found: value.type_name(),
                    });
                }
            }
            resolved.push((name, Arc::clone(&entry.invoke)));
        }

        for (name, invoke) in resolved {
            let observer: Weak<O> = Arc::downgrade(observer);
            let observable: Weak<B> = Arc::downgrade(observable);
            let new_value = new_value.clone();
            let old_value = old_value.clone();
            tracing::trace!(handler = %name, "handler scheduled");
            self.scheduler.schedule(Box::new(move || {
                let (Some(observer), Some(observable)) = (observer.upgrade(), observable.upgrade())
                else {
                    tracing::debug!(handler = %name, "observer or observable dropped; call skipped");
                    return;
                };
                invoke(&observer, &*observable, &new_value, &old_value);
            }))?;
        }
        Ok(())
    }
}
