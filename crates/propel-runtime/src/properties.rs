#![forbid(unsafe_code)]

//! Observable property storage.
//!
//! [`PropertySupport`] is the observable side of the notification contract:
//! it stores named property values for one observable and, on each write
//! that changes a value, asks the [`Dispatcher`] to notify every registered
//! observer.
//!
//! # Invariants
//!
//! 1. A property must be [`initialize`](PropertySupport::initialize)d before
//!    it can be [`set`](PropertySupport::set); its value type is fixed from
//!    then on.
//! 2. Writing a value equal to the current one is a no-op (no notification).
//! 3. Observers are notified in registration order. An observer registered
//!    with an alias gets the generic/type-qualified notification first, then
//!    the alias-qualified one.
//! 4. Registrations hold observers weakly; dropped observers are pruned
//!    lazily on the next write.
//!
//! # Failure Modes
//!
//! - **Unknown property**: `set` on a name that was never initialized returns
//!   [`DispatchError::UnknownProperty`] and stores nothing.
//! - **Type change**: `set` with another value type returns
//!   [`DispatchError::PropertyTypeMismatch`] and stores nothing.
//! - **Dispatch failure**: the value is stored, remaining observers are not
//!   notified, and the first error is returned.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use propel_core::naming;
use propel_core::value::PropertyValue;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::observer::{Observable, PropertyObserver};

/// Identifies one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

/// Type-erased weak observer.
trait ObserverSink<B>: Send + Sync {
    fn is_alive(&self) -> bool;

    fn deliver(
        &self,
        dispatcher: &Dispatcher,
        alias: Option<&str>,
        owner: &Arc<B>,
        property: &str,
        new_value: &PropertyValue,
        old_value: &PropertyValue,
    ) -> Result<(), DispatchError>;
}

struct WeakObserver<O>(Weak<O>);

impl<O: PropertyObserver, B: Observable> ObserverSink<B> for WeakObserver<O> {
    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    fn deliver(
        &self,
        dispatcher: &Dispatcher,
        alias: Option<&str>,
        owner: &Arc<B>,
        property: &str,
        new_value: &PropertyValue,
        old_value: &PropertyValue,
    ) -> Result<(), DispatchError> {
        let Some(observer) = self.0.upgrade() else {
            return Ok(());
        };
        dispatcher.notify(&observer, owner, property, new_value, old_value)?;
        if let Some(alias) = alias {
            dispatcher.notify_named(&observer, alias, owner, property, new_value, old_value)?;
        }
        Ok(())
    }
}

struct Registration<B> {
    id: RegistrationId,
    alias: Option<String>,
    sink: Arc<dyn ObserverSink<B>>,
}

/// Property store and observer registry for one observable.
pub struct PropertySupport<B> {
    dispatcher: Dispatcher,
    values: Mutex<HashMap<String, PropertyValue>>,
    observers: Mutex<Vec<Registration<B>>>,
    next_id: AtomicU64,
}

impl<B> fmt::Debug for PropertySupport<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = lock(&self.values).keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("PropertySupport")
            .field("properties", &names)
            .field("observers", &lock(&self.observers).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Observable> PropertySupport<B> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            values: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Declare a property with its initial value. No notification is sent.
    /// Re-initializing replaces the value and its type.
    pub fn initialize<T>(&self, name: &str, value: T) -> Result<(), DispatchError>
    where
        T: Any + Send + Sync,
    {
        naming::validate_property(name)?;
        lock(&self.values).insert(name.to_string(), PropertyValue::new(value));
        Ok(())
    }

    /// Register `observer`, optionally under an alias for this observable.
    pub fn register_observer<O: PropertyObserver>(
        &self,
        observer: &Arc<O>,
        alias: Option<&str>,
    ) -> Result<RegistrationId, DispatchError> {
        let alias = alias.map(naming::normalize_alias).transpose()?;
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            observable = B::type_name(),
            observer = std::any::type_name::<O>(),
            alias = alias.as_deref().unwrap_or(""),
            "observer registered"
        );
        lock(&self.observers).push(Registration {
            id,
            alias,
            sink: Arc::new(WeakObserver(Arc::downgrade(observer))),
        });
        Ok(id)
    }

    /// Remove a registration. Returns whether it existed.
    pub fn unregister_observer(&self, id: RegistrationId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|r| r.id != id);
        observers.len() != before
    }

    /// Number of registrations, including dropped observers not yet pruned.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    /// Current value as a shared handle.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<PropertyValue> {
        lock(&self.values).get(name).cloned()
    }

    /// Clone of the current value, if it exists and holds a `T`.
    #[must_use]
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        lock(&self.values)
            .get(name)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Write a property and notify observers if the value changed.
    ///
    /// Returns `Ok(false)` when the value was equal to the current one.
    pub fn set<T>(&self, owner: &Arc<B>, name: &str, value: T) -> Result<bool, DispatchError>
    where
        T: Any + PartialEq + Send + Sync,
    {
        naming::validate_property(name)?;
        let new_value = PropertyValue::new(value);
        let old_value = {
            let mut values = lock(&self.values);
            let Some(current) = values.get(name) else {
                return Err(DispatchError::UnknownProperty(name.to_string()));
            };
            let Some(current_typed) = current.downcast_ref::<T>() else {
                return Err(DispatchError::PropertyTypeMismatch {
                    property: name.to_string(),
                    expected: current.type_name(),
                    found: new_value.type_name(),
                });
            };
            if Some(current_typed) == new_value.downcast_ref::<T>() {
                return Ok(false);
            }
            let old = current.clone();
            values.insert(name.to_string(), new_value.clone());
            old
        };

        // Notify outside the value lock so handlers may read properties.
        let targets: Vec<(Option<String>, Arc<dyn ObserverSink<B>>)> = {
            let mut observers = lock(&self.observers);
            observers.retain(|r| r.sink.is_alive());
            observers
                .iter()
                .map(|r| (r.alias.clone(), Arc::clone(&r.sink)))
                .collect()
        };

        tracing::trace!(
            observable = B::type_name(),
            property = name,
            observers = targets.len(),
            "property changed"
        );
        for (alias, sink) in targets {
            sink.deliver(
                &self.dispatcher,
                alias.as_deref(),
                owner,
                name,
                &new_value,
                &old_value,
            )?;
        }
        Ok(true)
    }
}
