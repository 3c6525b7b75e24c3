#![forbid(unsafe_code)]

//! Observer capability tables.
//!
//! An observer declares the handlers it responds to in a [`HandlerTable`],
//! built once per observer type. Each handler is registered under its
//! conventional name (see [`propel_core::naming`]) together with the concrete
//! observable type and value type it accepts, so handler signatures are
//! checked at compile time:
//!
//! ```
//! use std::sync::{Mutex, OnceLock};
//! use propel_runtime::{HandlerTable, Observable, PropertyObserver};
//!
//! struct Counter;
//! impl Observable for Counter {}
//!
//! struct Window;
//! impl Observable for Window {}
//!
//! #[derive(Default)]
//! struct StatusBar {
//!     shown: Mutex<Vec<i64>>,
//!     caption: Mutex<String>,
//! }
//!
//! impl PropertyObserver for StatusBar {
//!     fn handlers(&self) -> &HandlerTable<Self> {
//!         static TABLE: OnceLock<HandlerTable<StatusBar>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             HandlerTable::<StatusBar>::builder()
//!                 .on_property::<Counter, i64>("value", |bar, _counter, new, _old| {
//!                     bar.shown.lock().unwrap().push(*new);
//!                 })
//!                 .on_alias_property::<Window, String>("main_window", "title", |bar, _w, new, _| {
//!                     *bar.caption.lock().unwrap() = new.clone();
//!                 })
//!                 .build()
//!                 .expect("handler names are valid identifiers")
//!         })
//!     }
//! }
//!
//! let bar = StatusBar::default();
//! assert!(bar.handlers().responds_to("property_value_changed"));
//! assert!(bar.handlers().responds_to("property_main_window_title_changed"));
//! ```
//!
//! A name resolves to at most one handler; registering a name twice keeps the
//! last registration.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use propel_core::naming::{self, NameError};
use propel_core::value::PropertyValue;

/// An object whose property writes produce change notifications.
pub trait Observable: Send + Sync + 'static {
    /// Declared type name used for type-qualified handler names. Module
    /// paths and generic arguments are ignored by the name derivation.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// An object that may respond to property-change handlers.
pub trait PropertyObserver: Send + Sync + Sized + 'static {
    fn handlers(&self) -> &HandlerTable<Self>;
}

type Invoke<O> = dyn Fn(&O, &(dyn Any + Send + Sync), &PropertyValue, &PropertyValue) + Send + Sync;

/// A registered handler with its accepted signature.
pub(crate) struct HandlerEntry<O> {
    source_type: TypeId,
    source_name: &'static str,
    value_name: &'static str,
    accepts_value: fn(&PropertyValue) -> bool,
    pub(crate) invoke: Arc<Invoke<O>>,
}

impl<O> HandlerEntry<O> {
    /// Whether the handler was registered for observables of type `B`.
    pub(crate) fn accepts_source<B: Any>(&self) -> bool {
        self.source_type == TypeId::of::<B>()
    }

    pub(crate) fn accepts_value(&self, value: &PropertyValue) -> bool {
        (self.accepts_value)(value)
    }

    pub(crate) fn value_name(&self) -> &'static str {
        self.value_name
    }

    pub(crate) fn source_name(&self) -> &'static str {
        self.source_name
    }
}

/// Immutable map from handler name to typed handler.
pub struct HandlerTable<O> {
    entries: HashMap<String, HandlerEntry<O>>,
}

impl<O> fmt::Debug for HandlerTable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerTable")
            .field("handlers", &names)
            .finish()
    }
}

impl<O> Default for HandlerTable<O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<O: 'static> HandlerTable<O> {
    #[must_use]
    pub fn builder() -> HandlerTableBuilder<O> {
        HandlerTableBuilder {
            entries: HashMap::new(),
            error: None,
        }
    }

    /// An observer that responds to nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl<O> HandlerTable<O> {
    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn responds_to(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered handler names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&HandlerEntry<O>> {
        self.entries.get(name)
    }
}

/// Builder for [`HandlerTable`]. The first invalid name is reported by
/// [`build`](Self::build).
pub struct HandlerTableBuilder<O> {
    entries: HashMap<String, HandlerEntry<O>>,
    error: Option<NameError>,
}

impl<O> fmt::Debug for HandlerTableBuilder<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTableBuilder")
            .field("handlers", &self.entries.len())
            .field("error", &self.error)
            .finish()
    }
}

impl<O: 'static> HandlerTableBuilder<O> {
    /// Register under an explicit handler name.
    #[must_use]
    pub fn on_handler<B, T>(
        self,
        name: &str,
        handler: impl Fn(&O, &B, &T, &T) + Send + Sync + 'static,
    ) -> Self
    where
        B: Observable,
        T: Any + Send + Sync,
    {
        self.insert(Ok(name.to_string()), handler)
    }

    /// `property_<property>_changed`
    #[must_use]
    pub fn on_property<B, T>(
        self,
        property: &str,
        handler: impl Fn(&O, &B, &T, &T) + Send + Sync + 'static,
    ) -> Self
    where
        B: Observable,
        T: Any + Send + Sync,
    {
        self.insert(naming::generic_handler_name(property), handler)
    }

    /// `property_<snake_case(B)>_<property>_changed`
    #[must_use]
    pub fn on_type_property<B, T>(
        self,
        property: &str,
        handler: impl Fn(&O, &B, &T, &T) + Send + Sync + 'static,
    ) -> Self
    where
        B: Observable,
        T: Any + Send + Sync,
    {
        self.insert(naming::type_handler_name(B::type_name(), property), handler)
    }

    /// `property_<alias>_<property>_changed`
    #[must_use]
    pub fn on_alias_property<B, T>(
        self,
        alias: &str,
        property: &str,
        handler: impl Fn(&O, &B, &T, &T) + Send + Sync + 'static,
    ) -> Self
    where
        B: Observable,
        T: Any + Send + Sync,
    {
        self.insert(naming::alias_handler_name(alias, property), handler)
    }

    fn insert<B, T>(
        mut self,
        name: Result<String, NameError>,
        handler: impl Fn(&O, &B, &T, &T) + Send + Sync + 'static,
    ) -> Self
    where
        B: Observable,
        T: Any + Send + Sync,
    {
        let name = match name {
            Ok(name) => name,
            Err(err) => {
                self.error.get_or_insert(err);
                return self;
            }
        };
        let invoke = move |observer: &O,
                           source: &(dyn Any + Send + Sync),
                           new: &PropertyValue,
                           old: &PropertyValue| {
            if let (Some(source), Some(new), Some(old)) = (
                source.downcast_ref::<B>(),
                new.downcast_ref::<T>(),
                old.downcast_ref::<T>(),
            ) {
                handler(observer, source, new, old);
            }
        };
        let entry = HandlerEntry {
            source_type: TypeId::of::<B>(),
            source_name: std::any::type_name::<B>(),
            value_name: std::any::type_name::<T>(),
            accepts_value: PropertyValue::is::<T>,
            invoke: Arc::new(invoke),
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            tracing::debug!(handler = %name, "handler registered twice; keeping the last");
        }
        self
    }

    pub fn build(self) -> Result<HandlerTable<O>, NameError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(HandlerTable {
                entries: self.entries,
            }),
        }
    }
}
