#![forbid(unsafe_code)]

//! Type-erased property values.
//!
//! Property values are opaque to the dispatcher. [`PropertyValue`] stores any
//! `Send + Sync` value behind an `Arc`, so cloning is a reference-count bump
//! and the same value can travel to the GUI thread while the writer keeps a
//! handle of its own.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased property value.
#[derive(Clone)]
pub struct PropertyValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl PropertyValue {
    /// Wrap a value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the value as `T`, or `None` if it holds another type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether the value holds a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Fully qualified name of the stored type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both handles point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

macro_rules! impl_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for PropertyValue {
                fn from(value: $t) -> Self {
                    Self::new(value)
                }
            }
        )*
    };
}

impl_from!(bool, i32, i64, u32, u64, usize, f32, f64, char, String);

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}
