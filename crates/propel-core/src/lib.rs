#![forbid(unsafe_code)]

//! Core: handler naming, property values, and logging for Propel.
//!
//! # Role in Propel
//! `propel-core` holds the pieces that do not depend on a running event
//! loop. The runtime (`propel-runtime`) builds the dispatcher, handler tables
//! and the GUI thread on top of them.
//!
//! # Primary responsibilities
//! - **naming**: deterministic handler names (`property_<scope>_<name>_changed`)
//!   and the snake-case rule behind them.
//! - **value**: [`PropertyValue`], the opaque value carried by change events.
//! - **log_support**: class-tagged log lines on top of `tracing`.

pub mod log_support;
pub mod naming;
pub mod value;

pub use log_support::{ClassLogger, LogLevel, LogOutput, LogSupport, LoggerConfig};
pub use naming::{IdentifierKind, NameError};
pub use value::PropertyValue;
