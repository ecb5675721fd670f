//! Core primitives for Horizon Sections.
//!
//! This crate provides the building blocks the section composition engine is
//! written against:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Logging**: `tracing` targets and tree formatting options
//! - **Configuration**: [`TreeConfig`], loadable from TOML
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_sections_core::Signal;
//!
//! let batch_committed = Signal::<(usize, usize)>::new();
//!
//! let conn_id = batch_committed.connect(|(inserted, removed)| {
//!     println!("+{inserted} -{removed}");
//! });
//!
//! batch_committed.emit((2, 1));
//! batch_committed.disconnect(conn_id);
//! ```

pub mod config;
pub mod logging;
pub mod signal;

pub use config::{ConfigError, ConfigResult, TreeConfig};
pub use logging::{TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionId, Signal};
