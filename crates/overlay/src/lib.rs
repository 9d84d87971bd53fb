//! Georeferenced image overlays.
//!
//! [`OverlayLoader`] is the synchronous state machine: it owns the overlay
//! currently on the map and decides what to fetch next. [`OverlayController`]
//! drives it against an [`ImageSource`] and feeds results back through the
//! single transition function, where stale results are dropped.

pub mod controller;
pub mod loader;
pub mod source;
pub mod state;

pub use controller::*;
pub use loader::*;
pub use source::*;
pub use state::*;
