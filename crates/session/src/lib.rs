//! Authenticated access to the pipeline-monitoring backend.
//!
//! [`SessionContext`] owns the token store, the refresh coordinator and the
//! session event channel. It is created once by the composition root and
//! shared by every [`ApiClient`] clone, which is what keeps a burst of 401s
//! down to a single refresh call.

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod form;
pub mod models;
pub mod refresh;
pub mod resources;

pub use auth::*;
pub use client::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use events::*;
pub use form::*;
pub use models::*;
pub use refresh::*;
pub use resources::*;
