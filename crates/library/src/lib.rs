//! Client for the remote character library service.
//!
//! [`api::LibraryApi`] is a thin HTTP wrapper with no retry logic; callers
//! depend on the [`api::CharacterLibrary`] trait. [`health::HealthMonitor`]
//! probes reachability and never fails.

pub mod api;
pub mod config;
pub mod health;
pub mod messages;

pub use api::{CharacterLibrary, LibraryApi, LibraryApiError};
pub use config::LibraryConfig;
pub use health::{HealthMonitor, HealthResult};
