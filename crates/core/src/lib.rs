//! Domain types and pure logic for character sync and image generation.
//!
//! Nothing in this crate performs I/O. The database, remote client and
//! orchestration layers build on these types.

pub mod error;
pub mod library;
pub mod prompt;
pub mod quality_gate;
pub mod retry;
pub mod types;
