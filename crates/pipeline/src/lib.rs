//! Orchestration of character sync and image generation against the
//! remote character library.
//!
//! - [`sync::SyncOrchestrator`] reconciles local characters with remote
//!   entities using delete-and-recreate.
//! - [`generation::GenerationOrchestrator`] drives the gated multi-stage
//!   image pipeline.
//! - [`recorder::MetadataRecorder`] appends one evidence row per attempt.
//! - [`service::CharacterLibraryService`] is the facade handlers call.

pub mod error;
pub mod generation;
pub mod lock;
pub mod recorder;
pub mod retry;
pub mod service;
pub mod settings;
pub mod sync;

pub use error::PipelineError;
pub use service::CharacterLibraryService;
pub use settings::PipelineSettings;
