//! Repository layer: zero-sized structs with async CRUD methods.
//!
//! Each repository takes `&PgPool` and returns `Result<T, sqlx::Error>`.

pub mod character_reference_repo;
pub mod character_repo;
pub mod image_metadata_repo;

pub use character_reference_repo::CharacterReferenceRepo;
pub use character_repo::CharacterRepo;
pub use image_metadata_repo::CharacterImageMetadataRepo;
