//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - An update DTO for the columns the sync and generation pipelines write

pub mod character;
pub mod character_reference;
pub mod image_metadata;
