pub mod character;
pub mod character_reference;
pub mod library;
pub mod project;
