//! Media template adapters.

pub mod media_library;

pub use media_library::MediaLibrary;
