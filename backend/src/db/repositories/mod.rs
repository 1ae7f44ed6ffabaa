//! Historical repository implementations.
//!
//! - `json_archive`: one JSON file on disk, the production store
//! - `local`: in-memory implementation for unit testing and local development
pub mod json_archive;
pub mod local;

pub use json_archive::JsonArchiveRepository;
pub use local::LocalRepository;
