//! Test doubles for the engine's seams.
pub mod file_store;
pub mod website;

pub use file_store::MockFileStore;
pub use website::MockWebsite;
