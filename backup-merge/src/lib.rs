//! Backup Merge Library
//!
//! Merges two Moodle course backups into one archive the importer accepts:
//! one section numbering, one course context id, one file index.

pub mod archive;
pub mod config;
pub mod document;
pub mod executor;
pub mod fs;
pub mod merge;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::MergeOrchestrator;
pub use utils::errors::MergeError;
pub type Result<T> = std::result::Result<T, MergeError>;
