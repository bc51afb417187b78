//! Utility modules for the backup merger.

pub mod errors;
pub mod logger;

pub use errors::{MergeError, Result};
