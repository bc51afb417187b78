//! Filesystem helpers: unpacked-tree traversal and stale directory cleanup.

pub mod cleanup;
pub mod walker;
