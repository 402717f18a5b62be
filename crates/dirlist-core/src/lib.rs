//! Core types and traits for dirlist.
//!
//! This crate provides the fundamental data structures shared by the
//! scanning engine and the view layer: raw directory entries, their
//! identifiers and type classification, container ("library") paths,
//! list configuration and error types.

mod config;
mod entry;
mod error;
mod kind;
mod libpath;

pub use config::{
    FilterOptions, ListConfig, ListConfigBuilder, ListKind, PreviewConfig, SortMode,
    DEFAULT_CACHE_SIZE, DEFAULT_PREVIEW_WORKERS,
};
pub use entry::{Category, CategoryMask, EntryId, RawEntry, TypeFlags};
pub use error::{ListError, ScanError};
pub use kind::{classify_path, is_container_name, sort_suffix, IconKind};
pub use libpath::LibraryPath;

/// Relative path of the "current directory" pseudo-entry.
pub const CURRENT_DIR: &str = ".";

/// Relative path of the "parent directory" pseudo-entry.
pub const PARENT_DIR: &str = "..";

/// Check whether a relative path is "." or "..".
pub fn is_curr_or_parent(relpath: &str) -> bool {
    relpath == CURRENT_DIR || relpath == PARENT_DIR
}
