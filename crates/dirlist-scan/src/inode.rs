//! Directory identity tracking for symlink cycle protection.

use std::fs::Metadata;

use dashmap::DashSet;

/// Device and inode pair identifying a directory on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirKey {
    pub device: u64,
    pub inode: u64,
}

impl DirKey {
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Key for the given metadata, when the platform exposes inodes.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Tracks directories already listed during one scan.
///
/// Only consulted when symlinks are followed; a directory reached twice
/// through different links is listed once.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: DashSet<DirKey>,
}

impl VisitedDirs {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track a directory. Returns `true` if this is the first time seeing it.
    pub fn track(&self, key: DirKey) -> bool {
        self.seen.insert(key)
    }

    /// Check if a directory has been seen (without tracking).
    pub fn has_seen(&self, key: &DirKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Clear all tracked directories.
    pub fn clear(&self) {
        self.seen.clear();
    }
}
