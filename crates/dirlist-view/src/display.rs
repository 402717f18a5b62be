//! Materialized entries handed to the consumer.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use dirlist_core::{Category, EntryId, IconKind, RawEntry, TypeFlags};

/// One revision of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub size: u64,
    pub modified: SystemTime,
    /// Provider-specific revision identifier.
    #[serde(default)]
    pub revision_id: Option<EntryId>,
}

/// A variant of an entry, with its revisions.
///
/// Entries read from disk have exactly one variant with one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub name: Option<CompactString>,
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub active_revision: usize,
}

impl Variant {
    /// A variant with a single revision.
    pub fn single(size: u64, modified: SystemTime) -> Self {
        Self {
            name: None,
            revisions: vec![Revision {
                size,
                modified,
                revision_id: None,
            }],
            active_revision: 0,
        }
    }
}

/// Decoded RGBA8 thumbnail.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// An entry ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub relpath: CompactString,
    pub name: CompactString,
    /// Full path, root joined with the relative path.
    pub description: String,
    pub id: EntryId,
    pub typeflags: TypeFlags,
    pub category: Option<Category>,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub active_variant: usize,
    #[serde(skip)]
    pub thumbnail: Option<Arc<Thumbnail>>,
    /// Set once a preview was attempted and produced nothing.
    #[serde(skip)]
    pub no_preview: bool,
}

impl DisplayEntry {
    /// Materialize a store entry under `root`.
    pub fn from_raw(root: &Path, raw: &RawEntry) -> Self {
        Self {
            relpath: raw.relpath.clone(),
            name: raw.name.clone(),
            description: root.join(raw.relpath.as_str()).to_string_lossy().into_owned(),
            id: raw.id,
            typeflags: raw.typeflags,
            category: raw.category,
            variants: vec![Variant::single(raw.size, raw.modified)],
            active_variant: 0,
            thumbnail: None,
            no_preview: false,
        }
    }

    /// Active revision of the active variant.
    pub fn revision(&self) -> Option<&Revision> {
        let variant = self.variants.get(self.active_variant)?;
        variant.revisions.get(variant.active_revision)
    }

    pub fn size(&self) -> u64 {
        self.revision().map_or(0, |r| r.size)
    }

    pub fn modified(&self) -> SystemTime {
        self.revision().map_or(UNIX_EPOCH, |r| r.modified)
    }

    pub fn is_dir(&self) -> bool {
        self.typeflags.is_dir()
    }

    pub fn icon_kind(&self) -> IconKind {
        self.typeflags.icon_kind(&self.relpath)
    }

    /// Whether a thumbnail should be requested for this entry.
    pub fn wants_preview(&self) -> bool {
        self.thumbnail.is_none()
            && !self.no_preview
            && self.typeflags.intersects(TypeFlags::PREVIEWABLE)
    }

    /// Fill in a missing name from the relative path.
    pub(crate) fn ensure_name(&mut self) {
        if self.name.is_empty() {
            self.name = if self.is_dir() {
                self.relpath.clone()
            } else {
                self.relpath
                    .rsplit('/')
                    .next()
                    .unwrap_or(self.relpath.as_str())
                    .into()
            };
        }
    }
}
