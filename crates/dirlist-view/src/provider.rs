//! Where display entries come from: the mirrored store, or an external
//! provider that replaces scanning and filtering altogether.

use std::path::Path;
use std::sync::Arc;

use dirlist_core::{EntryId, FilterOptions, RawEntry, SortMode};

use crate::cache::Materializer;
use crate::display::DisplayEntry;

/// State of an external provider's listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    /// Still listing; call again on the next poll.
    Running { progress: f32 },
    /// Listing is complete.
    Finished,
    /// Listing failed; whatever was listed so far stays available.
    Failed { message: String },
}

/// External source of entries.
///
/// When attached to a [`FileList`](crate::FileList), the provider does the
/// listing, sorting and filtering; the list only caches and windows its
/// results.
pub trait EntryProvider: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start or continue listing `root`. Called on every poll until it
    /// stops returning [`ProviderStatus::Running`].
    fn list(&mut self, root: &Path) -> ProviderStatus;

    /// Apply a sort mode and filter; returns the filtered entry count.
    fn sort_filter(&mut self, sort: SortMode, filter: &FilterOptions) -> usize;

    /// Entries `[start, end)` of the filtered view, or `None` when they
    /// are not available (yet).
    fn entries_block(&mut self, start: usize, end: usize) -> Option<Vec<DisplayEntry>>;

    /// Entries with the given identifiers; unknown ones are skipped.
    fn entries_by_id(&mut self, ids: &[EntryId]) -> Vec<DisplayEntry>;

    /// Abort any running listing.
    fn kill(&mut self) {}
}

/// Materializes filtered positions of the store mirror.
pub(crate) struct StoreMaterializer<'a> {
    root: &'a Path,
    entries: &'a [Arc<RawEntry>],
    positions: &'a [usize],
}

impl<'a> StoreMaterializer<'a> {
    pub(crate) fn new(root: &'a Path, entries: &'a [Arc<RawEntry>], positions: &'a [usize]) -> Self {
        Self {
            root,
            entries,
            positions,
        }
    }
}

impl Materializer for StoreMaterializer<'_> {
    fn materialize(&mut self, index: usize) -> Option<DisplayEntry> {
        let raw = self.entries.get(*self.positions.get(index)?)?;
        Some(DisplayEntry::from_raw(self.root, raw))
    }
}

/// Materializes through an [`EntryProvider`], one block per request.
pub(crate) struct ProviderMaterializer<'a> {
    provider: &'a mut dyn EntryProvider,
}

impl<'a> ProviderMaterializer<'a> {
    pub(crate) fn new(provider: &'a mut dyn EntryProvider) -> Self {
        Self { provider }
    }
}

impl Materializer for ProviderMaterializer<'_> {
    fn materialize(&mut self, index: usize) -> Option<DisplayEntry> {
        self.materialize_block(index, 1)?.pop()
    }

    fn materialize_block(&mut self, start: usize, len: usize) -> Option<Vec<DisplayEntry>> {
        let mut entries = self.provider.entries_block(start, start + len)?;
        if entries.len() != len {
            tracing::debug!(
                provider = self.provider.name(),
                start,
                expected = len,
                got = entries.len(),
                "Short entry block"
            );
            return None;
        }
        for entry in &mut entries {
            entry.ensure_name();
        }
        Some(entries)
    }
}
