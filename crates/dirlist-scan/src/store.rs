//! Shared, append-only store of raw entries.
//!
//! The scan job appends one batch per directory; the consumer mirrors the
//! store into its own vector with [`DirEntryStore::sync_into`]. The lock is
//! only held for appends and tail copies, never while a directory is being
//! read or while the consumer sorts and filters.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dirlist_core::RawEntry;
use tracing::trace;

#[derive(Debug, Default)]
struct StoreInner {
    entries: Vec<Arc<RawEntry>>,
    version: u64,
    generation: u64,
}

/// Append-only entry store shared between a scan job and its consumer.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct DirEntryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl DirEntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Entries are append-only, a poisoned store is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch of entries produced under `generation`.
    ///
    /// Returns `false` and drops the batch when the store was cleared since
    /// the producing job started.
    pub fn merge_batch(&self, generation: u64, batch: Vec<RawEntry>) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            trace!(
                expected = inner.generation,
                got = generation,
                dropped = batch.len(),
                "Discarding stale batch"
            );
            return false;
        }
        if batch.is_empty() {
            return true;
        }
        inner.entries.extend(batch.into_iter().map(Arc::new));
        inner.version += 1;
        true
    }

    /// Drop all entries and start a new generation.
    ///
    /// Returns the new generation, to be handed to the next scan job.
    pub fn clear(&self) -> u64 {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.version += 1;
        inner.generation += 1;
        inner.generation
    }

    /// Number of merged entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Counter bumped on every merge and clear.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Current generation; batches from other generations are rejected.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Entry at a raw index.
    pub fn get(&self, index: usize) -> Option<Arc<RawEntry>> {
        self.lock().entries.get(index).cloned()
    }

    /// Raw index of the entry with the given relative path.
    pub fn find_by_relpath(&self, relpath: &str) -> Option<usize> {
        self.lock()
            .entries
            .iter()
            .position(|entry| entry.relpath == relpath)
    }

    /// Copy of all current entries.
    pub fn snapshot(&self) -> Vec<Arc<RawEntry>> {
        self.lock().entries.clone()
    }

    /// Bring a consumer-side mirror up to date.
    ///
    /// Only the entries appended since the last sync are copied. A mirror
    /// from an older generation is reset first. Returns the number of
    /// entries added to the mirror.
    pub fn sync_into(&self, mirror: &mut StoreMirror) -> usize {
        let inner = self.lock();
        if mirror.generation != inner.generation || mirror.entries.len() > inner.entries.len() {
            mirror.entries.clear();
            mirror.generation = inner.generation;
        }
        let start = mirror.entries.len();
        mirror.entries.extend_from_slice(&inner.entries[start..]);
        inner.entries.len() - start
    }
}

/// Consumer-side copy of a [`DirEntryStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreMirror {
    entries: Vec<Arc<RawEntry>>,
    generation: u64,
}

impl StoreMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrored entries, in merge order.
    pub fn entries(&self) -> &[Arc<RawEntry>] {
        &self.entries
    }

    /// Mutable view for in-place reordering.
    ///
    /// Later syncs append after the current entries, so reordering what
    /// is already mirrored is safe.
    pub fn entries_mut(&mut self) -> &mut [Arc<RawEntry>] {
        &mut self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Arc<RawEntry>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generation the mirror was last synced from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget all mirrored entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
