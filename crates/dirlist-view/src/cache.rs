//! Windowed entry cache.
//!
//! Materialized entries live in two places:
//!
//! - a ring of fixed capacity holding the contiguous window
//!   `[block_start, block_end)` of filtered indices around the last
//!   requested center; moving the window only releases and creates the
//!   entries at its edges
//! - a FIFO "misc" cache of the same capacity for sporadic lookups outside
//!   the window
//!
//! An identifier table covers both, so lookups by [`EntryId`] are O(1).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, trace};

use dirlist_core::EntryId;

use crate::display::{DisplayEntry, Thumbnail};

/// Source of display entries for filtered indices.
pub trait Materializer {
    /// Create the entry at a filtered index.
    fn materialize(&mut self, index: usize) -> Option<DisplayEntry>;

    /// Create `len` consecutive entries starting at `start`.
    ///
    /// Fails as a whole when any entry is missing.
    fn materialize_block(&mut self, start: usize, len: usize) -> Option<Vec<DisplayEntry>> {
        (start..start + len).map(|i| self.materialize(i)).collect()
    }
}

/// How a call to [`EntryCache::ensure_window`] changed the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowChange {
    /// Same window, same center.
    Unchanged,
    /// Same window around a new center.
    Recentered,
    /// Window moved but overlaps the old one; only edges were rebuilt.
    Partial,
    /// Window moved without overlap; everything was rebuilt.
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Position in the ring.
    Block(usize),
    /// Filtered index held in the misc cache.
    Misc(usize),
}

/// Fixed-capacity cache of display entries.
#[derive(Debug)]
pub struct EntryCache {
    capacity: usize,
    block: Vec<Option<DisplayEntry>>,
    block_start: usize,
    block_end: usize,
    block_center: usize,
    block_cursor: usize,
    misc: HashMap<usize, DisplayEntry>,
    misc_indices: Vec<Option<usize>>,
    misc_cursor: usize,
    ids: HashMap<EntryId, Slot>,
}

impl EntryCache {
    /// Create a cache holding up to `capacity` windowed entries.
    ///
    /// The capacity is rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            capacity,
            block: std::iter::repeat_with(|| None).take(capacity).collect(),
            block_start: 0,
            block_end: 0,
            block_center: 0,
            block_cursor: 0,
            misc: HashMap::with_capacity(capacity),
            misc_indices: vec![None; capacity],
            misc_cursor: 0,
            ids: HashMap::with_capacity(capacity * 2),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current window of filtered indices.
    pub fn window(&self) -> Range<usize> {
        self.block_start..self.block_end
    }

    /// Center of the last window request.
    pub fn center(&self) -> usize {
        self.block_center
    }

    /// Number of entries held in the misc cache.
    pub fn misc_len(&self) -> usize {
        self.misc.len()
    }

    /// Number of distinct identifiers cached.
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    fn ring_pos(&self, index: usize) -> usize {
        (self.block_cursor + index - self.block_start) & (self.capacity - 1)
    }

    fn in_window(&self, index: usize) -> bool {
        index >= self.block_start && index < self.block_end
    }

    /// Whether an index is cached, in the window or in misc.
    pub fn contains(&self, index: usize) -> bool {
        self.in_window(index) || self.misc.contains_key(&index)
    }

    /// Cached entry at a filtered index, without materializing.
    pub fn get(&self, index: usize) -> Option<&DisplayEntry> {
        if self.in_window(index) {
            return self.block[self.ring_pos(index)].as_ref();
        }
        self.misc.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DisplayEntry> {
        if self.in_window(index) {
            let pos = self.ring_pos(index);
            return self.block[pos].as_mut();
        }
        self.misc.get_mut(&index)
    }

    /// Cached entry at a filtered index, materializing it into the misc
    /// cache when it is not cached yet.
    pub fn get_or_materialize(
        &mut self,
        index: usize,
        len: usize,
        source: &mut dyn Materializer,
    ) -> Option<&DisplayEntry> {
        if index >= len {
            return None;
        }
        if !self.contains(index) {
            trace!(index, "Materializing entry outside the window");
            let entry = source.materialize(index)?;
            self.insert_misc(index, entry);
        }
        self.get(index)
    }

    /// Cached entry with the given identifier.
    pub fn find_by_id(&self, id: &EntryId) -> Option<&DisplayEntry> {
        match self.ids.get(id)? {
            Slot::Block(pos) => self.block[*pos].as_ref(),
            Slot::Misc(index) => self.misc.get(index),
        }
    }

    /// Filtered index of a cached identifier.
    pub fn index_of(&self, id: &EntryId) -> Option<usize> {
        match self.ids.get(id)? {
            Slot::Block(pos) => {
                let offset = (*pos + self.capacity - self.block_cursor) & (self.capacity - 1);
                Some(self.block_start + offset)
            }
            Slot::Misc(index) => Some(*index),
        }
    }

    /// Move the window to hold up to `capacity` entries around `center`,
    /// out of `len` filtered entries.
    ///
    /// The window is `[center - capacity/2, center + capacity/2)` clipped to
    /// `[0, len)`. Only a window clipped at the start is widened back to
    /// `capacity`; one clipped at the end keeps its start, so near the end
    /// of the list it holds fewer than `capacity` entries.
    ///
    /// Returns `None` when `center` is out of range or materialization
    /// failed; the window is then left as it was.
    pub fn ensure_window(
        &mut self,
        center: usize,
        len: usize,
        source: &mut dyn Materializer,
    ) -> Option<WindowChange> {
        if center >= len {
            debug!(center, len, "Window center out of range");
            return None;
        }

        let half = self.capacity / 2;
        let start = center.saturating_sub(half);
        let end = if start == 0 {
            self.capacity.min(len)
        } else {
            (center + half).min(len)
        };

        if start == self.block_start && end == self.block_end {
            if center == self.block_center {
                return Some(WindowChange::Unchanged);
            }
            self.block_center = center;
            return Some(WindowChange::Recentered);
        }

        let overlaps =
            self.block_start < self.block_end && start < self.block_end && end > self.block_start;

        let change = if overlaps {
            self.shift_window(start, end, source)?;
            WindowChange::Partial
        } else {
            let entries = source.materialize_block(start, end - start)?;
            self.release_window();
            self.evict_misc_range(start..end);
            self.block_start = start;
            self.block_end = end;
            self.block_cursor = 0;
            for (offset, entry) in entries.into_iter().enumerate() {
                self.place(offset, entry);
            }
            WindowChange::Total
        };

        self.block_center = center;
        trace!(start, end, center, ?change, "Window moved");
        Some(change)
    }

    fn shift_window(
        &mut self,
        start: usize,
        end: usize,
        source: &mut dyn Materializer,
    ) -> Option<()> {
        // Fetch first so a failure leaves the window untouched.
        let head = if start < self.block_start {
            Some(source.materialize_block(start, self.block_start - start)?)
        } else {
            None
        };
        let tail = if end > self.block_end {
            Some(source.materialize_block(self.block_end, end - self.block_end)?)
        } else {
            None
        };

        for index in self.block_start..start.max(self.block_start) {
            self.release(index);
        }
        if start > self.block_start {
            self.block_cursor = self.ring_pos(start);
            self.block_start = start;
        }

        for index in end.min(self.block_end)..self.block_end {
            self.release(index);
        }
        if end < self.block_end {
            self.block_end = end;
        }

        if let Some(head) = head {
            self.evict_misc_range(start..self.block_start);
            let count = head.len();
            self.block_cursor = (self.block_cursor + self.capacity - count) & (self.capacity - 1);
            self.block_start = start;
            for (offset, entry) in head.into_iter().enumerate() {
                self.place(offset, entry);
            }
        }

        if let Some(tail) = tail {
            self.evict_misc_range(self.block_end..end);
            let first = self.block_end - self.block_start;
            self.block_end = end;
            for (offset, entry) in tail.into_iter().enumerate() {
                self.place(first + offset, entry);
            }
        }

        Some(())
    }

    /// Store an entry at `offset` from the window start.
    fn place(&mut self, offset: usize, entry: DisplayEntry) {
        let pos = (self.block_cursor + offset) & (self.capacity - 1);
        self.ids.insert(entry.id, Slot::Block(pos));
        self.block[pos] = Some(entry);
    }

    /// Drop the windowed entry at a filtered index.
    fn release(&mut self, index: usize) {
        let pos = self.ring_pos(index);
        if let Some(entry) = self.block[pos].take() {
            if self.ids.get(&entry.id) == Some(&Slot::Block(pos)) {
                self.ids.remove(&entry.id);
            }
        }
    }

    fn release_window(&mut self) {
        for index in self.block_start..self.block_end {
            self.release(index);
        }
        self.block_start = 0;
        self.block_end = 0;
        self.block_cursor = 0;
    }

    fn insert_misc(&mut self, index: usize, entry: DisplayEntry) {
        if let Some(old) = self.misc_indices[self.misc_cursor].take() {
            self.remove_misc(old);
        }
        self.ids.insert(entry.id, Slot::Misc(index));
        self.misc.insert(index, entry);
        self.misc_indices[self.misc_cursor] = Some(index);
        self.misc_cursor = (self.misc_cursor + 1) % self.capacity;
    }

    fn remove_misc(&mut self, index: usize) {
        if let Some(entry) = self.misc.remove(&index) {
            if self.ids.get(&entry.id) == Some(&Slot::Misc(index)) {
                self.ids.remove(&entry.id);
            }
        }
    }

    /// Drop misc entries for indices about to enter the window.
    fn evict_misc_range(&mut self, range: Range<usize>) {
        if self.misc.is_empty() {
            return;
        }
        let promoted: Vec<usize> = self
            .misc
            .keys()
            .copied()
            .filter(|index| range.contains(index))
            .collect();
        for index in promoted {
            self.remove_misc(index);
            for slot in self.misc_indices.iter_mut() {
                if *slot == Some(index) {
                    *slot = None;
                }
            }
        }
    }

    /// Attach a decoded preview to the entry at `index`.
    ///
    /// Only applies if that entry is still cached, still has identifier
    /// `id` and has no thumbnail yet. A `None` preview marks the entry as
    /// having none. Returns whether the entry was updated.
    pub fn attach_preview(
        &mut self,
        index: usize,
        id: &EntryId,
        thumbnail: Option<Arc<Thumbnail>>,
    ) -> bool {
        let Some(entry) = self.get_mut(index) else {
            return false;
        };
        if entry.id != *id || entry.thumbnail.is_some() {
            return false;
        }
        match thumbnail {
            Some(thumbnail) => entry.thumbnail = Some(thumbnail),
            None => entry.no_preview = true,
        }
        true
    }

    /// Windowed indices ordered nearest to the center first.
    pub fn preview_order(&self) -> Vec<usize> {
        if self.block_start >= self.block_end {
            return Vec::new();
        }
        let center = self.block_center.clamp(self.block_start, self.block_end - 1);
        std::iter::once(center)
            .chain(
                (self.block_start..center)
                    .rev()
                    .interleave(center + 1..self.block_end),
            )
            .collect()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        for slot in self.block.iter_mut() {
            *slot = None;
        }
        self.block_start = 0;
        self.block_end = 0;
        self.block_center = 0;
        self.block_cursor = 0;
        self.misc.clear();
        self.misc_indices.fill(None);
        self.misc_cursor = 0;
        self.ids.clear();
    }
}
