//! Per-entry selection flags, keyed by identifier.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use dirlist_core::EntryId;

bitflags! {
    /// Selection state bits of an entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SelectFlags: u8 {
        const SELECTED = 1 << 0;
        const HIGHLIGHTED = 1 << 1;
        /// Entry is being renamed.
        const EDITING = 1 << 2;
    }
}

impl SelectFlags {
    pub const NONE: Self = Self::empty();
}

impl Default for SelectFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// How flags are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SelectOp {
    Add,
    Remove,
    Toggle,
}

/// Which entries an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SelectCheck {
    #[default]
    All,
    Dirs,
    Files,
}

impl SelectCheck {
    pub fn applies(self, is_dir: bool) -> bool {
        match self {
            Self::All => true,
            Self::Dirs => is_dir,
            Self::Files => !is_dir,
        }
    }
}

/// Selection flags of every entry that has any.
///
/// Entries without flags have no key, so the map only grows with the
/// selection itself. Independent of the entry cache.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    flags: HashMap<EntryId, SelectFlags>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `op` with `flags` to an entry and return its new flags.
    ///
    /// Entries not matching `check` are left untouched.
    pub fn set(
        &mut self,
        id: EntryId,
        is_dir: bool,
        op: SelectOp,
        flags: SelectFlags,
        check: SelectCheck,
    ) -> SelectFlags {
        let current = self.flags.get(&id).copied().unwrap_or_default();
        if !check.applies(is_dir) {
            return current;
        }

        let updated = match op {
            SelectOp::Add => current | flags,
            SelectOp::Remove => current.difference(flags),
            SelectOp::Toggle => current.symmetric_difference(flags),
        };

        if updated.is_empty() {
            self.flags.remove(&id);
        } else {
            self.flags.insert(id, updated);
        }
        updated
    }

    /// Flags of an entry, or none when it does not match `check`.
    pub fn get(&self, id: &EntryId, is_dir: bool, check: SelectCheck) -> SelectFlags {
        if !check.applies(is_dir) {
            return SelectFlags::NONE;
        }
        self.flags.get(id).copied().unwrap_or_default()
    }

    /// Identifiers carrying any of `flags`.
    pub fn ids_with(&self, flags: SelectFlags) -> impl Iterator<Item = &EntryId> + '_ {
        self.flags
            .iter()
            .filter(move |(_, f)| f.intersects(flags))
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }
}
