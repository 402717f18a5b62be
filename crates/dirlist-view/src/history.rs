//! Back/forward history of visited roots.

use std::path::{Path, PathBuf};

/// Stack of previously visited roots plus the roots left by going back.
#[derive(Debug, Clone, Default)]
pub struct FolderHistory {
    prev: Vec<PathBuf>,
    next: Vec<PathBuf>,
}

impl FolderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visited root. Pushing the current top again is a no-op.
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if self.prev.last() == Some(&dir) {
            return;
        }
        self.prev.push(dir);
    }

    /// Most recently pushed root.
    pub fn peek(&self) -> Option<&Path> {
        self.prev.last().map(PathBuf::as_path)
    }

    /// Go back: drop the current root, remember it as "next" and return
    /// the root before it.
    pub fn back(&mut self) -> Option<&Path> {
        if self.prev.len() < 2 {
            return None;
        }
        let current = self.prev.pop()?;
        self.next.push(current);
        self.peek()
    }

    /// Go forward to the root last left by [`FolderHistory::back`].
    pub fn forward(&mut self) -> Option<&Path> {
        let dir = self.next.pop()?;
        self.push(dir);
        self.peek()
    }

    /// Forget the forward stack once the user navigates somewhere new.
    ///
    /// Returns whether it was cleared; it is kept while `current` is still
    /// the top of the back stack.
    pub fn clear_next(&mut self, current: &Path) -> bool {
        if self.next.is_empty() || self.peek() == Some(current) {
            return false;
        }
        self.next.clear();
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.prev.len() > 1
    }

    pub fn can_go_forward(&self) -> bool {
        !self.next.is_empty()
    }
}
