//! Filtering and the filtered, sorted view over mirrored entries.

use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, trace};

use dirlist_core::{
    is_curr_or_parent, CategoryMask, FilterOptions, ListKind, RawEntry, SortMode, TypeFlags,
    PARENT_DIR,
};

use crate::sort;

/// Check whether a relative path is hidden.
///
/// With `hide_dot`, names starting with a single dot and names ending with
/// `~` are hidden. With `hide_parent`, ".." is hidden. "." is always hidden.
/// Paths with separators are hidden when any segment is.
pub fn is_hidden(relpath: &str, hide_dot: bool, hide_parent: bool) -> bool {
    relpath
        .split('/')
        .any(|segment| is_hidden_segment(segment, hide_dot, hide_parent))
}

fn is_hidden_segment(name: &str, hide_dot: bool, hide_parent: bool) -> bool {
    if hide_dot {
        let bytes = name.as_bytes();
        if bytes.first() == Some(&b'.') && bytes.len() > 1 && bytes[1] != b'.' {
            return true;
        }
        if name.ends_with('~') {
            return true;
        }
    }
    if hide_parent && name == PARENT_DIR {
        return true;
    }
    name == "."
}

/// Compiled filter predicate for one list kind.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    kind: ListKind,
    hide_dot: bool,
    hide_parent: bool,
    types: TypeFlags,
    categories: CategoryMask,
    hide_lib_dir: bool,
    search: Option<GlobMatcher>,
    search_text: String,
}

impl EntryFilter {
    /// Compile filter options.
    ///
    /// `hide_lib_dir` hides container category directories; it applies to
    /// library lists only.
    pub fn new(kind: ListKind, options: &FilterOptions, hide_lib_dir: bool) -> Self {
        let search_text = options.search().to_string();
        let search = if search_text.is_empty() {
            None
        } else {
            match GlobBuilder::new(&search_text)
                .case_insensitive(true)
                .literal_separator(false)
                .build()
            {
                Ok(glob) => Some(glob.compile_matcher()),
                Err(e) => {
                    debug!(pattern = %search_text, error = %e, "Search is not a valid glob, matching as text");
                    None
                }
            }
        };

        Self {
            kind,
            hide_dot: options.hide_dot,
            hide_parent: options.hide_parent,
            types: options.types,
            categories: options.categories,
            hide_lib_dir,
            search,
            search_text,
        }
    }

    /// Whether an entry belongs to the filtered view.
    pub fn accepts(&self, entry: &RawEntry) -> bool {
        if is_hidden(&entry.relpath, self.hide_dot, self.hide_parent) {
            return false;
        }
        match self.kind {
            ListKind::DataBrowser => true,
            ListKind::Directory => self.accepts_file(entry),
            ListKind::LibraryArchive => self.accepts_file(entry) && self.accepts_library(entry),
        }
    }

    fn accepts_file(&self, entry: &RawEntry) -> bool {
        if entry.is_curr_or_parent() {
            return true;
        }
        if !self.types.is_empty() {
            let flags = entry.typeflags;
            let passes = if flags.is_dir() {
                if flags.intersects(TypeFlags::ARCHIVE | TypeFlags::LIBRARY) {
                    self.types.intersects(TypeFlags::ARCHIVE)
                } else {
                    self.types.intersects(TypeFlags::DIR)
                }
            } else {
                flags.intersects(self.types)
            };
            if !passes {
                return false;
            }
        }
        self.matches_search(&entry.relpath)
    }

    fn accepts_library(&self, entry: &RawEntry) -> bool {
        if !entry.typeflags.contains(TypeFlags::LIBRARY) || is_curr_or_parent(&entry.relpath) {
            return true;
        }
        if entry.is_dir() && self.hide_lib_dir {
            return false;
        }
        entry
            .category
            .is_none_or(|category| self.categories.accepts(category))
    }

    fn matches_search(&self, relpath: &str) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        match &self.search {
            Some(matcher) => matcher.is_match(relpath),
            None => {
                let needle = self.search_text.trim_matches('*').to_lowercase();
                relpath.to_lowercase().contains(&needle)
            }
        }
    }
}

/// Filtered, sorted view over the consumer's mirror of the entry store.
///
/// Holds positions into the mirror; rebuilt only when marked dirty.
#[derive(Debug)]
pub struct FilterIndex {
    filtered: Vec<usize>,
    sort: SortMode,
    filter: EntryFilter,
    need_sorting: bool,
    need_filtering: bool,
}

impl FilterIndex {
    pub fn new(kind: ListKind, sort: SortMode, options: &FilterOptions, hide_lib_dir: bool) -> Self {
        Self {
            filtered: Vec::new(),
            sort,
            filter: EntryFilter::new(kind, options, hide_lib_dir),
            need_sorting: true,
            need_filtering: true,
        }
    }

    /// Change the sort mode; marks the view dirty when it differs.
    pub fn set_sort(&mut self, sort: SortMode) {
        if self.sort != sort {
            self.sort = sort;
            self.need_sorting = true;
        }
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    /// Replace the filter predicate.
    pub fn set_filter(&mut self, filter: EntryFilter) {
        self.filter = filter;
        self.need_filtering = true;
    }

    pub fn filter(&self) -> &EntryFilter {
        &self.filter
    }

    /// New entries arrived: both order and membership must be recomputed.
    pub fn mark_dirty(&mut self) {
        self.need_sorting = true;
        self.need_filtering = true;
    }

    pub fn needs_rebuild(&self) -> bool {
        self.need_filtering || self.needs_sorting()
    }

    fn needs_sorting(&self) -> bool {
        self.need_sorting && self.sort != SortMode::None
    }

    /// Re-sort `entries` in place if needed, then recompute the filtered
    /// positions. Returns `false` when nothing was dirty.
    pub fn rebuild(&mut self, entries: &mut [Arc<RawEntry>]) -> bool {
        if !self.needs_rebuild() {
            return false;
        }

        if self.needs_sorting() {
            let mode = self.sort;
            entries.sort_by(|a, b| sort::compare(mode, a, b));
            trace!(count = entries.len(), sort = %mode, "Sorted entries");
        }
        self.need_sorting = false;

        self.filtered.clear();
        self.filtered.extend(
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| self.filter.accepts(entry))
                .map(|(i, _)| i),
        );
        self.need_filtering = false;

        debug!(
            total = entries.len(),
            filtered = self.filtered.len(),
            "Rebuilt filtered view"
        );
        true
    }

    /// Mirror position of a filtered index.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.filtered.get(index).copied()
    }

    /// Filtered mirror positions, in view order.
    pub fn positions(&self) -> &[usize] {
        &self.filtered
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Forget the current view and require a rebuild.
    pub fn reset(&mut self) {
        self.filtered.clear();
        self.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirlist_core::Category;

    fn entry(relpath: &str, flags: TypeFlags) -> Arc<RawEntry> {
        let mut e = RawEntry::new(relpath, flags);
        e.name = relpath.into();
        Arc::new(e)
    }

    fn names(index: &FilterIndex, entries: &[Arc<RawEntry>]) -> Vec<String> {
        index
            .positions()
            .iter()
            .map(|&i| entries[i].relpath.to_string())
            .collect()
    }

    #[test]
    fn test_hidden_rules() {
        assert!(is_hidden(".git", true, false));
        assert!(is_hidden("foo~", true, false));
        assert!(!is_hidden("..", true, false));
        assert!(is_hidden("..", true, true));
        assert!(is_hidden(".", false, false));
        assert!(!is_hidden(".git", false, false));
        assert!(is_hidden("src/.cache/x", true, false));
        assert!(!is_hidden("src/cache/x", true, false));
    }

    #[test]
    fn test_type_filter() {
        let options = FilterOptions::default().with_types(TypeFlags::IMAGE | TypeFlags::DIR);
        let filter = EntryFilter::new(ListKind::Directory, &options, false);

        assert!(filter.accepts(&entry("..", TypeFlags::DIR)));
        assert!(filter.accepts(&entry("photos", TypeFlags::DIR)));
        assert!(filter.accepts(&entry("a.png", TypeFlags::IMAGE)));
        assert!(!filter.accepts(&entry("a.txt", TypeFlags::TEXT)));
        assert!(!filter.accepts(&entry("p.zip", TypeFlags::ARCHIVE | TypeFlags::DIR)));

        // Containers only: directories without DIR in the filter are dropped.
        let options = FilterOptions::default().with_types(TypeFlags::ARCHIVE);
        let filter = EntryFilter::new(ListKind::Directory, &options, false);
        assert!(!filter.accepts(&entry("photos", TypeFlags::DIR)));
        assert!(filter.accepts(&entry("p.zip", TypeFlags::ARCHIVE | TypeFlags::DIR)));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let options = FilterOptions::default().with_search("REPORT");
        let filter = EntryFilter::new(ListKind::Directory, &options, false);

        assert!(filter.accepts(&entry("q3/annual-report.pdf", TypeFlags::NONE)));
        assert!(!filter.accepts(&entry("q3/summary.pdf", TypeFlags::NONE)));
        assert!(filter.accepts(&entry("..", TypeFlags::DIR)));
    }

    #[test]
    fn test_library_filter() {
        let mut options = FilterOptions::default().with_categories(Category::Image);
        let filter = EntryFilter::new(ListKind::LibraryArchive, &options, true);

        let image = Arc::new(
            RawEntry::new("p.zip/Image/a.png", TypeFlags::LIBRARY | TypeFlags::IMAGE)
                .with_category(Category::Image),
        );
        let sound = Arc::new(
            RawEntry::new("p.zip/Sound/b.wav", TypeFlags::LIBRARY | TypeFlags::SOUND)
                .with_category(Category::Sound),
        );
        let group = Arc::new(
            RawEntry::new("p.zip/Image", TypeFlags::LIBRARY | TypeFlags::DIR)
                .with_category(Category::Image),
        );
        assert!(filter.accepts(&image));
        assert!(!filter.accepts(&sound));
        assert!(!filter.accepts(&group));

        options.categories = CategoryMask::all();
        let filter = EntryFilter::new(ListKind::LibraryArchive, &options, false);
        assert!(filter.accepts(&group));
        assert!(filter.accepts(&entry("..", TypeFlags::LIBRARY | TypeFlags::DIR)));
    }

    #[test]
    fn test_data_browser_hidden_only() {
        let options = FilterOptions::default().with_types(TypeFlags::IMAGE);
        let filter = EntryFilter::new(ListKind::DataBrowser, &options, false);
        assert!(filter.accepts(&entry("Scenes", TypeFlags::DIR)));
        assert!(!filter.accepts(&entry(".internal", TypeFlags::NONE)));
    }

    #[test]
    fn test_rebuild_sorts_and_filters() {
        let mut entries = vec![
            entry("b.txt", TypeFlags::TEXT),
            entry(".git", TypeFlags::DIR),
            entry("..", TypeFlags::DIR),
            entry("a", TypeFlags::DIR),
            entry("foo~", TypeFlags::NONE),
            entry(".", TypeFlags::DIR),
        ];
        let mut index = FilterIndex::new(
            ListKind::Directory,
            SortMode::Name,
            &FilterOptions::default(),
            false,
        );

        assert!(index.rebuild(&mut entries));
        assert_eq!(names(&index, &entries), vec!["..", "a", "b.txt"]);

        let before = index.positions().to_vec();
        assert!(!index.rebuild(&mut entries));
        index.mark_dirty();
        assert!(index.rebuild(&mut entries));
        assert_eq!(index.positions(), before.as_slice());
    }

    #[test]
    fn test_sort_none_keeps_order() {
        let mut entries = vec![entry("z", TypeFlags::NONE), entry("a", TypeFlags::NONE)];
        let mut index = FilterIndex::new(
            ListKind::Directory,
            SortMode::None,
            &FilterOptions::default(),
            false,
        );
        index.rebuild(&mut entries);
        assert_eq!(names(&index, &entries), vec!["z", "a"]);
    }
}
