//! The file list: one browser panel's listing, wired end to end.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use dirlist_core::{
    EntryId, FilterOptions, LibraryPath, ListConfig, ListError, ListKind, SortMode,
};
use dirlist_scan::{
    clean_path, ArchiveReader, DirEntryStore, DirLister, JobHandle, JobScheduler, ScanJob,
    ScanOptions, StoreMirror,
};

use crate::cache::{EntryCache, Materializer, WindowChange};
use crate::display::DisplayEntry;
use crate::filter::{EntryFilter, FilterIndex};
use crate::preview::{
    ImageThumbnailer, PreviewError, PreviewPipeline, PreviewRequest, ThumbSource,
    ThumbnailDecoder,
};
use crate::provider::{EntryProvider, ProviderMaterializer, ProviderStatus, StoreMaterializer};
use crate::selection::{SelectCheck, SelectFlags, SelectOp, SelectionState};

/// Outcome of merging finished previews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    /// Attached to a live entry (possibly as "no preview").
    pub merged: usize,
    /// Entry was evicted or replaced; the result was dropped.
    pub discarded: usize,
}

/// A directory listing with its background read job, filtered view,
/// windowed cache, previews and selection.
///
/// All methods are meant to be called from the consumer's thread; the read
/// job and preview workers run elsewhere.
pub struct FileList {
    config: ListConfig,
    store: DirEntryStore,
    mirror: StoreMirror,
    index: FilterIndex,
    cache: EntryCache,
    selection: SelectionState,
    decoder: Arc<dyn ThumbnailDecoder>,
    previews: Option<PreviewPipeline>,
    /// Entries with a preview request queued or being decoded.
    previews_loading: HashSet<EntryId>,
    provider: Option<Box<dyn EntryProvider>>,
    provider_count: usize,
    provider_dirty: bool,
    provider_progress: f32,
    lister: Option<Arc<dyn DirLister>>,
    archives: Option<Arc<dyn ArchiveReader>>,
    job: Option<JobHandle>,
    force_reset: bool,
    force_refresh: bool,
    ready: bool,
    pending: bool,
}

impl FileList {
    /// Create a list from a configuration. Nothing is read until
    /// [`FileList::start`].
    pub fn new(config: ListConfig) -> Result<Self, ListError> {
        if config.cache_size == 0 || !config.cache_size.is_power_of_two() {
            return Err(ListError::InvalidConfig {
                message: format!("Cache size must be a power of two, got {}", config.cache_size),
            });
        }
        if config.preview.workers == 0 {
            return Err(ListError::InvalidConfig {
                message: "Preview worker count cannot be zero".to_string(),
            });
        }

        let mut config = config;
        config.root = check_dir(config.kind, &config.root);
        let hide_lib_dir = hide_lib_dir(&config);
        let index = FilterIndex::new(config.kind, config.sort, &config.filter, hide_lib_dir);
        let decoder: Arc<dyn ThumbnailDecoder> =
            Arc::new(ImageThumbnailer::new(config.preview.thumb_size));

        let mut list = Self {
            cache: EntryCache::new(config.cache_size),
            config,
            store: DirEntryStore::new(),
            mirror: StoreMirror::new(),
            index,
            selection: SelectionState::new(),
            decoder,
            previews: None,
            previews_loading: HashSet::new(),
            provider: None,
            provider_count: 0,
            provider_dirty: false,
            provider_progress: 0.0,
            lister: None,
            archives: None,
            job: None,
            force_reset: false,
            force_refresh: false,
            ready: false,
            pending: false,
        };
        if list.config.preview.enabled {
            list.previews_set(true)
                .map_err(|e| ListError::InvalidConfig { message: e.to_string() })?;
        }
        Ok(list)
    }

    /// Delegate listing, sorting and filtering to an external provider.
    pub fn with_provider(mut self, provider: Box<dyn EntryProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Decode previews with `decoder`. Takes effect the next time previews
    /// are enabled.
    pub fn with_decoder(mut self, decoder: Arc<dyn ThumbnailDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_lister(mut self, lister: Arc<dyn DirLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn with_archive_reader(mut self, archives: Arc<dyn ArchiveReader>) -> Self {
        self.archives = Some(archives);
        self
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn kind(&self) -> ListKind {
        self.config.kind
    }

    // ==================== Parameters ====================

    /// Point the list at another root. Returns the root actually used.
    ///
    /// A changed root forces a reset on the next [`FileList::update`].
    pub fn set_dir(&mut self, dir: &Path) -> &Path {
        let dir = check_dir(self.config.kind, dir);
        if dir != self.config.root {
            debug!(from = %self.config.root.display(), to = %dir.display(), "Root changed, forcing reset");
            self.config.root = dir;
            self.force_reset = true;
            self.refresh_filter();
        }
        &self.config.root
    }

    pub fn set_recursion(&mut self, level: u32) {
        if self.config.recursion_level != level {
            self.config.recursion_level = level;
            self.force_reset = true;
            self.refresh_filter();
        }
    }

    pub fn set_sorting(&mut self, sort: SortMode) {
        if self.config.sort != sort {
            self.config.sort = sort;
            self.index.set_sort(sort);
            self.provider_dirty = true;
        }
    }

    /// Replace the filter options. A changed operator glob needs a fresh
    /// read and forces a reset.
    pub fn set_filter(&mut self, options: FilterOptions) {
        if options == self.config.filter {
            return;
        }
        if options.operator_glob != self.config.filter.operator_glob {
            self.force_reset = true;
        }
        self.config.filter = options;
        self.refresh_filter();
    }

    fn refresh_filter(&mut self) {
        let filter = EntryFilter::new(
            self.config.kind,
            &self.config.filter,
            hide_lib_dir(&self.config),
        );
        self.index.set_filter(filter);
        self.provider_dirty = true;
    }

    // ==================== State ====================

    pub fn force_reset(&self) -> bool {
        self.force_reset
    }

    /// Request a rebuild of the view on the next poll.
    pub fn force_refresh(&mut self) {
        self.force_refresh = true;
    }

    /// Whether the view is empty, stale or due for a reset.
    pub fn need_refresh(&self) -> bool {
        let dirty = match self.provider {
            Some(_) => self.provider_dirty,
            None => self.mirror.is_empty() || self.index.needs_rebuild(),
        };
        dirty || self.force_reset || self.force_refresh
    }

    pub fn clear_refresh(&mut self) {
        self.force_refresh = false;
    }

    /// Whether a read job has to be started: nothing read yet, or a reset
    /// is due.
    pub fn needs_reading(&self) -> bool {
        self.force_reset || (!self.ready && !self.pending)
    }

    /// The last read completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// A read is in progress.
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Progress of the running read in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.ready {
            return 1.0;
        }
        if self.provider.is_some() {
            return self.provider_progress;
        }
        self.job.as_ref().map_or(0.0, JobHandle::progress)
    }

    /// Whether a path points into a container.
    pub fn is_library(path: &Path) -> bool {
        LibraryPath::explode_with(path, Path::is_file).is_some()
    }

    // ==================== Reading ====================

    /// Start reading the root from scratch.
    ///
    /// Any running read is stopped and its late batches are discarded.
    pub fn start(&mut self, scheduler: &dyn JobScheduler) -> Result<(), ListError> {
        self.stop_job();
        self.reset_view();
        self.force_reset = false;
        self.ready = false;

        if let Some(provider) = self.provider.as_deref_mut() {
            info!(provider = provider.name(), root = %self.config.root.display(), "Listing through provider");
            self.pending = true;
            self.provider_count = 0;
            self.provider_progress = 0.0;
            self.provider_dirty = true;
            return Ok(());
        }

        let generation = self.store.clear();
        let mut job = ScanJob::new(
            ScanOptions::from_config(&self.config),
            self.store.clone(),
            generation,
        );
        if let Some(lister) = &self.lister {
            job = job.with_lister(Arc::clone(lister));
        }
        if let Some(archives) = &self.archives {
            job = job.with_archive_reader(Arc::clone(archives));
        }

        self.pending = true;
        self.job = Some(scheduler.start(Box::new(job))?);
        debug!(root = %self.config.root.display(), generation, "Read job started");
        Ok(())
    }

    /// Poll the read. Returns whether new entries arrived or the list was
    /// reset, i.e. whether the view must be refreshed.
    pub fn update(&mut self) -> bool {
        if self.force_reset {
            debug!("Resetting list");
            self.stop_job();
            self.store.clear();
            self.reset_view();
            self.ready = false;
            return true;
        }

        if let Some(provider) = self.provider.as_deref_mut() {
            if !self.pending {
                return false;
            }
            match provider.list(&self.config.root) {
                ProviderStatus::Running { progress } => {
                    self.provider_progress = progress.clamp(0.0, 1.0);
                }
                ProviderStatus::Finished => {
                    self.pending = false;
                    self.ready = true;
                }
                ProviderStatus::Failed { message } => {
                    warn!(provider = provider.name(), error = %message, "Provider listing failed");
                    self.pending = false;
                    self.ready = true;
                }
            }
            self.provider_dirty = true;
            return true;
        }

        let Some(job) = &self.job else {
            return false;
        };
        let changed = job.take_update();
        let finished = job.is_finished();

        let mut added = 0;
        if changed || finished {
            added = self.store.sync_into(&mut self.mirror);
            if added > 0 {
                self.index.mark_dirty();
            }
        }
        if finished {
            self.job = None;
            self.pending = false;
            self.ready = true;
            debug!(entries = self.mirror.len(), "Read finished");
        }
        added > 0 || finished
    }

    /// Rebuild the filtered view if it is stale. Any rebuild invalidates
    /// the cache and pending previews.
    pub fn sort_filter(&mut self) -> bool {
        let rebuilt = match self.provider.as_deref_mut() {
            Some(provider) => {
                if !self.provider_dirty {
                    false
                } else {
                    self.provider_count = provider.sort_filter(self.config.sort, &self.config.filter);
                    self.provider_dirty = false;
                    true
                }
            }
            None => self.index.rebuild(self.mirror.entries_mut()),
        };
        if rebuilt {
            self.cache.clear();
            self.clear_preview_queue();
            trace!(count = self.num_files(), "View rebuilt, cache cleared");
        }
        rebuilt
    }

    fn stop_job(&mut self) {
        if let Some(job) = self.job.take() {
            job.stop();
        }
        if let Some(provider) = self.provider.as_deref_mut() {
            if self.pending {
                provider.kill();
            }
        }
        self.pending = false;
    }

    fn reset_view(&mut self) {
        self.mirror.clear();
        self.index.reset();
        self.cache.clear();
        self.provider_count = 0;
        self.clear_preview_queue();
    }

    /// Drop everything read so far, including the selection.
    pub fn clear(&mut self) {
        self.stop_job();
        self.store.clear();
        self.reset_view();
        self.selection.clear();
        self.ready = false;
    }

    // ==================== Entries ====================

    /// Number of entries in the filtered view.
    pub fn num_files(&self) -> usize {
        match self.provider {
            Some(_) => self.provider_count,
            None => self.index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_files() == 0
    }

    /// Entry at a filtered index, materialized on demand.
    ///
    /// `None` means "not available now"; a provider may still deliver it
    /// on a later poll.
    pub fn file(&mut self, index: usize) -> Option<&DisplayEntry> {
        let len = self.num_files();
        let found = with_materializer(
            &mut self.provider,
            &self.config.root,
            &self.mirror,
            &self.index,
            |source| self.cache.get_or_materialize(index, len, source).is_some(),
        );
        if !found {
            return None;
        }
        self.cache.get(index)
    }

    /// Full path of the entry at a filtered index.
    pub fn file_path(&mut self, index: usize) -> Option<PathBuf> {
        self.file(index).map(|entry| PathBuf::from(&entry.description))
    }

    /// Filtered index of an entry by relative path. Linear.
    pub fn find_path(&self, relpath: &str) -> Option<usize> {
        let entries = self.mirror.entries();
        self.index
            .positions()
            .iter()
            .position(|&pos| entries[pos].relpath == relpath)
    }

    /// Entry by identifier: cached entries first, then the provider, then
    /// a scan of the filtered view.
    pub fn entry_find_id(&mut self, id: &EntryId) -> Option<DisplayEntry> {
        if let Some(entry) = self.cache.find_by_id(id) {
            return Some(entry.clone());
        }
        if let Some(provider) = self.provider.as_deref_mut() {
            let mut found = provider.entries_by_id(std::slice::from_ref(id));
            let mut entry = found.pop()?;
            entry.ensure_name();
            return Some(entry);
        }
        let entries = self.mirror.entries();
        self.index
            .positions()
            .iter()
            .map(|&pos| &entries[pos])
            .find(|raw| raw.id == *id)
            .map(|raw| DisplayEntry::from_raw(&self.config.root, raw))
    }

    /// Cached entry by identifier, without any fallback.
    pub fn cached_by_id(&self, id: &EntryId) -> Option<&DisplayEntry> {
        self.cache.find_by_id(id)
    }

    /// Current cache window.
    pub fn cache_window(&self) -> std::ops::Range<usize> {
        self.cache.window()
    }

    /// Move the cache window around `index` and queue previews for it,
    /// nearest first. Returns `false` when `index` is out of range or the
    /// entries are not available yet.
    pub fn cache_block(&mut self, index: usize) -> bool {
        let len = self.num_files();
        let change = with_materializer(
            &mut self.provider,
            &self.config.root,
            &self.mirror,
            &self.index,
            |source| self.cache.ensure_window(index, len, source),
        );
        let Some(change) = change else {
            return false;
        };

        match change {
            WindowChange::Unchanged => return true,
            WindowChange::Recentered | WindowChange::Partial => {
                self.previews_update();
                self.clear_preview_queue();
            }
            WindowChange::Total => self.clear_preview_queue(),
        }
        self.queue_previews();
        true
    }

    // ==================== Previews ====================

    /// Start or stop the preview workers.
    pub fn previews_set(&mut self, enabled: bool) -> Result<(), PreviewError> {
        match (enabled, self.previews.is_some()) {
            (true, false) => {
                let pipeline =
                    PreviewPipeline::start(Arc::clone(&self.decoder), self.config.preview.workers)?;
                self.previews = Some(pipeline);
                self.previews_loading.clear();
                self.queue_previews();
            }
            (false, true) => {
                // Dropping stops the workers and frees anything decoded.
                self.previews = None;
                self.previews_loading.clear();
            }
            _ => {}
        }
        self.config.preview.enabled = enabled;
        Ok(())
    }

    pub fn previews_enabled(&self) -> bool {
        self.previews.is_some()
    }

    /// Previews queued or decoded but not merged yet.
    pub fn previews_pending(&self) -> usize {
        self.previews
            .as_ref()
            .map_or(0, |p| p.pending() + p.ready())
    }

    /// Attach finished previews to their entries. Results for entries that
    /// left the cache are dropped.
    pub fn previews_update(&mut self) -> PreviewStats {
        let Some(previews) = &self.previews else {
            return PreviewStats::default();
        };
        let mut stats = PreviewStats::default();
        for result in previews.drain_done() {
            self.previews_loading.remove(&result.id);
            if self
                .cache
                .attach_preview(result.index, &result.id, result.thumbnail)
            {
                stats.merged += 1;
            } else {
                stats.discarded += 1;
            }
        }
        if stats.merged + stats.discarded > 0 {
            trace!(merged = stats.merged, discarded = stats.discarded, "Merged previews");
        }
        if stats.discarded > 0 {
            // A discarded entry may be back in the window under another index.
            self.queue_previews();
        }
        stats
    }

    /// Drop queued requests; in-flight decodes stay tracked until drained.
    fn clear_preview_queue(&mut self) {
        if let Some(previews) = &self.previews {
            for id in previews.clear_pending() {
                self.previews_loading.remove(&id);
            }
        }
    }

    fn queue_previews(&mut self) {
        let Some(previews) = &self.previews else {
            return;
        };
        let mut queued = 0;
        for index in self.cache.preview_order() {
            let Some(entry) = self.cache.get(index) else {
                continue;
            };
            if !entry.wants_preview() || self.previews_loading.contains(&entry.id) {
                continue;
            }
            let Some(source) = ThumbSource::for_flags(entry.typeflags) else {
                continue;
            };
            let request = PreviewRequest {
                index,
                id: entry.id,
                path: PathBuf::from(&entry.description),
                source,
            };
            let id = request.id;
            if !previews.push(request) {
                break;
            }
            self.previews_loading.insert(id);
            queued += 1;
        }
        if queued > 0 {
            trace!(queued, "Queued previews");
        }
    }

    // ==================== Selection ====================

    pub fn entry_select_set(
        &mut self,
        entry: &DisplayEntry,
        op: SelectOp,
        flags: SelectFlags,
        check: SelectCheck,
    ) -> SelectFlags {
        self.selection.set(entry.id, entry.is_dir(), op, flags, check)
    }

    /// Select by filtered index; `None` when the entry is not available.
    pub fn entry_select_index_set(
        &mut self,
        index: usize,
        op: SelectOp,
        flags: SelectFlags,
        check: SelectCheck,
    ) -> Option<SelectFlags> {
        let (id, is_dir) = self.file(index).map(|e| (e.id, e.is_dir()))?;
        Some(self.selection.set(id, is_dir, op, flags, check))
    }

    /// Apply a selection to every entry in `range`. Nothing happens unless
    /// both ends are inside the view. Returns the number of entries
    /// visited.
    pub fn entries_select_range_set(
        &mut self,
        range: RangeInclusive<usize>,
        op: SelectOp,
        flags: SelectFlags,
        check: SelectCheck,
    ) -> usize {
        let len = self.num_files();
        if *range.start() >= len || *range.end() >= len {
            return 0;
        }
        range
            .filter(|&index| self.entry_select_index_set(index, op, flags, check).is_some())
            .count()
    }

    pub fn entry_select_get(&self, entry: &DisplayEntry, check: SelectCheck) -> SelectFlags {
        self.selection.get(&entry.id, entry.is_dir(), check)
    }

    pub fn entry_select_index_get(&mut self, index: usize, check: SelectCheck) -> SelectFlags {
        let Some((id, is_dir)) = self.file(index).map(|e| (e.id, e.is_dir())) else {
            return SelectFlags::NONE;
        };
        self.selection.get(&id, is_dir, check)
    }

    /// Selected entries matching `check`. The entry whose relative path is
    /// `active` comes first.
    pub fn selection_get(&mut self, check: SelectCheck, active: &str) -> Vec<DisplayEntry> {
        let mut ids: Vec<EntryId> = self
            .selection
            .ids_with(SelectFlags::SELECTED)
            .copied()
            .collect();
        ids.sort();

        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(entry) = self.entry_find_id(&id) else {
                continue;
            };
            if !check.applies(entry.is_dir()) {
                continue;
            }
            if entry.relpath == active {
                selected.insert(0, entry);
            } else {
                selected.push(entry);
            }
        }
        selected
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }
}

impl Drop for FileList {
    fn drop(&mut self) {
        self.stop_job();
    }
}

impl std::fmt::Debug for FileList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileList")
            .field("root", &self.config.root)
            .field("kind", &self.config.kind)
            .field("entries", &self.mirror.len())
            .field("filtered", &self.num_files())
            .field("window", &self.cache.window())
            .field("ready", &self.ready)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Run `f` with the materializer matching the list's entry source.
fn with_materializer<R>(
    provider: &mut Option<Box<dyn EntryProvider>>,
    root: &Path,
    mirror: &StoreMirror,
    index: &FilterIndex,
    f: impl FnOnce(&mut dyn Materializer) -> R,
) -> R {
    match provider.as_deref_mut() {
        Some(provider) => f(&mut ProviderMaterializer::new(provider)),
        None => f(&mut StoreMaterializer::new(
            root,
            mirror.entries(),
            index.positions(),
        )),
    }
}

/// Category directories are hidden while recursing from outside a
/// container, so objects show up flattened.
fn hide_lib_dir(config: &ListConfig) -> bool {
    config.kind == ListKind::LibraryArchive
        && config.recursion_level > 0
        && !FileList::is_library(&config.root)
}

/// Normalize a root for a list kind.
///
/// Directory lists fall back to the nearest existing ancestor; library
/// lists also accept paths inside containers; data-browser roots are not
/// filesystem paths and are kept as given.
fn check_dir(kind: ListKind, dir: &Path) -> PathBuf {
    match kind {
        ListKind::DataBrowser => dir.to_path_buf(),
        ListKind::Directory => existing_ancestor(&clean_path(dir)),
        ListKind::LibraryArchive => {
            let dir = clean_path(dir);
            if FileList::is_library(&dir) {
                dir
            } else {
                existing_ancestor(&dir)
            }
        }
    }
}

fn existing_ancestor(dir: &Path) -> PathBuf {
    match dir.ancestors().find(|candidate| candidate.is_dir()) {
        Some(found) => {
            if found != dir {
                debug!(requested = %dir.display(), using = %found.display(), "Directory missing, using ancestor");
            }
            found.to_path_buf()
        }
        None => dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn test_check_dir_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();

        let missing = temp.path().join("real/gone/deeper");
        assert_eq!(
            check_dir(ListKind::Directory, &missing),
            temp.path().join("real")
        );
        assert_eq!(
            check_dir(ListKind::DataBrowser, Path::new("/Scenes/Main")),
            PathBuf::from("/Scenes/Main")
        );
    }

    #[test]
    fn test_check_dir_accepts_container() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("pack.zip")).unwrap();

        let inside = temp.path().join("pack.zip/Image");
        assert_eq!(check_dir(ListKind::LibraryArchive, &inside), inside);
        assert_eq!(check_dir(ListKind::Directory, &inside), temp.path());
    }

    #[test]
    fn test_set_dir_forces_reset() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
        assert!(!list.force_reset());
        list.set_dir(temp.path());
        assert!(!list.force_reset());

        assert_eq!(list.set_dir(&temp.path().join("sub")), temp.path().join("sub"));
        assert!(list.force_reset());
        assert!(list.needs_reading());
        assert!(list.update());
        assert!(list.force_reset());
    }

    #[test]
    fn test_rejects_bad_cache_size() {
        let mut config = ListConfig::new("/tmp");
        config.cache_size = 100;
        assert!(matches!(
            FileList::new(config),
            Err(ListError::InvalidConfig { .. })
        ));
    }
}
