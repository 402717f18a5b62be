//! The read job: an iterative depth-first directory listing.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use dirlist_core::{
    classify_path, is_container_name, EntryId, LibraryPath, ListConfig, ListKind, RawEntry,
    ScanError, TypeFlags, CURRENT_DIR, PARENT_DIR,
};

use crate::archive::{ArchiveReader, ZipTarReader};
use crate::inode::{DirKey, VisitedDirs};
use crate::lister::{DirLister, JwalkLister};
use crate::progress::{ProgressTracker, ScanProgress};
use crate::scheduler::{Job, JobControl};
use crate::store::DirEntryStore;

/// What a scan job reads and how deep it goes.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory (or container path) to list.
    pub root: PathBuf,
    /// Open containers as libraries.
    pub library: bool,
    /// Recursion depth; 0 lists the root only.
    pub max_recursion: u32,
    /// Descend into symlinked directories.
    pub follow_symlinks: bool,
    /// `;`-separated globs tagging files as operators.
    pub operator_glob: String,
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            library: false,
            max_recursion: 0,
            follow_symlinks: false,
            operator_glob: String::new(),
        }
    }

    /// Options matching a list configuration.
    pub fn from_config(config: &ListConfig) -> Self {
        Self {
            root: config.root.clone(),
            library: config.kind == ListKind::LibraryArchive,
            max_recursion: config.recursion_level,
            follow_symlinks: config.follow_symlinks,
            operator_glob: config.filter.operator_glob.clone(),
        }
    }

    pub fn library(mut self, library: bool) -> Self {
        self.library = library;
        self
    }

    pub fn max_recursion(mut self, levels: u32) -> Self {
        self.max_recursion = levels;
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn operator_glob(mut self, glob: impl Into<String>) -> Self {
        self.operator_glob = glob.into();
        self
    }
}

/// A directory waiting to be listed.
#[derive(Debug, Clone)]
struct TodoDir {
    dir: PathBuf,
    level: u32,
}

/// An entry as read, before path normalization.
struct Discovered {
    entry: RawEntry,
    /// Whether the entry may be pushed for recursion at all.
    descend: bool,
}

/// Lists a directory tree into a [`DirEntryStore`], one batch per
/// directory.
///
/// The root is level 1. "." and ".." are only produced for the root.
/// Subdirectories are pushed while `level <= max_recursion`; at the last
/// level only containers are still opened, and everything below a
/// container is listed regardless of depth.
pub struct ScanJob {
    options: ScanOptions,
    root: PathBuf,
    store: DirEntryStore,
    generation: u64,
    lister: Arc<dyn DirLister>,
    archives: Arc<dyn ArchiveReader>,
    operators: Option<GlobSet>,
    todo: Vec<TodoDir>,
    visited: VisitedDirs,
    tracker: ProgressTracker,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl ScanJob {
    /// Create a job appending to `store` under `generation`.
    pub fn new(options: ScanOptions, store: DirEntryStore, generation: u64) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        let root = clean_path(&options.root);
        let operators = build_operator_glob(&options.operator_glob);
        Self {
            options,
            root,
            store,
            generation,
            lister: Arc::new(JwalkLister::new()),
            archives: Arc::new(ZipTarReader::new()),
            operators,
            todo: Vec::new(),
            visited: VisitedDirs::new(),
            tracker: ProgressTracker::new(),
            progress_tx,
        }
    }

    /// Use a different directory lister.
    pub fn with_lister(mut self, lister: Arc<dyn DirLister>) -> Self {
        self.lister = lister;
        self
    }

    /// Use a different container reader.
    pub fn with_archive_reader(mut self, archives: Arc<dyn ArchiveReader>) -> Self {
        self.archives = archives;
        self
    }

    /// Subscribe to progress updates, sent after every directory.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Directories still waiting to be listed.
    pub fn pending_dirs(&self) -> usize {
        self.todo.len()
    }

    pub fn progress(&self) -> ScanProgress {
        self.tracker.snapshot()
    }

    /// Run the listing until done or stopped.
    pub fn run_with(&mut self, control: &JobControl) -> ScanProgress {
        self.tracker = ProgressTracker::new();
        self.visited.clear();
        self.todo.clear();
        self.todo.push(TodoDir {
            dir: self.root.clone(),
            level: 1,
        });
        self.tracker.add_pending_dir();

        info!(
            root = %self.root.display(),
            library = self.options.library,
            max_recursion = self.options.max_recursion,
            "Starting directory read"
        );

        loop {
            if control.is_stopped() {
                debug!(dropped = self.todo.len(), "Read job stopped");
                break;
            }
            let Some(todo) = self.todo.pop() else {
                break;
            };
            self.tracker.set_current_path(todo.dir.clone());

            let (found, is_lib) = self.read_one(&todo);

            let mut batch = Vec::with_capacity(found.len());
            for discovered in found {
                let entry = self.finalize(&todo.dir, discovered.entry);
                if discovered.descend && self.should_descend(&entry, is_lib, todo.level) {
                    self.todo.push(TodoDir {
                        dir: self.root.join(entry.relpath.as_str()),
                        level: todo.level + 1,
                    });
                    self.tracker.add_pending_dir();
                }
                batch.push(entry);
            }

            let count = batch.len();
            if !self.store.merge_batch(self.generation, batch) {
                debug!(
                    generation = self.generation,
                    "Entry store was reset, abandoning read"
                );
                break;
            }

            self.tracker.record_dir(count);
            let snapshot = self.tracker.snapshot();
            control.set_progress(snapshot.fraction());
            if count > 0 {
                control.mark_updated();
            }
            // Receivers may lag or be gone.
            let _ = self.progress_tx.send(snapshot);
        }

        self.todo.clear();
        let progress = self.tracker.snapshot();
        info!(
            dirs = progress.dirs_done,
            entries = progress.entries_found,
            errors = progress.errors_count,
            "Directory read finished"
        );
        progress
    }

    /// List one directory, trying it as a library first in library mode.
    fn read_one(&mut self, todo: &TodoDir) -> (Vec<Discovered>, bool) {
        let skip_currpar = todo.level > 1;

        if self.options.library {
            let found = self.list_library(&todo.dir, skip_currpar);
            if !found.is_empty() {
                return (found, true);
            }
        }

        let found = match self.list_directory(&todo.dir, skip_currpar) {
            Ok(found) => found,
            Err(e) => {
                self.tracker.record_error();
                if todo.level == 1 {
                    warn!(dir = %todo.dir.display(), error = %e, "Failed to read directory");
                } else {
                    debug!(dir = %todo.dir.display(), error = %e, "Skipping unreadable directory");
                }
                Vec::new()
            }
        };
        (found, false)
    }

    fn list_library(&mut self, dir: &Path, skip_currpar: bool) -> Vec<Discovered> {
        let Some(lib) = self.archives.explode(dir) else {
            return Vec::new();
        };
        if lib.name.is_some() {
            // Points at an object, not a listable group.
            return Vec::new();
        }

        let contents = match self.archives.read_contents(&lib.container) {
            Ok(contents) => contents,
            Err(e) => {
                self.tracker.record_error();
                debug!(container = %lib.container.display(), error = %e, "Failed to read container");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        let mut push = |entry: RawEntry| {
            found.push(Discovered {
                entry,
                descend: true,
            })
        };

        match (&lib.group, lib.category()) {
            (None, _) => {
                for category in contents.categories() {
                    push(
                        RawEntry::new(category.as_ref(), TypeFlags::LIBRARY | TypeFlags::DIR)
                            .with_category(category),
                    );
                }
            }
            (Some(_), Some(category)) => {
                for object in contents.objects(category) {
                    push(
                        RawEntry::new(
                            object.name.as_str(),
                            TypeFlags::LIBRARY | category.type_flags(),
                        )
                        .with_category(category)
                        .with_stat(object.size, object.modified),
                    );
                }
            }
            (Some(group), None) => {
                trace!(group = %group, "Unknown container group");
            }
        }

        if !skip_currpar && !found.is_empty() {
            found.insert(
                0,
                Discovered {
                    entry: RawEntry::new(PARENT_DIR, TypeFlags::LIBRARY | TypeFlags::DIR),
                    descend: false,
                },
            );
        }
        found
    }

    fn list_directory(
        &mut self,
        dir: &Path,
        skip_currpar: bool,
    ) -> Result<Vec<Discovered>, ScanError> {
        if self.options.follow_symlinks {
            let metadata = fs::metadata(dir).map_err(|e| ScanError::io(dir, e))?;
            if let Some(key) = DirKey::from_metadata(&metadata) {
                if !self.visited.track(key) {
                    debug!(dir = %dir.display(), "Directory already listed, skipping");
                    return Ok(Vec::new());
                }
            }
        }

        let listed = self.lister.list(dir)?;
        let mut found = Vec::with_capacity(listed.len() + 2);

        if !skip_currpar {
            for pseudo in [CURRENT_DIR, PARENT_DIR] {
                found.push(Discovered {
                    entry: RawEntry::new(pseudo, TypeFlags::DIR),
                    descend: false,
                });
            }
        }

        for item in listed {
            let typeflags = if item.is_dir {
                TypeFlags::DIR
            } else if self.options.library && is_container_name(&item.name) {
                TypeFlags::ARCHIVE | TypeFlags::DIR
            } else if self.is_operator(&item.name) {
                TypeFlags::OPERATOR
            } else {
                classify_path(&item.name)
            };

            found.push(Discovered {
                entry: RawEntry::new(item.name.as_str(), typeflags)
                    .with_stat(item.size, item.modified),
                descend: !item.is_symlink || self.options.follow_symlinks,
            });
        }

        Ok(found)
    }

    fn is_operator(&self, name: &str) -> bool {
        self.operators
            .as_ref()
            .is_some_and(|globs| globs.is_match(name))
    }

    /// Turn a directory-local entry into a root-relative one with its id
    /// and display name.
    fn finalize(&self, dir: &Path, mut entry: RawEntry) -> RawEntry {
        let abs = clean_path(&dir.join(entry.relpath.as_str()));
        entry.id = EntryId::from_path(&abs);
        if !entry.is_curr_or_parent() {
            entry.relpath = relative_to(&abs, &self.root);
        }
        entry.name = display_name(&entry, &abs);
        entry
    }

    fn should_descend(&self, entry: &RawEntry, is_lib: bool, level: u32) -> bool {
        let max = self.options.max_recursion;
        if max == 0 || !(is_lib || level <= max) {
            return false;
        }
        if !entry.is_dir() || entry.is_curr_or_parent() {
            return false;
        }
        // On the last level only containers are opened.
        is_lib || level < max || entry.typeflags.contains(TypeFlags::ARCHIVE)
    }
}

impl Job for ScanJob {
    fn run(&mut self, control: &JobControl) {
        self.run_with(control);
    }
}

fn build_operator_glob(pattern: &str) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for part in pattern.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match GlobBuilder::new(part).case_insensitive(true).build() {
            Ok(glob) => {
                builder.add(glob);
                any = true;
            }
            Err(e) => warn!(pattern = part, error = %e, "Ignoring invalid operator glob"),
        }
    }
    if !any {
        return None;
    }
    builder
        .build()
        .map_err(|e| warn!(error = %e, "Failed to build operator globs"))
        .ok()
}

/// Lexically resolve "." and ".." components.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component.as_os_str());
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// `/`-separated path of `abs` below `root`.
fn relative_to(abs: &Path, root: &Path) -> CompactString {
    let rel = abs.strip_prefix(root).unwrap_or(abs);
    let mut out = CompactString::default();
    for (i, component) in rel.components().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

fn display_name(entry: &RawEntry, abs: &Path) -> CompactString {
    if entry.is_curr_or_parent() {
        return entry.relpath.clone();
    }
    if entry.typeflags.contains(TypeFlags::LIBRARY) {
        if let Some(name) = LibraryPath::explode(abs)
            .as_ref()
            .and_then(LibraryPath::ui_name)
        {
            return name.into();
        }
        return entry.relpath.clone();
    }
    if entry.is_dir() {
        return entry.relpath.clone();
    }
    let base = entry
        .relpath
        .rsplit('/')
        .next()
        .unwrap_or(entry.relpath.as_str());
    base.into()
}
