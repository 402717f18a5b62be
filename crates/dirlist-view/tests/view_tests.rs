use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dirlist_core::{Category, FilterOptions, ListConfig, ListKind, RawEntry, SortMode, TypeFlags};
use dirlist_scan::{InlineScheduler, TokioScheduler};
use dirlist_view::{
    DisplayEntry, EntryId, EntryProvider, FileList, PreviewError, PreviewStats, ProviderStatus,
    SelectCheck, SelectFlags, SelectOp, ThumbSource, Thumbnail, ThumbnailDecoder,
};
use tempfile::TempDir;

fn touch(dir: &Path, names: &[&str]) {
    for name in names {
        File::create(dir.join(name)).unwrap();
    }
}

fn numbered(dir: &Path, prefix: &str, ext: &str, count: usize) {
    for i in 0..count {
        File::create(dir.join(format!("{prefix}{i:02}.{ext}"))).unwrap();
    }
}

fn read_all(list: &mut FileList) {
    list.start(&InlineScheduler::new()).unwrap();
    assert!(list.update());
    assert!(list.is_ready());
    list.sort_filter();
}

fn relpaths(list: &mut FileList) -> Vec<String> {
    (0..list.num_files())
        .map(|i| list.file(i).unwrap().relpath.to_string())
        .collect()
}

fn config(root: &Path, cache_size: usize) -> ListConfig {
    let mut config = ListConfig::new(root);
    config.cache_size = cache_size;
    config
}

#[test]
fn test_rebuild_while_scanning() {
    let temp = TempDir::new().unwrap();
    for d in 0..30 {
        let dir = temp.path().join(format!("d{d:02}"));
        fs::create_dir(&dir).unwrap();
        numbered(&dir, "f", "txt", 40);
        touch(&dir, &[".hidden"]);
    }
    touch(temp.path(), &[".env"]);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let scheduler = TokioScheduler::new(runtime.handle().clone());

    let mut list = FileList::new(config(temp.path(), 64)).unwrap();
    list.set_recursion(2);
    list.start(&scheduler).unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut rebuilds = 0;
    loop {
        list.update();
        if list.sort_filter() {
            rebuilds += 1;
        }
        if !list.is_empty() {
            let center = list.num_files() / 2;
            list.cache_block(center);
        }
        if list.is_ready() {
            break;
        }
        assert!(Instant::now() < deadline, "scan did not finish");
        std::thread::sleep(Duration::from_millis(1));
    }
    list.sort_filter();
    assert!(rebuilds >= 1);

    // ".." plus 30 directories plus 40 visible files in each.
    assert_eq!(list.num_files(), 1 + 30 + 30 * 40);

    let mut ids = HashSet::new();
    let mut paths = HashSet::new();
    for index in 0..list.num_files() {
        let entry = list.file(index).unwrap();
        assert!(ids.insert(entry.id), "duplicate id at {index}");
        assert!(paths.insert(entry.relpath.to_string()));
    }
    assert!(paths.contains("d07/f13.txt"));
    assert!(!paths.iter().any(|p| p.ends_with(".hidden")));
}

#[test]
fn test_hidden_entries_filtered() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(".git")).unwrap();
    fs::create_dir(temp.path().join("b")).unwrap();
    touch(temp.path(), &["foo~", "a.txt", ".env"]);

    let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
    read_all(&mut list);
    assert_eq!(relpaths(&mut list), vec!["..", "b", "a.txt"]);

    let mut options = FilterOptions::default();
    options.hide_parent = true;
    list.set_filter(options);
    assert!(list.sort_filter());
    assert_eq!(relpaths(&mut list), vec!["b", "a.txt"]);
}

#[test]
fn test_selection_survives_eviction() {
    let temp = TempDir::new().unwrap();
    numbered(temp.path(), "f", "txt", 40);

    let mut list = FileList::new(config(temp.path(), 4)).unwrap();
    read_all(&mut list);
    assert_eq!(list.num_files(), 41);

    assert!(list.cache_block(2));
    let id = list.file(2).unwrap().id;
    assert_eq!(
        list.entry_select_index_set(2, SelectOp::Add, SelectFlags::SELECTED, SelectCheck::All),
        Some(SelectFlags::SELECTED)
    );

    assert!(list.cache_block(35));
    assert!(list.cached_by_id(&id).is_none());

    assert_eq!(list.file(2).unwrap().id, id);
    assert_eq!(
        list.entry_select_index_get(2, SelectCheck::All),
        SelectFlags::SELECTED
    );
}

#[test]
fn test_range_select() {
    let temp = TempDir::new().unwrap();
    numbered(temp.path(), "f", "txt", 10);

    let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
    read_all(&mut list);

    let visited = list.entries_select_range_set(
        1..=4,
        SelectOp::Add,
        SelectFlags::SELECTED,
        SelectCheck::Files,
    );
    assert_eq!(visited, 4);

    // ".." is a directory, so a files-only selection leaves it alone.
    list.entries_select_range_set(0..=0, SelectOp::Add, SelectFlags::SELECTED, SelectCheck::Files);
    assert_eq!(list.entry_select_index_get(0, SelectCheck::All), SelectFlags::NONE);

    assert_eq!(
        list.entries_select_range_set(5..=11, SelectOp::Add, SelectFlags::SELECTED, SelectCheck::All),
        0
    );

    let selection = list.selection_get(SelectCheck::All, "f02.txt");
    assert_eq!(selection.len(), 4);
    assert_eq!(selection[0].relpath, "f02.txt");
}

#[test]
fn test_rebuild_is_idempotent() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), &["b.txt", "a10.txt", "a9.txt", "C.txt"]);

    let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
    read_all(&mut list);
    let first = relpaths(&mut list);
    assert_eq!(first, vec!["..", "a9.txt", "a10.txt", "b.txt", "C.txt"]);

    assert!(!list.sort_filter());

    list.set_sorting(SortMode::Size);
    assert!(list.sort_filter());
    list.set_sorting(SortMode::Name);
    assert!(list.sort_filter());
    assert_eq!(relpaths(&mut list), first);
}

#[test]
fn test_extension_sort_groups_double_suffix() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), &["b.gz", "a.tar.gz", "c.png", "z.tar.gz", "Makefile"]);

    let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
    list.set_sorting(SortMode::Extension);
    read_all(&mut list);

    assert_eq!(
        relpaths(&mut list),
        vec!["..", "Makefile", "b.gz", "c.png", "a.tar.gz", "z.tar.gz"]
    );
}

#[test]
fn test_find_path_and_id() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), &["one.txt", "two.txt"]);

    let mut list = FileList::new(ListConfig::new(temp.path())).unwrap();
    read_all(&mut list);

    let index = list.find_path("two.txt").unwrap();
    assert_eq!(index, 2);
    assert_eq!(list.find_path("missing.txt"), None);

    // Not cached yet: found by scanning the filtered view.
    let id = EntryId::from_path(&temp.path().join("two.txt"));
    let entry = list.entry_find_id(&id).unwrap();
    assert_eq!(entry.relpath, "two.txt");
    assert!(list.cached_by_id(&id).is_none());
}

#[test]
fn test_set_dir_resets_list() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("first")).unwrap();
    fs::create_dir(temp.path().join("second")).unwrap();
    touch(&temp.path().join("first"), &["a.txt", "b.txt"]);
    touch(&temp.path().join("second"), &["c.txt"]);

    let mut list = FileList::new(ListConfig::new(temp.path().join("first"))).unwrap();
    read_all(&mut list);
    assert_eq!(list.num_files(), 3);

    list.set_dir(&temp.path().join("second"));
    assert!(list.update());
    assert!(!list.is_ready());
    list.sort_filter();
    assert_eq!(list.num_files(), 0);
    assert!(list.needs_reading());

    read_all(&mut list);
    assert!(!list.force_reset());
    assert_eq!(relpaths(&mut list), vec!["..", "c.txt"]);
}

#[test]
fn test_library_recursion_hides_category_dirs() {
    let temp = TempDir::new().unwrap();
    let file = File::create(temp.path().join("pack.zip")).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for name in ["cat.png", "theme.ogg"] {
        zip.start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"data").unwrap();
    }
    zip.finish().unwrap();

    let mut config = ListConfig::new(temp.path());
    config.kind = ListKind::LibraryArchive;
    config.recursion_level = 1;
    config.filter.categories = [Category::Image].into_iter().collect();

    let mut list = FileList::new(config).unwrap();
    read_all(&mut list);
    assert_eq!(
        relpaths(&mut list),
        vec!["..", "pack.zip", "pack.zip/Image/cat.png"]
    );
    assert_eq!(list.file(2).unwrap().name, "cat.png");
}

/// Decoder that blocks every decode until the gate opens.
#[derive(Default)]
struct GatedDecoder {
    open: Mutex<bool>,
    cond: Condvar,
    started: AtomicUsize,
}

impl GatedDecoder {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

impl ThumbnailDecoder for GatedDecoder {
    fn decode(&self, _path: &Path, _source: ThumbSource) -> Result<Thumbnail, PreviewError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
        Ok(Thumbnail {
            width: 1,
            height: 1,
            pixels: vec![0, 0, 0, 255],
        })
    }
}

#[test]
fn test_evicted_preview_is_discarded() {
    let temp = TempDir::new().unwrap();
    numbered(temp.path(), "img", "png", 20);

    let decoder = Arc::new(GatedDecoder::default());
    let mut config = config(temp.path(), 4);
    config.preview.workers = 1;
    let mut list = FileList::new(config)
        .unwrap()
        .with_decoder(decoder.clone());
    list.previews_set(true).unwrap();
    read_all(&mut list);

    // Window [0, 4): previews for indices 1, 2 and 3; ".." has none.
    assert!(list.cache_block(1));
    let evicted_id = list.file(1).unwrap().id;
    let deadline = Instant::now() + Duration::from_secs(5);
    while decoder.started.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(decoder.started.load(Ordering::SeqCst), 1);

    // Jump away while the preview for index 1 is being decoded.
    assert!(list.cache_block(15));
    assert_eq!(list.cache_window(), 13..17);
    decoder.open();

    let mut stats = PreviewStats::default();
    let deadline = Instant::now() + Duration::from_secs(5);
    while (stats.merged < 4 || stats.discarded < 1) && Instant::now() < deadline {
        let update = list.previews_update();
        stats.merged += update.merged;
        stats.discarded += update.discarded;
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(stats, PreviewStats { merged: 4, discarded: 1 });

    assert!(list.file(15).unwrap().thumbnail.is_some());
    let revived = list.file(1).unwrap();
    assert_eq!(revived.id, evicted_id);
    assert!(revived.thumbnail.is_none());
}

#[test]
fn test_moving_window_does_not_decode_twice() {
    let temp = TempDir::new().unwrap();
    numbered(temp.path(), "img", "png", 20);

    let decoder = Arc::new(GatedDecoder::default());
    let mut config = config(temp.path(), 4);
    config.preview.workers = 1;
    let mut list = FileList::new(config)
        .unwrap()
        .with_decoder(decoder.clone());
    list.previews_set(true).unwrap();
    read_all(&mut list);

    assert!(list.cache_block(1));
    let deadline = Instant::now() + Duration::from_secs(5);
    while decoder.started.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(decoder.started.load(Ordering::SeqCst), 1);

    // Recenter, then shift by one, while the first preview is still decoding.
    assert!(list.cache_block(2));
    assert_eq!(list.cache_window(), 0..4);
    assert!(list.cache_block(3));
    assert_eq!(list.cache_window(), 1..5);
    decoder.open();

    let mut stats = PreviewStats::default();
    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.merged < 4 && Instant::now() < deadline {
        let update = list.previews_update();
        stats.merged += update.merged;
        stats.discarded += update.discarded;
        std::thread::sleep(Duration::from_millis(2));
    }
    std::thread::sleep(Duration::from_millis(50));
    let late = list.previews_update();

    assert_eq!(stats, PreviewStats { merged: 4, discarded: 0 });
    assert_eq!(late, PreviewStats::default());
    assert_eq!(decoder.started.load(Ordering::SeqCst), 4);
    assert_eq!(list.previews_pending(), 0);
    for index in 1..5 {
        assert!(list.file(index).unwrap().thumbnail.is_some());
    }
}

/// Provider over a fixed set of entries; blocks can be made unavailable.
struct VecProvider {
    entries: Vec<DisplayEntry>,
    polls: usize,
    blocks_available: Arc<AtomicBool>,
}

impl VecProvider {
    fn new(count: usize, blocks_available: Arc<AtomicBool>) -> Self {
        let root = Path::new("/Scenes");
        let entries = (0..count)
            .map(|i| {
                let mut raw = RawEntry::new(format!("objects/obj{i:03}"), TypeFlags::NONE);
                raw.id = EntryId::from_path(&root.join(raw.relpath.as_str()));
                DisplayEntry::from_raw(root, &raw)
            })
            .collect();
        Self {
            entries,
            polls: 0,
            blocks_available,
        }
    }
}

impl EntryProvider for VecProvider {
    fn name(&self) -> &str {
        "vec"
    }

    fn list(&mut self, _root: &Path) -> ProviderStatus {
        self.polls += 1;
        if self.polls < 2 {
            ProviderStatus::Running { progress: 0.5 }
        } else {
            ProviderStatus::Finished
        }
    }

    fn sort_filter(&mut self, _sort: SortMode, _filter: &FilterOptions) -> usize {
        self.entries.len()
    }

    fn entries_block(&mut self, start: usize, end: usize) -> Option<Vec<DisplayEntry>> {
        if !self.blocks_available.load(Ordering::SeqCst) {
            return None;
        }
        self.entries.get(start..end).map(<[DisplayEntry]>::to_vec)
    }

    fn entries_by_id(&mut self, ids: &[EntryId]) -> Vec<DisplayEntry> {
        self.entries
            .iter()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect()
    }
}

#[test]
fn test_provider_backed_list() {
    let available = Arc::new(AtomicBool::new(true));
    let mut config = ListConfig::new("/Scenes");
    config.kind = ListKind::DataBrowser;
    config.cache_size = 4;

    let mut list = FileList::new(config)
        .unwrap()
        .with_provider(Box::new(VecProvider::new(30, available.clone())));

    list.start(&InlineScheduler::new()).unwrap();
    assert!(list.pending());
    assert!(list.update());
    assert!(list.pending());
    assert_eq!(list.progress(), 0.5);
    assert!(list.update());
    assert!(list.is_ready());
    assert!(!list.update());

    assert!(list.sort_filter());
    assert_eq!(list.num_files(), 30);

    assert!(list.cache_block(5));
    assert_eq!(list.cache_window(), 3..7);
    assert_eq!(list.file(6).unwrap().name, "obj006");

    // Unavailable blocks leave the window as it was.
    available.store(false, Ordering::SeqCst);
    assert!(!list.cache_block(20));
    assert_eq!(list.cache_window(), 3..7);
    assert!(list.file(25).is_none());

    // Lookups by id fall back to the provider.
    let id = EntryId::from_path(Path::new("/Scenes/objects/obj029"));
    let entry = list.entry_find_id(&id).unwrap();
    assert_eq!(entry.name, "obj029");
}
