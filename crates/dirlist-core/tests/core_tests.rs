use dirlist_core::{
    classify_path, is_curr_or_parent, Category, CategoryMask, EntryId, FilterOptions, LibraryPath,
    ListConfig, ListKind, RawEntry, SortMode, TypeFlags,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[test]
fn test_entry_id_operations() {
    let id1 = EntryId::from_path(Path::new("/srv/media/clip.mp4"));
    let id2 = EntryId::from_path(Path::new("/srv/media/clip.mp4"));

    assert_eq!(id1, id2);
    assert_eq!(id1.to_string(), id1.to_hex());
    assert!(id1.to_hex().chars().all(|c| c.is_ascii_hexdigit()));

    let raw = EntryId::new([7; 16]);
    assert_eq!(raw.0, [7; 16]);
}

#[test]
fn test_raw_entry_creation() {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let entry = RawEntry::new("photos/cat.png", classify_path("photos/cat.png"))
        .with_stat(2048, modified);

    assert_eq!(entry.relpath.as_str(), "photos/cat.png");
    assert_eq!(entry.typeflags, TypeFlags::IMAGE);
    assert_eq!(entry.size, 2048);
    assert_eq!(entry.modified, modified);
    assert!(!entry.is_dir());
    assert!(!entry.is_curr_or_parent());
    assert!(entry.category.is_none());
}

#[test]
fn test_library_entry() {
    let entry = RawEntry::new("pack.zip/Image", TypeFlags::LIBRARY | TypeFlags::DIR)
        .with_category(Category::Image);

    assert!(entry.is_dir());
    assert_eq!(entry.category, Some(Category::Image));
}

#[test]
fn test_pseudo_entries() {
    assert!(is_curr_or_parent("."));
    assert!(is_curr_or_parent(".."));
    assert!(!is_curr_or_parent("..."));
    assert!(!is_curr_or_parent(".git"));
}

#[test]
fn test_library_path_roundtrip() {
    let path = PathBuf::from("/home/user/assets.tar.bz2/Sound/beep.wav");
    let lib = LibraryPath::explode(&path).unwrap();

    assert_eq!(lib.category(), Some(Category::Sound));
    assert_eq!(lib.to_path(), path);
}

#[test]
fn test_list_config_defaults() {
    let config = ListConfig::new("/srv");

    assert_eq!(config.kind, ListKind::Directory);
    assert_eq!(config.sort, SortMode::Name);
    assert_eq!(config.recursion_level, 0);
    assert_eq!(config.cache_size, 1024);
    assert!(!config.preview.enabled);
    assert_eq!(config.preview.workers, 4);
    assert_eq!(config.filter, FilterOptions::default());
}

#[test]
fn test_list_config_serde() {
    let config = ListConfig::builder()
        .root("/srv")
        .sort(SortMode::Size)
        .build()
        .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let back: ListConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(back.sort, SortMode::Size);
    assert_eq!(back.root, PathBuf::from("/srv"));
    assert_eq!(back.filter, config.filter);
}

#[test]
fn test_filter_options_builders() {
    let options = FilterOptions::default()
        .with_hide_dot(false)
        .with_types(TypeFlags::IMAGE | TypeFlags::DIR)
        .with_categories([Category::Image, Category::Font].into_iter().collect::<CategoryMask>())
        .with_search("cat");

    assert!(!options.hide_dot);
    assert!(options.types.contains(TypeFlags::DIR));
    assert!(options.categories.accepts(Category::Font));
    assert!(!options.categories.accepts(Category::Sound));
    assert_eq!(options.search(), "*cat*");

    let single = FilterOptions::default().with_categories(Category::Sound);
    assert_eq!(single.categories, CategoryMask::SOUND);
    assert!(FilterOptions::default().categories.accepts(Category::Data));
}
