//! List configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::entry::{CategoryMask, TypeFlags};

/// Default capacity of the windowed entry cache. Must be a power of two.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Default number of preview worker threads.
pub const DEFAULT_PREVIEW_WORKERS: usize = 4;

/// Ordering applied to the filtered view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Keep scan order.
    None,
    /// Natural, case-insensitive name order.
    #[default]
    Name,
    /// Most recently modified first.
    Time,
    /// Largest first.
    Size,
    /// Grouped by extension (or container category).
    Extension,
}

/// What a file list is browsing; selects the directory check, read job and
/// filter strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum ListKind {
    /// Plain filesystem directories.
    #[default]
    Directory,
    /// Filesystem directories with archive containers browsable as folders.
    LibraryArchive,
    /// Application data browser; roots are not filesystem paths.
    DataBrowser,
}

/// Filtering options of a file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Hide dotfiles and `foo~` backups.
    #[serde(default = "default_true")]
    pub hide_dot: bool,

    /// Hide the ".." entry.
    #[serde(default)]
    pub hide_parent: bool,

    /// Accepted types; empty means no type filtering.
    #[serde(default)]
    pub types: TypeFlags,

    /// Accepted container categories.
    #[serde(default)]
    pub categories: CategoryMask,

    /// Glob tagging files as `OPERATOR` during scans (`;`-separated).
    #[serde(default)]
    pub operator_glob: String,

    /// Case-insensitive name search, stored with `*` padding.
    #[serde(default)]
    search: String,
}

fn default_true() -> bool {
    true
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            hide_dot: true,
            hide_parent: false,
            types: TypeFlags::NONE,
            categories: CategoryMask::all(),
            operator_glob: String::new(),
            search: String::new(),
        }
    }
}

impl FilterOptions {
    /// Set the search term; it is matched as `*term*` unless already padded.
    pub fn set_search(&mut self, search: &str) {
        self.search = pad_search(search);
    }

    /// Builder-style variant of [`FilterOptions::set_search`].
    pub fn with_search(mut self, search: &str) -> Self {
        self.set_search(search);
        self
    }

    pub fn with_hide_dot(mut self, hide_dot: bool) -> Self {
        self.hide_dot = hide_dot;
        self
    }

    /// Accept only these types (directories pass when `DIR` is included).
    pub fn with_types(mut self, types: TypeFlags) -> Self {
        self.types = types;
        self
    }

    /// Accept only container objects of these categories.
    pub fn with_categories(mut self, categories: impl Into<CategoryMask>) -> Self {
        self.categories = categories.into();
        self
    }

    /// Search pattern with padding, empty when no search is active.
    pub fn search(&self) -> &str {
        &self.search
    }
}

fn pad_search(search: &str) -> String {
    let core = search.trim_matches('*');
    if core.is_empty() {
        return String::new();
    }
    format!("*{core}*")
}

/// Preview pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Start the preview workers with the list.
    #[serde(default)]
    pub enabled: bool,

    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Longest side of generated thumbnails, in pixels.
    #[serde(default = "default_thumb_size")]
    pub thumb_size: u32,
}

fn default_workers() -> usize {
    DEFAULT_PREVIEW_WORKERS
}

fn default_thumb_size() -> u32 {
    128
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            workers: DEFAULT_PREVIEW_WORKERS,
            thumb_size: default_thumb_size(),
        }
    }
}

/// Configuration of a file list.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ListConfig {
    /// Root directory (or container path) to list.
    pub root: PathBuf,

    /// What is being browsed.
    #[builder(default)]
    #[serde(default)]
    pub kind: ListKind,

    /// Recursion depth; 0 lists the root only.
    #[builder(default = "0")]
    #[serde(default)]
    pub recursion_level: u32,

    /// Sort mode of the filtered view.
    #[builder(default)]
    #[serde(default)]
    pub sort: SortMode,

    /// Filtering options.
    #[builder(default)]
    #[serde(default)]
    pub filter: FilterOptions,

    /// Descend into symlinked directories when recursing.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Capacity of the windowed entry cache.
    #[builder(default = "DEFAULT_CACHE_SIZE")]
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Preview pipeline settings.
    #[builder(default)]
    #[serde(default)]
    pub preview: PreviewConfig,
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

impl ListConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if let Some(size) = self.cache_size {
            if size == 0 || !size.is_power_of_two() {
                return Err(format!("Cache size must be a power of two, got {size}"));
            }
        }
        if let Some(ref preview) = self.preview {
            if preview.workers == 0 {
                return Err("Preview worker count cannot be zero".to_string());
            }
        }
        Ok(())
    }
}

impl ListConfig {
    /// Create a new list config builder.
    pub fn builder() -> ListConfigBuilder {
        ListConfigBuilder::default()
    }

    /// Create a simple config listing a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            kind: ListKind::default(),
            recursion_level: 0,
            sort: SortMode::default(),
            filter: FilterOptions::default(),
            follow_symlinks: false,
            cache_size: DEFAULT_CACHE_SIZE,
            preview: PreviewConfig::default(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
