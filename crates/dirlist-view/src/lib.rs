//! Consumer side of dirlist: the filtered view, the windowed entry cache,
//! thumbnail previews and selection.
//!
//! # Overview
//!
//! - **[`FilterIndex`]**: sorted, filtered positions into the mirrored
//!   entry store, rebuilt only when dirty
//! - **[`EntryCache`]**: ring buffer window of materialized entries plus a
//!   FIFO for out-of-window lookups, indexed by [`EntryId`]
//! - **[`PreviewPipeline`]**: worker pool decoding thumbnails off the
//!   consumer thread
//! - **[`FileList`]**: ties the above to a background [`ScanJob`]
//!
//! # Example
//!
//! ```rust,no_run
//! use dirlist_core::ListConfig;
//! use dirlist_scan::InlineScheduler;
//! use dirlist_view::FileList;
//!
//! let mut list = FileList::new(ListConfig::new("/srv/media")).unwrap();
//! list.start(&InlineScheduler::new()).unwrap();
//! list.update();
//! list.sort_filter();
//!
//! list.cache_block(0);
//! for index in 0..list.num_files().min(10) {
//!     if let Some(entry) = list.file(index) {
//!         println!("{}", entry.name);
//!     }
//! }
//! ```
//!
//! [`ScanJob`]: dirlist_scan::ScanJob

mod cache;
mod display;
mod filelist;
mod filter;
mod history;
mod preview;
mod provider;
mod selection;
mod sort;

pub use cache::{EntryCache, Materializer, WindowChange};
pub use display::{DisplayEntry, Revision, Thumbnail, Variant};
pub use filelist::{FileList, PreviewStats};
pub use filter::{is_hidden, EntryFilter, FilterIndex};
pub use history::FolderHistory;
pub use preview::{
    ImageThumbnailer, PreviewError, PreviewPipeline, PreviewRequest, PreviewResult, ThumbSource,
    ThumbnailDecoder,
};
pub use provider::{EntryProvider, ProviderStatus};
pub use selection::{SelectCheck, SelectFlags, SelectOp, SelectionState};
pub use sort::{compare, natural_cmp};

// Re-export core types for convenience
pub use dirlist_core::{EntryId, FilterOptions, ListConfig, ListKind, SortMode};
