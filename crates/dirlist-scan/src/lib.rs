//! Background directory reading engine for dirlist.
//!
//! # Overview
//!
//! `dirlist-scan` reads a directory (optionally recursively, optionally
//! opening archive containers as libraries) into a shared
//! [`DirEntryStore`]. Key pieces:
//!
//! - **[`ScanJob`]**: iterative depth-first listing, one store merge per
//!   directory, cooperative stop between directories
//! - **[`DirLister`] / [`ArchiveReader`]**: where entries come from
//! - **[`JobScheduler`]**: runs jobs on a tokio blocking pool or inline
//! - **Progress updates** via broadcast channels and [`JobControl`]
//!
//! # Example
//!
//! ```rust,no_run
//! use dirlist_scan::{DirEntryStore, InlineScheduler, JobScheduler, ScanJob, ScanOptions};
//!
//! let store = DirEntryStore::new();
//! let generation = store.generation();
//! let job = ScanJob::new(ScanOptions::new("/srv/media"), store.clone(), generation);
//!
//! let handle = InlineScheduler::new().start(Box::new(job)).unwrap();
//! assert!(handle.is_finished());
//! println!("{} entries", store.len());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use dirlist_scan::{DirEntryStore, ScanJob, ScanOptions};
//!
//! let store = DirEntryStore::new();
//! let job = ScanJob::new(ScanOptions::new("/srv/media").max_recursion(3), store, 0);
//! let mut progress_rx = job.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("{:.0}%", progress.fraction() * 100.0);
//!     }
//! });
//! ```

mod archive;
mod inode;
mod job;
mod lister;
mod progress;
mod scheduler;
mod store;

pub use archive::{ArchiveReader, ContainerContents, ObjectInfo, ZipTarReader};
pub use inode::{DirKey, VisitedDirs};
pub use job::{clean_path, ScanJob, ScanOptions};
pub use lister::{DirLister, JwalkLister, ListedEntry};
pub use progress::ScanProgress;
pub use scheduler::{InlineScheduler, Job, JobControl, JobHandle, JobScheduler, TokioScheduler};
pub use store::{DirEntryStore, StoreMirror};

// Re-export core types for convenience
pub use dirlist_core::{EntryId, ListError, RawEntry, ScanError, TypeFlags};
