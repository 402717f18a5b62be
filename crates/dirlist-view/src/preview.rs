//! Asynchronous thumbnail generation.
//!
//! A fixed pool of workers pulls [`PreviewRequest`]s from a todo queue and
//! pushes [`PreviewResult`]s onto a done queue. The consumer drains the
//! done queue without blocking and merges results into cached entries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use dirlist_core::{EntryId, TypeFlags};

use crate::display::Thumbnail;

/// Errors from thumbnail generation.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The decoder cannot handle this kind of source.
    #[error("No preview support for {kind:?} sources")]
    Unsupported { kind: ThumbSource },

    /// Decoding failed.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// The worker pool could not be created.
    #[error("Failed to start preview workers: {message}")]
    Pool { message: String },
}

/// What a preview is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbSource {
    Image,
    Movie,
    Font,
    Archive,
}

impl ThumbSource {
    /// Source kind for an entry, if it is previewable at all.
    pub fn for_flags(flags: TypeFlags) -> Option<Self> {
        if flags.contains(TypeFlags::IMAGE) {
            Some(Self::Image)
        } else if flags.intersects(TypeFlags::ARCHIVE | TypeFlags::LIBRARY) {
            Some(Self::Archive)
        } else if flags.contains(TypeFlags::MOVIE) {
            Some(Self::Movie)
        } else if flags.contains(TypeFlags::FONT) {
            Some(Self::Font)
        } else {
            None
        }
    }
}

/// Decodes thumbnails.
pub trait ThumbnailDecoder: Send + Sync {
    fn decode(&self, path: &Path, source: ThumbSource) -> Result<Thumbnail, PreviewError>;
}

/// Image thumbnails through the `image` crate. Other sources are
/// unsupported.
#[derive(Debug, Clone, Copy)]
pub struct ImageThumbnailer {
    size: u32,
}

impl ImageThumbnailer {
    /// Thumbnails fit in a `size` x `size` box.
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::new(128)
    }
}

impl ThumbnailDecoder for ImageThumbnailer {
    fn decode(&self, path: &Path, source: ThumbSource) -> Result<Thumbnail, PreviewError> {
        if source != ThumbSource::Image {
            return Err(PreviewError::Unsupported { kind: source });
        }
        let image = image::open(path).map_err(|e| PreviewError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgba = image.thumbnail(self.size, self.size).to_rgba8();
        Ok(Thumbnail {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

/// A queued preview.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    /// Filtered index the entry had when queued.
    pub index: usize,
    pub id: EntryId,
    pub path: PathBuf,
    pub source: ThumbSource,
}

/// A finished preview; `thumbnail` is `None` when decoding failed.
#[derive(Debug, Clone)]
pub struct PreviewResult {
    pub index: usize,
    pub id: EntryId,
    pub thumbnail: Option<Arc<Thumbnail>>,
}

/// Worker pool with todo and done queues.
pub struct PreviewPipeline {
    todo_tx: Sender<PreviewRequest>,
    todo_rx: Receiver<PreviewRequest>,
    done_rx: Receiver<PreviewResult>,
    token: CancellationToken,
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl PreviewPipeline {
    /// Spin up `workers` threads decoding with `decoder`.
    pub fn start(decoder: Arc<dyn ThumbnailDecoder>, workers: usize) -> Result<Self, PreviewError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dirlist-preview-{i}"))
            .build()
            .map_err(|e| PreviewError::Pool {
                message: e.to_string(),
            })?;

        let (todo_tx, todo_rx) = async_channel::unbounded::<PreviewRequest>();
        let (done_tx, done_rx) = async_channel::unbounded::<PreviewResult>();
        let token = CancellationToken::new();

        for _ in 0..workers {
            let todo_rx = todo_rx.clone();
            let done_tx = done_tx.clone();
            let token = token.clone();
            let decoder = Arc::clone(&decoder);
            pool.spawn(move || run_worker(decoder.as_ref(), &todo_rx, &done_tx, &token));
        }

        debug!(workers, "Preview workers started");
        Ok(Self {
            todo_tx,
            todo_rx,
            done_rx,
            token,
            pool: Some(pool),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a request. Returns `false` once the pipeline is stopped.
    pub fn push(&self, request: PreviewRequest) -> bool {
        self.todo_tx.try_send(request).is_ok()
    }

    /// Requests not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.todo_rx.len()
    }

    /// Results waiting to be drained.
    pub fn ready(&self) -> usize {
        self.done_rx.len()
    }

    /// Drop queued requests and undrained results, returning their ids.
    /// Previews already being decoded still complete later.
    pub fn clear_pending(&self) -> Vec<EntryId> {
        let mut dropped = Vec::new();
        while let Ok(request) = self.todo_rx.try_recv() {
            dropped.push(request.id);
        }
        while let Ok(result) = self.done_rx.try_recv() {
            dropped.push(result.id);
        }
        if !dropped.is_empty() {
            trace!(dropped = dropped.len(), "Cleared preview queues");
        }
        dropped
    }

    /// Take every finished preview without blocking.
    pub fn drain_done(&self) -> Vec<PreviewResult> {
        let mut results = Vec::with_capacity(self.done_rx.len());
        while let Ok(result) = self.done_rx.try_recv() {
            results.push(result);
        }
        results
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the workers and free everything queued.
    pub fn stop(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.todo_tx.close();
        self.clear_pending();
        self.done_rx.close();
        // Dropping the pool lets workers exit once their current decode ends.
        self.pool.take();
        debug!("Preview workers stopped");
    }
}

impl Drop for PreviewPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PreviewPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewPipeline")
            .field("workers", &self.workers)
            .field("pending", &self.pending())
            .field("ready", &self.ready())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn run_worker(
    decoder: &dyn ThumbnailDecoder,
    todo: &Receiver<PreviewRequest>,
    done: &Sender<PreviewResult>,
    token: &CancellationToken,
) {
    while !token.is_cancelled() {
        let Ok(request) = todo.recv_blocking() else {
            break;
        };
        if token.is_cancelled() {
            break;
        }

        let thumbnail = match decoder.decode(&request.path, request.source) {
            Ok(thumbnail) => Some(Arc::new(thumbnail)),
            Err(e) => {
                trace!(path = %request.path.display(), error = %e, "No preview");
                None
            }
        };

        let result = PreviewResult {
            index: request.index,
            id: request.id,
            thumbnail,
        };
        if done.try_send(result).is_err() {
            break;
        }
    }
}
