//! dirlist - asynchronous directory listing with a windowed entry cache.
//!
//! Usage:
//!   dirlist ls [PATH]               List a directory
//!   dirlist find PATTERN [PATH]     List entries whose path matches PATTERN
//!   dirlist thumbs [PATH]           Generate thumbnails for the first window
//!   dirlist --help                  Show help
//!
//! Logging is controlled with `DIRLIST_LOG` (falls back to `RUST_LOG`).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use dirlist_core::{FilterOptions, ListConfig, ListKind, SortMode};
use dirlist_scan::TokioScheduler;
use dirlist_view::{DisplayEntry, FileList};

#[derive(Parser)]
#[command(
    name = "dirlist",
    version,
    about = "Asynchronous directory listing engine",
    long_about = "dirlist reads directories (and archive containers) in the background,\n\
                  filters and sorts them, and serves entries through a windowed cache."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        #[command(flatten)]
        list: ListArgs,
    },

    /// List entries whose relative path matches a pattern
    Find {
        /// Case-insensitive glob, matched anywhere in the path
        pattern: String,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Generate thumbnails for the first window of entries
    Thumbs {
        #[command(flatten)]
        list: ListArgs,

        /// Longest side of generated thumbnails, in pixels
        #[arg(long, default_value = "128")]
        size: u32,

        /// Number of preview workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Give up waiting for previews after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Directory (or path inside a container) to list
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Recursion depth (0 lists the directory only)
    #[arg(short, long, default_value = "0")]
    recursion: u32,

    /// Sort mode: none, name, time, size or extension
    #[arg(short, long, default_value = "name")]
    sort: SortMode,

    /// Browse archive containers as folders
    #[arg(short, long)]
    library: bool,

    /// Show dotfiles and backup files
    #[arg(short, long)]
    all: bool,

    /// Follow symlinked directories when recursing
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One listed entry, as printed.
#[derive(Serialize)]
struct EntryRow {
    relpath: String,
    name: String,
    kind: String,
    size: u64,
    modified: DateTime<Local>,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<(u32, u32)>,
}

impl EntryRow {
    fn new(entry: &DisplayEntry) -> Self {
        Self {
            relpath: entry.relpath.to_string(),
            name: entry.name.to_string(),
            kind: entry.icon_kind().to_string(),
            size: entry.size(),
            modified: DateTime::from(entry.modified()),
            id: entry.id.to_hex(),
            thumbnail: entry.thumbnail.as_ref().map(|t| (t.width, t.height)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Ls { list } => {
            let mut files = FileList::new(list_config(&list, None)?)?;
            read(&mut files).await?;
            print_rows(&collect_rows(&mut files, usize::MAX), list.format)?;
        }
        Command::Find { pattern, list } => {
            let mut files = FileList::new(list_config(&list, Some(&pattern))?)?;
            read(&mut files).await?;
            let rows = collect_rows(&mut files, usize::MAX);
            eprintln!("{} match(es) for \"{}\"", rows.len(), pattern);
            print_rows(&rows, list.format)?;
        }
        Command::Thumbs {
            list,
            size,
            workers,
            timeout,
        } => {
            run_thumbs(&list, size, workers, Duration::from_secs(timeout)).await?;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DIRLIST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build a list configuration from command line arguments.
fn list_config(args: &ListArgs, search: Option<&str>) -> Result<ListConfig> {
    let path = match args.path.canonicalize() {
        Ok(path) => path,
        // Paths inside containers do not exist on disk.
        Err(_) if args.library => std::path::absolute(&args.path).context("Invalid path")?,
        Err(e) => return Err(e).context("Invalid path"),
    };

    let mut filter = FilterOptions::default().with_hide_dot(!args.all);
    if let Some(search) = search {
        filter.set_search(search);
    }

    let kind = if args.library {
        ListKind::LibraryArchive
    } else {
        ListKind::Directory
    };
    ListConfig::builder()
        .root(path)
        .kind(kind)
        .recursion_level(args.recursion)
        .sort(args.sort)
        .filter(filter)
        .follow_symlinks(args.follow_symlinks)
        .build()
        .context("Invalid list configuration")
}

/// Run the read job to completion, then build the filtered view.
async fn read(list: &mut FileList) -> Result<()> {
    let scheduler = TokioScheduler::current()?;
    eprintln!("Reading {}...", list.root().display());

    let started = Instant::now();
    list.start(&scheduler)?;
    loop {
        list.update();
        if list.is_ready() {
            break;
        }
        debug!(progress = list.progress(), "Reading");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    list.sort_filter();

    info!(
        entries = list.num_files(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "List ready"
    );
    Ok(())
}

/// Walk the filtered view window by window.
fn collect_rows(list: &mut FileList, limit: usize) -> Vec<EntryRow> {
    let count = list.num_files().min(limit);
    let mut rows = Vec::with_capacity(count);
    for index in 0..count {
        if !list.cache_window().contains(&index) {
            list.cache_block(index);
        }
        if let Some(entry) = list.file(index) {
            rows.push(EntryRow::new(entry));
        }
    }
    rows
}

fn print_rows(rows: &[EntryRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for row in rows {
                let size = if row.kind == "Folder" || row.kind == "Parent" {
                    "-".to_string()
                } else {
                    format_size(row.size)
                };
                let thumb = row
                    .thumbnail
                    .map(|(w, h)| format!("  [{w}x{h}]"))
                    .unwrap_or_default();
                println!(
                    "{:<8} {:<48} {:>10}  {}{}",
                    row.kind,
                    truncate(&row.relpath, 48),
                    size,
                    row.modified.format("%Y-%m-%d %H:%M"),
                    thumb
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
    }
    Ok(())
}

/// Generate previews for the first cache window and report them.
async fn run_thumbs(args: &ListArgs, size: u32, workers: usize, timeout: Duration) -> Result<()> {
    if workers == 0 {
        bail!("At least one preview worker is required");
    }

    let mut config = list_config(args, None)?;
    config.preview.thumb_size = size;
    config.preview.workers = workers;
    config.preview.enabled = true;

    let mut list = FileList::new(config)?;
    read(&mut list).await?;
    if !list.cache_block(0) {
        eprintln!("Nothing to preview.");
        return Ok(());
    }

    let window = list.cache_window();
    let deadline = Instant::now() + timeout;
    let mut merged = 0;
    loop {
        merged += list.previews_update().merged;
        let waiting = window
            .clone()
            .filter(|&i| list.file(i).is_some_and(DisplayEntry::wants_preview))
            .count();
        if waiting == 0 {
            break;
        }
        if Instant::now() >= deadline {
            eprintln!("Timed out with {waiting} preview(s) outstanding");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    eprintln!("{merged} preview(s) processed");

    let rows = collect_rows(&mut list, window.end);
    let rows: Vec<EntryRow> = rows.into_iter().filter(|r| r.thumbnail.is_some()).collect();
    print_rows(&rows, args.format)
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}
