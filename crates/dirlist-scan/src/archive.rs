//! Reading the contents of archive containers.
//!
//! Containers are browsed as libraries: each file inside is an object,
//! grouped by [`Category`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use dirlist_core::{Category, LibraryPath, ScanError};

/// One object stored inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Path of the object inside the container, `/`-separated.
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// Objects of a container grouped by category.
#[derive(Debug, Clone, Default)]
pub struct ContainerContents {
    groups: BTreeMap<Category, Vec<ObjectInfo>>,
}

impl ContainerContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object under the category derived from its name.
    pub fn insert(&mut self, object: ObjectInfo) {
        let category = Category::for_object(&object.name);
        self.groups.entry(category).or_default().push(object);
    }

    /// Categories with at least one object, in category code order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.groups.keys().copied()
    }

    /// Objects of one category.
    pub fn objects(&self, category: Category) -> &[ObjectInfo] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of objects.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Reads archive containers.
pub trait ArchiveReader: Send + Sync {
    /// Split a path into container, group and object, if it points into a
    /// real container.
    fn explode(&self, path: &Path) -> Option<LibraryPath> {
        LibraryPath::explode_with(path, |candidate| candidate.is_file())
    }

    /// Read the object list of a container.
    fn read_contents(&self, container: &Path) -> Result<ContainerContents, ScanError>;
}

/// Reader for zip and (optionally compressed) tar archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipTarReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    Tar,
    TarGz,
    TarXz,
    TarBz2,
}

impl Format {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

impl ZipTarReader {
    pub fn new() -> Self {
        Self
    }

    fn read_zip(&self, path: &Path, file: File) -> Result<ContainerContents, ScanError> {
        let mut archive =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ScanError::corrupt(path, e))?;
        let fallback_time = container_mtime(path);

        let mut contents = ContainerContents::new();
        for index in 0..archive.len() {
            let entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(path = %path.display(), index, error = %e, "Skipping zip member");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches("./").to_string();
            if name.is_empty() {
                continue;
            }
            contents.insert(ObjectInfo {
                name,
                size: entry.size(),
                modified: fallback_time,
            });
        }
        Ok(contents)
    }

    fn read_tar(&self, path: &Path, reader: Box<dyn Read>) -> Result<ContainerContents, ScanError> {
        let mut archive = tar::Archive::new(reader);
        let entries = archive.entries().map_err(|e| ScanError::corrupt(path, e))?;

        let mut contents = ContainerContents::new();
        for entry_result in entries {
            // A broken tar stream cannot be resynchronized.
            let entry = entry_result.map_err(|e| ScanError::corrupt(path, e))?;
            let header = entry.header();
            if !header.entry_type().is_file() {
                continue;
            }
            let name = match entry.path() {
                Ok(p) => p.to_string_lossy().trim_start_matches("./").to_string(),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping tar member");
                    continue;
                }
            };
            if name.is_empty() {
                continue;
            }
            let size = header.size().unwrap_or(0);
            let modified = header
                .mtime()
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap_or(UNIX_EPOCH);
            contents.insert(ObjectInfo {
                name,
                size,
                modified,
            });
        }
        Ok(contents)
    }
}

impl ArchiveReader for ZipTarReader {
    fn read_contents(&self, container: &Path) -> Result<ContainerContents, ScanError> {
        let format = Format::detect(container).ok_or_else(|| ScanError::NotAContainer {
            path: container.to_path_buf(),
        })?;
        let file = File::open(container).map_err(|e| ScanError::io(container, e))?;

        match format {
            Format::Zip => self.read_zip(container, file),
            Format::Tar => self.read_tar(container, Box::new(BufReader::new(file))),
            Format::TarGz => self.read_tar(
                container,
                Box::new(flate2::read::GzDecoder::new(BufReader::new(file))),
            ),
            Format::TarXz => self.read_tar(
                container,
                Box::new(xz2::read::XzDecoder::new(BufReader::new(file))),
            ),
            Format::TarBz2 => self.read_tar(
                container,
                Box::new(bzip2::read::BzDecoder::new(BufReader::new(file))),
            ),
        }
    }
}

fn container_mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH)
}
