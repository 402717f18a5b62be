//! Single-level directory reading.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use jwalk::{Parallelism, WalkDir};
use tracing::debug;

use dirlist_core::ScanError;

/// One child of a listed directory.
#[derive(Debug, Clone)]
pub struct ListedEntry {
    /// File name, without any path.
    pub name: String,
    /// Whether the entry is (or links to) a directory.
    pub is_dir: bool,
    /// Whether the entry itself is a symbolic link.
    pub is_symlink: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// Reads the immediate children of a directory.
///
/// Implementations must not return "." or "..".
pub trait DirLister: Send + Sync {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, ScanError>;
}

/// Filesystem lister backed by jwalk.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwalkLister;

impl JwalkLister {
    pub fn new() -> Self {
        Self
    }
}

impl DirLister for JwalkLister {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, ScanError> {
        let metadata = fs::metadata(dir).map_err(|e| ScanError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        // Surface permission errors on the directory itself.
        fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .skip_hidden(false)
            .follow_links(false)
            .sort(false)
            .parallelism(Parallelism::Serial);

        let mut entries = Vec::new();
        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_symlink = file_type.is_symlink();
            let path = entry.path();

            // Links are reported with their target's type and stat.
            let metadata = if is_symlink {
                fs::metadata(&path).or_else(|_| fs::symlink_metadata(&path))
            } else {
                fs::symlink_metadata(&path)
            };
            let (is_dir, size, modified) = match metadata {
                Ok(m) => (
                    m.is_dir(),
                    if m.is_dir() { 0 } else { m.len() },
                    m.modified().unwrap_or(UNIX_EPOCH),
                ),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to stat entry");
                    (file_type.is_dir(), 0, UNIX_EPOCH)
                }
            };

            entries.push(ListedEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
                is_symlink,
                size,
                modified,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_list_single_level() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("sub")).unwrap();
        fs::create_dir(root.join("sub/deeper")).unwrap();
        let mut f = File::create(root.join("notes.txt")).unwrap();
        f.write_all(b"hello").unwrap();
        File::create(root.join(".hidden")).unwrap();

        let mut entries = JwalkLister::new().list(root).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".hidden", "notes.txt", "sub"]);

        assert!(entries[2].is_dir);
        assert_eq!(entries[1].size, 5);
        assert!(!entries[1].is_dir);
    }

    #[test]
    fn test_list_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = JwalkLister::new().list(&temp.path().join("nope"));
        assert!(matches!(result, Err(ScanError::NotFound { .. })));
    }

    #[test]
    fn test_list_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        File::create(&file).unwrap();

        let result = JwalkLister::new().list(&file);
        assert!(matches!(result, Err(ScanError::NotADirectory { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_reports_target_type() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let entries = JwalkLister::new().list(root).unwrap();
        let link = entries.iter().find(|e| e.name == "link").unwrap();
        assert!(link.is_symlink);
        assert!(link.is_dir);
    }
}
