//! File type classification from names.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::entry::TypeFlags;

/// Compressed tarball suffixes made of two extensions.
const DOUBLE_SUFFIXES: &[&str] = &[".tar.gz", ".tar.xz", ".tar.bz2"];

const CONTAINER_EXTENSIONS: &[&str] = &["zip", "tar", "tgz", "txz", "tbz2"];
const BACKUP_EXTENSIONS: &[&str] = &["bak", "old", "orig"];
const SCRIPT_EXTENSIONS: &[&str] = &["py", "sh", "lua", "js", "rb", "pl"];
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "glsl", "osl", "data", "json", "toml", "yaml", "csv", "log",
];
const FONT_EXTENSIONS: &[&str] = &["ttf", "ttc", "pfb", "otf", "otc", "woff", "woff2"];
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "tga", "webp", "exr", "hdr", "psd",
    "ico", "dds", "pnm",
];
const MOVIE_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "mpg", "mpeg", "m4v", "flv", "wmv", "ogv",
];
const SOUND_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a", "opus", "aiff"];

/// Lowercased last extension of a path, without the dot.
fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn ends_with_ignore_case(path: &str, suffix: &str) -> bool {
    path.len() > suffix.len()
        && path.is_char_boundary(path.len() - suffix.len())
        && path[path.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Check whether a name designates an archive container file.
pub fn is_container_name(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    if DOUBLE_SUFFIXES.iter().any(|s| ends_with_ignore_case(path, s)) {
        return true;
    }
    extension(path).is_some_and(|ext| CONTAINER_EXTENSIONS.contains(&ext.as_str()))
}

/// Classify a file from its name. Directories are not classified here.
pub fn classify_path(path: &str) -> TypeFlags {
    if is_container_name(path) {
        return TypeFlags::ARCHIVE;
    }
    if ends_with_ignore_case(path, ".app") {
        return TypeFlags::BUNDLE;
    }

    let Some(ext) = extension(path) else {
        return TypeFlags::NONE;
    };
    let ext = ext.as_str();

    if BACKUP_EXTENSIONS.contains(&ext) {
        TypeFlags::BACKUP
    } else if SCRIPT_EXTENSIONS.contains(&ext) {
        TypeFlags::SCRIPT
    } else if TEXT_EXTENSIONS.contains(&ext) {
        TypeFlags::TEXT
    } else if FONT_EXTENSIONS.contains(&ext) {
        TypeFlags::FONT
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        TypeFlags::IMAGE
    } else if MOVIE_EXTENSIONS.contains(&ext) {
        TypeFlags::MOVIE
    } else if SOUND_EXTENSIONS.contains(&ext) {
        TypeFlags::SOUND
    } else {
        TypeFlags::NONE
    }
}

/// Suffix used to group entries in extension sort.
///
/// Known double suffixes (`.tar.gz`) are kept whole; otherwise the text from
/// the last dot. Empty when there is no dot.
pub fn sort_suffix(relpath: &str) -> &str {
    for suffix in DOUBLE_SUFFIXES {
        if ends_with_ignore_case(relpath, suffix) {
            return &relpath[relpath.len() - suffix.len()..];
        }
    }
    match relpath.rfind('.') {
        Some(pos) => &relpath[pos..],
        None => "",
    }
}

/// Icon a consumer should draw for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum IconKind {
    Folder,
    Parent,
    Archive,
    Backup,
    Image,
    Movie,
    Sound,
    Font,
    Text,
    Script,
    Bundle,
    Blank,
}

impl TypeFlags {
    /// Pick the icon for an entry of this type.
    pub fn icon_kind(self, relpath: &str) -> IconKind {
        if relpath == crate::PARENT_DIR {
            return IconKind::Parent;
        }
        if self.contains(TypeFlags::ARCHIVE) {
            return IconKind::Archive;
        }
        if self.is_dir() {
            return IconKind::Folder;
        }
        if self.contains(TypeFlags::BACKUP) {
            IconKind::Backup
        } else if self.contains(TypeFlags::IMAGE) {
            IconKind::Image
        } else if self.contains(TypeFlags::MOVIE) {
            IconKind::Movie
        } else if self.contains(TypeFlags::SOUND) {
            IconKind::Sound
        } else if self.contains(TypeFlags::FONT) {
            IconKind::Font
        } else if self.contains(TypeFlags::TEXT) {
            IconKind::Text
        } else if self.contains(TypeFlags::SCRIPT) {
            IconKind::Script
        } else if self.contains(TypeFlags::BUNDLE) {
            IconKind::Bundle
        } else {
            IconKind::Blank
        }
    }
}
