//! Raw directory entry types.

use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, FromRepr};

/// Stable identifier of a logical entry.
///
/// Derived from the absolute path of the entry, so rescanning the same
/// directory yields the same identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub [u8; 16]);

impl EntryId {
    /// Create an identifier from raw bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Compute the identifier of an absolute path (truncated BLAKE3 hash).
    pub fn from_path(path: &Path) -> Self {
        let path = path.to_string_lossy();
        let hash = blake3::hash(path.trim_end_matches('/').as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }

    /// Get the identifier as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

bitflags! {
    /// Type classification bitmask of an entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TypeFlags: u32 {
        /// Directory, or anything browsable as one.
        const DIR = 1 << 0;
        /// Archive container file (zip, tar...).
        const ARCHIVE = 1 << 1;
        /// Object or category directory living inside a container.
        const LIBRARY = 1 << 2;
        const BACKUP = 1 << 3;
        const IMAGE = 1 << 4;
        const MOVIE = 1 << 5;
        const SOUND = 1 << 6;
        const FONT = 1 << 7;
        const TEXT = 1 << 8;
        const SCRIPT = 1 << 9;
        const BUNDLE = 1 << 10;
        /// File matched the operator glob given to the scan.
        const OPERATOR = 1 << 11;
    }
}

impl TypeFlags {
    pub const NONE: Self = Self::empty();

    /// Kinds a thumbnail can be generated for.
    pub const PREVIEWABLE: Self = Self::IMAGE
        .union(Self::MOVIE)
        .union(Self::FONT)
        .union(Self::ARCHIVE)
        .union(Self::LIBRARY);

    pub const fn is_dir(self) -> bool {
        self.intersects(Self::DIR)
    }
}

impl Default for TypeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Category of objects stored inside a container.
///
/// Containers are browsed as `container/Category/object`; the category is the
/// secondary type code of entries found there.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    FromRepr,
)]
#[repr(u8)]
pub enum Category {
    Image = 1,
    Movie,
    Sound,
    Font,
    Text,
    Script,
    Archive,
    Data,
}

impl Category {
    /// Category an object is filed under, based on its own name.
    pub fn for_object(name: &str) -> Self {
        let flags = crate::kind::classify_path(name);
        if flags.contains(TypeFlags::IMAGE) {
            Self::Image
        } else if flags.contains(TypeFlags::MOVIE) {
            Self::Movie
        } else if flags.contains(TypeFlags::SOUND) {
            Self::Sound
        } else if flags.contains(TypeFlags::FONT) {
            Self::Font
        } else if flags.contains(TypeFlags::TEXT) {
            Self::Text
        } else if flags.contains(TypeFlags::SCRIPT) {
            Self::Script
        } else if flags.contains(TypeFlags::ARCHIVE) {
            Self::Archive
        } else {
            Self::Data
        }
    }

    /// Numeric code, used for grouping in extension sort.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Type flags an object of this category carries besides `LIBRARY`.
    pub fn type_flags(self) -> TypeFlags {
        match self {
            Self::Image => TypeFlags::IMAGE,
            Self::Movie => TypeFlags::MOVIE,
            Self::Sound => TypeFlags::SOUND,
            Self::Font => TypeFlags::FONT,
            Self::Text => TypeFlags::TEXT,
            Self::Script => TypeFlags::SCRIPT,
            Self::Archive => TypeFlags::ARCHIVE,
            Self::Data => TypeFlags::NONE,
        }
    }
}

bitflags! {
    /// Set of categories accepted by a library filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CategoryMask: u32 {
        const IMAGE = 1 << 1;
        const MOVIE = 1 << 2;
        const SOUND = 1 << 3;
        const FONT = 1 << 4;
        const TEXT = 1 << 5;
        const SCRIPT = 1 << 6;
        const ARCHIVE = 1 << 7;
        const DATA = 1 << 8;
    }
}

impl CategoryMask {
    pub const NONE: Self = Self::empty();

    /// Whether objects of `category` pass the mask.
    pub fn accepts(self, category: Category) -> bool {
        self.contains(category.into())
    }
}

impl From<Category> for CategoryMask {
    fn from(category: Category) -> Self {
        Self::from_bits_retain(1 << category.code())
    }
}

impl Default for CategoryMask {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Category> for CategoryMask {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::NONE, |mask, category| mask | category.into())
    }
}

/// A directory entry as discovered by a scan.
///
/// Immutable once merged into the entry store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    /// Path relative to the list root, `/`-separated.
    pub relpath: CompactString,

    /// Display name.
    pub name: CompactString,

    /// Identifier derived from the absolute path.
    pub id: EntryId,

    /// Type classification.
    pub typeflags: TypeFlags,

    /// Category code for entries inside a container.
    pub category: Option<Category>,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,
}

impl RawEntry {
    /// Create an entry with empty metadata; name and id are finalized later.
    pub fn new(relpath: impl Into<CompactString>, typeflags: TypeFlags) -> Self {
        Self {
            relpath: relpath.into(),
            name: CompactString::default(),
            id: EntryId::new([0; 16]),
            typeflags,
            category: None,
            size: 0,
            modified: UNIX_EPOCH,
        }
    }

    /// Set size and modification time.
    pub fn with_stat(mut self, size: u64, modified: SystemTime) -> Self {
        self.size = size;
        self.modified = modified;
        self
    }

    /// Set the container category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.typeflags.is_dir()
    }

    /// Check if this is the "." or ".." pseudo-entry.
    pub fn is_curr_or_parent(&self) -> bool {
        crate::is_curr_or_parent(&self.relpath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entry_id_is_deterministic() {
        let a = EntryId::from_path(Path::new("/data/images/cat.png"));
        let b = EntryId::from_path(Path::new("/data/images/cat.png"));
        let c = EntryId::from_path(Path::new("/data/images/dog.png"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 32);
    }

    #[test]
    fn test_entry_id_ignores_trailing_slash() {
        let a = EntryId::from_path(Path::new("/data/images/"));
        let b = EntryId::from_path(Path::new("/data/images"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_type_flags_ops() {
        let flags = TypeFlags::DIR | TypeFlags::ARCHIVE;
        assert!(flags.is_dir());
        assert!(flags.contains(TypeFlags::ARCHIVE));
        assert!(!flags.contains(TypeFlags::DIR | TypeFlags::IMAGE));
        assert!(flags.intersects(TypeFlags::DIR | TypeFlags::IMAGE));
        assert!(TypeFlags::PREVIEWABLE.contains(TypeFlags::IMAGE));
        assert!(!TypeFlags::PREVIEWABLE.intersects(TypeFlags::TEXT));
        assert_eq!(TypeFlags::default(), TypeFlags::NONE);
        assert!(TypeFlags::NONE.is_empty());
    }

    #[test]
    fn test_type_flags_serde() {
        let flags = TypeFlags::IMAGE | TypeFlags::LIBRARY;
        let json = serde_json::to_string(&flags).unwrap();
        let back: TypeFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::from_str("Image").unwrap(), Category::Image);
        assert_eq!(Category::Font.to_string(), "Font");
        assert!(Category::from_str("Nope").is_err());
        assert_eq!(Category::from_repr(Category::Text.code()), Some(Category::Text));
    }

    #[test]
    fn test_category_for_object() {
        assert_eq!(Category::for_object("cat.PNG"), Category::Image);
        assert_eq!(Category::for_object("notes.txt"), Category::Text);
        assert_eq!(Category::for_object("blob.bin"), Category::Data);
    }

    #[test]
    fn test_category_mask() {
        let mask: CategoryMask = [Category::Image, Category::Font].into_iter().collect();
        assert!(mask.accepts(Category::Image));
        assert!(!mask.accepts(Category::Text));
        assert!(mask.contains(CategoryMask::IMAGE | CategoryMask::FONT));
        assert!(CategoryMask::all().accepts(Category::Data));
        assert!(CategoryMask::default().accepts(Category::Script));

        // Every category maps to its own bit.
        for category in <Category as strum::IntoEnumIterator>::iter() {
            assert_eq!(CategoryMask::from(category).bits().count_ones(), 1);
            assert!(CategoryMask::all().accepts(category));
        }
    }
}
