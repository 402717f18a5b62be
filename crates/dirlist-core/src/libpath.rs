//! Paths pointing inside archive containers.
//!
//! A container is browsed as a pseudo-directory: `pack.zip/` lists one
//! directory per [`Category`], `pack.zip/Image/` lists the objects of that
//! category. A full library path therefore explodes into
//! `(container, group, name)`.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::entry::Category;
use crate::kind::is_container_name;

/// An exploded path inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPath {
    /// Path of the container file itself.
    pub container: PathBuf,
    /// Category directory name, if the path goes below the container root.
    pub group: Option<String>,
    /// Object name, if the path goes below the category.
    pub name: Option<String>,
}

impl LibraryPath {
    /// Explode a path, treating any component with a container suffix as a
    /// container.
    pub fn explode(path: &Path) -> Option<Self> {
        Self::explode_with(path, |_| true)
    }

    /// Explode a path, accepting a container candidate only when
    /// `is_container` agrees (e.g. it exists as a regular file).
    pub fn explode_with(path: &Path, is_container: impl Fn(&Path) -> bool) -> Option<Self> {
        let mut container = PathBuf::new();
        let mut components = path.components();

        loop {
            let component = components.next()?;
            container.push(component.as_os_str());
            if let Component::Normal(name) = component {
                if is_container_name(&name.to_string_lossy()) && is_container(&container) {
                    break;
                }
            }
        }

        let mut rest = components.map(|c| c.as_os_str().to_string_lossy().into_owned());
        let group = rest.next();
        let name: Vec<String> = rest.collect();
        let name = if name.is_empty() {
            None
        } else {
            Some(name.join("/"))
        };

        Some(Self {
            container,
            group,
            name,
        })
    }

    /// Category named by the group component, if it is a known one.
    pub fn category(&self) -> Option<Category> {
        self.group
            .as_deref()
            .and_then(|group| Category::from_str(group).ok())
    }

    /// Rebuild the full path.
    pub fn to_path(&self) -> PathBuf {
        let mut path = self.container.clone();
        if let Some(group) = &self.group {
            path.push(group);
            if let Some(name) = &self.name {
                path.push(name);
            }
        }
        path
    }

    /// Name shown for an entry pointing here: the object name, or the group
    /// for a category directory.
    pub fn ui_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.group.as_deref())
    }
}
