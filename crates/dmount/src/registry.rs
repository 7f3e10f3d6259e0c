//! Registry of disk images known to the helper.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dmount_common::{DmountError, DmountResult};

/// A named disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Key the automounter asks for.
    pub name: String,
    /// Backing image file or bundle.
    pub path: PathBuf,
}

impl ImageEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Mapping from names to image paths, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRegistry {
    images: BTreeMap<String, PathBuf>,
}

impl ImageRegistry {
    /// Create a registry from a name to path mapping.
    #[must_use]
    pub fn new(images: BTreeMap<String, PathBuf>) -> Self {
        Self { images }
    }

    /// Only the entries whose backing path currently exists.
    #[must_use]
    pub fn available(&self) -> Self {
        self.images
            .iter()
            .filter(|(name, path)| {
                let exists = path.exists();
                if !exists {
                    tracing::debug!(%name, path = %path.display(), "Skipping missing disk image");
                }
                exists
            })
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect()
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// Look up an image by name.
    ///
    /// # Errors
    ///
    /// Returns [`DmountError::UnknownImage`] if the name is not registered.
    pub fn resolve(&self, name: &str) -> DmountResult<ImageEntry> {
        self.images
            .get(name)
            .map(|path| ImageEntry::new(name, path.clone()))
            .ok_or_else(|| DmountError::UnknownImage {
                name: name.to_string(),
            })
    }

    /// Names as printed by the listing mode, one per line.
    #[must_use]
    pub fn listing(&self) -> String {
        self.names().fold(String::new(), |mut out, name| {
            out.push_str(name);
            out.push('\n');
            out
        })
    }

    /// Number of registered images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no image is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for ImageRegistry {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
