//! Newtype identifiers: class ids and sample keys.
//!
//! Using newtypes prevents accidentally mixing up a class index with any
//! other integer, or a sample key with an arbitrary path string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Index of a class in the configured class table.
///
/// A `ClassId` only says "index"; whether it is a member of the table is
/// decided by [`ClassTable`](crate::config::ClassTable).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Creates a new ClassId.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the id as a table index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ClassId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base filename (without extension) shared by an image and its annotation.
///
/// This is the join key between the image store and the label store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleKey(String);

impl SampleKey {
    /// Creates a key from an already-stripped base name.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives the key from a file path by dropping directory and extension.
    ///
    /// Returns `None` for paths without a UTF-8 file stem.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this key with the given extension (no leading dot).
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Debug for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SampleKey({:?})", self.0)
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_ordering() {
        assert!(ClassId(1) < ClassId(2));
        assert_eq!(ClassId::from(3).index(), 3);
    }

    #[test]
    fn test_sample_key_from_path() {
        let key = SampleKey::from_path(Path::new("data/Annotations/cc_01-frame_00012.xml"))
            .expect("key from path");
        assert_eq!(key.as_str(), "cc_01-frame_00012");
        assert_eq!(key.file_name("txt"), "cc_01-frame_00012.txt");
    }

    #[test]
    fn test_sample_key_keeps_inner_dots() {
        let key = SampleKey::from_path(Path::new("images/board.v2.jpg")).expect("key");
        assert_eq!(key.as_str(), "board.v2");
    }

    #[test]
    fn test_sample_key_rejects_empty_stem() {
        assert!(SampleKey::from_path(Path::new("/")).is_none());
    }
}
