//! Pluggable key derivation and value extraction.

use crate::IndexError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;

/// Application-supplied extraction strategy.
///
/// The engine is parameterized over this trait instead of subclassing:
/// key derivation, value extraction, and (optionally) relevance all live
/// here. Keys must be stable for a given filename and unique across
/// distinct files; values are immutable snapshots replaced wholesale when
/// a file changes.
#[async_trait]
pub trait Extractor: Send + Sync + 'static {
    /// Stable identity derived from a filename.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Derived, serializable snapshot of a file's content/metadata.
    type Value: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Derive the cache key for a filename. Must be pure and stable.
    fn derive_key(&self, file_name: &str) -> Self::Key;

    /// Extract a value from the file's current contents.
    ///
    /// May perform arbitrary I/O and parsing; a failure applies to this
    /// file only and never aborts work on other files.
    async fn extract(&self, path: &Path) -> Result<Self::Value, IndexError>;

    /// Whether a filename participates in the index.
    ///
    /// Defaults to a suffix match on the configured extension. The index's
    /// own storage area is excluded before this is consulted.
    fn is_relevant(&self, file_name: &str, extension: &str) -> bool {
        let suffix_len = extension.len() + 1;
        file_name.len() > suffix_len
            && file_name.ends_with(extension)
            && file_name.as_bytes()[file_name.len() - suffix_len] == b'.'
    }
}
