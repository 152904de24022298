//! Ready-made extractor for basic file facts.
//!
//! Applications normally supply their own [`Extractor`]; this one derives
//! size, line count, and a SHA-256 content hash, keyed by filename. The
//! bundled CLI uses it, and it doubles as the reference extractor in tests.

use crate::{Extractor, IndexError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Derived facts about a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    /// File size in bytes
    pub size: u64,
    /// Line count
    pub line_count: usize,
    /// Content hash (SHA-256, hex)
    pub hash: String,
}

/// Extractor producing [`FileFacts`], keyed by filename.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactsExtractor;

#[async_trait]
impl Extractor for FactsExtractor {
    type Key = String;
    type Value = FileFacts;

    fn derive_key(&self, file_name: &str) -> String {
        file_name.to_string()
    }

    async fn extract(&self, path: &Path) -> Result<FileFacts, IndexError> {
        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8_lossy(&bytes);

        Ok(FileFacts {
            size: bytes.len() as u64,
            line_count: content.lines().count(),
            hash: compute_hash(&bytes),
        })
    }
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
