//! Durable index store: one persisted record per indexed source file.
//!
//! Records live in the reserved `.dirdex/` subdirectory of the watched
//! directory, named exactly like their source file. A record's own mtime is
//! set to the source file's mtime at write time; the two being exactly
//! equal is the validity contract. Writes go through a temp file and an
//! atomic rename, so a concurrent reader of the storage area only ever
//! sees a complete record.

use crate::codec::Codec;
use crate::filter::RESERVED_DIR;
use crate::IndexError;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Persists one value per relevant source file.
pub struct IndexStore<V> {
    dir: PathBuf,
    codec: Arc<dyn Codec<V>>,
}

impl<V> IndexStore<V> {
    /// Open the store for a watched directory, creating the reserved
    /// subdirectory when it does not exist (empty prior state).
    pub async fn open(
        watched_dir: &Path,
        codec: Arc<dyn Codec<V>>,
    ) -> Result<Self, IndexError> {
        let dir = watched_dir.join(RESERVED_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        Ok(Self { dir, codec })
    }

    /// Storage directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{name}.tmp"))
    }

    /// Persist a value for a source file, tagging the record with the
    /// source's mtime.
    ///
    /// Encode, write to a temp file in the same directory, rename over any
    /// existing record, then mirror the source mtime onto the record. A
    /// crash before the rename leaves only a stray temp file, never a
    /// half-written record under the final name.
    pub async fn write(
        &self,
        name: &str,
        value: &V,
        source_mtime: SystemTime,
    ) -> Result<(), IndexError> {
        let bytes = self.codec.encode(value)?;

        let temp = self.temp_path(name);
        let record = self.record_path(name);

        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &record).await?;

        filetime::set_file_mtime(&record, FileTime::from_system_time(source_mtime))?;

        debug!(record = %name, size = bytes.len(), "Wrote index record");

        Ok(())
    }

    /// Read and decode a record. A decode failure is corruption.
    pub async fn read(&self, name: &str) -> Result<V, IndexError> {
        let bytes = tokio::fs::read(self.record_path(name)).await?;
        self.codec.decode(&bytes)
    }

    /// Record mtime, or `None` when no record exists.
    pub async fn record_mtime(&self, name: &str) -> Option<SystemTime> {
        tokio::fs::metadata(self.record_path(name))
            .await
            .ok()?
            .modified()
            .ok()
    }

    /// Whether a record exists and its mtime equals the source mtime
    /// exactly. Any mismatch means the record is stale.
    pub async fn is_valid(&self, name: &str, source_mtime: SystemTime) -> bool {
        self.record_mtime(name).await == Some(source_mtime)
    }

    /// Delete a record. Missing records are fine.
    pub async fn delete(&self, name: &str) -> Result<(), IndexError> {
        match tokio::fs::remove_file(self.record_path(name)).await {
            Ok(()) => {
                debug!(record = %name, "Deleted index record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rename a record, overwriting any existing destination record.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), IndexError> {
        tokio::fs::rename(self.record_path(old_name), self.record_path(new_name)).await?;
        debug!(from = %old_name, to = %new_name, "Renamed index record");
        Ok(())
    }

    /// List record names, skipping stray temp files.
    pub async fn list(&self) -> Result<Vec<String>, IndexError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_temp_name(&name) {
                continue;
            }
            names.push(name);
        }

        Ok(names)
    }

    /// Delete temp files left behind by a crash mid-write. Returns how
    /// many were removed.
    pub async fn remove_stray_temps(&self) -> Result<usize, IndexError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_temp_name(&name) {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed = removed, "Removed stray temp files");
        }

        Ok(removed)
    }
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}
