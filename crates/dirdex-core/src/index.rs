//! The index engine: construction, live update application, queries.

use crate::cache::Cache;
use crate::codec::{Codec, JsonCodec};
use crate::filter::RelevanceFilter;
use crate::reconcile::{reconcile, ReconcileSummary};
use crate::store::IndexStore;
use crate::watcher::{start_watching, FsChange, WatchHandle};
use crate::{Extractor, IndexError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for the live watcher.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Debounce window for change notifications
    pub debounce: Duration,
    /// Capacity of the change channel
    pub channel_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            channel_capacity: 1024,
        }
    }
}

/// State shared between the engine, the scan tasks, and the consumer task.
pub(crate) struct Shared<E: Extractor> {
    pub(crate) dir: PathBuf,
    pub(crate) filter: RelevanceFilter,
    pub(crate) extractor: E,
    pub(crate) store: IndexStore<E::Value>,
    pub(crate) cache: Cache<E::Key, E::Value>,
}

impl<E: Extractor> Shared<E> {
    /// Whether a path is a relevant file directly inside the watched
    /// directory. Name-based only, so it also works for deleted paths.
    fn is_relevant_path(&self, path: &Path) -> bool {
        if path.parent() != Some(self.dir.as_path()) || self.filter.is_reserved(path) {
            return false;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.extractor.is_relevant(name, self.filter.extension()),
            None => false,
        }
    }

    /// The single read-modify-write primitive: extract, persist, commit.
    ///
    /// The source mtime is read before extraction, so a file changing
    /// underneath us yields a record already marked stale rather than one
    /// that wrongly passes validation. The cache is only updated once the
    /// durable write has completed.
    pub(crate) async fn add(&self, path: &Path) -> Result<(), IndexError> {
        let name = file_name_of(path).ok_or_else(|| IndexError::NotFound(path.to_path_buf()))?;

        let mtime = tokio::fs::metadata(path).await?.modified()?;
        let value = self.extractor.extract(path).await?;

        self.store.write(&name, &value, mtime).await?;

        let key = self.extractor.derive_key(&name);
        self.cache.insert(key, name, value);

        Ok(())
    }

    /// Remove a file's record and cache entry.
    async fn remove(&self, path: &Path) -> Result<(), IndexError> {
        let name = file_name_of(path).ok_or_else(|| IndexError::NotFound(path.to_path_buf()))?;

        self.store.delete(&name).await?;

        let key = self.extractor.derive_key(&name);
        self.cache.remove(&key);

        Ok(())
    }

    /// Move an entry between two relevant names, carrying the value.
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), IndexError> {
        let old_name = file_name_of(from).ok_or_else(|| IndexError::NotFound(from.to_path_buf()))?;
        let new_name = file_name_of(to).ok_or_else(|| IndexError::NotFound(to.to_path_buf()))?;

        let old_key = self.extractor.derive_key(&old_name);
        if !self.cache.contains(&old_key) {
            // Never indexed under the old name; index the new one fresh.
            return self.add(to).await;
        }

        match self.store.rename(&old_name, &new_name).await {
            Ok(()) => {
                let new_key = self.extractor.derive_key(&new_name);
                self.cache.rename(&old_key, new_key, new_name);
                Ok(())
            }
            Err(IndexError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                // Cache entry without a record; re-extract under the new name.
                self.cache.remove(&old_key);
                self.add(to).await
            }
            Err(e) => Err(e),
        }
    }

    /// Apply one change. Relevance of a rename's two sides is evaluated
    /// independently; crossing the relevance boundary degrades to a plain
    /// add or remove.
    pub(crate) async fn apply(&self, change: FsChange) -> Result<(), IndexError> {
        match change {
            FsChange::Created(path) | FsChange::Modified(path) => {
                if self.is_relevant_path(&path) {
                    self.add(&path).await
                } else {
                    Ok(())
                }
            }
            FsChange::Removed(path) => {
                if self.is_relevant_path(&path) {
                    self.remove(&path).await
                } else {
                    Ok(())
                }
            }
            FsChange::Renamed { from, to } => {
                match (self.is_relevant_path(&from), self.is_relevant_path(&to)) {
                    (true, true) => self.rename(&from, &to).await,
                    (true, false) => self.remove(&from).await,
                    (false, true) => self.add(&to).await,
                    (false, false) => Ok(()),
                }
            }
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

/// Queryable, self-maintaining index over one directory.
///
/// Construction reconciles the persisted index with the directory's actual
/// contents, then attaches a non-recursive watcher whose changes a single
/// consumer task applies in order. Queries read consistent snapshots at
/// any time.
pub struct DirIndex<E: Extractor> {
    shared: Arc<Shared<E>>,
    watch: Mutex<Option<WatchHandle>>,
    summary: ReconcileSummary,
}

impl<E: Extractor> DirIndex<E> {
    /// Open an index with the default JSON codec and options.
    ///
    /// `extension` is the relevant file suffix without a leading dot.
    pub async fn open(
        dir: impl AsRef<Path>,
        extension: &str,
        extractor: E,
    ) -> Result<Self, IndexError> {
        Self::open_with(
            dir,
            extension,
            extractor,
            Arc::new(JsonCodec),
            IndexOptions::default(),
        )
        .await
    }

    /// Open an index with an explicit codec and options.
    pub async fn open_with(
        dir: impl AsRef<Path>,
        extension: &str,
        extractor: E,
        codec: Arc<dyn Codec<E::Value>>,
        options: IndexOptions,
    ) -> Result<Self, IndexError> {
        // Fail fast on configuration before any filesystem work.
        let filter = RelevanceFilter::new(extension)?;

        let dir = dir
            .as_ref()
            .canonicalize()
            .map_err(|_| IndexError::NotFound(dir.as_ref().to_path_buf()))?;

        let store = IndexStore::open(&dir, codec).await?;

        let shared = Arc::new(Shared {
            dir: dir.clone(),
            filter,
            extractor,
            store,
            cache: Cache::new(),
        });

        let summary = reconcile(&shared).await?;

        let (watch, mut rx) = start_watching(&dir, options.debounce, options.channel_capacity)?;

        let consumer = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                if let Err(e) = consumer.apply(change).await {
                    warn!(error = %e, "Failed to apply change");
                }
            }
            debug!("Change loop stopped");
        });

        info!(path = ?dir, entries = shared.cache.len(), "Index ready, watching");

        Ok(Self {
            shared,
            watch: Mutex::new(Some(watch)),
            summary,
        })
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Counters from the startup reconciliation.
    pub fn reconcile_summary(&self) -> &ReconcileSummary {
        &self.summary
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> Vec<E::Key> {
        self.shared.cache.keys()
    }

    /// Snapshot of all values.
    pub fn values(&self) -> Vec<E::Value> {
        self.shared.cache.values()
    }

    /// Point lookup; `None` signals an absent key.
    pub fn get(&self, key: &E::Key) -> Option<E::Value> {
        self.shared.cache.get(key)
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.shared.cache.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.cache.is_empty()
    }

    /// Stop watching. Idempotent; releases the OS watch handle and stops
    /// new notification delivery before returning. Updates already in
    /// flight drain through the consumer task.
    pub fn close(&self) {
        if let Some(watch) = self.watch.lock().take() {
            drop(watch);
            info!(path = ?self.shared.dir, "Stopped watching");
        }
    }
}

impl<E: Extractor> Drop for DirIndex<E> {
    fn drop(&mut self) {
        self.close();
    }
}
