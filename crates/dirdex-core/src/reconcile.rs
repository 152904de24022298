//! Startup reconciliation.
//!
//! Converges the cache and the durable store with the directory's actual
//! contents, whatever state the store was left in: records for vanished or
//! modified files are dropped, still-valid records are loaded without
//! re-extraction, and everything else is extracted fresh.

use crate::index::Shared;
use crate::{Extractor, IndexError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Counters from a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    /// Entries loaded from still-valid records, no extraction needed
    pub loaded: usize,
    /// Entries freshly extracted
    pub extracted: usize,
    /// Records dropped as stale or orphaned
    pub removed: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Run the three reconciliation passes.
pub(crate) async fn reconcile<E: Extractor>(
    shared: &Arc<Shared<E>>,
) -> Result<ReconcileSummary, IndexError> {
    let start = Instant::now();

    shared.store.remove_stray_temps().await?;

    // Pass 1: load still-valid records, drop everything stale or corrupt.
    let mut satisfied: HashSet<String> = HashSet::new();
    let mut loaded = 0;
    let mut removed = 0;

    for name in shared.store.list().await? {
        let relevant = shared
            .extractor
            .is_relevant(&name, shared.filter.extension());
        let source_mtime = tokio::fs::metadata(shared.dir.join(&name))
            .await
            .ok()
            .and_then(|m| m.modified().ok());

        let valid = match source_mtime {
            Some(mtime) if relevant => shared.store.is_valid(&name, mtime).await,
            _ => false,
        };

        if !valid {
            debug!(record = %name, "Dropping stale or orphaned record");
            shared.store.delete(&name).await?;
            removed += 1;
            continue;
        }

        match shared.store.read(&name).await {
            Ok(value) => {
                let key = shared.extractor.derive_key(&name);
                shared.cache.insert(key, name.clone(), value);
                satisfied.insert(name);
                loaded += 1;
            }
            Err(e) => {
                debug!(record = %name, error = %e, "Dropping corrupt record");
                shared.store.delete(&name).await?;
                removed += 1;
            }
        }
    }

    // Pass 2: scan the directory; every relevant file counts as existing,
    // unsatisfied ones get a full add. Files are independent, so the adds
    // fan out; a failure affects only its own file.
    let mut existing: HashSet<E::Key> = HashSet::new();
    let mut tasks = JoinSet::new();
    let mut entries = tokio::fs::read_dir(&shared.dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if shared.filter.is_reserved(&entry.path())
            || !shared
                .extractor
                .is_relevant(&name, shared.filter.extension())
        {
            continue;
        }

        existing.insert(shared.extractor.derive_key(&name));

        if satisfied.contains(&name) {
            continue;
        }

        let task_shared = Arc::clone(shared);
        let path = entry.path();
        tasks.spawn(async move {
            let result = task_shared.add(&path).await;
            (path, result)
        });
    }

    let mut extracted = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => extracted += 1,
            Ok((path, Err(e))) => {
                warn!(path = ?path, error = %e, "Initial extraction failed");
            }
            Err(e) => warn!(error = %e, "Extraction task failed"),
        }
    }

    // Pass 3: entries loaded in pass 1 whose files no longer exist.
    for name in shared.cache.retain(&existing) {
        debug!(record = %name, "Dropping entry for vanished file");
        shared.store.delete(&name).await?;
        removed += 1;
    }

    let summary = ReconcileSummary {
        loaded,
        extracted,
        removed,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        loaded = summary.loaded,
        extracted = summary.extracted,
        removed = summary.removed,
        duration_ms = summary.duration_ms,
        "Reconciliation complete"
    );

    Ok(summary)
}
