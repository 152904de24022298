//! File system watcher plumbing.
//!
//! Uses FSEvents on macOS and inotify on Linux via `notify`, wrapped in a
//! debouncer that pairs rename halves. The notification layer produces a
//! small closed set of change variants, delivered over a channel to the
//! single consumer task that owns all index mutation.

use crate::IndexError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A file system change relevant to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// File was created
    Created(PathBuf),
    /// File content or metadata was modified
    Modified(PathBuf),
    /// File was deleted
    Removed(PathBuf),
    /// File was renamed
    Renamed {
        /// Previous path
        from: PathBuf,
        /// New path
        to: PathBuf,
    },
}

/// Live watch handle; dropping it stops notification delivery.
pub(crate) type WatchHandle = Debouncer<RecommendedWatcher, RecommendedCache>;

/// Start watching a directory, non-recursively.
///
/// Returns the debouncer (delivery stops when it is dropped) and the
/// receiving end of the change channel. The channel closes once the
/// debouncer is gone and any queued changes have been drained.
pub(crate) fn start_watching(
    path: &Path,
    debounce: Duration,
    capacity: usize,
) -> Result<(WatchHandle, mpsc::Receiver<FsChange>), IndexError> {
    let (tx, rx) = mpsc::channel(capacity);

    let mut debouncer = new_debouncer(
        debounce,
        None,
        move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
            Ok(events) => {
                for event in events {
                    if let Some(change) = convert_event(&event.event) {
                        if let Err(e) = tx.blocking_send(change) {
                            error!(error = %e, "Failed to send change event");
                        }
                    }
                }
            }
            Err(errors) => {
                for e in errors {
                    warn!(error = %e, "Watcher error");
                }
            }
        },
    )
    .map_err(|e| IndexError::Watcher(e.to_string()))?;

    debouncer
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e: notify::Error| IndexError::Watcher(e.to_string()))?;

    Ok((debouncer, rx))
}

/// Convert a notify Event to an FsChange.
///
/// Only content/metadata modifications count as Modified; access events
/// and other notification subtypes are dropped. Rename halves arrive
/// already paired by the debouncer's file-id tracking.
fn convert_event(event: &Event) -> Option<FsChange> {
    let path = event.paths.first()?.clone();

    let change = match &event.kind {
        EventKind::Create(_) => {
            if path.is_dir() {
                return None;
            }
            FsChange::Created(path)
        }
        EventKind::Remove(_) => FsChange::Removed(path),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both | RenameMode::Any | RenameMode::Other
                if event.paths.len() >= 2 =>
            {
                FsChange::Renamed {
                    from: path,
                    to: event.paths[1].clone(),
                }
            }
            // Unpaired halves: the old name is gone, the new name appears.
            RenameMode::From => FsChange::Removed(path),
            RenameMode::To => FsChange::Created(path),
            _ => return None,
        },
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_) | ModifyKind::Any) => {
            if path.is_dir() {
                return None;
            }
            FsChange::Modified(path)
        }
        EventKind::Modify(ModifyKind::Other) => return None,
        EventKind::Access(_) => return None,
        EventKind::Any | EventKind::Other => return None,
    };

    debug!(change = ?change, "File change detected");

    Some(change)
}
