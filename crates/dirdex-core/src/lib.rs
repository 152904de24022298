//! Dirdex Core
//!
//! This crate maintains a queryable in-memory index of derived metadata for
//! the relevant files in a single directory, including:
//! - Startup reconciliation of the persisted index against directory contents
//! - Live incremental updates from debounced file system notifications
//! - Crash-tolerant record persistence via atomic temp-then-rename writes
//! - Pluggable key derivation, value extraction, and record codecs

mod error;

pub mod cache;
pub mod codec;
pub mod extract;
pub mod facts;
pub mod filter;
pub mod index;
pub mod reconcile;
pub mod store;
pub mod watcher;

pub use cache::Cache;
pub use codec::{Codec, JsonCodec, MsgpackCodec};
pub use error::IndexError;
pub use extract::Extractor;
pub use facts::{FactsExtractor, FileFacts};
pub use filter::{RelevanceFilter, RESERVED_DIR};
pub use index::{DirIndex, IndexOptions};
pub use reconcile::ReconcileSummary;
pub use store::IndexStore;
pub use watcher::FsChange;
