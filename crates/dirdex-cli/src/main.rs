//! Dirdex CLI
//!
//! Opens a metadata index on a directory, prints what reconciliation did,
//! and follows live changes until interrupted.

use anyhow::Result;
use clap::Parser;
use dirdex_core::codec::{Codec, JsonCodec, MsgpackCodec};
use dirdex_core::facts::{FactsExtractor, FileFacts};
use dirdex_core::index::{DirIndex, IndexOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dirdex", about = "Watch a directory and maintain a metadata index")]
struct Args {
    /// Directory to index and watch
    directory: PathBuf,

    /// File extension to index, without leading dot
    #[arg(long, default_value = "txt")]
    ext: String,

    /// Persist records as MessagePack instead of JSON
    #[arg(long)]
    msgpack: bool,

    /// Print the index as JSON and exit instead of watching
    #[arg(long)]
    dump: bool,
}

/// Run the watcher
async fn run(args: Args) -> Result<()> {
    let codec: Arc<dyn Codec<FileFacts>> = if args.msgpack {
        Arc::new(MsgpackCodec)
    } else {
        Arc::new(JsonCodec)
    };

    let index = DirIndex::open_with(
        &args.directory,
        &args.ext,
        FactsExtractor,
        codec,
        IndexOptions::default(),
    )
    .await?;

    let summary = index.reconcile_summary();
    tracing::info!(
        entries = index.len(),
        loaded = summary.loaded,
        extracted = summary.extracted,
        removed = summary.removed,
        duration_ms = summary.duration_ms,
        "Index ready"
    );

    if args.dump {
        let mut keys = index.keys();
        keys.sort();
        let dump: Vec<_> = keys
            .iter()
            .filter_map(|k| index.get(k).map(|v| serde_json::json!({ "file": k, "facts": v })))
            .collect();
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    tracing::info!(path = ?index.dir(), "Watching; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    index.close();

    let mut keys = index.keys();
    keys.sort();
    tracing::info!(entries = keys.len(), "Stopped");
    for key in keys {
        println!("{key}");
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting dirdex v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(Args::parse()))
}
