//! # corpus-bundler
//!
//! Streaming voice-corpus exporter. Reads clip metadata rows from a tabular
//! source, writes one sanitized TSV row per record in source order, and
//! concurrently downloads each row's audio clip from remote object storage
//! under watermark-based backpressure, accumulating per-locale statistics as
//! rows arrive. Completion happens exactly once: when the source is exhausted
//! and no downloads remain in flight.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - no CLI or terminal output, purely a Rust crate
//! - **Event-driven** - progress is published on a broadcast channel,
//!   rendering belongs to subscribers
//! - **Idempotent re-runs** - clips already on disk are never re-fetched
//!
//! ## Quick Start
//!
//! ```no_run
//! use corpus_bundler::{Config, ExportPipeline, HttpClipStorage, MySqlClipSource};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::load(std::path::Path::new("config.json"))?);
//!
//!     let storage = Arc::new(HttpClipStorage::new(&config.clip_bucket.base_url)?);
//!     let source = MySqlClipSource::connect(&config.source).await?;
//!
//!     let pipeline = ExportPipeline::new(config.clone(), storage);
//!
//!     // Subscribe to progress events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("event: {:?}", event);
//!         }
//!     });
//!
//!     let tsv = std::fs::File::create(config.export.local_out_dir.join("clips.tsv"))?;
//!     let report = pipeline.run(source, tsv).await?;
//!     println!("{} rows, {} clips", report.rows_read, report.clips_downloaded);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Locale archive bundling and upload
pub mod bundler;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Download admission control (watermark backpressure)
pub mod flow;
/// The export pipeline coordinator
pub mod pipeline;
/// Clip persistence (existing-asset check, single download task)
pub mod saver;
/// Record serialization to the TSV sink
pub mod serializer;
/// Record source (ordered clip metadata stream)
pub mod source;
/// Per-locale statistics accumulation
pub mod stats;
/// Remote object storage port
pub mod storage;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use bundler::{BundleInfo, bundle_and_upload};
pub use config::{BucketConfig, Config, ExportConfig, SourceConfig};
pub use error::{Error, Result};
pub use flow::{FlowControl, FlowState, FlowTransition};
pub use pipeline::ExportPipeline;
pub use saver::{clip_exists, save_clip};
pub use serializer::{RecordSerializer, hash_client_id};
pub use source::{ClipSource, MySqlClipSource};
pub use stats::StatsAccumulator;
pub use storage::{ByteStream, ClipStorage, HttpClipStorage};
pub use types::{Event, ExportReport, LocaleReport, OutputRecord, Record, canonical_clip_name};
