//! Core types and events for corpus-bundler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One clip's metadata, as read from the tabular record source.
///
/// Ownership transfers fully to the pipeline when the record is read; the
/// record is never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique clip identifier
    pub id: u64,
    /// Locale the clip belongs to (the statistics group key)
    pub locale: String,
    /// Submitter identifier (hashed on output unless hashing is disabled)
    pub client_id: String,
    /// The spoken sentence
    pub sentence: String,
    /// Remote object key of the audio clip
    pub path: String,
    /// Categorical column values (accent, age, gender, ...) keyed by column name
    pub demographics: BTreeMap<String, String>,
}

/// The sanitized form of a [`Record`] as written to the TSV sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    /// Unique clip identifier (unchanged)
    pub id: u64,
    /// Submitter identifier, sha512-hashed unless hashing is disabled
    pub client_id: String,
    /// Canonical local clip filename (see [`canonical_clip_name`])
    pub path: String,
    /// Sentence with carriage returns replaced by spaces
    pub sentence: String,
    /// Locale (unchanged)
    pub locale: String,
    /// Categorical column values, in configured column order
    pub demographics: BTreeMap<String, String>,
}

/// Canonical local filename for a clip: `common_voice_<locale>_<id>.<ext>`.
///
/// The extension is carried over from the remote key (`mp3` when the key has
/// none). Deterministic, and collision-free for distinct (locale, id) pairs.
pub fn canonical_clip_name(locale: &str, id: u64, remote_key: &str) -> String {
    let ext = std::path::Path::new(remote_key)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3");
    format!("common_voice_{locale}_{id}.{ext}")
}

/// Finalized statistics for one locale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocaleReport {
    /// Number of clips read for this locale
    pub clips: u64,
    /// Number of distinct submitters for this locale
    pub users: u64,
    /// Per categorical column: observed value -> fraction of clips (2 decimal places)
    pub splits: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Final result of an export run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportReport {
    /// Total records read from the source
    pub rows_read: u64,
    /// Clips newly downloaded during this run (existing clips are skipped)
    pub clips_downloaded: u64,
    /// Finalized per-locale statistics
    pub locales: BTreeMap<String, LocaleReport>,
}

/// Events emitted by the pipeline on its broadcast channel.
///
/// Consumers subscribe via [`ExportPipeline::subscribe`](crate::ExportPipeline::subscribe);
/// progress rendering is a subscriber concern, the pipeline never touches a
/// terminal itself.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Periodic progress update (one per record read, one per clip saved)
    Progress {
        /// Records read so far
        rows_read: u64,
        /// Clips newly downloaded so far
        clips_downloaded: u64,
    },

    /// The record source was paused (in-flight downloads exceeded the high watermark)
    SourcePaused {
        /// In-flight download count at the moment of pausing
        in_flight: usize,
    },

    /// The record source was resumed (in-flight downloads dropped below the low watermark)
    SourceResumed {
        /// In-flight download count at the moment of resuming
        in_flight: usize,
    },

    /// One clip was downloaded and persisted locally
    ClipSaved {
        /// Clip identifier
        id: u64,
        /// Bytes written
        bytes: u64,
    },

    /// One clip download failed; the clip was skipped, the run continues
    DownloadFailed {
        /// Clip identifier
        id: u64,
        /// Remote object key
        key: String,
        /// Error description
        error: String,
    },

    /// A locale bundle was uploaded to the out bucket
    BundleUploaded {
        /// Locale the bundle covers
        locale: String,
        /// Uploaded archive size in bytes
        bytes: u64,
    },

    /// The export run completed
    Complete {
        /// Total records read
        rows_read: u64,
        /// Total clips newly downloaded
        clips_downloaded: u64,
    },
}
