//! The export pipeline coordinator
//!
//! Single consumer loop over the record source and download completion
//! events. Per record, in arrival order: statistics update, TSV write,
//! existing-asset check, and (when the clip is missing locally) an admitted
//! download spawned as an independent task. Download completions flow back
//! over an mpsc channel; the loop is their only consumer, so the shared
//! counters mutate in one place.
//!
//! Completion condition: the source is exhausted AND no downloads are in
//! flight. Both events race -- the source can exhaust while downloads are
//! still outstanding, and the last download can finish first -- so the
//! predicate is re-checked on every completion after exhaustion instead of
//! assumed at either trigger point. The loop structure makes resolving twice
//! impossible.


use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::error::Result;
use crate::flow::{FlowControl, FlowTransition};
use crate::saver;
use crate::serializer::RecordSerializer;
use crate::source::ClipSource;
use crate::stats::StatsAccumulator;
use crate::storage::ClipStorage;
use crate::types::{Event, ExportReport};

/// Outcome of one clip download task, delivered over the completion channel.
///
/// Sent on success AND failure -- a failed download must still decrement the
/// in-flight count and re-trigger the completion check, otherwise the run
/// would stall forever waiting on a download that already died.
struct DownloadOutcome {
    id: u64,
    key: String,
    result: Result<u64>,
}

/// The row-streaming extraction pipeline (cloneable - state is Arc-wrapped).
#[derive(Clone)]
pub struct ExportPipeline {
    config: Arc<Config>,
    storage: Arc<dyn ClipStorage>,
    flow: FlowControl,
    event_tx: broadcast::Sender<Event>,
}

impl ExportPipeline {
    /// Create a pipeline over the given storage, with watermarks and output
    /// layout taken from `config`.
    pub fn new(config: Arc<Config>, storage: Arc<dyn ClipStorage>) -> Self {
        let flow = FlowControl::new(
            config.export.pause_watermark,
            config.export.resume_watermark,
        );
        let (event_tx, _rx) = broadcast::channel(1024);
        Self {
            config,
            storage,
            flow,
            event_tx,
        }
    }

    /// Subscribe to pipeline events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. Progress rendering belongs to subscribers, never to
    /// the pipeline itself.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The shared admission controller (exposed for observability).
    pub fn flow(&self) -> &FlowControl {
        &self.flow
    }

    /// Run the extraction: read every record from `source`, write one TSV
    /// row per record to `sink` in source order, download missing clips
    /// concurrently under watermark backpressure, and return the finalized
    /// per-locale statistics.
    pub async fn run<S, W>(&self, mut source: S, sink: W) -> Result<ExportReport>
    where
        S: ClipSource,
        W: Write + Send,
    {
        let columns = &self.config.source.categorical_columns;
        let mut serializer =
            RecordSerializer::new(sink, columns, self.config.export.skip_hashing)?;
        let mut stats = StatsAccumulator::new(columns);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<DownloadOutcome>();
        let mut rows_read = 0u64;
        let mut clips_downloaded = 0u64;

        loop {
            // Fold in any completions that arrived while we were busy.
            while let Ok(outcome) = done_rx.try_recv() {
                self.on_download_done(outcome, &mut clips_downloaded, rows_read);
            }

            // Backpressure: while paused, the only way forward is a
            // completion. In-flight is above the low watermark here, so a
            // completion is guaranteed to arrive.
            while self.flow.is_paused() {
                match done_rx.recv().await {
                    Some(outcome) => {
                        self.on_download_done(outcome, &mut clips_downloaded, rows_read)
                    }
                    None => break,
                }
            }

            let record = match source.next_record().await? {
                Some(record) => record,
                None => break,
            };

            rows_read += 1;
            stats.record(&record);

            // Serialization is synchronous at read time; output order is
            // source order no matter when downloads finish.
            let output = serializer.write(&record)?;
            self.emit(Event::Progress {
                rows_read,
                clips_downloaded,
            });

            let dest = self.clip_path(&record.locale, &output.path);
            if saver::clip_exists(&dest).await {
                continue;
            }

            if let Some(FlowTransition::Paused) = self.flow.admit() {
                let in_flight = self.flow.in_flight();
                tracing::debug!(in_flight, "pausing record source");
                self.emit(Event::SourcePaused { in_flight });
            }

            let storage = Arc::clone(&self.storage);
            let done_tx = done_tx.clone();
            let timeout = self.config.export.download_timeout();
            let (id, key) = (record.id, record.path.clone());
            tokio::spawn(async move {
                let result = saver::save_clip(storage.as_ref(), &key, &dest, timeout).await;
                // The receiver only goes away once the run is over; a send
                // error here means there is nothing left to notify.
                done_tx.send(DownloadOutcome { id, key, result }).ok();
            });
        }

        tracing::debug!(rows_read, "record source exhausted");

        // Source exhausted; drain outstanding downloads. Dropping our sender
        // means recv() returns None once every spawned task has reported.
        drop(done_tx);
        while self.flow.in_flight() > 0 {
            match done_rx.recv().await {
                Some(outcome) => {
                    self.on_download_done(outcome, &mut clips_downloaded, rows_read)
                }
                None => break,
            }
        }

        serializer.finish()?;

        let report = ExportReport {
            rows_read,
            clips_downloaded,
            locales: stats.finalize(),
        };
        tracing::info!(
            rows_read,
            clips_downloaded,
            locales = report.locales.len(),
            "export complete"
        );
        self.emit(Event::Complete {
            rows_read,
            clips_downloaded,
        });
        Ok(report)
    }

    /// Bundle every exported locale directory and upload the archives to
    /// `out_storage`, honoring `export.skip_bundling`.
    ///
    /// Bundle progress surfaces as [`Event::BundleUploaded`] on the same
    /// channel as the run events. Returns an empty list when bundling is
    /// disabled.
    pub async fn bundle(
        &self,
        out_storage: &dyn ClipStorage,
    ) -> Result<Vec<crate::bundler::BundleInfo>> {
        if self.config.export.skip_bundling {
            tracing::info!("bundling disabled, skipping");
            return Ok(Vec::new());
        }
        crate::bundler::bundle_and_upload(
            &self.config.export.local_out_dir,
            &self.config.export.release_name,
            out_storage,
            &self.event_tx,
        )
        .await
    }

    /// Local destination for a clip: `<out_dir>/<locale>/clips/<canonical name>`.
    fn clip_path(&self, locale: &str, canonical_name: &str) -> PathBuf {
        self.config
            .export
            .local_out_dir
            .join(locale)
            .join("clips")
            .join(canonical_name)
    }

    /// Handle one download completion: low-watermark transition, counters,
    /// events. Runs on the coordinator, never on a download task.
    fn on_download_done(
        &self,
        outcome: DownloadOutcome,
        clips_downloaded: &mut u64,
        rows_read: u64,
    ) {
        if let Some(FlowTransition::Resumed) = self.flow.complete() {
            let in_flight = self.flow.in_flight();
            tracing::debug!(in_flight, "resuming record source");
            self.emit(Event::SourceResumed { in_flight });
        }

        match outcome.result {
            Ok(bytes) => {
                *clips_downloaded += 1;
                self.emit(Event::ClipSaved {
                    id: outcome.id,
                    bytes,
                });
                self.emit(Event::Progress {
                    rows_read,
                    clips_downloaded: *clips_downloaded,
                });
            }
            Err(e) => {
                tracing::warn!(
                    clip_id = outcome.id,
                    key = %outcome.key,
                    error = %e,
                    "clip download failed, skipping"
                );
                self.emit(Event::DownloadFailed {
                    id: outcome.id,
                    key: outcome.key,
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: Event) {
        // send() errors when no one is subscribed, which is fine.
        self.event_tx.send(event).ok();
    }
}
