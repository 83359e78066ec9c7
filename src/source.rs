//! Record source -- the ordered stream of clip metadata rows
//!
//! The pipeline pulls records through the [`ClipSource`] trait; pausing is a
//! consumer-side concern (the pipeline simply stops pulling while the
//! admission controller is paused). [`MySqlClipSource`] streams query rows on
//! a detached task into a small bounded channel, so a source that keeps
//! producing after a pause request can buffer at most the channel capacity
//! before it blocks -- the guard against a source that ignores pause requests.

use futures::StreamExt;
use sqlx::Row;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::types::Record;

/// Rows buffered between the streaming task and the pipeline.
const ROW_BUFFER: usize = 16;

/// Abstraction over the ordered record stream, enabling testability.
///
/// `Ok(None)` signals exhaustion; an `Err` is fatal to the run (a failed
/// query must not silently continue with partial statistics).
#[async_trait::async_trait]
pub trait ClipSource: Send {
    /// Pull the next record from the source.
    async fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Production [`ClipSource`] streaming rows from a MySQL export query.
pub struct MySqlClipSource {
    rx: mpsc::Receiver<Result<Record>>,
}

impl MySqlClipSource {
    /// Connect to the database and start streaming the export query.
    ///
    /// The query text is read from `config.query_file`. Row order is
    /// preserved end to end: the single streaming task forwards rows into
    /// the channel in query order.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let query = tokio::fs::read_to_string(&config.query_file)
            .await
            .map_err(|e| Error::Config {
                message: format!(
                    "failed to read query file '{}': {}",
                    config.query_file.display(),
                    e
                ),
                key: Some("source.query_file".to_string()),
            })?;

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(&config.connect_url())
            .await?;

        let columns = config.categorical_columns.clone();
        let (tx, rx) = mpsc::channel(ROW_BUFFER);

        tokio::spawn(async move {
            let mut rows = sqlx::query(&query).fetch(&pool);
            while let Some(row) = rows.next().await {
                let record = row
                    .map_err(Error::from)
                    .and_then(|r| decode_row(&r, &columns));
                let is_err = record.is_err();
                if tx.send(record).await.is_err() {
                    // Receiver dropped: the run ended, stop streaming.
                    break;
                }
                if is_err {
                    break;
                }
            }
        });

        Ok(Self { rx })
    }
}

#[async_trait::async_trait]
impl ClipSource for MySqlClipSource {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        self.rx.recv().await.transpose()
    }
}

fn decode_row(row: &MySqlRow, columns: &[String]) -> Result<Record> {
    let mut demographics = BTreeMap::new();
    for column in columns {
        let value: Option<String> = row.try_get(column.as_str())?;
        demographics.insert(column.clone(), value.unwrap_or_default());
    }

    Ok(Record {
        id: row.try_get("id")?,
        locale: row.try_get("locale")?,
        client_id: row.try_get("client_id")?,
        sentence: row.try_get("sentence")?,
        path: row.try_get("path")?,
        demographics,
    })
}
