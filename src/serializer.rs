//! Record serialization to the TSV sink
//!
//! Rows are written at record-arrival time, strictly in source order --
//! serialization is fully decoupled from clip downloads. Transform rules:
//! carriage returns in the sentence become spaces, the submitter identifier
//! is replaced by its sha512 hash unless hashing is disabled, and the clip
//! path is rewritten to the canonical local filename.

use sha2::{Digest, Sha512};
use std::io::Write;

use crate::error::Result;
use crate::types::{OutputRecord, Record, canonical_clip_name};

/// Writes sanitized [`OutputRecord`]s to a tab-delimited sink with a header
/// row. Fields are quoted minimally.
pub struct RecordSerializer<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
    skip_hashing: bool,
}

impl<W: Write> RecordSerializer<W> {
    /// Create a serializer over `sink`, writing the header row immediately.
    ///
    /// `columns` are the categorical columns appended after the named fields;
    /// their order is fixed here so every row lines up with the header.
    pub fn new(sink: W, columns: &[String], skip_hashing: bool) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(sink);

        let mut header: Vec<&str> = vec!["id", "client_id", "path", "sentence", "locale"];
        header.extend(columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        Ok(Self {
            writer,
            columns: columns.to_vec(),
            skip_hashing,
        })
    }

    /// Transform one record and append it to the sink.
    ///
    /// Returns the written [`OutputRecord`] so the caller can reuse the
    /// canonical filename for the local clip path.
    pub fn write(&mut self, record: &Record) -> Result<OutputRecord> {
        let client_id = if self.skip_hashing {
            record.client_id.clone()
        } else {
            hash_client_id(&record.client_id)
        };

        let output = OutputRecord {
            id: record.id,
            client_id,
            path: canonical_clip_name(&record.locale, record.id, &record.path),
            sentence: sanitize_sentence(&record.sentence),
            locale: record.locale.clone(),
            demographics: self
                .columns
                .iter()
                .map(|c| {
                    (
                        c.clone(),
                        record.demographics.get(c).cloned().unwrap_or_default(),
                    )
                })
                .collect(),
        };

        let id = output.id.to_string();
        let mut row: Vec<&str> = vec![
            &id,
            &output.client_id,
            &output.path,
            &output.sentence,
            &output.locale,
        ];
        for column in &self.columns {
            row.push(output.demographics.get(column).map_or("", String::as_str));
        }
        self.writer.write_record(&row)?;

        Ok(output)
    }

    /// Flush the sink and finish the stream.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One-way hash of a submitter identifier (sha512, lowercase hex).
pub fn hash_client_id(client_id: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(client_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Replace line-internal carriage returns with single spaces.
pub fn sanitize_sentence(sentence: &str) -> String {
    sentence.replace('\r', " ")
}
