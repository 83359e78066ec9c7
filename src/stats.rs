//! Per-locale statistics accumulation
//!
//! Statistics are updated synchronously as each record arrives, never deferred
//! until the associated download resolves -- records whose clips already exist
//! locally trigger no download at all, yet still count.

use std::collections::{BTreeMap, HashSet};

use crate::types::{LocaleReport, Record};

struct LocaleStats {
    clips: u64,
    users: HashSet<String>,
    splits: BTreeMap<String, BTreeMap<String, u64>>,
}

impl LocaleStats {
    fn new(columns: &[String]) -> Self {
        Self {
            clips: 0,
            users: HashSet::new(),
            splits: columns
                .iter()
                .map(|c| (c.clone(), BTreeMap::new()))
                .collect(),
        }
    }
}

/// Running per-locale statistics for one export run.
///
/// Entries are created lazily on the first record of a locale and never
/// removed. [`finalize`](StatsAccumulator::finalize) turns occurrence counts
/// into fractions of the locale's clip count and the submitter set into its
/// cardinality.
pub struct StatsAccumulator {
    columns: Vec<String>,
    locales: BTreeMap<String, LocaleStats>,
}

impl StatsAccumulator {
    /// Create an accumulator tracking the given categorical columns.
    #[must_use]
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            locales: BTreeMap::new(),
        }
    }

    /// Fold one record into the running statistics.
    pub fn record(&mut self, record: &Record) {
        let stats = self
            .locales
            .entry(record.locale.clone())
            .or_insert_with(|| LocaleStats::new(&self.columns));

        stats.clips += 1;
        stats.users.insert(record.client_id.clone());

        for column in &self.columns {
            // Missing and empty values both count under the empty bucket.
            let value = record
                .demographics
                .get(column)
                .cloned()
                .unwrap_or_default();
            if let Some(counts) = stats.splits.get_mut(column) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
    }

    /// Number of distinct locales seen so far.
    pub fn locale_count(&self) -> usize {
        self.locales.len()
    }

    /// Finalize: occurrence counts become fractions of the locale's clip
    /// count (rounded to 2 decimal places), submitter sets become their size.
    #[must_use]
    pub fn finalize(self) -> BTreeMap<String, LocaleReport> {
        self.locales
            .into_iter()
            .map(|(locale, stats)| {
                let clips = stats.clips;
                let splits = stats
                    .splits
                    .into_iter()
                    .map(|(column, counts)| {
                        let fractions = counts
                            .into_iter()
                            .map(|(value, count)| {
                                (value, round2(count as f64 / clips as f64))
                            })
                            .collect();
                        (column, fractions)
                    })
                    .collect();
                (
                    locale,
                    LocaleReport {
                        clips,
                        users: stats.users.len() as u64,
                        splits,
                    },
                )
            })
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
