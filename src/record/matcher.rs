use std::collections::HashSet;
use std::sync::Arc;
use rayon::prelude::*;
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::reader::index_searcher::IndexSearcher;
use crate::record::output::{OutputRecord, WordResult};

/// Standardizes multi-field records against one synonym index per column
pub struct RecordMatcher {
    searchers: Vec<Option<Arc<IndexSearcher>>>,  // Fixed size, one slot per column
    parallel: bool,
}

impl RecordMatcher {
    pub fn new(record_size: usize) -> Self {
        Self::with_config(record_size, &Config::default())
    }

    pub fn with_config(record_size: usize, config: &Config) -> Self {
        RecordMatcher {
            searchers: vec![None; record_size],
            parallel: config.parallel_field_search,
        }
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn record_size(&self) -> usize {
        self.searchers.len()
    }

    /// Binds `searcher` to `column`, replacing any previous binding.
    pub fn add_searcher(&mut self, searcher: Arc<IndexSearcher>, column: usize) -> Result<()> {
        let size = self.searchers.len();
        let slot = self.searchers.get_mut(column).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("column {} out of range for records of {} fields", column, size),
            )
        })?;
        *slot = Some(searcher);
        Ok(())
    }

    pub fn searcher(&self, column: usize) -> Option<&Arc<IndexSearcher>> {
        self.searchers.get(column).and_then(Option::as_ref)
    }

    /// Hits of every field, in column order. The field queries are
    /// independent; all of them finish before any error is reported, and the
    /// first failing column wins.
    pub fn candidates<S>(&self, record: &[S]) -> Result<Vec<Vec<WordResult>>>
    where
        S: AsRef<str> + Sync,
    {
        let searchers = self.bound_searchers(record.len())?;

        let query_field = |(column, (searcher, value)): (usize, (&Arc<IndexSearcher>, &S))| {
            field_candidates(searcher, value.as_ref())
                .map_err(|e| e.with_prefix(format!("field {}", column)))
        };

        let results: Vec<Result<Vec<WordResult>>> = if self.parallel {
            searchers.par_iter()
                .zip(record.par_iter())
                .enumerate()
                .map(|(column, (searcher, value))| query_field((column, (*searcher, value))))
                .collect()
        } else {
            searchers.iter()
                .zip(record.iter())
                .enumerate()
                .map(|(column, (searcher, value))| query_field((column, (*searcher, value))))
                .collect()
        };

        results.into_iter().collect()
    }

    /// Number of records the enumeration produces before deduplication.
    pub fn combination_count(candidates: &[Vec<WordResult>]) -> usize {
        if candidates.is_empty() {
            return 0;
        }
        candidates.iter()
            .map(Vec::len)
            .fold(1usize, |acc, n| acc.saturating_mul(n))
    }

    /// At most `max_results` standardized records for `record`, best first.
    ///
    /// Record `i` takes candidate `i mod n_j` for column `j`. The pattern
    /// repeats every lcm(n_j) records, so enumeration stops there; the
    /// deduplicated set is the same as over the full product.
    pub fn search<S>(&self, max_results: usize, record: &[S]) -> Result<Vec<OutputRecord>>
    where
        S: AsRef<str> + Sync,
    {
        let candidates = self.candidates(record)?;
        let total = Self::combination_count(&candidates);
        if total == 0 || max_results == 0 {
            debug!(fields = record.len(), total, "no combination to rank");
            return Ok(Vec::new());
        }

        let steps = total.min(period(&candidates));
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(steps);
        let mut records = Vec::with_capacity(steps);

        for i in 0..steps {
            let mut fields = Vec::with_capacity(candidates.len());
            let mut scores = Vec::with_capacity(candidates.len());
            for field in &candidates {
                let chosen = &field[i % field.len()];
                fields.push(chosen.word.clone());
                scores.push(chosen.score);
            }

            if seen.insert(fields.clone()) {
                records.push(OutputRecord::new(fields, scores));
            }
        }

        // Stable: equal scores keep enumeration order
        records.sort_by(OutputRecord::cmp_by_score);
        records.truncate(max_results);

        debug!(total, steps, returned = records.len(), "record search");
        Ok(records)
    }

    fn bound_searchers(&self, record_len: usize) -> Result<Vec<&Arc<IndexSearcher>>> {
        if record_len != self.searchers.len() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("record has {} fields, expected {}", record_len, self.searchers.len()),
            ));
        }

        self.searchers.iter()
            .enumerate()
            .map(|(column, slot)| {
                slot.as_ref().ok_or_else(|| {
                    Error::new(ErrorKind::UnboundFieldIndex, format!("no searcher bound to column {}", column))
                })
            })
            .collect()
    }
}

fn field_candidates(searcher: &IndexSearcher, value: &str) -> Result<Vec<WordResult>> {
    let results = searcher.search_document_by_synonym(value)?;
    Ok(results.hits.iter()
        .filter_map(|hit| {
            searcher.get_word_by_doc_id(hit.doc_id).map(|word| WordResult {
                input: value.to_string(),
                word: word.to_string(),
                score: hit.score,
            })
        })
        .collect())
}

/// lcm of the candidate counts; saturates instead of overflowing.
fn period(candidates: &[Vec<WordResult>]) -> usize {
    candidates.iter()
        .map(Vec::len)
        .filter(|n| *n > 0)
        .fold(1usize, |acc, n| {
            let gcd = gcd(acc, n);
            (acc / gcd).saturating_mul(n)
        })
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
