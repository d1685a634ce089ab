use std::sync::Arc;
use tracing::{debug, info};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::query::cache::{CacheStats, QueryCache, QueryKey};
use crate::query::parser::QueryParser;
use crate::reader::snapshot_reader::SnapshotReader;
use crate::scoring::scorer::{Scorer, scorer_for};
use crate::search::results::SearchResults;
use crate::storage::location::StorageLocation;

/// Read-only view over a committed index with a bounded hit list.
///
/// Safe to share between threads; reopen to observe later writes.
pub struct IndexSearcher {
    location: StorageLocation,
    snapshot: SnapshotReader,
    parser: QueryParser,
    scorer: Box<dyn Scorer>,
    cache: QueryCache,
    top_doc_limit: usize,
}

impl IndexSearcher {
    pub fn open(location: StorageLocation) -> Result<Self> {
        Self::open_with_config(location, &Config::default())
    }

    pub fn open_with_config(location: StorageLocation, config: &Config) -> Result<Self> {
        let snapshot = SnapshotReader::open(&location)?;
        let parser = QueryParser::new(snapshot.table.analyzer().clone())
            .with_default_operator(config.default_operator);

        info!(location = %location, docs = snapshot.table.len(), "opened index searcher");

        Ok(IndexSearcher {
            location,
            snapshot,
            parser,
            scorer: scorer_for(config.scorer),
            cache: QueryCache::new(config.query_cache_size),
            top_doc_limit: config.top_doc_limit,
        })
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Best `top_doc_limit` documents whose synonyms match `text`.
    pub fn search_document_by_synonym(&self, text: &str) -> Result<Arc<SearchResults>> {
        let key = QueryKey::new(text, self.top_doc_limit);
        if let Some(results) = self.cache.get(&key) {
            return Ok(results);
        }

        let query = self.parser.parse(text)?;
        let results = Arc::new(self.snapshot.search(&query, self.scorer.as_ref(), self.top_doc_limit));
        debug!(query = text, hits = results.len(), total = results.total_hits, "synonym search");

        self.cache.put(key, results.clone());
        Ok(results)
    }

    pub fn search_document_by_word(&self, word: &str) -> Vec<DocId> {
        self.snapshot.table.docs_for_word(word).to_vec()
    }

    /// Canonical word of a hit.
    pub fn get_word_by_doc_id(&self, doc_id: DocId) -> Option<&str> {
        self.snapshot.table.document(doc_id).map(|doc| doc.word.as_str())
    }

    pub fn synonyms_by_doc_id(&self, doc_id: DocId) -> Option<&[String]> {
        self.snapshot.table.document(doc_id).map(|doc| doc.synonyms.as_slice())
    }

    pub fn num_docs(&self) -> usize {
        self.snapshot.table.len()
    }

    pub fn top_doc_limit(&self) -> usize {
        self.top_doc_limit
    }

    pub fn set_top_doc_limit(&mut self, limit: usize) {
        if limit != self.top_doc_limit {
            self.top_doc_limit = limit;
            self.cache.clear();
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Mutation count of the index when the snapshot was taken.
    pub fn version(&self) -> u64 {
        self.snapshot.table.version()
    }

    pub fn close(self) {
        debug!(location = %self.location, "closed index searcher");
    }
}
