use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::core::error::Result;
use crate::query::parser::BooleanOperator;
use crate::storage::wal::SyncMode;

/// Relevance model used by searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScorerKind {
    Bm25,
    TfIdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Writer
    pub synonym_separator: Option<char>,  // No implicit default
    pub sync_mode: SyncMode,
    pub checkpoint_interval: usize,       // WAL entries before folding

    // Searcher
    pub top_doc_limit: usize,
    pub query_cache_size: usize,          // 0 disables the cache
    pub scorer: ScorerKind,
    pub default_operator: BooleanOperator,

    // Record matching
    pub parallel_field_search: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            synonym_separator: None,
            sync_mode: SyncMode::Batch,
            checkpoint_interval: 10_000,

            top_doc_limit: 10,
            query_cache_size: 256,
            scorer: ScorerKind::Bm25,
            default_operator: BooleanOperator::Or,

            parallel_field_search: true,
        }
    }
}

impl Config {
    pub fn with_separator(separator: char) -> Self {
        Config {
            synonym_separator: Some(separator),
            ..Config::default()
        }
    }

    /// Missing keys fall back to their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}
