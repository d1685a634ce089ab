use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::index::synonym_table::SynonymTable;
use crate::query::ast::Query;
use crate::scoring::scorer::Scorer;
use crate::search::executor::QueryExecutor;
use crate::search::prefix::PrefixIndex;
use crate::search::results::SearchResults;
use crate::storage::checkpoint::RecoveryManager;
use crate::storage::layout::StorageLayout;
use crate::storage::location::{MemoryArena, StorageLocation};

/// Reader for the committed state of an index at the moment it was opened
pub struct SnapshotReader {
    pub table: SynonymTable,
    pub terms: PrefixIndex,
}

impl SnapshotReader {
    /// Loads the committed state; writes made afterwards are never visible.
    pub fn open(location: &StorageLocation) -> Result<Self> {
        let table = match location {
            StorageLocation::Directory(path) => Self::load_directory(path)?,
            StorageLocation::Memory(arena) => Self::load_arena(arena)?,
        };
        let terms = PrefixIndex::build(table.index())?;

        debug!(location = %location, docs = table.len(), terms = terms.len(), version = table.version(), "snapshot loaded");
        Ok(SnapshotReader { table, terms })
    }

    fn load_directory(path: &Path) -> Result<SynonymTable> {
        let storage = StorageLayout::existing(path.to_path_buf())?;
        let recovered = RecoveryManager::recover(&storage)?;

        let mut table = SynonymTable::from_checkpoint(Arc::new(Analyzer::synonym()), recovered.checkpoint);
        for operation in &recovered.operations {
            table.apply(operation);
        }
        Ok(table)
    }

    fn load_arena(arena: &MemoryArena) -> Result<SynonymTable> {
        if !arena.is_initialized() {
            return Err(Error::unavailable("no index found in memory arena"));
        }
        Ok(arena.table().read().clone())
    }

    pub fn search(&self, query: &Query, scorer: &dyn Scorer, limit: usize) -> SearchResults {
        QueryExecutor::new(self.table.index(), &self.terms, scorer).search(query, limit)
    }
}
