use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, SynonymDocument};
use crate::index::synonym_table::SynonymTable;
use crate::query::parser::QueryParser;
use crate::scoring::scorer::scorer_for;
use crate::search::executor::search_table;
use crate::search::results::SearchResults;
use crate::storage::checkpoint::{Checkpoint, RecoveryManager};
use crate::storage::file_lock::{FileLock, WriterLock};
use crate::storage::layout::StorageLayout;
use crate::storage::location::{MemoryArena, StorageLocation};
use crate::storage::wal::{Operation, WAL};

/// How `TermIndex::open` treats existing contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Create,          // Wipe whatever is there
    Append,          // Location must already hold an index
    CreateOrAppend,
}

// Shared table, durable part, writer lock, WAL entries not yet folded
type Opened = (Arc<RwLock<SynonymTable>>, Option<Durable>, WriterLock, usize);

struct Durable {
    storage: StorageLayout,
    wal: WAL,
}

/// Single writer over one synonym index.
///
/// Every mutation is one WAL entry applied to the in-memory table, so a
/// reader sees either all of it or none of it. The log is folded into the
/// checkpoint on `close()`, on `checkpoint()` and every
/// `checkpoint_interval` entries.
pub struct TermIndex {
    location: StorageLocation,
    table: Arc<RwLock<SynonymTable>>,
    durable: Option<Durable>,      // None for in-memory arenas
    lock: Option<WriterLock>,      // None once closed
    create_mode: bool,
    config: Config,
    entries_since_checkpoint: usize,
}

impl TermIndex {
    pub fn open(location: StorageLocation, mode: OpenMode) -> Result<Self> {
        Self::open_with_config(location, mode, Config::default())
    }

    pub fn open_with_config(location: StorageLocation, mode: OpenMode, config: Config) -> Result<Self> {
        let analyzer = Arc::new(Analyzer::synonym());

        let (table, durable, lock, pending) = match &location {
            StorageLocation::Directory(path) => Self::open_directory(path, mode, &config, analyzer)?,
            StorageLocation::Memory(arena) => Self::open_arena(arena, mode, analyzer)?,
        };

        info!(location = %location, ?mode, docs = table.read().len(), "opened term index");

        Ok(TermIndex {
            location,
            table,
            durable,
            lock: Some(lock),
            create_mode: false,
            config,
            entries_since_checkpoint: pending,
        })
    }

    fn open_directory(
        path: &Path,
        mode: OpenMode,
        config: &Config,
        analyzer: Arc<Analyzer>,
    ) -> Result<Opened> {
        let storage = match mode {
            OpenMode::Append => StorageLayout::existing(path.to_path_buf())?,
            OpenMode::Create | OpenMode::CreateOrAppend => StorageLayout::new(path.to_path_buf())?,
        };
        let lock = FileLock::acquire(&storage)?;

        let fresh = mode == OpenMode::Create
            || (mode == OpenMode::CreateOrAppend && !storage.has_checkpoint());

        if fresh {
            storage.wipe()?;
            Checkpoint::empty(0).save(&storage)?;
            let wal = WAL::create(&storage, 0, config.sync_mode)?;

            let table = SynonymTable::new(analyzer);
            return Ok((Arc::new(RwLock::new(table)), Some(Durable { storage, wal }), WriterLock::File(lock), 0));
        }

        let recovered = RecoveryManager::recover(&storage)?;
        let generation = recovered.checkpoint.wal_generation;
        debug!(
            generation,
            replayed = recovered.operations.len(),
            last_write = %recovered.last_write,
            "recovered term index"
        );

        // Leftovers of a fold that did not finish
        for stale in storage.wal_generations()? {
            if stale != generation {
                warn!(generation = stale, "removing stale WAL generation");
                WAL::remove(&storage, stale)?;
            }
        }

        let mut table = SynonymTable::from_checkpoint(analyzer, recovered.checkpoint);
        for operation in &recovered.operations {
            table.apply(operation);
        }

        let wal = WAL::open(
            &storage,
            generation,
            config.sync_mode,
            recovered.wal_valid_len,
            recovered.next_sequence,
        )?;

        Ok((
            Arc::new(RwLock::new(table)),
            Some(Durable { storage, wal }),
            WriterLock::File(lock),
            recovered.operations.len(),
        ))
    }

    fn open_arena(
        arena: &MemoryArena,
        mode: OpenMode,
        analyzer: Arc<Analyzer>,
    ) -> Result<Opened> {
        let lease = arena.try_acquire_writer()?;
        let table = arena.table();

        match mode {
            OpenMode::Append if !arena.is_initialized() => {
                return Err(Error::unavailable("no index found in memory arena"));
            }
            OpenMode::Create => *table.write() = SynonymTable::new(analyzer),
            _ => {}
        }
        arena.mark_initialized();

        Ok((table, None, WriterLock::Arena(lease), 0))
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.lock.is_none()
    }

    /// Append-only bulk load: inserts skip the existing-word check.
    pub fn set_using_create_mode(&mut self, create_mode: bool) {
        self.create_mode = create_mode;
    }

    pub fn is_using_create_mode(&self) -> bool {
        self.create_mode
    }

    pub fn set_synonym_separator(&mut self, separator: char) {
        self.config.synonym_separator = Some(separator);
    }

    pub fn separator(&self) -> Option<char> {
        self.config.synonym_separator
    }

    /// Stores `word` with the synonyms split on the separator. Outside create
    /// mode an existing document for the word is replaced.
    pub fn insert_document(&mut self, word: &str, synonyms: &str) -> Result<()> {
        self.ensure_open()?;
        let document = self.parse_document(word, synonyms)?;

        let operation = {
            let table = self.table.read();
            if self.create_mode {
                Operation::Put { doc_id: table.next_doc_id(), document }
            } else {
                replace_or_append(&table, document)
            }
        };

        self.commit(operation)
    }

    /// Replaces the synonyms of `word`, inserting it when absent. Returns the
    /// number of documents that existed for the word; an insertion counts 0.
    pub fn update_document(&mut self, word: &str, synonyms: &str) -> Result<usize> {
        self.ensure_open()?;
        let document = self.parse_document(word, synonyms)?;

        let (operation, affected) = {
            let table = self.table.read();
            let affected = table.docs_for_word(word).len();
            (replace_or_append(&table, document), affected)
        };

        self.commit(operation)?;
        Ok(affected)
    }

    pub fn delete_document_by_word(&mut self, word: &str) -> Result<()> {
        self.ensure_open()?;

        let doc_ids = self.table.read().docs_for_word(word).to_vec();
        if doc_ids.is_empty() {
            return Ok(());
        }

        self.commit(Operation::Delete { doc_ids })
    }

    pub fn delete_all_documents(&mut self) -> Result<()> {
        self.ensure_open()?;

        if self.table.read().is_empty() {
            return Ok(());
        }

        self.commit(Operation::Clear)
    }

    /// Appends one synonym; no-op when the word is absent.
    pub fn add_synonym_to_document(&mut self, word: &str, synonym: &str) -> Result<()> {
        self.ensure_open()?;

        let operation = {
            let table = self.table.read();
            let Some(mut document) = first_document(&table, word) else {
                return Ok(());
            };
            document.synonyms.push(synonym.to_string());
            replace_or_append(&table, document)
        };

        self.commit(operation)
    }

    /// Removes one occurrence of `synonym`, compared case-sensitively; no-op
    /// when either the word or the synonym is absent.
    pub fn remove_synonym_from_document(&mut self, word: &str, synonym: &str) -> Result<()> {
        self.ensure_open()?;

        let operation = {
            let table = self.table.read();
            let Some(mut document) = first_document(&table, word) else {
                return Ok(());
            };
            let Some(position) = document.position_of(synonym) else {
                return Ok(());
            };
            document.synonyms.remove(position);
            replace_or_append(&table, document)
        };

        self.commit(operation)
    }

    /// Documents stored under exactly `word`.
    pub fn search_document_by_word(&self, word: &str) -> Vec<DocId> {
        self.table.read().docs_for_word(word).to_vec()
    }

    /// Full-text search over synonyms; every matching document, best first.
    pub fn search_document_by_synonym(&self, text: &str) -> Result<SearchResults> {
        let table = self.table.read();
        let query = QueryParser::new(table.analyzer().clone())
            .with_default_operator(self.config.default_operator)
            .parse(text)?;
        let scorer = scorer_for(self.config.scorer);
        search_table(&table, scorer.as_ref(), &query, table.len())
    }

    pub fn get_synonym_count(&self, word: &str) -> usize {
        let table = self.table.read();
        first_document(&table, word)
            .map(|doc| doc.synonym_count())
            .unwrap_or(0)
    }

    pub fn synonyms(&self, word: &str) -> Option<Vec<String>> {
        first_document(&self.table.read(), word).map(|doc| doc.synonyms)
    }

    pub fn document(&self, doc_id: DocId) -> Option<SynonymDocument> {
        self.table.read().document(doc_id).cloned()
    }

    pub fn num_docs(&self) -> usize {
        self.table.read().len()
    }

    /// Folds the WAL into a new checkpoint. In-memory arenas have nothing to
    /// fold.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.ensure_open()?;
        let Some(durable) = &mut self.durable else {
            return Ok(());
        };

        durable.wal.sync()?;
        let old_generation = durable.wal.generation;
        let generation = old_generation + 1;

        let wal = WAL::create(&durable.storage, generation, self.config.sync_mode)?;
        self.table.read().to_checkpoint(generation).save(&durable.storage)?;
        durable.wal = wal;
        WAL::remove(&durable.storage, old_generation)?;

        debug!(generation, folded = self.entries_since_checkpoint, "checkpoint written");
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    /// Flushes pending writes and releases the writer. Closing twice is fine.
    pub fn close(&mut self) -> Result<()> {
        if self.lock.is_none() {
            return Ok(());
        }

        let result = if self.entries_since_checkpoint > 0 {
            self.checkpoint()
        } else {
            match &mut self.durable {
                Some(durable) => durable.wal.sync(),
                None => Ok(()),
            }
        };

        self.durable = None;
        self.lock = None;
        info!(location = %self.location, "closed term index");
        result
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lock.is_none() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("term index at {} is closed", self.location),
            ));
        }
        Ok(())
    }

    fn parse_document(&self, word: &str, synonyms: &str) -> Result<SynonymDocument> {
        let separator = self.config.synonym_separator.ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, "synonym separator is not set".to_string())
        })?;
        Ok(SynonymDocument::parse(word, synonyms, separator))
    }

    fn commit(&mut self, operation: Operation) -> Result<()> {
        if let Some(durable) = &mut self.durable {
            durable.wal.append(&operation)?;
            self.entries_since_checkpoint += 1;
        }

        self.table.write().apply(&operation);

        if self.durable.is_some() && self.entries_since_checkpoint >= self.config.checkpoint_interval.max(1) {
            self.checkpoint()?;
        }
        Ok(())
    }
}

impl Drop for TermIndex {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(location = %self.location, error = %e, "failed to close term index");
        }
    }
}

fn first_document(table: &SynonymTable, word: &str) -> Option<SynonymDocument> {
    table.docs_for_word(word)
        .first()
        .and_then(|id| table.document(*id))
        .cloned()
}

/// Puts `document` in place of the first document for its word and drops
/// the duplicates a create-mode load may have left.
fn replace_or_append(table: &SynonymTable, document: SynonymDocument) -> Operation {
    match table.docs_for_word(&document.word) {
        [] => Operation::Put { doc_id: table.next_doc_id(), document },
        [first] => Operation::Put { doc_id: *first, document },
        [first, rest @ ..] => Operation::Batch(vec![
            Operation::Delete { doc_ids: rest.to_vec() },
            Operation::Put { doc_id: *first, document },
        ]),
    }
}
