use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::index::synonym_table::SynonymTable;

/// Where an index lives
#[derive(Debug, Clone)]
pub enum StorageLocation {
    Directory(PathBuf),
    Memory(MemoryArena),
}

impl StorageLocation {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        StorageLocation::Directory(path.into())
    }

    /// A fresh, empty in-memory arena.
    pub fn memory() -> Self {
        StorageLocation::Memory(MemoryArena::new())
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Directory(path) => write!(f, "{}", path.display()),
            StorageLocation::Memory(arena) => write!(f, "memory:{:p}", Arc::as_ptr(&arena.inner)),
        }
    }
}

/// In-process index storage. Clones are handles to the same arena.
///
/// The committed table is shared between the writer and searchers: the writer
/// applies each mutation under the write lock, searchers copy the table under
/// the read lock when they open.
#[derive(Clone)]
pub struct MemoryArena {
    inner: Arc<ArenaState>,
}

struct ArenaState {
    table: Arc<RwLock<SynonymTable>>,
    initialized: AtomicBool,
    writer_held: AtomicBool,
}

impl MemoryArena {
    pub fn new() -> Self {
        MemoryArena {
            inner: Arc::new(ArenaState {
                table: Arc::new(RwLock::new(SynonymTable::new(Arc::new(Analyzer::synonym())))),
                initialized: AtomicBool::new(false),
                writer_held: AtomicBool::new(false),
            }),
        }
    }

    /// True once a writer has opened the arena.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_initialized(&self) {
        self.inner.initialized.store(true, Ordering::Release);
    }

    pub(crate) fn table(&self) -> Arc<RwLock<SynonymTable>> {
        self.inner.table.clone()
    }

    /// Exclusive write access; fails fast when another writer holds it.
    pub fn try_acquire_writer(&self) -> Result<ArenaLease> {
        self.inner.writer_held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::unavailable("in-memory index is locked by another writer"))?;

        Ok(ArenaLease { inner: self.inner.clone() })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.writer_held.load(Ordering::Acquire)
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryArena")
            .field("initialized", &self.is_initialized())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Writer lease on a [`MemoryArena`], released on drop.
pub struct ArenaLease {
    inner: Arc<ArenaState>,
}

impl Drop for ArenaLease {
    fn drop(&mut self) {
        self.inner.writer_held.store(false, Ordering::Release);
    }
}
