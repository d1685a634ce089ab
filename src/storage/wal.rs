use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Seek, SeekFrom, Write};
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::core::types::{DocId, SynonymDocument};
use crate::storage::layout::StorageLayout;
use crate::core::error::{Error, ErrorKind, Result};

const FRAME_HEADER: usize = 8;       // len u32 + crc u32
const BATCH_SYNC_EVERY: usize = 64;  // appends between fsyncs in Batch mode
const MAX_ENTRY_SIZE: usize = 64 * 1024 * 1024;

/// Write-ahead log of one generation. Every mutation of the index is a single
/// framed entry, so a reader either sees the whole mutation or none of it.
pub struct WAL {
    pub file: File,
    pub generation: u64,
    pub position: u64,
    pub sequence: u64,
    pub sync_mode: SyncMode,
    unsynced: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync periodically
    None,       // Let OS handle it
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WALEntry {
    pub sequence: u64,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

/// Logical mutation, already resolved to document ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert, or overwrite the document stored under `doc_id`
    Put { doc_id: DocId, document: SynonymDocument },
    Delete { doc_ids: Vec<DocId> },
    /// Applied as one unit
    Batch(Vec<Operation>),
    Clear,
}

/// Valid entries of a log file and where they end.
#[derive(Debug, Default)]
pub struct WalContents {
    pub entries: Vec<WALEntry>,
    pub valid_len: u64,
    pub torn_bytes: u64,
}

impl WAL {
    /// Starts an empty generation, truncating any leftover file.
    pub fn create(storage: &StorageLayout, generation: u64, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(storage.wal_path(generation))?;
        file.sync_all()?;

        Ok(WAL {
            file,
            generation,
            position: 0,
            sequence: 0,
            sync_mode,
            unsynced: 0,
        })
    }

    /// Reopens a generation for appending, cutting a torn tail at `valid_len`.
    pub fn open(
        storage: &StorageLayout,
        generation: u64,
        sync_mode: SyncMode,
        valid_len: u64,
        next_sequence: u64,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(storage.wal_path(generation))?;

        if file.metadata()?.len() > valid_len {
            warn!(generation, valid_len, "truncating torn WAL tail");
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok(WAL {
            file,
            generation,
            position: valid_len,
            sequence: next_sequence,
            sync_mode,
            unsynced: 0,
        })
    }

    pub fn append(&mut self, operation: &Operation) -> Result<()> {
        let entry = WALEntry {
            sequence: self.sequence,
            operation: operation.clone(),
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        if data.len() > MAX_ENTRY_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("WAL entry of {} bytes exceeds the {} byte limit", data.len(), MAX_ENTRY_SIZE),
            ));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER + data.len());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        frame.extend_from_slice(&data);

        if let Err(e) = self.file.write_all(&frame) {
            if let Err(cleanup) = self.discard_partial_frame() {
                warn!(generation = self.generation, error = %cleanup, "could not cut partial WAL frame");
            }
            return Err(e.into());
        }

        self.sequence += 1;
        self.position += frame.len() as u64;
        self.unsynced += 1;

        match self.sync_mode {
            SyncMode::Immediate => self.sync()?,
            SyncMode::Batch if self.unsynced >= BATCH_SYNC_EVERY => self.sync()?,
            _ => {}
        }

        Ok(())
    }

    /// Cuts whatever a failed write left past the last complete frame.
    fn discard_partial_frame(&mut self) -> Result<()> {
        self.file.set_len(self.position)?;
        self.file.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Reads every complete entry of a log. A missing file reads as empty; an
    /// incomplete or checksum-failing tail ends the log.
    pub fn read_log(path: &Path) -> Result<WalContents> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(WalContents::default()),
            Err(e) => return Err(e.into()),
        };

        let mut contents = WalContents::default();
        let mut offset = 0usize;

        while offset + FRAME_HEADER <= data.len() {
            let len = u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize;
            let crc = u32::from_le_bytes([data[offset + 4], data[offset + 5], data[offset + 6], data[offset + 7]]);

            if len > MAX_ENTRY_SIZE {
                break;
            }

            let start = offset + FRAME_HEADER;
            let end = start + len;
            if end > data.len() || crc32fast::hash(&data[start..end]) != crc {
                break;
            }

            let entry: WALEntry = bincode::deserialize(&data[start..end]).map_err(|e| {
                Error::new(ErrorKind::Corrupted, format!("WAL entry at {}: {}", offset, e))
            })?;
            contents.entries.push(entry);
            offset = end;
        }

        contents.valid_len = offset as u64;
        contents.torn_bytes = (data.len() - offset) as u64;

        if contents.torn_bytes > 0 {
            warn!(path = %path.display(), torn_bytes = contents.torn_bytes, "ignoring incomplete WAL tail");
        }

        Ok(contents)
    }

    pub fn remove(storage: &StorageLayout, generation: u64) -> Result<()> {
        match fs::remove_file(storage.wal_path(generation)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(id: u32, word: &str) -> Operation {
        Operation::Put {
            doc_id: DocId(id),
            document: SynonymDocument::new(word, vec![word.to_lowercase()]),
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let mut wal = WAL::create(&layout, 0, SyncMode::Immediate).unwrap();
        wal.append(&put(0, "IBM")).unwrap();
        wal.append(&Operation::Delete { doc_ids: vec![DocId(0)] }).unwrap();

        let contents = WAL::read_log(&layout.wal_path(0)).unwrap();
        assert_eq!(contents.entries.len(), 2);
        assert_eq!(contents.entries[0].operation, put(0, "IBM"));
        assert_eq!(contents.entries[1].sequence, 1);
        assert_eq!(contents.valid_len, wal.position);
        assert_eq!(contents.torn_bytes, 0);
    }

    #[test]
    fn test_torn_tail_is_ignored_then_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let mut wal = WAL::create(&layout, 2, SyncMode::None).unwrap();
        wal.append(&put(0, "ANPE")).unwrap();
        let good_len = wal.position;
        wal.append(&put(1, "IAIDQ")).unwrap();
        drop(wal);

        // Chop the last frame in half
        let path = layout.wal_path(2);
        let full = fs::read(&path).unwrap();
        let cut = good_len as usize + (full.len() - good_len as usize) / 2;
        fs::write(&path, &full[..cut]).unwrap();

        let contents = WAL::read_log(&path).unwrap();
        assert_eq!(contents.entries.len(), 1);
        assert_eq!(contents.valid_len, good_len);
        assert!(contents.torn_bytes > 0);

        let mut reopened = WAL::open(&layout, 2, SyncMode::None, contents.valid_len, 1).unwrap();
        reopened.append(&put(1, "IAIDQ")).unwrap();
        let contents = WAL::read_log(&path).unwrap();
        assert_eq!(contents.entries.len(), 2);
        assert_eq!(contents.torn_bytes, 0);
    }

    #[test]
    fn test_oversized_entry_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let mut wal = WAL::create(&layout, 0, SyncMode::None).unwrap();
        wal.append(&put(0, "SMALL")).unwrap();
        let position = wal.position;

        let big = Operation::Put {
            doc_id: DocId(1),
            document: SynonymDocument::new("BIG", vec!["x".repeat(MAX_ENTRY_SIZE + 1)]),
        };
        let err = wal.append(&big).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(wal.position, position);

        wal.append(&put(1, "AFTER")).unwrap();
        let contents = WAL::read_log(&layout.wal_path(0)).unwrap();
        assert_eq!(contents.entries.len(), 2);
        assert_eq!(contents.entries[1].operation, put(1, "AFTER"));
        assert_eq!(contents.entries[1].sequence, 1);
    }

    #[test]
    fn test_partial_frame_is_cut_before_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let mut wal = WAL::create(&layout, 0, SyncMode::None).unwrap();
        wal.append(&put(0, "IBM")).unwrap();

        // What a write failing halfway leaves behind
        wal.file.write_all(&[0x2a, 0, 0, 0, 0xff]).unwrap();
        wal.discard_partial_frame().unwrap();

        wal.append(&put(1, "SNCF")).unwrap();
        let contents = WAL::read_log(&layout.wal_path(0)).unwrap();
        assert_eq!(contents.entries.len(), 2);
        assert_eq!(contents.torn_bytes, 0);
        assert_eq!(contents.valid_len, wal.position);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let contents = WAL::read_log(&dir.path().join("wal_00000009.log")).unwrap();
        assert!(contents.entries.is_empty());
        assert_eq!(contents.valid_len, 0);
    }
}
