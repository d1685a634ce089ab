use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, SynonymDocument};
use crate::mmap::mmap_file::MmapFile;
use crate::storage::layout::StorageLayout;
use crate::storage::wal::{Operation, WAL};

const MAGIC: [u8; 4] = *b"SYNX";
const MAX_RECOVERY_ATTEMPTS: usize = 8;

/// Fixed-size header in front of the compressed payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub magic: [u8; 4],
    pub format: u32,
    pub wal_generation: u64,
    pub checksum: u32,      // CRC32 of the compressed payload
    pub payload_len: u64,
}

impl CheckpointHeader {
    pub const FORMAT: u32 = 1;
    pub const SIZE: usize = 28;

    fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::new(ErrorKind::Corrupted, "not a checkpoint file".to_string()));
        }
        if self.format != Self::FORMAT {
            return Err(Error::new(
                ErrorKind::Corrupted,
                format!("unsupported checkpoint format {}", self.format),
            ));
        }
        Ok(())
    }
}

/// Full document table at the moment the WAL generation `wal_generation` began.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub wal_generation: u64,
    pub version: u64,
    pub next_doc_id: u32,
    pub documents: Vec<(DocId, SynonymDocument)>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn empty(wal_generation: u64) -> Self {
        Checkpoint {
            wal_generation,
            version: 0,
            next_doc_id: 0,
            documents: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Load checkpoint from disk
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.checkpoint_path();
        let mapped = match MmapFile::open_read_only(&path) {
            Ok(mapped) => mapped,
            Err(e) if e.kind == ErrorKind::Io && !path.exists() => return Ok(None),
            Err(e) => return Err(e),
        };

        let data = mapped.data();
        if data.len() < CheckpointHeader::SIZE {
            return Err(Error::new(ErrorKind::Corrupted, "truncated checkpoint header".to_string()));
        }

        let header: CheckpointHeader = bincode::deserialize(&data[..CheckpointHeader::SIZE])?;
        header.validate()?;

        let payload = &data[CheckpointHeader::SIZE..];
        if payload.len() as u64 != header.payload_len || crc32fast::hash(payload) != header.checksum {
            return Err(Error::new(ErrorKind::Corrupted, "checkpoint checksum mismatch".to_string()));
        }

        let raw = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| Error::new(ErrorKind::Corrupted, format!("checkpoint payload: {}", e)))?;
        let checkpoint: Checkpoint = bincode::deserialize(&raw)?;

        Ok(Some(checkpoint))
    }

    /// Generation recorded in the current checkpoint, reading the header only.
    pub fn read_generation(storage: &StorageLayout) -> Result<Option<u64>> {
        let mut file = match File::open(storage.checkpoint_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut header_buf = [0u8; CheckpointHeader::SIZE];
        file.read_exact(&mut header_buf)?;
        let header: CheckpointHeader = bincode::deserialize(&header_buf)?;
        header.validate()?;

        Ok(Some(header.wal_generation))
    }

    /// Save checkpoint to disk; the rename is the commit point.
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let raw = bincode::serialize(self)?;
        let payload = lz4_flex::compress_prepend_size(&raw);

        let header = CheckpointHeader {
            magic: MAGIC,
            format: CheckpointHeader::FORMAT,
            wal_generation: self.wal_generation,
            checksum: crc32fast::hash(&payload),
            payload_len: payload.len() as u64,
        };

        let tmp_path = storage.checkpoint_tmp_path();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bincode::serialize(&header)?)?;
        file.write_all(&payload)?;
        file.sync_all()?;

        fs::rename(&tmp_path, storage.checkpoint_path())?;
        debug!(
            generation = self.wal_generation,
            documents = self.documents.len(),
            "checkpoint saved"
        );
        Ok(())
    }
}

/// Committed state of a directory: checkpoint plus the WAL entries after it.
#[derive(Debug)]
pub struct Recovered {
    pub checkpoint: Checkpoint,
    pub operations: Vec<Operation>,
    pub wal_valid_len: u64,
    pub next_sequence: u64,
    pub last_write: DateTime<Utc>,  // newest WAL entry, else the checkpoint
}

pub struct RecoveryManager;

impl RecoveryManager {
    /// Reads checkpoint and WAL as one consistent state. A writer folding the
    /// log concurrently moves the generation forward; the read is retried then.
    pub fn recover(storage: &StorageLayout) -> Result<Recovered> {
        for _ in 0..MAX_RECOVERY_ATTEMPTS {
            let checkpoint = Checkpoint::load(storage)?.ok_or_else(|| {
                Error::unavailable(format!("no index found at {}", storage.base_dir.display()))
            })?;
            let generation = checkpoint.wal_generation;

            let wal = WAL::read_log(&storage.wal_path(generation))?;

            if Checkpoint::read_generation(storage)? != Some(generation) {
                debug!(generation, "checkpoint moved during recovery, retrying");
                continue;
            }

            let next_sequence = wal.entries.last().map(|e| e.sequence + 1).unwrap_or(0);
            let last_write = wal.entries.last().map(|e| e.timestamp).unwrap_or(checkpoint.timestamp);
            return Ok(Recovered {
                checkpoint,
                operations: wal.entries.into_iter().map(|e| e.operation).collect(),
                wal_valid_len: wal.valid_len,
                next_sequence,
                last_write,
            });
        }

        Err(Error::unavailable(format!(
            "index at {} kept changing during recovery",
            storage.base_dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::SyncMode;

    fn layout() -> (tempfile::TempDir, StorageLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        (dir, layout)
    }

    #[test]
    fn test_header_size_matches_encoding() {
        let header = CheckpointHeader {
            magic: MAGIC,
            format: CheckpointHeader::FORMAT,
            wal_generation: 7,
            checksum: 1,
            payload_len: 2,
        };
        assert_eq!(bincode::serialize(&header).unwrap().len(), CheckpointHeader::SIZE);
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, layout) = layout();
        assert!(Checkpoint::load(&layout).unwrap().is_none());

        let mut checkpoint = Checkpoint::empty(3);
        checkpoint.next_doc_id = 2;
        checkpoint.version = 5;
        checkpoint.documents.push((DocId(1), SynonymDocument::new("IBM", vec!["Big Blue".to_string()])));
        checkpoint.save(&layout).unwrap();

        let loaded = Checkpoint::load(&layout).unwrap().unwrap();
        assert_eq!(loaded.wal_generation, 3);
        assert_eq!(loaded.version, 5);
        assert_eq!(loaded.documents, checkpoint.documents);
        assert_eq!(Checkpoint::read_generation(&layout).unwrap(), Some(3));
    }

    #[test]
    fn test_corruption_detected() {
        let (_dir, layout) = layout();
        Checkpoint::empty(0).save(&layout).unwrap();

        let path = layout.checkpoint_path();
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = Checkpoint::load(&layout).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupted);
        assert!(err.is_io());
    }

    #[test]
    fn test_recover_replays_wal() {
        let (_dir, layout) = layout();
        assert_eq!(RecoveryManager::recover(&layout).unwrap_err().kind, ErrorKind::IndexUnavailable);

        let checkpoint = Checkpoint::empty(0);
        checkpoint.save(&layout).unwrap();
        assert_eq!(RecoveryManager::recover(&layout).unwrap().last_write, checkpoint.timestamp);

        let mut wal = WAL::create(&layout, 0, SyncMode::None).unwrap();
        wal.append(&Operation::Clear).unwrap();
        wal.append(&Operation::Delete { doc_ids: vec![DocId(4)] }).unwrap();

        let recovered = RecoveryManager::recover(&layout).unwrap();
        assert_eq!(recovered.operations.len(), 2);
        assert_eq!(recovered.next_sequence, 2);
        assert_eq!(recovered.wal_valid_len, wal.position);
        assert!(recovered.last_write >= checkpoint.timestamp);
    }
}
