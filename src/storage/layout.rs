use std::path::PathBuf;
use std::fs;
use crate::core::error::{Error, Result};

/// Directory structure of one on-disk index
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory, holds the writer lock
    pub wal_dir: PathBuf,       // Write-ahead log generations
    pub meta_dir: PathBuf,      // Checkpoint location
}

impl StorageLayout {
    /// Layout for a writer; directories are created when missing.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let layout = Self::at(base_dir);

        fs::create_dir_all(&layout.wal_dir)?;
        fs::create_dir_all(&layout.meta_dir)?;

        Ok(layout)
    }

    /// Layout of an index that must already exist.
    pub fn existing(base_dir: PathBuf) -> Result<Self> {
        let layout = Self::at(base_dir);

        if !layout.checkpoint_path().is_file() {
            return Err(Error::unavailable(format!(
                "no index found at {}",
                layout.base_dir.display()
            )));
        }

        Ok(layout)
    }

    fn at(base_dir: PathBuf) -> Self {
        let wal_dir = base_dir.join("wal");
        let meta_dir = base_dir.join("meta");

        StorageLayout {
            base_dir,
            wal_dir,
            meta_dir,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn wal_path(&self, generation: u64) -> PathBuf {
        self.wal_dir.join(format!("wal_{:08}.log", generation))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.meta_dir.join("checkpoint.bin")
    }

    pub fn checkpoint_tmp_path(&self) -> PathBuf {
        self.meta_dir.join("checkpoint.bin.tmp")
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint_path().is_file()
    }

    /// Generations of every WAL file present, ascending.
    pub fn wal_generations(&self) -> Result<Vec<u64>> {
        let mut generations = Vec::new();

        if !self.wal_dir.exists() {
            return Ok(generations);
        }

        for entry in fs::read_dir(&self.wal_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) != Some("log") {
                continue;
            }

            // wal_00000000.log
            let generation = path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix("wal_"))
                .and_then(|digits| digits.parse::<u64>().ok());

            if let Some(generation) = generation {
                generations.push(generation);
            }
        }

        generations.sort_unstable();
        Ok(generations)
    }

    /// Removes the checkpoint and every WAL generation.
    pub fn wipe(&self) -> Result<()> {
        for generation in self.wal_generations()? {
            fs::remove_file(self.wal_path(generation))?;
        }

        for path in [self.checkpoint_path(), self.checkpoint_tmp_path()] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }

        Ok(())
    }
}
