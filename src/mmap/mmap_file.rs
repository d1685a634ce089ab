use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;
use crate::core::error::Result;

/// Memory-mapped file for zero-copy reads
pub struct MmapFile {
    pub mmap: Mmap,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;

        // SAFETY: index files are replaced by rename, never modified in place,
        // so the mapped bytes stay stable while the map is alive.
        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };

        Ok(MmapFile { mmap })
    }

    pub fn data(&self) -> &[u8] {
        &self.mmap[..]
    }
}
