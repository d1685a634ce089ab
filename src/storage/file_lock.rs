use std::fs::{File, OpenOptions};
use crate::core::error::{Error, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::location::ArenaLease;

/// Single writer guarantee for an index directory
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    /// Takes an exclusive, non-blocking lock on `<dir>/.lock`.
    pub fn acquire(storage: &StorageLayout) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(storage.lock_path())?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();

            // SAFETY: fd is a valid descriptor owned by `file`.
            if unsafe { flock(fd, LOCK_EX | LOCK_NB) } != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(Error::unavailable(format!(
                        "{} is locked by another writer",
                        storage.base_dir.display()
                    )));
                }
                return Err(err.into());
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            // SAFETY: fd stays valid until `file` is dropped after this call.
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

/// Exclusive write access to a storage location. Dropping it releases the
/// location for the next writer.
pub enum WriterLock {
    File(FileLock),
    Arena(ArenaLease),
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_second_lock_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let first = FileLock::acquire(&layout).unwrap();
        let err = FileLock::acquire(&layout).err().unwrap();
        assert_eq!(err.kind, ErrorKind::IndexUnavailable);

        drop(first);
        assert!(FileLock::acquire(&layout).is_ok());
    }
}
