pub mod layout;
pub mod location;
pub mod file_lock;
pub mod wal;
pub mod checkpoint;
