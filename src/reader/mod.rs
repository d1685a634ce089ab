pub mod snapshot_reader;
pub mod index_searcher;
