//! Integration tests for the on-disk and in-memory synonym index

use std::fs::OpenOptions;
use std::io::Write;

use tempfile::TempDir;

use synodex::core::config::Config;
use synodex::core::error::ErrorKind;
use synodex::index::term_index::{OpenMode, TermIndex};
use synodex::reader::index_searcher::IndexSearcher;
use synodex::storage::location::{MemoryArena, StorageLocation};
use synodex::storage::wal::SyncMode;

const SYNONYMS: &[(&str, &str)] = &[
    ("IBM", "IBM|International Business Machines|Big Blue"),
    ("ANPE", "A.N.P.E.|Agence Nationale Pour l'Emploi|Pôle Emploi"),
    ("SNCF", "SNCF|Société nationale des chemins de fer"),
    ("Sécurité Sociale", "Sécurité Sociale|Sécu|SS"),
];

fn config() -> Config {
    Config {
        sync_mode: SyncMode::None,
        ..Config::with_separator('|')
    }
}

fn setup_directory() -> (TempDir, StorageLocation) {
    let tmp = TempDir::new().unwrap();
    let location = StorageLocation::directory(tmp.path().join("index"));
    (tmp, location)
}

fn seed(index: &mut TermIndex) {
    for (word, synonyms) in SYNONYMS {
        index.insert_document(word, synonyms).unwrap();
    }
}

#[test]
fn test_big_blue_resolves_to_ibm() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
    seed(&mut index);

    let results = index.search_document_by_synonym("Big Blue").unwrap();
    assert!(!results.is_empty());
    assert_eq!(index.document(results.hits[0].doc_id).unwrap().word, "IBM");
    assert_eq!(index.get_synonym_count("IBM"), 3);
}

#[test]
fn test_removed_acronym_no_longer_matches() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
    seed(&mut index);

    let before = index.search_document_by_synonym("A.N.P.E.").unwrap();
    assert_eq!(before.len(), 1);

    index.remove_synonym_from_document("ANPE", "A.N.P.E.").unwrap();
    assert_eq!(index.get_synonym_count("ANPE"), 2);
    assert!(index.search_document_by_synonym("A.N.P.E.").unwrap().is_empty());

    // Other synonyms still reach the document
    let results = index.search_document_by_synonym("pôle emploi").unwrap();
    assert_eq!(index.document(results.hits[0].doc_id).unwrap().word, "ANPE");
}

#[test]
fn test_persists_across_reopen() {
    let (_tmp, location) = setup_directory();
    {
        let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
        seed(&mut index);
        index.delete_document_by_word("SNCF").unwrap();
        index.close().unwrap();
    }

    let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Append, config()).unwrap();
    assert_eq!(index.num_docs(), SYNONYMS.len() - 1);
    assert_eq!(index.get_synonym_count("IBM"), 3);
    assert!(index.search_document_by_word("SNCF").is_empty());

    index.add_synonym_to_document("IBM", "Big Blue Inc").unwrap();
    assert_eq!(index.get_synonym_count("IBM"), 4);
}

#[test]
fn test_wal_is_replayed_without_close() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
    seed(&mut index);

    // A reader sees every committed mutation before the log is folded
    let searcher = IndexSearcher::open(location.clone()).unwrap();
    assert_eq!(searcher.num_docs(), SYNONYMS.len());
    assert_eq!(searcher.search_document_by_synonym("sécu").unwrap().len(), 1);
}

#[test]
fn test_torn_wal_tail_is_ignored() {
    let (tmp, location) = setup_directory();
    {
        let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
        index.close().unwrap();
    }
    {
        let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Append, config()).unwrap();
        index.insert_document("IBM", "IBM|Big Blue").unwrap();
        // Leak the writer state on disk as a crash would
        std::mem::forget(index);
    }

    let wal_dir = tmp.path().join("index").join("wal");
    let wal_path = std::fs::read_dir(&wal_dir).unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| path.extension().is_some_and(|ext| ext == "log"))
        .unwrap();
    let mut wal = OpenOptions::new().append(true).open(&wal_path).unwrap();
    wal.write_all(&[0xAB, 0xCD, 0x01]).unwrap();

    let searcher = IndexSearcher::open(location).unwrap();
    assert_eq!(searcher.num_docs(), 1);
    assert_eq!(searcher.search_document_by_synonym("big blue").unwrap().len(), 1);
}

#[test]
fn test_oversized_insert_fails_and_later_writes_survive() {
    let (_tmp, location) = setup_directory();
    {
        let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
        index.insert_document("SMALL", "small").unwrap();

        let huge = "x".repeat(65 * 1024 * 1024);
        let err = index.insert_document("BIG", &huge).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(index.search_document_by_word("BIG").is_empty());

        index.insert_document("AFTER", "after").unwrap();
        assert_eq!(index.num_docs(), 2);
        std::mem::forget(index);
    }

    let searcher = IndexSearcher::open(location).unwrap();
    assert_eq!(searcher.num_docs(), 2);
    assert_eq!(searcher.search_document_by_word("AFTER").len(), 1);
}

#[test]
fn test_second_writer_is_rejected() {
    let (_tmp, location) = setup_directory();
    let mut first = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();

    let err = TermIndex::open_with_config(location.clone(), OpenMode::CreateOrAppend, config()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::IndexUnavailable);

    first.close().unwrap();
    let second = TermIndex::open_with_config(location, OpenMode::Append, config());
    assert!(second.is_ok());
}

#[test]
fn test_append_requires_existing_index() {
    let (_tmp, location) = setup_directory();
    let err = TermIndex::open_with_config(location.clone(), OpenMode::Append, config()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::IndexUnavailable);

    let err = IndexSearcher::open(location).err().unwrap();
    assert_eq!(err.kind, ErrorKind::IndexUnavailable);
}

#[test]
fn test_create_mode_wipes_existing_contents() {
    let (_tmp, location) = setup_directory();
    {
        let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
        seed(&mut index);
    }

    let index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
    assert_eq!(index.num_docs(), 0);

    drop(index);

    let index = TermIndex::open_with_config(location, OpenMode::CreateOrAppend, config()).unwrap();
    assert_eq!(index.num_docs(), 0);
}

#[test]
fn test_bulk_load_in_create_mode() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location.clone(), OpenMode::Create, config()).unwrap();
    index.set_using_create_mode(true);
    assert!(index.is_using_create_mode());

    for i in 0..500 {
        index.insert_document(&format!("WORD{}", i), &format!("synonym {}|alias{}", i, i)).unwrap();
    }
    index.close().unwrap();

    let searcher = IndexSearcher::open(location).unwrap();
    assert_eq!(searcher.num_docs(), 500);
    let results = searcher.search_document_by_synonym("alias42").unwrap();
    assert_eq!(searcher.get_word_by_doc_id(results.hits[0].doc_id), Some("WORD42"));
}

#[test]
fn test_update_document_counts() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location, OpenMode::Create, config()).unwrap();
    seed(&mut index);

    let mut updated = 0;
    updated += index.update_document("Sécurité Sociale", "I|have|been|updated").unwrap();
    assert_eq!(updated, 1);
    updated += index.update_document("INEXIST", "I|don't|exist").unwrap();
    assert_eq!(updated, 1);

    assert_eq!(index.get_synonym_count("Sécurité Sociale"), 4);
    assert_eq!(index.num_docs(), SYNONYMS.len() + 1);
}

#[test]
fn test_insert_existing_word_replaces() {
    let (_tmp, location) = setup_directory();
    let mut index = TermIndex::open_with_config(location, OpenMode::Create, config()).unwrap();
    seed(&mut index);

    index.insert_document("ADD", "This|is|a|new|document").unwrap();
    assert_eq!(index.num_docs(), SYNONYMS.len() + 1);
    index.insert_document("IBM", "This|is|an|existing|document").unwrap();
    assert_eq!(index.num_docs(), SYNONYMS.len() + 1);
    assert_eq!(index.get_synonym_count("IBM"), 5);
}

#[test]
fn test_memory_arena_is_shared_between_handles() {
    let arena = MemoryArena::new();
    let mut index = TermIndex::open_with_config(StorageLocation::Memory(arena.clone()), OpenMode::Create, config()).unwrap();
    seed(&mut index);

    let searcher = IndexSearcher::open(StorageLocation::Memory(arena.clone())).unwrap();
    assert_eq!(searcher.num_docs(), SYNONYMS.len());

    index.close().unwrap();
    let reopened = TermIndex::open_with_config(StorageLocation::Memory(arena), OpenMode::Append, config()).unwrap();
    assert_eq!(reopened.num_docs(), SYNONYMS.len());
}
