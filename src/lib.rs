pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod reader;
pub mod record;
pub mod mmap;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                          SYNODEX STRUCT ARCHITECTURE                          │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── WRITE PATH ───────────────────────────────────┐
│                                                                              │
│  struct TermIndex                                                            │
│  ├─ location: StorageLocation        // Directory(PathBuf) | Memory(Arena)   │
│  ├─ table: Arc<RwLock<SynonymTable>> // Shared with the arena when in memory │
│  ├─ durable: Option<Durable>         // StorageLayout + WAL (directories)    │
│  ├─ lock: Option<WriterLock>         // flock or arena lease, None = closed  │
│  ├─ create_mode: bool                // Append-only bulk load                │
│  └─ config: Config                                                           │
│                                                                              │
│  mutation ──► Operation ──► WAL::append ──► SynonymTable::apply              │
│                                  │                                           │
│                                  └─► every N entries / close():              │
│                                      new WAL generation, Checkpoint::save,   │
│                                      old WAL removed                         │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── STORAGE ──────────────────────────────────────┐
│  <dir>/.lock                       exclusive flock                           │
│  <dir>/meta/checkpoint.bin         header | lz4(bincode(documents))          │
│  <dir>/wal/wal_<generation>.log    [len][crc32][bincode WALEntry]...         │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── READ PATH ────────────────────────────────────┐
│                                                                              │
│  struct IndexSearcher                                                        │
│  ├─ snapshot: SnapshotReader   // SynonymTable + PrefixIndex (fst), frozen   │
│  ├─ parser: QueryParser        // nom lexer, analyzed Query AST              │
│  ├─ scorer: Box<dyn Scorer>    // BM25 | TF-IDF                              │
│  ├─ cache: QueryCache          // LRU keyed by (query, limit)                │
│  └─ top_doc_limit: usize                                                     │
│                                                                              │
│  text ──► QueryParser ──► Query ──► QueryExecutor (roaring) ──► TopK         │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── RECORD MATCHING ──────────────────────────────┐
│                                                                              │
│  struct RecordMatcher                                                        │
│  ├─ searchers: Vec<Option<Arc<IndexSearcher>>>  // one slot per column       │
│  └─ parallel: bool                              // rayon field queries       │
│                                                                              │
│  record[j] ──► searcher[j] ──► Vec<WordResult>  (barrier)                    │
│            ──► i mod n_j enumeration ──► dedup ──► sort ──► truncate         │
│            ──► Vec<OutputRecord>                                             │
└──────────────────────────────────────────────────────────────────────────────┘
*/
