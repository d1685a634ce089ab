use serde::{Serialize, Deserialize};
use std::fmt;

/// Physical document number inside one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A canonical word and the surface forms known to refer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymDocument {
    pub word: String,
    pub synonyms: Vec<String>,
}

impl SynonymDocument {
    pub fn new(word: impl Into<String>, synonyms: Vec<String>) -> Self {
        SynonymDocument {
            word: word.into(),
            synonyms,
        }
    }

    /// Splits `synonyms` on `separator`. Pieces are trimmed and empty pieces
    /// are skipped; duplicates are kept.
    pub fn parse(word: &str, synonyms: &str, separator: char) -> Self {
        let synonyms = synonyms
            .split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        SynonymDocument::new(word, synonyms)
    }

    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }

    /// Position of the first synonym equal to `synonym` (case-sensitive).
    pub fn position_of(&self, synonym: &str) -> Option<usize> {
        self.synonyms.iter().position(|s| s == synonym)
    }
}
