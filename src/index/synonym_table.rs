use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::Token;
use crate::core::types::{DocId, SynonymDocument};
use crate::index::inverted::InvertedIndex;
use crate::storage::checkpoint::Checkpoint;
use crate::storage::wal::Operation;

/// Position distance between two synonyms of one document, so that phrase
/// matching never spans two synonyms.
pub const POSITION_INCREMENT_GAP: u32 = 100;

/// Documents of one index with both lookup paths: word -> documents and
/// synonym token -> postings.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    analyzer: Arc<Analyzer>,
    documents: BTreeMap<DocId, SynonymDocument>,
    words: HashMap<String, Vec<DocId>>,
    index: InvertedIndex,
    next_doc_id: u32,
    version: u64,
}

impl SynonymTable {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        SynonymTable {
            analyzer,
            documents: BTreeMap::new(),
            words: HashMap::new(),
            index: InvertedIndex::new(),
            next_doc_id: 0,
            version: 0,
        }
    }

    pub fn from_checkpoint(analyzer: Arc<Analyzer>, checkpoint: Checkpoint) -> Self {
        let mut table = Self::new(analyzer);
        for (doc_id, document) in checkpoint.documents {
            table.put(doc_id, document);
        }
        table.next_doc_id = table.next_doc_id.max(checkpoint.next_doc_id);
        table.version = checkpoint.version;
        table
    }

    pub fn to_checkpoint(&self, wal_generation: u64) -> Checkpoint {
        let mut checkpoint = Checkpoint::empty(wal_generation);
        checkpoint.version = self.version;
        checkpoint.next_doc_id = self.next_doc_id;
        checkpoint.documents = self.documents
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect();
        checkpoint
    }

    /// Applies one logged mutation; nested batches count as one version.
    pub fn apply(&mut self, operation: &Operation) {
        self.apply_one(operation);
        self.version += 1;
    }

    fn apply_one(&mut self, operation: &Operation) {
        match operation {
            Operation::Put { doc_id, document } => self.put(*doc_id, document.clone()),
            Operation::Delete { doc_ids } => {
                for doc_id in doc_ids {
                    self.delete(*doc_id);
                }
            }
            Operation::Batch(operations) => {
                for op in operations {
                    self.apply_one(op);
                }
            }
            Operation::Clear => self.clear(),
        }
    }

    fn put(&mut self, doc_id: DocId, document: SynonymDocument) {
        if self.documents.contains_key(&doc_id) {
            self.delete(doc_id);
        }

        let tokens = self.analyze_synonyms(&document.synonyms);
        self.index.add_document(doc_id, &tokens);

        let ids = self.words.entry(document.word.clone()).or_default();
        if let Err(pos) = ids.binary_search(&doc_id) {
            ids.insert(pos, doc_id);
        }

        self.documents.insert(doc_id, document);
        self.next_doc_id = self.next_doc_id.max(doc_id.0 + 1);
    }

    fn delete(&mut self, doc_id: DocId) -> bool {
        let Some(document) = self.documents.remove(&doc_id) else {
            return false;
        };

        if let Some(ids) = self.words.get_mut(&document.word) {
            ids.retain(|id| *id != doc_id);
            if ids.is_empty() {
                self.words.remove(&document.word);
            }
        }

        self.index.remove_document(doc_id);
        true
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.words.clear();
        self.index.clear();
    }

    /// Tokens of every synonym; positions jump by the gap between synonyms.
    pub fn analyze_synonyms(&self, synonyms: &[String]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut base = 0u32;

        for synonym in synonyms {
            let analyzed = self.analyzer.analyze(synonym);
            let width = analyzed.iter().map(|t| t.position + 1).max().unwrap_or(0);

            for mut token in analyzed {
                token.position += base;
                tokens.push(token);
            }

            base += width + POSITION_INCREMENT_GAP;
        }

        tokens
    }

    /// Id the next appended document will receive.
    pub fn next_doc_id(&self) -> DocId {
        DocId(self.next_doc_id)
    }

    /// Documents stored under `word`, ascending (case-sensitive match).
    pub fn docs_for_word(&self, word: &str) -> &[DocId] {
        self.words.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document(&self, doc_id: DocId) -> Option<&SynonymDocument> {
        self.documents.get(&doc_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &SynonymDocument)> {
        self.documents.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of mutations applied since the index was created.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SynonymTable {
        SynonymTable::new(Arc::new(Analyzer::synonym()))
    }

    fn put(id: u32, word: &str, synonyms: &[&str]) -> Operation {
        Operation::Put {
            doc_id: DocId(id),
            document: SynonymDocument::new(word, synonyms.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_put_indexes_both_sides() {
        let mut table = table();
        table.apply(&put(0, "IBM", &["IBM", "Big Blue"]));

        assert_eq!(table.docs_for_word("IBM"), &[DocId(0)]);
        assert!(table.docs_for_word("ibm").is_empty());
        assert_eq!(table.index().search_term("blue").unwrap().doc_freq(), 1);
        assert_eq!(table.next_doc_id(), DocId(1));
        assert_eq!(table.version(), 1);
    }

    #[test]
    fn test_synonym_positions_are_gapped() {
        let table = table();
        let tokens = table.analyze_synonyms(&["Big Blue".to_string(), "IBM".to_string()]);
        let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2 + POSITION_INCREMENT_GAP]);
    }

    #[test]
    fn test_batch_is_one_version() {
        let mut table = table();
        table.apply(&put(0, "SS", &["Sécu"]));
        table.apply(&put(1, "SS", &["CPAM"]));
        table.apply(&Operation::Batch(vec![
            Operation::Delete { doc_ids: vec![DocId(1)] },
            put(0, "SS", &["Sécu", "CPAM"]),
        ]));

        assert_eq!(table.version(), 3);
        assert_eq!(table.docs_for_word("SS"), &[DocId(0)]);
        assert_eq!(table.document(DocId(0)).unwrap().synonym_count(), 2);
        assert_eq!(table.index().search_term("cpam").unwrap().doc_freq(), 1);
    }

    #[test]
    fn test_clear_keeps_id_counter() {
        let mut table = table();
        table.apply(&put(0, "ANPE", &["Pôle Emploi"]));
        table.apply(&Operation::Clear);

        assert!(table.is_empty());
        assert_eq!(table.index().doc_count(), 0);
        assert_eq!(table.next_doc_id(), DocId(1));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut table = table();
        table.apply(&put(0, "IAIDQ", &["Int. Assoc. Info & DQ"]));
        table.apply(&put(4, "ANPE", &["A.N.P.E."]));
        table.apply(&Operation::Delete { doc_ids: vec![DocId(4)] });

        let restored = SynonymTable::from_checkpoint(table.analyzer().clone(), table.to_checkpoint(1));
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.next_doc_id(), DocId(5));
        assert_eq!(restored.version(), 3);
        assert!(restored.index().search_term("dq").is_some());
    }
}
