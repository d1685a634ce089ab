use std::collections::HashMap;
use crate::analysis::token::Token;
use crate::core::types::DocId;
use crate::index::posting::{Posting, PostingList};
use crate::scoring::scorer::DocStats;

/// Token -> postings, with the per-document bookkeeping needed to undo an
/// insertion.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, PostingList>,
    doc_terms: HashMap<DocId, Vec<String>>,
    doc_lengths: HashMap<DocId, u32>,
    total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, doc_id: DocId, tokens: &[Token]) {
        if self.doc_lengths.contains_key(&doc_id) {
            self.remove_document(doc_id);
        }

        let mut term_positions: HashMap<&str, Vec<u32>> = HashMap::new();
        for token in tokens {
            term_positions.entry(token.text.as_str())
                .or_default()
                .push(token.position);
        }

        let mut terms = Vec::with_capacity(term_positions.len());
        for (term, positions) in term_positions {
            let posting = Posting {
                doc_id,
                term_freq: positions.len() as u32,
                positions,
            };

            self.postings.entry(term.to_string())
                .or_default()
                .add_posting(posting);
            terms.push(term.to_string());
        }

        self.doc_terms.insert(doc_id, terms);
        self.doc_lengths.insert(doc_id, tokens.len() as u32);
        self.total_tokens += tokens.len() as u64;
    }

    pub fn remove_document(&mut self, doc_id: DocId) -> bool {
        let Some(terms) = self.doc_terms.remove(&doc_id) else {
            return false;
        };

        for term in terms {
            if let Some(list) = self.postings.get_mut(&term) {
                list.remove(doc_id);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }

        if let Some(length) = self.doc_lengths.remove(&doc_id) {
            self.total_tokens -= length as u64;
        }

        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn search_term(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_tokens as f32 / self.doc_lengths.len() as f32
        }
    }

    pub fn doc_stats(&self, doc_id: DocId) -> DocStats {
        DocStats {
            doc_length: self.doc_lengths.get(&doc_id).copied().unwrap_or(0) as usize,
            avg_doc_length: self.avg_doc_length(),
            total_docs: self.doc_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<Token> {
        words.iter()
            .enumerate()
            .map(|(i, w)| Token::new(w.to_string(), i as u32, 0))
            .collect()
    }

    #[test]
    fn test_add_and_remove() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId(0), &tokens(&["big", "blue", "big"]));
        index.add_document(DocId(1), &tokens(&["blue"]));

        let big = index.search_term("big").unwrap();
        assert_eq!(big.get(DocId(0)).unwrap().positions, vec![0, 2]);
        assert_eq!(index.search_term("blue").unwrap().doc_freq(), 2);
        assert_eq!(index.avg_doc_length(), 2.0);

        assert!(index.remove_document(DocId(0)));
        assert!(index.search_term("big").is_none());
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.doc_stats(DocId(1)).doc_length, 1);
        assert!(!index.remove_document(DocId(0)));
    }

    #[test]
    fn test_readd_replaces() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId(3), &tokens(&["sécu"]));
        index.add_document(DocId(3), &tokens(&["cpam", "ss"]));

        assert!(index.search_term("sécu").is_none());
        assert_eq!(index.term_count(), 2);
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.avg_doc_length(), 2.0);
    }
}
