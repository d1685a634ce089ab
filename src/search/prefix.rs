use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use crate::core::error::Result;
use crate::index::inverted::InvertedIndex;

/// FST over the terms of one snapshot, for prefix and fuzzy expansion
pub struct PrefixIndex {
    /// Term -> document frequency
    fst: Map<Vec<u8>>,
}

impl PrefixIndex {
    pub fn empty() -> Self {
        Self { fst: Map::default() }
    }

    /// Build FST from the terms of an inverted index
    pub fn build(index: &InvertedIndex) -> Result<Self> {
        let mut terms: Vec<(&str, u64)> = index.terms()
            .map(|term| {
                let doc_freq = index.search_term(term).map(|list| list.doc_freq()).unwrap_or(0);
                (term, doc_freq as u64)
            })
            .collect();

        // FST requires sorted input
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut builder = MapBuilder::memory();
        for (term, doc_freq) in terms {
            builder.insert(term.as_bytes(), doc_freq)?;
        }

        Ok(Self { fst: builder.into_map() })
    }

    pub fn len(&self) -> usize {
        self.fst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fst.is_empty()
    }

    /// Find all terms with given prefix, in lexicographic order
    pub fn search_prefix(&self, prefix: &str) -> Vec<String> {
        let mut results = Vec::new();
        let prefix_bytes = prefix.as_bytes();

        let mut stream = self.fst.range().ge(prefix_bytes).into_stream();
        while let Some((term_bytes, _)) = stream.next() {
            if !term_bytes.starts_with(prefix_bytes) {
                break;
            }
            if let Ok(term) = std::str::from_utf8(term_bytes) {
                results.push(term.to_string());
            }
        }

        results
    }

    /// Visit every term, in lexicographic order.
    pub fn for_each_term<F: FnMut(&str)>(&self, mut f: F) {
        let mut stream = self.fst.stream();
        while let Some((term_bytes, _)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(term_bytes) {
                f(term);
            }
        }
    }
}
