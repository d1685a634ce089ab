use std::cmp::Ordering;
use std::collections::BinaryHeap;
use crate::core::types::DocId;

/// Search results container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub hits: Vec<ScoredDocument>,  // Best first
    pub total_hits: usize,          // Matching documents before truncation
    pub max_score: f32,
}

impl SearchResults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.hits.iter().map(|hit| hit.doc_id)
    }
}

/// Document with relevance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f32,
}

// Greater means worse: lower score, then higher doc id, so the max-heap
// keeps the entry to evict on top.
struct Ranked(ScoredDocument);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.score.total_cmp(&self.0.score)
            .then_with(|| self.0.doc_id.cmp(&other.0.doc_id))
    }
}

/// Top-K collector for efficient result collection
pub struct TopKCollector {
    heap: BinaryHeap<Ranked>,
    k: usize,
    total_collected: usize,  // Track total documents processed
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, scored_doc: ScoredDocument) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        let candidate = Ranked(scored_doc);
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn into_results(self) -> SearchResults {
        let hits: Vec<ScoredDocument> = self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.0)
            .collect();

        SearchResults {
            max_score: hits.first().map(|hit| hit.score).unwrap_or(0.0),
            hits,
            total_hits: self.total_collected,
        }
    }
}
