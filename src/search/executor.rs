use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::inverted::InvertedIndex;
use crate::index::posting::Posting;
use crate::index::synonym_table::SynonymTable;
use crate::query::ast::{BoolQuery, FuzzyQuery, PhraseQuery, PrefixQuery, Query, TermQuery};
use crate::scoring::scorer::Scorer;
use crate::search::fuzzy::FuzzyAutomaton;
use crate::search::prefix::PrefixIndex;
use crate::search::results::{ScoredDocument, SearchResults, TopKCollector};

/// Matching documents of one (sub)query with their scores
#[derive(Debug, Clone, Default)]
pub struct Matches {
    pub docs: RoaringBitmap,
    pub scores: HashMap<u32, f32>,
}

impl Matches {
    fn add(&mut self, doc_id: u32, score: f32) {
        self.docs.insert(doc_id);
        *self.scores.entry(doc_id).or_insert(0.0) += score;
    }

    fn keep_max(&mut self, doc_id: u32, score: f32) {
        self.docs.insert(doc_id);
        let entry = self.scores.entry(doc_id).or_insert(score);
        if score > *entry {
            *entry = score;
        }
    }

    fn score(&self, doc_id: u32) -> f32 {
        self.scores.get(&doc_id).copied().unwrap_or(0.0)
    }

    fn scale(&mut self, factor: f32) {
        if factor != 1.0 {
            for score in self.scores.values_mut() {
                *score *= factor;
            }
        }
    }
}

/// Evaluates parsed queries against one immutable snapshot
pub struct QueryExecutor<'a> {
    index: &'a InvertedIndex,
    terms: &'a PrefixIndex,
    scorer: &'a dyn Scorer,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(index: &'a InvertedIndex, terms: &'a PrefixIndex, scorer: &'a dyn Scorer) -> Self {
        QueryExecutor { index, terms, scorer }
    }

    /// Runs the query and keeps the `limit` best documents, score descending,
    /// ties by ascending doc id.
    pub fn search(&self, query: &Query, limit: usize) -> SearchResults {
        let matches = self.execute(query);

        let mut collector = TopKCollector::new(limit);
        for doc_id in matches.docs.iter() {
            collector.collect(ScoredDocument {
                doc_id: DocId(doc_id),
                score: matches.score(doc_id),
            });
        }
        collector.into_results()
    }

    pub fn execute(&self, query: &Query) -> Matches {
        let mut matches = match query {
            Query::Term(q) => self.execute_term(q),
            Query::Phrase(q) => self.execute_phrase(q),
            Query::Prefix(q) => self.execute_prefix(q),
            Query::Fuzzy(q) => self.execute_fuzzy(q),
            Query::Bool(q) => self.execute_bool(q),
        };
        matches.scale(query.boost());
        matches
    }

    fn execute_term(&self, query: &TermQuery) -> Matches {
        self.weighted_term(&query.term, 1.0)
    }

    fn weighted_term(&self, term: &str, weight: f32) -> Matches {
        let mut matches = Matches::default();
        let Some(list) = self.index.search_term(term) else {
            return matches;
        };

        let idf = self.scorer.idf(list.doc_freq(), self.index.doc_count());
        for posting in &list.postings {
            let stats = self.index.doc_stats(posting.doc_id);
            let score = self.scorer.score(posting.term_freq as f32, idf, &stats);
            matches.add(posting.doc_id.0, score * weight);
        }
        matches
    }

    fn execute_phrase(&self, query: &PhraseQuery) -> Matches {
        let mut matches = Matches::default();

        let mut lists = Vec::with_capacity(query.terms.len());
        for term in &query.terms {
            match self.index.search_term(term) {
                Some(list) => lists.push(list),
                None => return matches,
            }
        }

        let mut candidates = match lists.first() {
            Some(list) => list.doc_ids(),
            None => return matches,
        };
        for list in &lists[1..] {
            candidates &= list.doc_ids();
        }

        let total_docs = self.index.doc_count();
        let idf: f32 = lists.iter()
            .map(|list| self.scorer.idf(list.doc_freq(), total_docs))
            .sum();

        for doc_id in candidates.iter() {
            let postings: Vec<&Posting> = lists.iter()
                .filter_map(|list| list.get(DocId(doc_id)))
                .collect();
            if postings.len() != lists.len() {
                continue;
            }

            let freq = phrase_freq(&postings, query.slop);
            if freq > 0 {
                let stats = self.index.doc_stats(DocId(doc_id));
                matches.add(doc_id, self.scorer.score(freq as f32, idf, &stats));
            }
        }
        matches
    }

    fn execute_prefix(&self, query: &PrefixQuery) -> Matches {
        let mut matches = Matches::default();
        for term in self.terms.search_prefix(&query.prefix) {
            let expanded = self.weighted_term(&term, 1.0);
            for doc_id in expanded.docs.iter() {
                matches.keep_max(doc_id, expanded.score(doc_id));
            }
        }
        matches
    }

    fn execute_fuzzy(&self, query: &FuzzyQuery) -> Matches {
        let mut matches = Matches::default();
        let automaton = FuzzyAutomaton::new(&query.term, query.max_edits);
        for candidate in automaton.expand(self.terms) {
            let expanded = self.weighted_term(&candidate.term, candidate.weight());
            for doc_id in expanded.docs.iter() {
                matches.keep_max(doc_id, expanded.score(doc_id));
            }
        }
        matches
    }

    fn execute_bool(&self, query: &BoolQuery) -> Matches {
        let scoring_clauses = query.scoring_clauses();
        if scoring_clauses == 0 {
            return Matches::default();
        }

        let must: Vec<Matches> = query.must.iter().map(|q| self.execute(q)).collect();
        let should: Vec<Matches> = query.should.iter().map(|q| self.execute(q)).collect();

        let mut docs = if must.is_empty() {
            should.iter().fold(RoaringBitmap::new(), |acc, m| acc | &m.docs)
        } else {
            let mut iter = must.iter();
            let first = iter.next().map(|m| m.docs.clone()).unwrap_or_default();
            iter.fold(first, |acc, m| acc & &m.docs)
        };

        for excluded in &query.must_not {
            docs -= &self.execute(excluded).docs;
        }

        let mut matches = Matches::default();
        for doc_id in docs.iter() {
            let mut score = 0.0;
            let mut matched = 0usize;
            for clause in must.iter().chain(should.iter()) {
                if clause.docs.contains(doc_id) {
                    score += clause.score(doc_id);
                    matched += 1;
                }
            }

            // Coordination: documents matching more clauses rank higher
            let coord = matched as f32 / scoring_clauses as f32;
            matches.add(doc_id, score * coord);
        }
        matches
    }
}

/// One-off search over a table; the term dictionary is built only when the
/// query needs it.
pub fn search_table(table: &SynonymTable, scorer: &dyn Scorer, query: &Query, limit: usize) -> Result<SearchResults> {
    let terms = if query.needs_term_expansion() {
        PrefixIndex::build(table.index())?
    } else {
        PrefixIndex::empty()
    };
    Ok(QueryExecutor::new(table.index(), &terms, scorer).search(query, limit))
}

/// Number of start positions at which the terms appear in order within
/// `slop` extra positions.
fn phrase_freq(postings: &[&Posting], slop: u32) -> usize {
    let Some(first) = postings.first() else {
        return 0;
    };
    let slop = slop as i64;

    first.positions.iter()
        .filter(|&&start| {
            let start = start as i64;
            let mut low = 0i64;
            let mut high = 0i64;

            for (i, posting) in postings.iter().enumerate().skip(1) {
                let expected = start + i as i64;
                let best = posting.positions.iter()
                    .map(|&p| p as i64 - expected)
                    .min_by_key(|offset| offset.abs());

                match best {
                    Some(offset) if offset.abs() <= slop => {
                        low = low.min(offset);
                        high = high.max(offset);
                    }
                    _ => return false,
                }
            }

            high - low <= slop
        })
        .count()
}
