use levenshtein_automata::{DFA, Distance, LevenshteinAutomatonBuilder};
use crate::search::prefix::PrefixIndex;

/// Automaton for fuzzy matching with edit distance
pub struct FuzzyAutomaton {
    max_edit_distance: u8,
    dfa: DFA,
}

/// Index term within the allowed distance of the query term
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub term: String,
    pub distance: u8,
}

impl FuzzyMatch {
    /// Score multiplier: exact matches count fully, each edit lowers it.
    pub fn weight(&self) -> f32 {
        1.0 / (1.0 + self.distance as f32)
    }
}

impl FuzzyAutomaton {
    pub fn new(term: &str, max_edit_distance: u8) -> Self {
        // Transpositions count as one edit (teh -> the)
        let builder = LevenshteinAutomatonBuilder::new(max_edit_distance, true);
        Self {
            max_edit_distance,
            dfa: builder.build_dfa(term),
        }
    }

    /// Edit distance to the candidate, if within bounds
    pub fn distance(&self, candidate: &str) -> Option<u8> {
        let mut state = self.dfa.initial_state();
        for &byte in candidate.as_bytes() {
            state = self.dfa.transition(state, byte);
        }

        match self.dfa.distance(state) {
            Distance::Exact(d) if d <= self.max_edit_distance => Some(d),
            _ => None,
        }
    }

    /// Expand against every term of a snapshot
    pub fn expand(&self, terms: &PrefixIndex) -> Vec<FuzzyMatch> {
        let mut matches = Vec::new();
        terms.for_each_term(|term| {
            if let Some(distance) = self.distance(term) {
                matches.push(FuzzyMatch { term: term.to_string(), distance });
            }
        });
        matches
    }
}
