use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Field value matched to one canonical word of a column index
#[derive(Debug, Clone, PartialEq)]
pub struct WordResult {
    pub input: String,
    pub word: String,
    pub score: f32,
}

/// Standardized record: one canonical word per input column.
///
/// Equality and hashing only look at `fields`; two records built from
/// different hits but naming the same words are the same record.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub fields: Vec<String>,
    pub scores: Vec<f32>,  // Per-field hit scores
    pub score: f32,        // Mean of `scores`
}

impl OutputRecord {
    pub fn new(fields: Vec<String>, scores: Vec<f32>) -> Self {
        let score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };
        OutputRecord { fields, scores, score }
    }

    /// Orders by aggregate score, best first.
    pub fn cmp_by_score(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }

    /// Per-field scores as "s1|s2|...".
    pub fn scores_trace(&self) -> String {
        self.scores.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl PartialEq for OutputRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for OutputRecord {}

impl Hash for OutputRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] score={} ({})", self.fields.join(", "), self.score, self.scores_trace())
    }
}
