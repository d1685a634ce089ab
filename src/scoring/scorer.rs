use crate::core::config::ScorerKind;

/// Scorer trait
pub trait Scorer: Send + Sync {
    /// Inverse document frequency; always positive so that a single-document
    /// index still produces non-zero scores.
    fn idf(&self, doc_freq: u32, total_docs: usize) -> f32;

    fn score(&self, term_freq: f32, idf: f32, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub doc_length: usize,    // Number of tokens across all synonyms
    pub avg_doc_length: f32,  // Average document length in the index
    pub total_docs: usize,
}

pub fn scorer_for(kind: ScorerKind) -> Box<dyn Scorer> {
    match kind {
        ScorerKind::Bm25 => Box::new(BM25Scorer::default()),
        ScorerKind::TfIdf => Box::new(TfIdfScorer::default()),
    }
}

/// Classic TF-IDF: sqrt(tf) * idf² * 1/sqrt(length)
#[derive(Debug, Clone, Default)]
pub struct TfIdfScorer;

impl Scorer for TfIdfScorer {
    fn idf(&self, doc_freq: u32, total_docs: usize) -> f32 {
        1.0 + (total_docs as f32 / (doc_freq as f32 + 1.0)).ln().max(-0.9)
    }

    fn score(&self, term_freq: f32, idf: f32, doc_stats: &DocStats) -> f32 {
        let norm = 1.0 / (doc_stats.doc_length.max(1) as f32).sqrt();
        term_freq.sqrt() * idf * idf * norm
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

/// BM25 Scorer
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn idf(&self, doc_freq: u32, total_docs: usize) -> f32 {
        let n = total_docs as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn score(&self, term_freq: f32, idf: f32, doc_stats: &DocStats) -> f32 {
        let doc_len = doc_stats.doc_length as f32;
        let avg_doc_len = if doc_stats.avg_doc_length > 0.0 { doc_stats.avg_doc_length } else { 1.0 };

        let numerator = idf * term_freq * (self.k1 + 1.0);
        let denominator = term_freq + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(doc_length: usize, avg: f32, total: usize) -> DocStats {
        DocStats { doc_length, avg_doc_length: avg, total_docs: total }
    }

    #[test]
    fn test_idf_positive_for_single_document() {
        for scorer in [scorer_for(ScorerKind::Bm25), scorer_for(ScorerKind::TfIdf)] {
            let idf = scorer.idf(1, 1);
            assert!(idf > 0.0, "{} idf was {}", scorer.name(), idf);
            assert!(scorer.score(1.0, idf, &stats(3, 3.0, 1)) > 0.0);
        }
    }

    #[test]
    fn test_rare_terms_score_higher() {
        let scorer = BM25Scorer::default();
        assert!(scorer.idf(1, 100) > scorer.idf(50, 100));
    }

    #[test]
    fn test_shorter_documents_score_higher() {
        let scorer = BM25Scorer::default();
        let idf = scorer.idf(2, 10);
        let short = scorer.score(1.0, idf, &stats(2, 5.0, 10));
        let long = scorer.score(1.0, idf, &stats(12, 5.0, 10));
        assert!(short > long);

        let tfidf = TfIdfScorer;
        let idf = tfidf.idf(2, 10);
        assert!(tfidf.score(1.0, idf, &stats(2, 5.0, 10)) > tfidf.score(1.0, idf, &stats(12, 5.0, 10)));
    }
}
