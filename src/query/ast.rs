/// Parsed synonym query, already analyzed (terms are index tokens)
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    Phrase(PhraseQuery),
    Prefix(PrefixQuery),
    Fuzzy(FuzzyQuery),
    Bool(BoolQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub term: String,
    pub boost: Option<f32>,
}

/// Tokens in order; `slop` is the number of extra positions tolerated
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub terms: Vec<String>,
    pub slop: u32,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub prefix: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    pub term: String,
    pub max_edits: u8,
    pub boost: Option<f32>,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match when `must` is empty
    pub must_not: Vec<Query>,  // None may match (NOT)
    pub boost: Option<f32>,
}

impl Query {
    pub fn boost(&self) -> f32 {
        let boost = match self {
            Query::Term(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::Prefix(q) => q.boost,
            Query::Fuzzy(q) => q.boost,
            Query::Bool(q) => q.boost,
        };
        boost.unwrap_or(1.0)
    }

    pub fn with_boost(mut self, value: Option<f32>) -> Self {
        if value.is_none() {
            return self;
        }
        match &mut self {
            Query::Term(q) => q.boost = value,
            Query::Phrase(q) => q.boost = value,
            Query::Prefix(q) => q.boost = value,
            Query::Fuzzy(q) => q.boost = value,
            Query::Bool(q) => q.boost = value,
        }
        self
    }

    pub fn term(term: &str) -> Self {
        Query::Term(TermQuery { term: term.to_string(), boost: None })
    }

    /// Prefix and fuzzy queries enumerate the term dictionary.
    pub fn needs_term_expansion(&self) -> bool {
        match self {
            Query::Prefix(_) | Query::Fuzzy(_) => true,
            Query::Term(_) | Query::Phrase(_) => false,
            Query::Bool(q) => q.must.iter()
                .chain(q.should.iter())
                .chain(q.must_not.iter())
                .any(Query::needs_term_expansion),
        }
    }

    /// A query that can never match anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Query::Bool(q) => q.must.is_empty() && q.should.is_empty(),
            _ => false,
        }
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    /// Clauses that contribute to the score.
    pub fn scoring_clauses(&self) -> usize {
        self.must.len() + self.should.len()
    }
}
