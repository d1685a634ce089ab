use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Analyzer shared by indexing and querying of synonyms: word
    /// segmentation followed by lowercasing, no stemming.
    pub fn synonym() -> Self {
        Analyzer::new("synonym".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonym_analyzer_is_case_insensitive() {
        let analyzer = Analyzer::synonym();
        let upper: Vec<String> = analyzer.analyze("Pôle EMPLOI").into_iter().map(|t| t.text).collect();
        let lower: Vec<String> = analyzer.analyze("pôle emploi").into_iter().map(|t| t.text).collect();
        assert_eq!(upper, vec!["pôle", "emploi"]);
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_debug_lists_pipeline() {
        let rendered = format!("{:?}", Analyzer::synonym());
        assert!(rendered.contains("standard"));
        assert!(rendered.contains("lowercase"));
    }
}
