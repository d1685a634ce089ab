use std::sync::Arc;
use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error as NomError, ErrorKind as NomErrorKind},
    sequence::{pair, preceded},
};
use serde::{Deserialize, Serialize};
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::query::ast::{BoolQuery, FuzzyQuery, PhraseQuery, PrefixQuery, Query, TermQuery};

const MAX_EDITS: u8 = 2;
const MAX_DEPTH: usize = 256;  // nested groups

/// Query parser for converting synonym search strings to the query AST
pub struct QueryParser {
    pub analyzer: Arc<Analyzer>,
    pub default_operator: BooleanOperator,
}

/// How adjacent clauses without an explicit operator combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Open,
    Close(Option<f32>),
    Plus,
    Minus,
    And,
    Or,
    Not,
    Word(WordLexeme),
    Quoted {
        text: String,
        slop: u32,
        boost: Option<f32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct WordLexeme {
    text: String,
    wildcard: bool,
    fuzzy: Option<u8>,
    boost: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Must,
    Should,
    MustNot,
}

impl QueryParser {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        QueryParser {
            analyzer,
            default_operator: BooleanOperator::Or,
        }
    }

    pub fn with_default_operator(mut self, operator: BooleanOperator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Parse a query string into the Query AST
    /// Examples:
    /// - "big blue" -> OR of two terms
    /// - "big AND blue", "+big +blue" -> both required
    /// - "\"big blue\"~1" -> phrase with slop
    /// - "emplo*" -> prefix, "emploi~1" -> fuzzy
    /// - "(pole OR agence)^2 -chomage" -> boosted group, prohibited term
    ///
    /// A blank query, or one whose words all analyze to nothing, yields an
    /// empty boolean query that matches no document.
    pub fn parse(&self, input: &str) -> Result<Query> {
        let lexemes = lex(input).map_err(|reason| Error::syntax(input, reason))?;
        let mut cursor = Cursor { lexemes: &lexemes, pos: 0 };

        let clauses = self.parse_group(&mut cursor, 0)
            .map_err(|reason| Error::syntax(input, reason))?;

        Ok(build_query(clauses, None))
    }

    fn parse_group(&self, cursor: &mut Cursor<'_>, depth: usize) -> std::result::Result<Vec<(Occur, Query)>, String> {
        if depth > MAX_DEPTH {
            return Err("query nested too deeply".to_string());
        }

        let mut clauses: Vec<(Occur, Option<Query>)> = Vec::new();
        let mut pending: Option<BooleanOperator> = None;

        loop {
            match cursor.peek() {
                None => {
                    if depth > 0 {
                        return Err("missing ')'".to_string());
                    }
                    break;
                }
                Some(Lexeme::Close(_)) => {
                    if depth == 0 {
                        return Err("unexpected ')'".to_string());
                    }
                    break;
                }
                Some(Lexeme::And) => {
                    if clauses.is_empty() || pending.is_some() {
                        return Err("AND without left operand".to_string());
                    }
                    cursor.advance();
                    if let Some(last) = clauses.last_mut() {
                        if last.0 == Occur::Should {
                            last.0 = Occur::Must;
                        }
                    }
                    pending = Some(BooleanOperator::And);
                }
                Some(Lexeme::Or) => {
                    if clauses.is_empty() || pending.is_some() {
                        return Err("OR without left operand".to_string());
                    }
                    cursor.advance();
                    pending = Some(BooleanOperator::Or);
                }
                Some(_) => {
                    let modifier = match cursor.peek() {
                        Some(Lexeme::Plus) => Some(Occur::Must),
                        Some(Lexeme::Minus) | Some(Lexeme::Not) => Some(Occur::MustNot),
                        _ => None,
                    };
                    if modifier.is_some() {
                        cursor.advance();
                    }

                    let query = self.parse_atom(cursor, depth)?;
                    let occur = match (modifier, pending) {
                        (Some(occur), _) => occur,
                        (None, Some(BooleanOperator::And)) => Occur::Must,
                        (None, Some(BooleanOperator::Or)) => Occur::Should,
                        (None, None) => match self.default_operator {
                            BooleanOperator::And => Occur::Must,
                            BooleanOperator::Or => Occur::Should,
                        },
                    };
                    clauses.push((occur, query));
                    pending = None;
                }
            }
        }

        match pending {
            Some(BooleanOperator::And) => return Err("AND without right operand".to_string()),
            Some(BooleanOperator::Or) => return Err("OR without right operand".to_string()),
            None => {}
        }

        Ok(clauses.into_iter()
            .filter_map(|(occur, query)| query.map(|q| (occur, q)))
            .collect())
    }

    /// Returns None when the operand analyzed to nothing.
    fn parse_atom(&self, cursor: &mut Cursor<'_>, depth: usize) -> std::result::Result<Option<Query>, String> {
        match cursor.next() {
            Some(Lexeme::Word(word)) => Ok(self.word_query(word)),
            Some(Lexeme::Quoted { text, slop, boost }) => {
                let terms = self.analyze(text);
                Ok(match terms.len() {
                    0 => None,
                    1 => Some(Query::Term(TermQuery { term: terms[0].clone(), boost: *boost })),
                    _ => Some(Query::Phrase(PhraseQuery { terms, slop: *slop, boost: *boost })),
                })
            }
            Some(Lexeme::Open) => {
                let clauses = self.parse_group(cursor, depth + 1)?;
                match cursor.next() {
                    Some(Lexeme::Close(boost)) => {
                        if clauses.is_empty() {
                            Ok(None)
                        } else {
                            Ok(Some(build_query(clauses, *boost)))
                        }
                    }
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Lexeme::Plus) | Some(Lexeme::Minus) | Some(Lexeme::Not) => {
                Err("repeated operator".to_string())
            }
            Some(Lexeme::And) | Some(Lexeme::Or) | Some(Lexeme::Close(_)) | None => {
                Err("operator without operand".to_string())
            }
        }
    }

    fn word_query(&self, word: &WordLexeme) -> Option<Query> {
        let mut terms = self.analyze(&word.text);
        let last = terms.pop()?;

        let tail = if word.wildcard {
            Query::Prefix(PrefixQuery { prefix: last, boost: None })
        } else if let Some(max_edits) = word.fuzzy {
            Query::Fuzzy(FuzzyQuery { term: last, max_edits, boost: None })
        } else {
            Query::Term(TermQuery { term: last, boost: None })
        };

        if terms.is_empty() {
            return Some(tail.with_boost(word.boost));
        }

        // Several tokens from one word ("a.n-p.e") must stay together
        let query = match tail {
            Query::Term(TermQuery { term, .. }) => {
                terms.push(term);
                Query::Phrase(PhraseQuery { terms, slop: 0, boost: None })
            }
            tail => {
                let mut bool_query = BoolQuery::new();
                for term in terms {
                    bool_query = bool_query.with_must(Query::term(&term));
                }
                Query::Bool(bool_query.with_must(tail))
            }
        };
        Some(query.with_boost(word.boost))
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        self.analyzer.analyze(text)
            .into_iter()
            .map(|token| token.text)
            .collect()
    }
}

fn build_query(mut clauses: Vec<(Occur, Query)>, boost: Option<f32>) -> Query {
    if clauses.len() == 1 && clauses[0].0 != Occur::MustNot {
        let (_, query) = clauses.remove(0);
        return match boost {
            Some(b) => {
                let inner = query.boost();
                query.with_boost(Some(inner * b))
            }
            None => query,
        };
    }

    let mut bool_query = BoolQuery { boost, ..BoolQuery::default() };
    for (occur, query) in clauses {
        match occur {
            Occur::Must => bool_query.must.push(query),
            Occur::Should => bool_query.should.push(query),
            Occur::MustNot => bool_query.must_not.push(query),
        }
    }
    Query::Bool(bool_query)
}

struct Cursor<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Lexeme> {
        let lexeme = self.lexemes.get(self.pos);
        self.pos += 1;
        lexeme
    }

    fn advance(&mut self) {
        self.pos += 1;
    }
}

// Failure codes raised by the hand-written lexers, mapped to messages in lex()
const UNTERMINATED_QUOTE: NomErrorKind = NomErrorKind::Char;
const TRAILING_ESCAPE: NomErrorKind = NomErrorKind::Escaped;
const BAD_WILDCARD: NomErrorKind = NomErrorKind::Verify;
const BAD_MODIFIER: NomErrorKind = NomErrorKind::Digit;

fn lex(input: &str) -> std::result::Result<Vec<Lexeme>, String> {
    let mut lexemes = Vec::new();
    let mut rest = input;

    loop {
        let (after_space, _) = multispace0::<&str, NomError<&str>>(rest)
            .map_err(|_| "invalid whitespace".to_string())?;
        rest = after_space;
        if rest.is_empty() {
            break;
        }

        match lexeme(rest) {
            Ok((remaining, lexeme)) => {
                lexemes.push(lexeme);
                rest = remaining;
            }
            Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                let message = match e.code {
                    UNTERMINATED_QUOTE => "unterminated quote".to_string(),
                    TRAILING_ESCAPE => "trailing escape character".to_string(),
                    BAD_WILDCARD => "misplaced '*' wildcard".to_string(),
                    BAD_MODIFIER => "malformed '~' or '^' modifier".to_string(),
                    _ => match e.input.chars().next() {
                        Some(c) => format!("unexpected '{}'", c),
                        None => "unexpected end of query".to_string(),
                    },
                };
                return Err(message);
            }
            Err(nom::Err::Incomplete(_)) => return Err("unexpected end of query".to_string()),
        }
    }

    Ok(lexemes)
}

fn lexeme(input: &str) -> IResult<&str, Lexeme> {
    alt((
        value(Lexeme::Open, char('(')),
        map(preceded(char(')'), opt(boost)), Lexeme::Close),
        value(Lexeme::Plus, char('+')),
        value(Lexeme::Minus, char('-')),
        quoted,
        word,
    )).parse(input)
}

fn boost(input: &str) -> IResult<&str, f32> {
    preceded(
        char('^'),
        map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), |s: &str| s.parse::<f32>()),
    ).parse(input)
}

fn slop_suffix(input: &str) -> IResult<&str, &str> {
    preceded(char('~'), digit1).parse(input)
}

fn fuzzy_suffix(input: &str) -> IResult<&str, Option<&str>> {
    preceded(char('~'), opt(digit1)).parse(input)
}

fn failure<T>(input: &str, code: NomErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Failure(NomError::new(input, code)))
}

fn quoted(input: &str) -> IResult<&str, Lexeme> {
    let (body, _) = char::<&str, NomError<&str>>('"').parse(input)?;

    let mut text = String::new();
    let mut chars = body.char_indices();
    let rest = loop {
        match chars.next() {
            None => return failure(input, UNTERMINATED_QUOTE),
            Some((_, '\\')) => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => return failure(input, TRAILING_ESCAPE),
            },
            Some((i, '"')) => break &body[i + 1..],
            Some((_, c)) => text.push(c),
        }
    };

    let (rest, slop) = opt(slop_suffix).parse(rest)?;
    let slop = match slop {
        Some(digits) => match digits.parse::<u32>() {
            Ok(n) => n,
            Err(_) => return failure(rest, BAD_MODIFIER),
        },
        None => 0,
    };
    let (rest, boost) = opt(boost).parse(rest)?;
    check_boundary(rest)?;

    Ok((rest, Lexeme::Quoted { text, slop, boost }))
}

fn word(input: &str) -> IResult<&str, Lexeme> {
    let mut text = String::new();
    let mut wildcard = false;
    let mut escaped = false;
    let mut end = input.len();

    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '~' | '^') => {
                end = i;
                break;
            }
            '\\' => match chars.next() {
                Some(_) if wildcard => return failure(&input[i..], BAD_WILDCARD),
                Some((_, c)) => {
                    text.push(c);
                    escaped = true;
                }
                None => return failure(&input[i..], TRAILING_ESCAPE),
            },
            '*' => {
                if text.is_empty() || wildcard {
                    return failure(&input[i..], BAD_WILDCARD);
                }
                wildcard = true;
            }
            c => {
                if wildcard {
                    return failure(&input[i..], BAD_WILDCARD);
                }
                text.push(c);
            }
        }
    }

    if text.is_empty() {
        return Err(nom::Err::Error(NomError::new(input, NomErrorKind::Alpha)));
    }

    let rest = &input[end..];
    let (rest, fuzzy) = opt(fuzzy_suffix).parse(rest)?;
    let fuzzy = match fuzzy {
        Some(Some(digits)) => match digits.parse::<u8>() {
            Ok(n) => Some(n.min(MAX_EDITS)),
            Err(_) => Some(MAX_EDITS),
        },
        Some(None) => Some(MAX_EDITS),
        None => None,
    };
    if wildcard && fuzzy.is_some() {
        return failure(rest, BAD_WILDCARD);
    }
    let (rest, boost) = opt(boost).parse(rest)?;
    check_boundary(rest)?;

    if !escaped && !wildcard && fuzzy.is_none() && boost.is_none() {
        match text.as_str() {
            "AND" | "&&" => return Ok((rest, Lexeme::And)),
            "OR" | "||" => return Ok((rest, Lexeme::Or)),
            "NOT" | "!" => return Ok((rest, Lexeme::Not)),
            _ => {}
        }
    }

    Ok((rest, Lexeme::Word(WordLexeme { text, wildcard, fuzzy, boost })))
}

/// A modifier must be followed by whitespace, a parenthesis or the end.
fn check_boundary(rest: &str) -> IResult<&str, ()> {
    match rest.chars().next() {
        None => Ok((rest, ())),
        Some(c) if c.is_whitespace() || c == '(' || c == ')' => Ok((rest, ())),
        Some(_) => failure(rest, BAD_MODIFIER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn parser() -> QueryParser {
        QueryParser::new(Arc::new(Analyzer::synonym()))
    }

    fn term(t: &str) -> Query {
        Query::term(t)
    }

    #[test]
    fn test_single_word_is_lowercased_term() {
        assert_eq!(parser().parse("IBM").unwrap(), term("ibm"));
    }

    #[test]
    fn test_words_default_to_or() {
        let query = parser().parse("big blue").unwrap();
        assert_eq!(query, Query::Bool(BoolQuery::new()
            .with_should(term("big"))
            .with_should(term("blue"))));
    }

    #[test]
    fn test_default_and_operator() {
        let query = parser()
            .with_default_operator(BooleanOperator::And)
            .parse("big blue")
            .unwrap();
        assert_eq!(query, Query::Bool(BoolQuery::new()
            .with_must(term("big"))
            .with_must(term("blue"))));
    }

    #[test]
    fn test_and_not_keywords() {
        let query = parser().parse("pole AND emploi NOT agence").unwrap();
        assert_eq!(query, Query::Bool(BoolQuery::new()
            .with_must(term("pole"))
            .with_must(term("emploi"))
            .with_must_not(term("agence"))));
    }

    #[test]
    fn test_plus_minus_modifiers() {
        let query = parser().parse("+big -red blue").unwrap();
        assert_eq!(query, Query::Bool(BoolQuery::new()
            .with_must(term("big"))
            .with_should(term("blue"))
            .with_must_not(term("red"))));
    }

    #[test]
    fn test_phrase_with_slop_and_boost() {
        let query = parser().parse("\"Big Blue\"~2^3").unwrap();
        assert_eq!(query, Query::Phrase(PhraseQuery {
            terms: vec!["big".into(), "blue".into()],
            slop: 2,
            boost: Some(3.0),
        }));
    }

    #[test]
    fn test_multi_token_word_becomes_phrase() {
        let query = parser().parse("pôle-emploi").unwrap();
        assert_eq!(query, Query::Phrase(PhraseQuery {
            terms: vec!["pôle".into(), "emploi".into()],
            slop: 0,
            boost: None,
        }));
    }

    #[test]
    fn test_prefix_and_fuzzy() {
        assert_eq!(parser().parse("Emplo*").unwrap(), Query::Prefix(PrefixQuery {
            prefix: "emplo".into(),
            boost: None,
        }));
        assert_eq!(parser().parse("emploi~").unwrap(), Query::Fuzzy(FuzzyQuery {
            term: "emploi".into(),
            max_edits: 2,
            boost: None,
        }));
        assert_eq!(parser().parse("emploi~7").unwrap(), Query::Fuzzy(FuzzyQuery {
            term: "emploi".into(),
            max_edits: 2,
            boost: None,
        }));
    }

    #[test]
    fn test_group_boost() {
        let query = parser().parse("(big OR blue)^2").unwrap();
        assert_eq!(query, Query::Bool(BoolQuery {
            should: vec![term("big"), term("blue")],
            boost: Some(2.0),
            ..BoolQuery::default()
        }));
    }

    #[test]
    fn test_escaped_keyword_is_a_word() {
        assert_eq!(parser().parse("\\AND").unwrap(), term("and"));
    }

    #[test]
    fn test_blank_query_is_empty() {
        assert!(parser().parse("").unwrap().is_empty());
        assert!(parser().parse("   ").unwrap().is_empty());
        assert!(parser().parse("... ,,,").unwrap().is_empty());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |depth: usize| format!("{}a{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parser().parse(&nested(MAX_DEPTH)).unwrap(), term("a"));

        let err = parser().parse(&nested(3_000)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuerySyntax);
        assert!(err.context.contains("nested too deeply"));
    }

    #[test]
    fn test_syntax_errors() {
        let inputs = [
            "\"big blue",
            "(big blue",
            "big blue)",
            "AND blue",
            "big OR",
            "*big",
            "bi*g",
            "big~x",
            "big^",
            "big\\",
            "+",
            "big AND OR blue",
        ];
        for input in inputs {
            let err = parser().parse(input).unwrap_err();
            assert_eq!(err.kind, ErrorKind::QuerySyntax, "input {:?}", input);
            assert!(err.context.contains(input), "input {:?}", input);
        }
    }
}
