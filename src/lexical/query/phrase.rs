//! Phrase queries: ordered tokens scored by proximity.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::lexical::query::term::{MatchMode, TermQuery};

/// An ordered sequence of tokens in one field.
///
/// Documents score higher the closer and the more in order the tokens occur.
/// The match mode applies to every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseQuery {
    /// Field to search.
    pub field: String,
    /// Tokens in phrase order.
    pub tokens: Vec<String>,
    /// Matching mode of each token.
    #[serde(default)]
    pub mode: MatchMode,
}

impl PhraseQuery {
    /// Exact-match phrase.
    pub fn new<F, I, T>(field: F, tokens: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        PhraseQuery {
            field: field.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            mode: MatchMode::Exact,
        }
    }

    /// Phrase of the whitespace-separated, lowercased tokens of `text`.
    pub fn from_text<F: Into<String>>(field: F, text: &str) -> Self {
        PhraseQuery::new(field, text.split_whitespace().map(str::to_lowercase))
    }

    /// Set the match mode of every token.
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject empty phrases, fields and tokens.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(TesseraError::invalid_query(format!(
                "phrase in field '{}' has no tokens",
                self.field
            )));
        }
        self.tokens.iter().try_for_each(|token| {
            TermQuery {
                field: self.field.clone(),
                token: token.clone(),
                mode: self.mode,
            }
            .validate()
        })
    }
}

impl From<TermQuery> for PhraseQuery {
    /// A term is a phrase of one token.
    fn from(term: TermQuery) -> Self {
        PhraseQuery {
            field: term.field,
            tokens: vec![term.token],
            mode: term.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_splits_and_lowercases() {
        let phrase = PhraseQuery::from_text("body", "Quick  Brown\tFox");
        assert_eq!(phrase.tokens, vec!["quick", "brown", "fox"]);
        assert!(phrase.validate().is_ok());
    }

    #[test]
    fn test_empty_phrase_is_invalid() {
        assert!(PhraseQuery::from_text("body", "   ").validate().is_err());
        assert!(PhraseQuery::new("body", ["a", ""]).validate().is_err());
    }

    #[test]
    fn test_term_converts_to_single_token_phrase() {
        let phrase = PhraseQuery::from(TermQuery::new("body", "fo").prefix());
        assert_eq!(phrase.tokens, vec!["fo"]);
        assert_eq!(phrase.mode, MatchMode::Prefix);
    }
}
