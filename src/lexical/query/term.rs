//! Single-token queries.

use serde::{Deserialize, Serialize};

use crate::config::FuzzyConfig;
use crate::error::{Result, TesseraError};

/// How a query token is matched against the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchMode {
    /// The token itself.
    #[default]
    Exact,
    /// Every dictionary token beginning with the query token.
    Prefix,
    /// Every dictionary token within an edit budget of the query token.
    Fuzzy {
        /// Explicit budget; `None` derives it from the token length.
        #[serde(default)]
        edits: Option<u32>,
    },
}

impl MatchMode {
    /// Fuzzy matching with the configured length-based budget.
    pub fn fuzzy() -> Self {
        MatchMode::Fuzzy { edits: None }
    }

    /// Fuzzy matching with a fixed budget.
    pub fn fuzzy_with_edits(edits: u32) -> Self {
        MatchMode::Fuzzy { edits: Some(edits) }
    }

    /// Edit budget for `token`, or `None` when the mode is not fuzzy.
    pub fn edits_for(&self, token: &str, fuzzy: &FuzzyConfig) -> Option<u32> {
        match self {
            MatchMode::Fuzzy { edits: Some(edits) } => Some(*edits),
            MatchMode::Fuzzy { edits: None } => Some(fuzzy.edits_for(token)),
            MatchMode::Exact | MatchMode::Prefix => None,
        }
    }
}

/// One token in one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermQuery {
    /// Field to search.
    pub field: String,
    /// Token to match.
    pub token: String,
    /// Matching mode.
    #[serde(default)]
    pub mode: MatchMode,
}

impl TermQuery {
    /// Exact match of `token` in `field`.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, token: T) -> Self {
        TermQuery {
            field: field.into(),
            token: token.into(),
            mode: MatchMode::Exact,
        }
    }

    /// Match every token starting with this one.
    pub fn prefix(mut self) -> Self {
        self.mode = MatchMode::Prefix;
        self
    }

    /// Match tokens within the configured edit budget.
    pub fn fuzzy(mut self) -> Self {
        self.mode = MatchMode::fuzzy();
        self
    }

    /// Match tokens within `edits` edits.
    pub fn max_edits(mut self, edits: u32) -> Self {
        self.mode = MatchMode::fuzzy_with_edits(edits);
        self
    }

    /// Reject empty fields and tokens.
    pub fn validate(&self) -> Result<()> {
        if self.field.is_empty() {
            return Err(TesseraError::invalid_query("term query without a field"));
        }
        if self.token.is_empty() {
            return Err(TesseraError::invalid_query(format!(
                "empty token in field '{}'",
                self.field
            )));
        }
        Ok(())
    }
}
