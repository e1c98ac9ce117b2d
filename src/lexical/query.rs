//! Pre-parsed query trees.
//!
//! There is no query language here; callers build a [`QueryNode`] tree
//! directly or deserialize one from JSON.

pub mod boolean;
pub mod phrase;
pub mod term;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use boolean::{BooleanClause, BooleanQuery, Occur};
pub use phrase::PhraseQuery;
pub use term::{MatchMode, TermQuery};

/// A node of a query tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryNode {
    Term(TermQuery),
    Phrase(PhraseQuery),
    Boolean(BooleanQuery),
}

impl QueryNode {
    /// Check the whole tree for structural errors.
    pub fn validate(&self) -> Result<()> {
        match self {
            QueryNode::Term(term) => term.validate(),
            QueryNode::Phrase(phrase) => phrase.validate(),
            QueryNode::Boolean(boolean) => boolean.validate(),
        }
    }

    /// Whether the node yields at most one score per document, so that the
    /// phrase combinators apply.
    pub fn is_phrase(&self) -> bool {
        matches!(self, QueryNode::Term(_) | QueryNode::Phrase(_))
    }
}

impl From<TermQuery> for QueryNode {
    fn from(query: TermQuery) -> Self {
        QueryNode::Term(query)
    }
}

impl From<PhraseQuery> for QueryNode {
    fn from(query: PhraseQuery) -> Self {
        QueryNode::Phrase(query)
    }
}

impl From<BooleanQuery> for QueryNode {
    fn from(query: BooleanQuery) -> Self {
        QueryNode::Boolean(query)
    }
}
