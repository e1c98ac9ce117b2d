//! Boolean query combining sub-queries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::lexical::query::QueryNode;

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

/// A clause in a boolean query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanClause {
    /// The query for this clause.
    pub query: QueryNode,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new<Q: Into<QueryNode>>(query: Q, occur: Occur) -> Self {
        BooleanClause {
            query: query.into(),
            occur,
        }
    }

    /// Create a MUST clause.
    pub fn must<Q: Into<QueryNode>>(query: Q) -> Self {
        BooleanClause::new(query, Occur::Must)
    }

    /// Create a SHOULD clause.
    pub fn should<Q: Into<QueryNode>>(query: Q) -> Self {
        BooleanClause::new(query, Occur::Should)
    }

    /// Create a MUST_NOT clause.
    pub fn must_not<Q: Into<QueryNode>>(query: Q) -> Self {
        BooleanClause::new(query, Occur::MustNot)
    }
}

/// AND/OR/NOT over sub-queries.
///
/// Must clauses are intersected, should clauses are unioned (or, next to must
/// clauses, only add to documents the must clauses matched), and must-not
/// clauses remove documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanQuery {
    /// The clauses in this boolean query.
    pub clauses: Vec<BooleanClause>,
}

impl BooleanQuery {
    /// Create a new empty boolean query.
    pub fn new() -> Self {
        BooleanQuery::default()
    }

    /// Add a clause to this boolean query.
    pub fn add_clause(&mut self, clause: BooleanClause) {
        self.clauses.push(clause);
    }

    /// Add a MUST clause.
    pub fn add_must<Q: Into<QueryNode>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::must(query));
    }

    /// Add a SHOULD clause.
    pub fn add_should<Q: Into<QueryNode>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::should(query));
    }

    /// Add a MUST_NOT clause.
    pub fn add_must_not<Q: Into<QueryNode>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::must_not(query));
    }

    /// Builder form of [`BooleanQuery::add_must`].
    pub fn must<Q: Into<QueryNode>>(mut self, query: Q) -> Self {
        self.add_must(query);
        self
    }

    /// Builder form of [`BooleanQuery::add_should`].
    pub fn should<Q: Into<QueryNode>>(mut self, query: Q) -> Self {
        self.add_should(query);
        self
    }

    /// Builder form of [`BooleanQuery::add_must_not`].
    pub fn must_not<Q: Into<QueryNode>>(mut self, query: Q) -> Self {
        self.add_must_not(query);
        self
    }

    /// Clauses with the given occurrence, in insertion order.
    pub fn clauses_with(&self, occur: Occur) -> impl Iterator<Item = &QueryNode> {
        self.clauses
            .iter()
            .filter(move |c| c.occur == occur)
            .map(|c| &c.query)
    }

    /// Reject empty queries and queries with nothing but exclusions.
    pub fn validate(&self) -> Result<()> {
        if self.clauses.is_empty() {
            return Err(TesseraError::invalid_query("boolean query without clauses"));
        }
        if self.clauses.iter().all(|c| c.occur == Occur::MustNot) {
            return Err(TesseraError::invalid_query(
                "boolean query needs at least one must or should clause",
            ));
        }
        self.clauses.iter().try_for_each(|c| c.query.validate())
    }
}
