//! Evaluates a query tree against one segment.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::cancel::Cancellation;
use crate::config::FuzzyConfig;
use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentPosting;
use crate::lexical::core::term::Word;
use crate::lexical::query::{BooleanQuery, MatchMode, Occur, PhraseQuery, QueryNode};
use crate::lexical::score::{self, DocumentScore};
use crate::lexical::search::phrase::{self, ProximityScorer};
use crate::lexical::session::{AddressRow, ReadSession};
use crate::observe::SearchObserver;

/// Produces the live, hashed score list of one segment for a query tree.
///
/// Scores come out ascending by document id with one entry per document.
/// Every session call is preceded by a cancellation check.
#[derive(Debug)]
pub struct SegmentEvaluator<'a> {
    session: &'a dyn ReadSession,
    observer: Arc<dyn SearchObserver>,
    cancel: &'a Cancellation,
    fuzzy: FuzzyConfig,
    scorer: ProximityScorer,
}

impl<'a> SegmentEvaluator<'a> {
    /// Create an evaluator for `session`.
    pub fn new(
        session: &'a dyn ReadSession,
        observer: Arc<dyn SearchObserver>,
        cancel: &'a Cancellation,
        fuzzy: FuzzyConfig,
    ) -> Self {
        let scorer = ProximityScorer::new(session.version(), Arc::clone(&observer));
        SegmentEvaluator {
            session,
            observer,
            cancel,
            fuzzy,
            scorer,
        }
    }

    /// Score `query` in this segment.
    pub fn evaluate(&self, query: &QueryNode) -> Result<Vec<DocumentScore>> {
        self.cancel.check()?;
        match query {
            QueryNode::Term(term) => self.evaluate_phrase(&PhraseQuery::from(term.clone())),
            QueryNode::Phrase(phrase) => self.evaluate_phrase(phrase),
            QueryNode::Boolean(boolean) => self.evaluate_boolean(boolean),
        }
    }

    fn evaluate_phrase(&self, phrase: &PhraseQuery) -> Result<Vec<DocumentScore>> {
        let words: Vec<Vec<Word>> = phrase
            .tokens
            .par_iter()
            .map(|token| self.lookup(&phrase.field, token, phrase.mode))
            .collect::<Result<_>>()?;
        if words.iter().any(Vec::is_empty) {
            return Ok(Vec::new());
        }

        let rows: Vec<AddressRow> = words
            .iter()
            .map(|w| AddressRow::from_words(phrase.field.as_str(), w))
            .collect();
        self.cancel.check()?;
        let postings = match self.read_rows(&phrase.field, &rows)? {
            Some(postings) => postings,
            None => return Ok(Vec::new()),
        };

        let scores = self.scorer.score(&postings, phrase.tokens.len());
        self.cancel.check()?;
        phrase::resolve_live(scores, |ids| self.session.read_doc_hashes(ids))
    }

    fn lookup(&self, field: &str, token: &str, mode: MatchMode) -> Result<Vec<Word>> {
        self.cancel.check()?;
        let timer = Instant::now();
        let words: Vec<Word> = match mode {
            MatchMode::Exact => self.session.is_word(field, token)?.into_iter().collect(),
            MatchMode::Prefix => self.session.starts_with(field, token)?,
            MatchMode::Fuzzy { .. } => {
                let edits = mode.edits_for(token, &self.fuzzy).unwrap_or(0);
                self.session.semantically_near(field, token, edits)?
            }
        };
        self.observer.term_lookup(
            self.session.version(),
            field,
            token,
            words.len(),
            timer.elapsed(),
        );
        Ok(words)
    }

    /// Decoded rows, or `None` when a corrupt block leaves a token without
    /// postings.
    fn read_rows(
        &self,
        field: &str,
        rows: &[AddressRow],
    ) -> Result<Option<Vec<Vec<DocumentPosting>>>> {
        let mut postings = Vec::with_capacity(rows.len());
        let mut complete = true;
        for row in self.session.read_positions(rows)? {
            match row {
                Ok(list) => postings.push(list),
                Err(e @ TesseraError::CorruptBlock(_)) => {
                    self.observer.corrupt_block(self.session.version(), field, &e);
                    complete = false;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(complete.then_some(postings))
    }

    fn evaluate_boolean(&self, query: &BooleanQuery) -> Result<Vec<DocumentScore>> {
        let required = self.fold_clauses(
            query,
            Occur::Must,
            score::combine_and_phrase,
            score::combine_and,
        )?;
        let optional = self.fold_clauses(
            query,
            Occur::Should,
            score::combine_or_phrase,
            score::combine_or,
        )?;

        let mut result = match (required, optional) {
            (Some(required), Some(optional)) => {
                // Optional matches only add to documents the required clauses found.
                let union = score::combine_or(&required, &optional)?;
                score::not(&union, &score::not(&optional, &required))
            }
            (Some(required), None) => required,
            (None, Some(optional)) => optional,
            (None, None) => {
                return Err(TesseraError::invalid_query(
                    "boolean query needs at least one must or should clause",
                ));
            }
        };

        for excluded in query.clauses_with(Occur::MustNot) {
            if result.is_empty() {
                break;
            }
            result = score::not(&result, &self.evaluate(excluded)?);
        }

        Ok(result)
    }

    /// Fold the clauses with `occur`, using `phrase_op` while every clause so
    /// far is a phrase and `op` otherwise. `None` when there are no such clauses.
    fn fold_clauses(
        &self,
        query: &BooleanQuery,
        occur: Occur,
        phrase_op: fn(&[DocumentScore], &[DocumentScore]) -> Result<Vec<DocumentScore>>,
        op: fn(&[DocumentScore], &[DocumentScore]) -> Result<Vec<DocumentScore>>,
    ) -> Result<Option<Vec<DocumentScore>>> {
        let mut acc: Option<(Vec<DocumentScore>, bool)> = None;
        for clause in query.clauses_with(occur) {
            let scores = self.evaluate(clause)?;
            acc = Some(match acc {
                None => (scores, clause.is_phrase()),
                Some((acc, acc_is_phrase)) => {
                    let is_phrase = acc_is_phrase && clause.is_phrase();
                    let combine = if is_phrase { phrase_op } else { op };
                    (combine(&acc, &scores)?, is_phrase)
                }
            });
        }
        Ok(acc.map(|(scores, _)| scores))
    }
}
