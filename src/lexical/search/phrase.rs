//! Phrase and proximity scoring.
//!
//! A phrase of N tokens is scored by pairing every position of the first
//! token with positions of each following token in the same document. Pass
//! `p` pairs the first token with token `p + 1`; each pairing is worth
//! `1 / distance`, minus `ln(distance)` when the later token occurs before the
//! first one. A document scores only when one occurrence of the first token
//! found a partner in every pass.

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::lexical::core::posting::{DocumentId, DocumentPosting};
use crate::lexical::core::segment::{DocHashEntry, SegmentVersion};
use crate::lexical::score::DocumentScore;
use crate::observe::SearchObserver;

/// Score of each occurrence of a single-token phrase.
pub const SINGLE_TOKEN_WEIGHT: f64 = 1.0;

/// Proximity scorer for one segment.
#[derive(Debug, Clone)]
pub struct ProximityScorer {
    version: SegmentVersion,
    observer: Arc<dyn SearchObserver>,
}

impl ProximityScorer {
    /// Create a scorer producing scores for segment `version`.
    pub fn new(version: SegmentVersion, observer: Arc<dyn SearchObserver>) -> Self {
        ProximityScorer { version, observer }
    }

    /// Score a phrase of `token_count` tokens given one sorted posting list per
    /// token, in phrase order.
    ///
    /// Returns unhashed scores, ascending by document id with one entry per
    /// document. A token without postings, or fewer lists than tokens, means
    /// the phrase occurs nowhere.
    pub fn score(&self, postings: &[Vec<DocumentPosting>], token_count: usize) -> Vec<DocumentScore> {
        if token_count == 0 || postings.len() < token_count {
            return Vec::new();
        }
        let postings = &postings[..token_count];
        if postings.iter().any(Vec::is_empty) {
            return Vec::new();
        }

        if token_count == 1 {
            return self.score_single(&postings[0]);
        }

        let timer = Instant::now();
        let weights = self.weights(postings);
        let scores = self.sum_rows(&postings[0], &weights);
        self.observer
            .weights_scored(self.version, weights.len(), timer.elapsed());
        scores
    }

    fn score_single(&self, postings: &[DocumentPosting]) -> Vec<DocumentScore> {
        postings
            .chunk_by(|a, b| a.document_id == b.document_id)
            .map(|run| {
                DocumentScore::unhashed(
                    run[0].document_id,
                    SINGLE_TOKEN_WEIGHT * run.len() as f64,
                    self.version,
                )
            })
            .collect()
    }

    /// Weight matrix indexed by `[position in first list][pass]`.
    fn weights(&self, postings: &[Vec<DocumentPosting>]) -> Vec<Vec<Option<f64>>> {
        let passes = postings.len() - 1;
        let max_distance = passes as i64;
        let first = &postings[0];
        let mut weights = vec![vec![None; passes]; first.len()];

        for (pass, second) in postings[1..].iter().enumerate() {
            let matches = score_pass(first, second, max_distance, &mut weights, pass);
            self.observer.pass_completed(self.version, pass, matches);
        }

        weights
    }

    /// Sum complete rows; the best row of each document wins.
    fn sum_rows(&self, first: &[DocumentPosting], weights: &[Vec<Option<f64>>]) -> Vec<DocumentScore> {
        let mut scores: Vec<DocumentScore> = Vec::new();

        for (posting, row) in first.iter().zip(weights) {
            let Some(total) = row.iter().copied().sum::<Option<f64>>() else {
                continue;
            };
            match scores.last_mut() {
                Some(last) if last.document_id == posting.document_id => {
                    if total > last.score {
                        last.score = total;
                    }
                }
                _ => scores.push(DocumentScore::unhashed(
                    posting.document_id,
                    total,
                    self.version,
                )),
            }
        }

        scores
    }
}

/// Score of one pairing; `offset` is the later token's position minus the
/// first token's.
///
/// Only a negative offset, the later token occurring before the first, pays
/// the `ln(distance)` order penalty. In-order gaps score `1 / distance` alone.
pub fn pair_score(offset: i64) -> f64 {
    let distance = offset.unsigned_abs() as f64;
    let score = 1.0 / distance;
    if offset < 0 { score - distance.ln() } else { score }
}

/// Two-pointer merge of the first token's postings against one later token.
/// Returns the number of accepted pairings.
fn score_pass(
    first: &[DocumentPosting],
    second: &[DocumentPosting],
    max_distance: i64,
    weights: &mut [Vec<Option<f64>>],
    pass: usize,
) -> usize {
    let mut matches = 0;
    let (mut i, mut j) = (0, 0);

    while i < first.len() && j < second.len() {
        let (p1, p2) = (&first[i], &second[j]);
        if p1.document_id < p2.document_id {
            i += 1;
            continue;
        }
        if p1.document_id > p2.document_id {
            j += 1;
            continue;
        }

        let offset = p2.data as i64 - p1.data as i64;
        let distance = offset.abs();
        if distance == 0 {
            j += 1;
            continue;
        }
        if distance > max_distance {
            // Only a later occurrence of the first token can still reach
            // a partner that lies this far ahead.
            if offset > 0 {
                i += 1;
            } else {
                j += 1;
            }
            continue;
        }

        let score = pair_score(offset);
        let cell = &mut weights[i][pass];
        if cell.is_none_or(|best| best < score) {
            *cell = Some(score);
        }
        matches += 1;

        if distance == 1 {
            i += 1;
        } else {
            j += 1;
        }
    }

    matches
}

/// Attach document hashes and drop obsolete documents.
///
/// `entries[k]` must describe `scores[k].document_id`.
pub fn attach_doc_hashes(
    scores: Vec<DocumentScore>,
    entries: &[DocHashEntry],
) -> Vec<DocumentScore> {
    scores
        .into_iter()
        .zip(entries)
        .filter(|(_, entry)| !entry.is_obsolete)
        .map(|(score, entry)| score.with_doc_hash(entry.hash))
        .collect()
}

/// Document ids of `scores`, in order.
pub fn document_ids(scores: &[DocumentScore]) -> Vec<DocumentId> {
    scores.iter().map(|s| s.document_id).collect()
}

/// Resolve hashes for `scores` with `read`, keeping live documents only.
pub fn resolve_live<F>(scores: Vec<DocumentScore>, read: F) -> Result<Vec<DocumentScore>>
where
    F: FnOnce(&[DocumentId]) -> Result<Vec<DocHashEntry>>,
{
    if scores.is_empty() {
        return Ok(scores);
    }
    let entries = read(&document_ids(&scores))?;
    Ok(attach_doc_hashes(scores, &entries))
}
