//! Document scores and the algebra that combines them.
//!
//! Within one segment scores are combined by `document_id`; across segments by
//! `doc_hash` (see [`crate::lexical::search::resolver`]).
//!
//! Every combinator is pure: inputs are borrowed and a fresh list is returned,
//! so one score list can feed several combination chains. Inputs must be
//! ascending by `document_id`, with equal ids adjacent, and outputs keep that
//! order. The combinators walk both inputs with two cursors and never hash.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentId;
use crate::lexical::core::segment::SegmentVersion;

/// Relevance of one document in one segment, with the identity needed to
/// resolve it against other segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentScore {
    /// Segment-local document id.
    pub document_id: DocumentId,
    /// Cross-segment identity of the document.
    pub doc_hash: u64,
    /// Relevance.
    pub score: f64,
    /// Segment the score was computed in.
    pub segment_version: SegmentVersion,
}

impl DocumentScore {
    /// Create a score.
    pub fn new(
        document_id: DocumentId,
        doc_hash: u64,
        score: f64,
        segment_version: SegmentVersion,
    ) -> Self {
        DocumentScore {
            document_id,
            doc_hash,
            score,
            segment_version,
        }
    }

    /// A score whose document hash has not been read yet.
    pub fn unhashed(document_id: DocumentId, score: f64, segment_version: SegmentVersion) -> Self {
        DocumentScore::new(document_id, 0, score, segment_version)
    }

    /// The same score with its document hash attached.
    pub fn with_doc_hash(self, doc_hash: u64) -> Self {
        DocumentScore { doc_hash, ..self }
    }

    /// Sum of two scores for the same document.
    ///
    /// Adding scores of different documents is a bug in the caller and is
    /// reported as [`TesseraError::ScoreMismatch`].
    pub fn add(&self, other: &DocumentScore) -> Result<DocumentScore> {
        if self.document_id != other.document_id {
            return Err(TesseraError::ScoreMismatch {
                left: self.document_id,
                right: other.document_id,
            });
        }
        Ok(DocumentScore {
            score: self.score + other.score,
            ..*self
        })
    }
}

impl std::fmt::Display for DocumentScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "docid:{} score:{}", self.document_id, self.score)
    }
}

/// Splits a document-id-ordered list into runs of equal ids.
fn runs(scores: &[DocumentScore]) -> impl Iterator<Item = &[DocumentScore]> {
    scores.chunk_by(|a, b| a.document_id == b.document_id)
}

/// Adds up a run of scores for one document.
fn fold(run: &[DocumentScore]) -> Result<DocumentScore> {
    let (first, rest) = run
        .split_first()
        .ok_or_else(|| TesseraError::other("cannot fold an empty run"))?;
    rest.iter().try_fold(*first, |acc, s| acc.add(s))
}

fn single(run: &[DocumentScore], side: &str) -> Result<DocumentScore> {
    match run {
        [only] => Ok(*only),
        _ => Err(TesseraError::invalid_argument(format!(
            "document {} occurs {} times in the {side} phrase list",
            run[0].document_id,
            run.len()
        ))),
    }
}

fn debug_check_order(scores: &[DocumentScore]) {
    debug_assert!(
        scores.windows(2).all(|w| w[0].document_id <= w[1].document_id),
        "score list must be ascending by document id"
    );
}

/// Documents present in both lists.
///
/// Each surviving document's score is the sum of all of its entries in
/// `first` and all of its entries in `other`.
pub fn combine_and(first: &[DocumentScore], other: &[DocumentScore]) -> Result<Vec<DocumentScore>> {
    debug_check_order(first);
    debug_check_order(other);

    let mut result = Vec::new();
    let mut left = runs(first).peekable();
    let mut right = runs(other).peekable();

    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let (l_id, r_id) = (l[0].document_id, r[0].document_id);
        if l_id < r_id {
            left.next();
        } else if l_id > r_id {
            right.next();
        } else {
            let folded = fold(l)?;
            result.push(r.iter().try_fold(folded, |acc, s| acc.add(s))?);
            left.next();
            right.next();
        }
    }

    Ok(result)
}

/// Documents present in both phrase lists, scored as the sum of the two
/// matching entries.
///
/// Stricter than [`combine_and`]: each document may appear at most once per
/// side.
pub fn combine_and_phrase(
    first: &[DocumentScore],
    other: &[DocumentScore],
) -> Result<Vec<DocumentScore>> {
    debug_check_order(first);
    debug_check_order(other);

    let mut result = Vec::new();
    let mut left = runs(first).peekable();
    let mut right = runs(other).peekable();

    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let (l_id, r_id) = (l[0].document_id, r[0].document_id);
        if l_id < r_id {
            left.next();
        } else if l_id > r_id {
            right.next();
        } else {
            result.push(single(l, "first")?.add(&single(r, "other")?)?);
            left.next();
            right.next();
        }
    }

    Ok(result)
}

/// Union of both lists; every entry for a document is summed.
pub fn combine_or(first: &[DocumentScore], other: &[DocumentScore]) -> Result<Vec<DocumentScore>> {
    debug_check_order(first);
    debug_check_order(other);

    let mut result = Vec::with_capacity(first.len().max(other.len()));
    let mut left = runs(first).peekable();
    let mut right = runs(other).peekable();

    loop {
        match (left.peek(), right.peek()) {
            (Some(l), Some(r)) if l[0].document_id < r[0].document_id => {
                result.push(fold(l)?);
                left.next();
            }
            (Some(l), Some(r)) if l[0].document_id > r[0].document_id => {
                result.push(fold(r)?);
                right.next();
            }
            (Some(l), Some(r)) => {
                let folded = fold(l)?;
                result.push(r.iter().try_fold(folded, |acc, s| acc.add(s))?);
                left.next();
                right.next();
            }
            (Some(l), None) => {
                result.push(fold(l)?);
                left.next();
            }
            (None, Some(r)) => {
                result.push(fold(r)?);
                right.next();
            }
            (None, None) => break,
        }
    }

    Ok(result)
}

/// Union of two phrase lists. Scores of shared documents are summed.
pub fn combine_or_phrase(
    first: &[DocumentScore],
    other: &[DocumentScore],
) -> Result<Vec<DocumentScore>> {
    combine_or(first, other)
}

/// Entries of `source` whose document does not occur in `exclude`.
pub fn not(source: &[DocumentScore], exclude: &[DocumentScore]) -> Vec<DocumentScore> {
    debug_check_order(source);
    debug_check_order(exclude);

    let mut result = Vec::with_capacity(source.len());
    let mut cursor = 0;

    for score in source {
        while cursor < exclude.len() && exclude[cursor].document_id < score.document_id {
            cursor += 1;
        }
        if cursor < exclude.len() && exclude[cursor].document_id == score.document_id {
            continue;
        }
        result.push(*score);
    }

    result
}

/// Coalesce adjacent entries of the same document into one by addition.
pub fn sum(scores: &[DocumentScore]) -> Result<Vec<DocumentScore>> {
    runs(scores).map(fold).collect()
}

/// Intersect all lists with [`combine_and`].
///
/// No lists yield nothing; a single list is coalesced with [`sum`].
pub fn sum_all(lists: &[Vec<DocumentScore>]) -> Result<Vec<DocumentScore>> {
    match lists {
        [] => Ok(Vec::new()),
        [only] => sum(only),
        [first, rest @ ..] => rest
            .iter()
            .try_fold(first.clone(), |acc, list| combine_and(&acc, list)),
    }
}
