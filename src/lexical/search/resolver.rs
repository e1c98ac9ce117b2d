//! Cross-segment resolution.
//!
//! A logical document may live in several segments under different local ids.
//! Scores from every segment are merged by `doc_hash`; when the same document
//! was scored in more than one segment only the newest segment's score
//! survives. The merged list is ranked and paged.

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::error::{Result, TesseraError};
use crate::lexical::score::DocumentScore;

/// The newer of two scores for the same document.
///
/// On equal segment versions `incumbent` wins. Scores of different documents
/// are rejected with [`TesseraError::HashMismatch`].
pub fn take_latest_version(
    incumbent: &DocumentScore,
    challenger: &DocumentScore,
) -> Result<DocumentScore> {
    if incumbent.doc_hash != challenger.doc_hash {
        return Err(TesseraError::HashMismatch {
            left: incumbent.doc_hash,
            right: challenger.doc_hash,
        });
    }
    if challenger.segment_version > incumbent.segment_version {
        Ok(*challenger)
    } else {
        Ok(*incumbent)
    }
}

/// Deduplicates scores by `doc_hash` as segment lists are folded in.
#[derive(Debug, Default)]
pub struct LatestVersions {
    by_hash: AHashMap<u64, DocumentScore>,
}

impl LatestVersions {
    /// An empty set.
    pub fn new() -> Self {
        LatestVersions::default()
    }

    /// Fold one segment's scores in. Earlier entries are incumbents.
    pub fn merge(&mut self, scores: &[DocumentScore]) -> Result<()> {
        self.by_hash.reserve(scores.len());
        for score in scores {
            match self.by_hash.get_mut(&score.doc_hash) {
                Some(existing) => *existing = take_latest_version(existing, score)?,
                None => {
                    self.by_hash.insert(score.doc_hash, *score);
                }
            }
        }
        Ok(())
    }

    /// Number of distinct documents.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Whether no document has been merged.
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Every surviving score, best first.
    pub fn into_ranked(self) -> Vec<DocumentScore> {
        let mut scores: Vec<_> = self.by_hash.into_values().collect();
        scores.sort_unstable_by(rank);
        scores
    }
}

/// Merge two score lists by `doc_hash`, keeping the newest version of every
/// document. `first` holds the incumbents.
pub fn merge_latest(first: &[DocumentScore], other: &[DocumentScore]) -> Result<Vec<DocumentScore>> {
    let mut latest = LatestVersions::new();
    latest.merge(first)?;
    latest.merge(other)?;
    Ok(latest.into_ranked())
}

/// Descending score, then ascending `doc_hash`.
pub fn rank(a: &DocumentScore, b: &DocumentScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.doc_hash.cmp(&b.doc_hash))
}

/// One page of resolved scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPage {
    /// Scores of the page, best first.
    pub scores: Vec<DocumentScore>,
    /// Distinct documents across all segments, before paging.
    pub total: usize,
}

/// Resolve per-segment lists into one ranked page.
///
/// Lists are folded in the order given, so pass them oldest segment first for
/// the incumbent rule to favour the earliest list on version ties.
pub fn sort_by_score_and_take_latest_version(
    lists: &[Vec<DocumentScore>],
    skip: usize,
    size: usize,
) -> Result<ResolvedPage> {
    if lists.is_empty() {
        return Ok(ResolvedPage::default());
    }

    let mut latest = LatestVersions::new();
    for list in lists {
        latest.merge(list)?;
    }

    let total = latest.len();
    let scores = latest
        .into_ranked()
        .into_iter()
        .skip(skip)
        .take(size)
        .collect();

    Ok(ResolvedPage { scores, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::core::segment::SegmentVersion;

    fn score(document_id: u32, doc_hash: u64, score: f64, version: u64) -> DocumentScore {
        DocumentScore::new(document_id, doc_hash, score, SegmentVersion(version))
    }

    #[test]
    fn test_newer_segment_wins() {
        let old = score(0, 7, 0.4, 1);
        let new = score(3, 7, 0.9, 2);
        assert_eq!(take_latest_version(&old, &new).unwrap(), new);
        assert_eq!(take_latest_version(&new, &old).unwrap(), new);
    }

    #[test]
    fn test_equal_versions_keep_incumbent() {
        let first = score(0, 7, 0.4, 1);
        let second = score(5, 7, 0.9, 1);
        assert_eq!(take_latest_version(&first, &second).unwrap(), first);
    }

    #[test]
    fn test_different_documents_are_a_contract_violation() {
        let result = take_latest_version(&score(0, 7, 0.4, 1), &score(0, 8, 0.4, 1));
        assert!(matches!(
            result,
            Err(TesseraError::HashMismatch { left: 7, right: 8 })
        ));
    }

    #[test]
    fn test_merge_with_itself_is_idempotent() {
        let list = vec![score(0, 1, 0.5, 3), score(1, 2, 0.25, 3), score(2, 3, 0.75, 3)];
        let merged = merge_latest(&list, &list).unwrap();
        let mut expected = list.clone();
        expected.sort_by(rank);
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_same_document_across_segments_resolves_to_newest() {
        let s1 = vec![score(0, 0xABCD, 0.4, 1)];
        let s2 = vec![score(12, 0xABCD, 0.9, 2)];
        let page = sort_by_score_and_take_latest_version(&[s1, s2], 0, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.scores, vec![score(12, 0xABCD, 0.9, 2)]);
    }

    #[test]
    fn test_paging_keeps_total() {
        let list: Vec<_> = (0..5u32)
            .map(|i| score(i, i as u64, i as f64, 1))
            .collect();
        let lists = [list];

        let first = sort_by_score_and_take_latest_version(&lists, 0, 2).unwrap();
        let hashes: Vec<_> = first.scores.iter().map(|s| s.doc_hash).collect();
        assert_eq!(hashes, vec![4, 3]);
        assert_eq!(first.total, 5);

        let second = sort_by_score_and_take_latest_version(&lists, 2, 2).unwrap();
        let hashes: Vec<_> = second.scores.iter().map(|s| s.doc_hash).collect();
        assert_eq!(hashes, vec![2, 1]);
        assert_eq!(second.total, 5);

        let past_end = sort_by_score_and_take_latest_version(&lists, 4, 2).unwrap();
        assert_eq!(past_end.scores.len(), 1);
        assert_eq!(past_end.total, 5);
    }

    #[test]
    fn test_ties_are_broken_by_hash() {
        let list = vec![score(0, 9, 1.0, 1), score(1, 4, 1.0, 1), score(2, 6, 1.0, 1)];
        let page = sort_by_score_and_take_latest_version(&[list], 0, 3).unwrap();
        let hashes: Vec<_> = page.scores.iter().map(|s| s.doc_hash).collect();
        assert_eq!(hashes, vec![4, 6, 9]);
    }

    #[test]
    fn test_no_segments_is_empty() {
        let page = sort_by_score_and_take_latest_version(&[], 0, 10).unwrap();
        assert_eq!(page, ResolvedPage::default());
        let page = sort_by_score_and_take_latest_version(&[Vec::new()], 0, 10).unwrap();
        assert_eq!(page.total, 0);
    }
}
