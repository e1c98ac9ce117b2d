//! Positional postings.

use std::cmp::Ordering;
use std::sync::Arc;

/// Segment-local document identifier.
pub type DocumentId = u32;

/// One occurrence of a term: the document it occurs in and its word offset
/// within the field.
///
/// Postings order by `(document_id, data)`; every merge in the scoring layer
/// relies on lists arriving in that order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPosting {
    /// Document the term occurs in.
    pub document_id: DocumentId,
    /// Field the occurrence belongs to.
    pub field: Arc<str>,
    /// Word position within the field.
    pub data: u32,
}

impl DocumentPosting {
    /// Create a new posting.
    pub fn new(document_id: DocumentId, field: Arc<str>, data: u32) -> Self {
        DocumentPosting {
            document_id,
            field,
            data,
        }
    }
}

impl Ord for DocumentPosting {
    fn cmp(&self, other: &Self) -> Ordering {
        self.document_id
            .cmp(&other.document_id)
            .then(self.data.cmp(&other.data))
            .then_with(|| self.field.cmp(&other.field))
    }
}

impl PartialOrd for DocumentPosting {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether `postings` is ascending by `(document_id, data)`.
pub fn is_sorted(postings: &[DocumentPosting]) -> bool {
    postings
        .windows(2)
        .all(|w| (w[0].document_id, w[0].data) <= (w[1].document_id, w[1].data))
}

/// Merge already-sorted posting lists into one sorted list.
///
/// Used when a fuzzy or prefix lookup fans one query token out over several
/// dictionary entries.
pub fn merge_sorted(mut lists: Vec<Vec<DocumentPosting>>) -> Vec<DocumentPosting> {
    match lists.len() {
        0 => Vec::new(),
        1 => lists.pop().unwrap_or_default(),
        _ => {
            let mut merged = lists.pop().unwrap_or_default();
            for list in lists {
                merged = merge_two(merged, list);
            }
            merged
        }
    }
}

fn merge_two(a: Vec<DocumentPosting>, b: Vec<DocumentPosting>) -> Vec<DocumentPosting> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l <= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        out.extend(next);
    }

    out
}
