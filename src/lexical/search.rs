//! Query evaluation: per-segment scoring and cross-segment resolution.
//!
//! - `phrase`: proximity scoring of ordered tokens
//! - `evaluator`: query tree evaluation against one segment
//! - `resolver`: deduplication by document hash, ranking and paging
//! - `searcher`: the entry point tying sessions, evaluation and resolution together

pub mod evaluator;
pub mod phrase;
pub mod resolver;
pub mod searcher;
