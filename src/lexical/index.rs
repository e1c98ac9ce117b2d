//! On-disk structures of a sealed segment, as seen by the read path.

pub mod directory;
pub mod doc_hash;
pub mod postings;
pub mod segment;
pub mod trie;
