//! Lexical retrieval over segmented inverted indexes.
//!
//! # Module Structure
//!
//! - `core`: Core data structures (postings, terms, segment metadata)
//! - `index`: Sealed segment files (postings codec, term trie, document hashes, directory)
//! - `session`: Read sessions over one segment, local or remote
//! - `score`: Document score algebra
//! - `query`: Pre-parsed query trees
//! - `search`: Proximity scoring, evaluation, resolution and the searcher

pub mod core;
pub mod index;
pub mod query;
pub mod score;
pub mod search;
pub mod session;

// Re-exports
pub use self::core::posting::{DocumentId, DocumentPosting};
pub use self::core::segment::{CompressionMode, DocHashEntry, SegmentInfo, SegmentVersion};
pub use self::core::term::{BlockInfo, PostingsAddress, Term, Word};
pub use index::directory::{DirectoryStatus, IndexDirectory};
pub use index::segment::SegmentBuilder;
pub use query::{BooleanClause, BooleanQuery, MatchMode, Occur, PhraseQuery, QueryNode, TermQuery};
pub use score::DocumentScore;
pub use search::searcher::{SearchHit, SearchResults, Searcher};
pub use session::{
    AddressRow, LocalReadSession, ReadSession, RemoteReadSession, SessionServer, open_sessions,
};
