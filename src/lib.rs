//! # Tessera
//!
//! Query-time retrieval and scoring over segmented inverted indexes.
//!
//! ## Features
//!
//! - Per-field term tries with exact, prefix and fuzzy lookup
//! - Checksummed, addressed postings blocks
//! - Phrase proximity scoring over positional postings
//! - Boolean AND/OR/NOT evaluation with a pure score algebra
//! - Cross-segment resolution: newest version of a document wins
//! - Local (memory-mapped) and remote (TCP) read sessions
pub mod cancel;
pub mod config;
mod error;
pub mod lexical;
pub mod observe;
mod util;

// Re-exports for the public API
pub use cancel::Cancellation;
pub use config::{FailurePolicy, FuzzyConfig, SearchConfig, SessionConfig};
pub use error::{Result, TesseraError};
pub use lexical::{
    BooleanQuery, IndexDirectory, MatchMode, PhraseQuery, QueryNode, SearchHit, SearchResults,
    Searcher, SegmentBuilder, TermQuery,
};
pub use observe::{LogObserver, NoopObserver, SearchObserver};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
