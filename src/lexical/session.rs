//! Read sessions: the scorer's only window onto segment data.
//!
//! A session wraps exactly one sealed segment. Every method is read-only and
//! may be called concurrently from several query evaluations. Two backends
//! share the [`ReadSession`] contract: [`local::LocalReadSession`] maps the
//! segment files, [`remote::RemoteReadSession`] asks a
//! [`server::SessionServer`] over TCP.

pub mod local;
pub mod protocol;
pub mod remote;
pub mod server;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::lexical::core::posting::{DocumentId, DocumentPosting};
use crate::lexical::core::segment::{DocHashEntry, SegmentInfo, SegmentVersion};
use crate::lexical::core::term::{BlockInfo, Word};
use crate::lexical::index::directory::IndexDirectory;

pub use local::LocalReadSession;
pub use remote::RemoteReadSession;
pub use server::SessionServer;

/// The postings blocks matched by one query token in one field.
///
/// A fuzzy or prefix token fans out over several dictionary entries; their
/// blocks are decoded and merged into a single sorted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRow {
    /// Field the blocks were looked up in.
    pub field: String,
    /// Blocks to decode.
    pub blocks: Vec<BlockInfo>,
}

impl AddressRow {
    /// Create a row.
    pub fn new<S: Into<String>>(field: S, blocks: Vec<BlockInfo>) -> Self {
        AddressRow {
            field: field.into(),
            blocks,
        }
    }

    /// Row of the addresses resolved for `words`. Unresolved words are skipped.
    pub fn from_words<S: Into<String>>(field: S, words: &[Word]) -> Self {
        AddressRow::new(
            field,
            words.iter().filter_map(|w| w.postings_address).collect(),
        )
    }
}

/// Decoded postings of one [`AddressRow`].
///
/// An `Err` means one of the row's blocks is corrupt; the row as a whole is
/// then unusable, while the other rows of the same call are unaffected.
pub type PositionsRow = Result<Vec<DocumentPosting>>;

/// Read access to one segment.
pub trait ReadSession: Send + Sync + std::fmt::Debug {
    /// Metadata of the wrapped segment.
    fn info(&self) -> &SegmentInfo;

    /// Version of the wrapped segment.
    fn version(&self) -> SegmentVersion {
        self.info().version
    }

    /// Exact dictionary lookup. A field the segment never indexed yields `None`.
    fn is_word(&self, field: &str, token: &str) -> Result<Option<Word>>;

    /// Every dictionary entry of `field` starting with `prefix`.
    fn starts_with(&self, field: &str, prefix: &str) -> Result<Vec<Word>>;

    /// Every dictionary entry of `field` within `max_edits` edits of `token`.
    fn semantically_near(&self, field: &str, token: &str, max_edits: u32) -> Result<Vec<Word>>;

    /// Decode each row's blocks and merge them into one list sorted by
    /// `(document_id, data)`.
    ///
    /// The outer `Err` reports a session failure (I/O, network); corrupt
    /// blocks are reported per row.
    fn read_positions(&self, rows: &[AddressRow]) -> Result<Vec<PositionsRow>>;

    /// Identity and liveness of one document.
    fn read_doc_hash(&self, document_id: DocumentId) -> Result<DocHashEntry>;

    /// Identity and liveness of several documents, in the order asked.
    fn read_doc_hashes(&self, document_ids: &[DocumentId]) -> Result<Vec<DocHashEntry>> {
        document_ids
            .iter()
            .map(|&id| self.read_doc_hash(id))
            .collect()
    }
}

/// Open one session per live segment of the index at `root`, oldest first.
pub fn open_sessions(root: &Path, config: &SessionConfig) -> Result<Vec<Arc<dyn ReadSession>>> {
    match config {
        SessionConfig::Local => {
            let directory = IndexDirectory::open(root)?;
            directory
                .live_segments()?
                .into_iter()
                .map(|info| {
                    let path = directory.segment_path(info.version);
                    let session = LocalReadSession::open_with_info(&path, info)?;
                    Ok(Arc::new(session) as Arc<dyn ReadSession>)
                })
                .collect()
        }
        SessionConfig::Remote {
            address,
            timeout_ms,
        } => Ok(
            remote::connect_all(address, Duration::from_millis(*timeout_ms))?
                .into_iter()
                .map(|session| Arc::new(session) as Arc<dyn ReadSession>)
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::index::segment::SegmentBuilder;

    #[test]
    fn test_address_row_skips_unresolved_words() {
        let words = vec![
            Word::resolved("quick", BlockInfo::new(0, 20)),
            Word::new("quack"),
            Word::resolved("quirk", BlockInfo::new(20, 17)),
        ];
        let row = AddressRow::from_words("body", &words);
        assert_eq!(row.field, "body");
        assert_eq!(row.blocks, vec![BlockInfo::new(0, 20), BlockInfo::new(20, 17)]);
    }

    #[test]
    fn test_open_local_sessions_follows_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexDirectory::open(dir.path()).unwrap();
        for text in ["alpha beta", "beta gamma"] {
            let mut builder = SegmentBuilder::new();
            let doc = builder.add_document(text.len() as u64);
            builder.add_text(doc, "body", text).unwrap();
            index.commit(builder).unwrap();
        }

        let sessions = open_sessions(dir.path(), &SessionConfig::Local).unwrap();
        let versions: Vec<_> = sessions.iter().map(|s| s.version()).collect();
        assert_eq!(versions, vec![SegmentVersion(1), SegmentVersion(2)]);
        assert!(sessions[0].is_word("body", "alpha").unwrap().is_some());
        assert!(sessions[1].is_word("body", "alpha").unwrap().is_none());
    }
}
