//! File-backed read session.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use memmap2::Mmap;

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::{DocumentId, DocumentPosting, merge_sorted};
use crate::lexical::core::segment::{DocHashEntry, SegmentInfo};
use crate::lexical::core::term::{BlockInfo, Word};
use crate::lexical::index::doc_hash;
use crate::lexical::index::postings::{decode_block, slice_block};
use crate::lexical::index::segment::{self, DOC_HASH_FILE, POSTINGS_FILE};
use crate::lexical::index::trie::TermTrie;
use crate::lexical::session::{AddressRow, PositionsRow, ReadSession};

/// A decoded block, or the reason it could not be decoded.
type Decoded = std::result::Result<Arc<Vec<DocumentPosting>>, String>;

/// Read session over a segment directory on the local file system.
///
/// Term dictionaries are parsed once at open time. The postings store and the
/// document hash table are memory-mapped, so a deletion that rewrites an
/// obsolete flag in place is visible to later reads.
#[derive(Debug)]
pub struct LocalReadSession {
    path: PathBuf,
    info: SegmentInfo,
    tries: AHashMap<String, TermTrie>,
    postings: Option<Mmap>,
    doc_hashes: Option<Mmap>,
}

impl LocalReadSession {
    /// Open the segment at `segment_dir`, reading its `info.json`.
    pub fn open<P: AsRef<Path>>(segment_dir: P) -> Result<Self> {
        let info = segment::read_info(segment_dir.as_ref())?;
        Self::open_with_info(segment_dir.as_ref(), info)
    }

    /// Open the segment at `segment_dir` with already-read metadata.
    pub fn open_with_info(segment_dir: &Path, info: SegmentInfo) -> Result<Self> {
        let mut tries = AHashMap::with_capacity(info.fields.len());
        for field in &info.fields {
            let bytes = std::fs::read(segment::trie_path(segment_dir, field))?;
            tries.insert(field.clone(), TermTrie::from_bytes(&bytes)?);
        }

        let postings = map_file(&segment_dir.join(POSTINGS_FILE))?;
        let doc_hashes = map_file(&segment_dir.join(DOC_HASH_FILE))?;
        if let Some(table) = &doc_hashes {
            let count = doc_hash::document_count(table)?;
            if count != info.document_count {
                return Err(TesseraError::index(format!(
                    "segment {} lists {} documents but its hash table holds {count}",
                    info.version, info.document_count
                )));
            }
        }

        Ok(LocalReadSession {
            path: segment_dir.to_path_buf(),
            info,
            tries,
            postings,
            doc_hashes,
        })
    }

    /// Directory of the wrapped segment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn trie(&self, field: &str) -> Option<&TermTrie> {
        self.tries.get(field)
    }

    fn postings_store(&self) -> &[u8] {
        self.postings.as_deref().unwrap_or(&[])
    }

    fn doc_hash_table(&self) -> &[u8] {
        self.doc_hashes.as_deref().unwrap_or(&[])
    }
}

/// Map `path` read-only. Empty files are not mapped.
fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // SAFETY: sealed segment files are never truncated or rewritten while
    // live; the only in-place write flips a flag byte in the hash table.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Some(mmap))
}

impl ReadSession for LocalReadSession {
    fn info(&self) -> &SegmentInfo {
        &self.info
    }

    fn is_word(&self, field: &str, token: &str) -> Result<Option<Word>> {
        match self.trie(field) {
            Some(trie) => trie.is_word(token),
            None => Ok(None),
        }
    }

    fn starts_with(&self, field: &str, prefix: &str) -> Result<Vec<Word>> {
        match self.trie(field) {
            Some(trie) => trie.starts_with(prefix),
            None => Ok(Vec::new()),
        }
    }

    fn semantically_near(&self, field: &str, token: &str, max_edits: u32) -> Result<Vec<Word>> {
        match self.trie(field) {
            Some(trie) => trie.semantically_near(token, max_edits),
            None => Ok(Vec::new()),
        }
    }

    fn read_positions(&self, rows: &[AddressRow]) -> Result<Vec<PositionsRow>> {
        let store = self.postings_store();
        // A block shared by several rows (overlapping fuzzy and prefix
        // matches) is decoded once per call.
        let mut cache: AHashMap<(&str, BlockInfo), Decoded> = AHashMap::new();

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let field: Arc<str> = Arc::from(row.field.as_str());
            let mut lists = Vec::with_capacity(row.blocks.len());
            let mut failure = None;

            for &block in &row.blocks {
                let decoded = cache
                    .entry((row.field.as_str(), block))
                    .or_insert_with(|| {
                        slice_block(store, block)
                            .and_then(|bytes| decode_block(bytes, &field))
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    });
                match decoded {
                    Ok(postings) => lists.push(Vec::clone(postings)),
                    Err(message) => {
                        failure = Some(TesseraError::corrupt_block(format!(
                            "block {}+{} of field {}: {message}",
                            block.offset, block.length, row.field
                        )));
                        break;
                    }
                }
            }

            result.push(match failure {
                Some(error) => Err(error),
                None => Ok(merge_sorted(lists)),
            });
        }

        Ok(result)
    }

    fn read_doc_hash(&self, document_id: DocumentId) -> Result<DocHashEntry> {
        doc_hash::read_entry(self.doc_hash_table(), document_id)
    }
}
