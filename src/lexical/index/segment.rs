//! Sealed segment layout and the builder that produces it.
//!
//! A segment directory holds:
//!
//! ```text
//! seg-<version>/
//! ├── info.json        SegmentInfo
//! ├── postings.dat     addressed postings blocks
//! ├── dochash.dat      document hash table
//! └── <field>.trie     one term dictionary per field
//! ```
//!
//! Building segments belongs to ingestion; [`SegmentBuilder`] is the minimal
//! writer that seals the files the read path consumes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentId;
use crate::lexical::core::segment::{CompressionMode, DocHashEntry, SegmentInfo, SegmentVersion};
use crate::lexical::index::doc_hash;
use crate::lexical::index::postings::PostingsWriter;
use crate::lexical::index::trie::TermTrieBuilder;

/// Segment metadata file.
pub const SEGMENT_INFO_FILE: &str = "info.json";
/// Postings store file.
pub const POSTINGS_FILE: &str = "postings.dat";
/// Document hash table file.
pub const DOC_HASH_FILE: &str = "dochash.dat";
/// Extension of per-field term dictionaries.
pub const TRIE_EXTENSION: &str = "trie";

/// Directory name of the segment with `version`.
pub fn segment_dir_name(version: SegmentVersion) -> String {
    format!("seg-{}", version.0)
}

/// Path of the term dictionary for `field` inside `segment_dir`.
pub fn trie_path(segment_dir: &Path, field: &str) -> PathBuf {
    segment_dir.join(format!("{field}.{TRIE_EXTENSION}"))
}

/// Read a segment's metadata.
pub fn read_info(segment_dir: &Path) -> Result<SegmentInfo> {
    let bytes = std::fs::read(segment_dir.join(SEGMENT_INFO_FILE))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Field names become file names, so they are restricted to a safe alphabet.
pub fn validate_field_name(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(TesseraError::invalid_argument(format!(
            "field name '{field}' must be non-empty ASCII alphanumerics, '_' or '-'"
        )))
    }
}

/// Accumulates documents and term occurrences, then seals them as a segment.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    compression: CompressionMode,
    /// field -> token -> (document, position) occurrences
    terms: BTreeMap<String, BTreeMap<String, Vec<(DocumentId, u32)>>>,
    documents: Vec<DocHashEntry>,
}

impl SegmentBuilder {
    /// Create a builder using the default postings codec.
    pub fn new() -> Self {
        SegmentBuilder::default()
    }

    /// Choose the postings codec.
    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    /// Register a document by its cross-segment hash and return its id.
    pub fn add_document(&mut self, hash: u64) -> DocumentId {
        self.documents.push(DocHashEntry::live(hash));
        (self.documents.len() - 1) as DocumentId
    }

    /// Record that `token` occurs in `field` of `document_id` at `position`.
    pub fn add_occurrence(
        &mut self,
        document_id: DocumentId,
        field: &str,
        token: &str,
        position: u32,
    ) -> Result<()> {
        validate_field_name(field)?;
        self.check_document(document_id)?;
        self.terms
            .entry(field.to_string())
            .or_default()
            .entry(token.to_string())
            .or_default()
            .push((document_id, position));
        Ok(())
    }

    /// Index whitespace-separated, lowercased tokens of `text` at consecutive
    /// positions starting from zero.
    pub fn add_text(&mut self, document_id: DocumentId, field: &str, text: &str) -> Result<()> {
        for (position, token) in text.split_whitespace().enumerate() {
            self.add_occurrence(document_id, field, &token.to_lowercase(), position as u32)?;
        }
        Ok(())
    }

    /// Seal the document as deleted.
    pub fn mark_obsolete(&mut self, document_id: DocumentId) -> Result<()> {
        self.check_document(document_id)?;
        self.documents[document_id as usize].is_obsolete = true;
        Ok(())
    }

    /// Number of registered documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Write the segment files into `segment_dir` (created if missing).
    pub fn seal(self, segment_dir: &Path, version: SegmentVersion) -> Result<SegmentInfo> {
        std::fs::create_dir_all(segment_dir)?;

        let mut postings = PostingsWriter::new(self.compression);
        let mut fields = Vec::with_capacity(self.terms.len());

        for (field, tokens) in self.terms {
            let mut trie = TermTrieBuilder::new();
            for (token, mut occurrences) in tokens {
                occurrences.sort_unstable();
                occurrences.dedup();
                let address = postings.append(&occurrences)?;
                trie.insert(token, address);
            }
            std::fs::write(trie_path(segment_dir, &field), trie.build()?)?;
            fields.push(field);
        }

        std::fs::write(segment_dir.join(POSTINGS_FILE), postings.into_bytes())?;
        std::fs::write(
            segment_dir.join(DOC_HASH_FILE),
            doc_hash::encode_table(&self.documents)?,
        )?;

        let info = SegmentInfo {
            version,
            document_count: self.documents.len() as u32,
            compression: self.compression,
            fields,
            created_at: Utc::now(),
        };
        std::fs::write(
            segment_dir.join(SEGMENT_INFO_FILE),
            serde_json::to_vec_pretty(&info)?,
        )?;

        Ok(info)
    }

    fn check_document(&self, document_id: DocumentId) -> Result<()> {
        if (document_id as usize) < self.documents.len() {
            Ok(())
        } else {
            Err(TesseraError::invalid_argument(format!(
                "document {document_id} was never added"
            )))
        }
    }
}
