//! Document hash table: identity and liveness of every document in a segment.
//!
//! Fixed-width records indexed by document id, so a lookup is one slice and a
//! deletion rewrites a single flag byte in place.
//!
//! ```text
//! [u32 magic][u32 n][n * (u64 hash, u8 flags)]
//! ```

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentId;
use crate::lexical::core::segment::DocHashEntry;

const DOC_HASH_MAGIC: u32 = 0x4844_5354; // "TSDH"
const HEADER_LEN: usize = 8;
const RECORD_LEN: usize = 9;
const FLAG_OBSOLETE: u8 = 0x01;

/// Serialize entries; the entry at index `i` belongs to document `i`.
pub fn encode_table(entries: &[DocHashEntry]) -> Result<Vec<u8>> {
    let count = u32::try_from(entries.len())
        .map_err(|_| TesseraError::invalid_argument("too many documents for one segment"))?;

    let mut out = Vec::with_capacity(HEADER_LEN + entries.len() * RECORD_LEN);
    out.write_u32::<LittleEndian>(DOC_HASH_MAGIC)?;
    out.write_u32::<LittleEndian>(count)?;
    for entry in entries {
        out.write_u64::<LittleEndian>(entry.hash)?;
        out.write_u8(if entry.is_obsolete { FLAG_OBSOLETE } else { 0 })?;
    }
    Ok(out)
}

/// Number of documents recorded in a serialized table.
pub fn document_count(table: &[u8]) -> Result<u32> {
    check_header(table)?;
    Ok(LittleEndian::read_u32(&table[4..8]))
}

/// Look up one document.
pub fn read_entry(table: &[u8], document_id: DocumentId) -> Result<DocHashEntry> {
    let count = document_count(table)?;
    if document_id >= count {
        return Err(TesseraError::not_found(format!(
            "document {document_id} (segment holds {count})"
        )));
    }

    let start = record_offset(document_id);
    let record = table
        .get(start..start + RECORD_LEN)
        .ok_or_else(|| TesseraError::index("document hash table truncated"))?;

    Ok(DocHashEntry {
        hash: LittleEndian::read_u64(&record[0..8]),
        is_obsolete: record[8] & FLAG_OBSOLETE != 0,
    })
}

/// Every document whose hash equals `hash`, obsolete or not.
pub fn find_by_hash(table: &[u8], hash: u64) -> Result<Vec<DocumentId>> {
    let count = document_count(table)?;
    let mut found = Vec::new();
    for document_id in 0..count {
        if read_entry(table, document_id)?.hash == hash {
            found.push(document_id);
        }
    }
    Ok(found)
}

/// Flag a document of a sealed segment as obsolete, in place.
///
/// Sessions that memory-map the table observe the change on their next read.
pub fn mark_obsolete<P: AsRef<Path>>(path: P, document_id: DocumentId) -> Result<()> {
    let bytes = std::fs::read(path.as_ref())?;
    let entry = read_entry(&bytes, document_id)?;
    if entry.is_obsolete {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path.as_ref())?;
    file.seek(SeekFrom::Start((record_offset(document_id) + 8) as u64))?;
    file.write_all(&[FLAG_OBSOLETE])?;
    file.sync_data()?;
    Ok(())
}

fn record_offset(document_id: DocumentId) -> usize {
    HEADER_LEN + document_id as usize * RECORD_LEN
}

fn check_header(table: &[u8]) -> Result<()> {
    if table.len() < HEADER_LEN || LittleEndian::read_u32(&table[0..4]) != DOC_HASH_MAGIC {
        return Err(TesseraError::index("not a document hash table"));
    }
    Ok(())
}
