//! Addressed postings blocks.
//!
//! Every term's postings are written as one self-describing block inside the
//! segment's `postings.dat`. A [`BlockInfo`] is enough to slice the block out
//! and decode it, without scanning neighbouring blocks.
//!
//! ## Block layout
//!
//! ```text
//! [u8 codec][u32 count][u32 crc32(payload)][payload]
//! ```
//!
//! All integers are little endian. The payload depends on the codec:
//!
//! - `Plain`: `count` fixed-width `(u32 document_id, u32 position)` pairs.
//! - `DeltaVarint`: per posting a varint document delta followed by a varint
//!   position; the position is a delta from the previous position while the
//!   document stays the same and absolute when it changes.

use std::io::Write;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::{DocumentId, DocumentPosting};
use crate::lexical::core::segment::CompressionMode;
use crate::lexical::core::term::BlockInfo;
use crate::util::varint;

/// Size of the fixed block header in bytes.
pub const BLOCK_HEADER_LEN: usize = 9;

/// Encode sorted `(document_id, position)` pairs into one block.
///
/// The pairs must be ascending by document and, within a document, by position.
pub fn encode_block(mode: CompressionMode, postings: &[(DocumentId, u32)]) -> Result<Vec<u8>> {
    if postings.windows(2).any(|w| w[0] > w[1]) {
        return Err(TesseraError::invalid_argument(
            "postings must be sorted by document id and position",
        ));
    }

    let mut payload = Vec::with_capacity(postings.len() * 2);
    match mode {
        CompressionMode::Plain => {
            for &(doc, pos) in postings {
                payload.write_u32::<LittleEndian>(doc)?;
                payload.write_u32::<LittleEndian>(pos)?;
            }
        }
        CompressionMode::DeltaVarint => {
            let mut prev: Option<(DocumentId, u32)> = None;
            for &(doc, pos) in postings {
                match prev {
                    Some((prev_doc, prev_pos)) if prev_doc == doc => {
                        varint::write_u64(&mut payload, 0);
                        varint::write_u64(&mut payload, (pos - prev_pos) as u64);
                    }
                    Some((prev_doc, _)) => {
                        varint::write_u64(&mut payload, (doc - prev_doc) as u64);
                        varint::write_u64(&mut payload, pos as u64);
                    }
                    None => {
                        varint::write_u64(&mut payload, doc as u64);
                        varint::write_u64(&mut payload, pos as u64);
                    }
                }
                prev = Some((doc, pos));
            }
        }
    }

    let count = u32::try_from(postings.len())
        .map_err(|_| TesseraError::invalid_argument("too many postings for one block"))?;

    let mut block = Vec::with_capacity(BLOCK_HEADER_LEN + payload.len());
    block.write_u8(mode.codec_id())?;
    block.write_u32::<LittleEndian>(count)?;
    block.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    block.write_all(&payload)?;
    Ok(block)
}

/// Decode one block into postings for `field`.
///
/// Truncated or inconsistent blocks are rejected with
/// [`TesseraError::CorruptBlock`]; a partial list is never returned.
pub fn decode_block(block: &[u8], field: &Arc<str>) -> Result<Vec<DocumentPosting>> {
    if block.len() < BLOCK_HEADER_LEN {
        return Err(TesseraError::corrupt_block(format!(
            "block of {} bytes is shorter than its header",
            block.len()
        )));
    }

    let mode = CompressionMode::from_codec_id(block[0])
        .ok_or_else(|| TesseraError::corrupt_block(format!("unknown codec {}", block[0])))?;
    let count = LittleEndian::read_u32(&block[1..5]) as usize;
    let checksum = LittleEndian::read_u32(&block[5..9]);
    let payload = &block[BLOCK_HEADER_LEN..];

    if crc32fast::hash(payload) != checksum {
        return Err(TesseraError::corrupt_block("checksum mismatch"));
    }

    let mut postings = Vec::with_capacity(count.min(payload.len()));
    match mode {
        CompressionMode::Plain => {
            if payload.len() != count * 8 {
                return Err(TesseraError::corrupt_block(format!(
                    "expected {} payload bytes for {count} postings, found {}",
                    count * 8,
                    payload.len()
                )));
            }
            for chunk in payload.chunks_exact(8) {
                let doc = LittleEndian::read_u32(&chunk[0..4]);
                let pos = LittleEndian::read_u32(&chunk[4..8]);
                postings.push(DocumentPosting::new(doc, field.clone(), pos));
            }
            if !crate::lexical::core::posting::is_sorted(&postings) {
                return Err(TesseraError::corrupt_block("postings out of order"));
            }
        }
        CompressionMode::DeltaVarint => {
            let mut cursor = 0;
            let mut prev: Option<(DocumentId, u32)> = None;
            for _ in 0..count {
                let (doc_delta, read) = varint::read_u32(&payload[cursor..])?;
                cursor += read;
                let (pos_value, read) = varint::read_u32(&payload[cursor..])?;
                cursor += read;

                let (doc, pos) = match prev {
                    Some((prev_doc, prev_pos)) if doc_delta == 0 => {
                        (prev_doc, checked(prev_pos.checked_add(pos_value))?)
                    }
                    Some((prev_doc, _)) => (checked(prev_doc.checked_add(doc_delta))?, pos_value),
                    None => (doc_delta, pos_value),
                };
                postings.push(DocumentPosting::new(doc, field.clone(), pos));
                prev = Some((doc, pos));
            }
            if cursor != payload.len() {
                return Err(TesseraError::corrupt_block(format!(
                    "{} trailing bytes after {count} postings",
                    payload.len() - cursor
                )));
            }
        }
    }

    Ok(postings)
}

fn checked(value: Option<u32>) -> Result<u32> {
    value.ok_or_else(|| TesseraError::corrupt_block("delta overflows u32"))
}

/// Slice the bytes of `info` out of a postings store.
pub fn slice_block(store: &[u8], info: BlockInfo) -> Result<&[u8]> {
    let start = usize::try_from(info.offset)
        .map_err(|_| TesseraError::corrupt_block("block offset out of range"))?;
    let end = start
        .checked_add(info.length as usize)
        .filter(|&end| end <= store.len())
        .ok_or_else(|| {
            TesseraError::corrupt_block(format!(
                "block {}+{} lies beyond the {}-byte postings store",
                info.offset,
                info.length,
                store.len()
            ))
        })?;
    Ok(&store[start..end])
}

/// Appends encoded blocks to an in-memory postings store.
#[derive(Debug, Default)]
pub struct PostingsWriter {
    buffer: Vec<u8>,
    mode: CompressionMode,
}

impl PostingsWriter {
    /// Create a writer producing blocks in `mode`.
    pub fn new(mode: CompressionMode) -> Self {
        PostingsWriter {
            buffer: Vec::new(),
            mode,
        }
    }

    /// Encode and append one block, returning its address.
    pub fn append(&mut self, postings: &[(DocumentId, u32)]) -> Result<BlockInfo> {
        let block = encode_block(self.mode, postings)?;
        let length = u32::try_from(block.len())
            .map_err(|_| TesseraError::invalid_argument("postings block exceeds 4 GiB"))?;
        let info = BlockInfo::new(self.buffer.len() as u64, length);
        self.buffer.extend_from_slice(&block);
        Ok(info)
    }

    /// Finish and return the store bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Arc<str> {
        Arc::from("body")
    }

    fn pairs(postings: &[DocumentPosting]) -> Vec<(u32, u32)> {
        postings.iter().map(|p| (p.document_id, p.data)).collect()
    }

    #[test]
    fn test_both_codecs_decode_to_same_postings() {
        let input = vec![(0, 3), (0, 9), (4, 1), (70_000, 2), (70_000, 400)];
        for mode in [CompressionMode::Plain, CompressionMode::DeltaVarint] {
            let block = encode_block(mode, &input).unwrap();
            let decoded = decode_block(&block, &field()).unwrap();
            assert_eq!(pairs(&decoded), input);
            assert!(decoded.iter().all(|p| &*p.field == "body"));
        }
    }

    #[test]
    fn test_delta_is_smaller_than_plain() {
        let input: Vec<_> = (0..100).map(|d| (d, 1)).collect();
        let plain = encode_block(CompressionMode::Plain, &input).unwrap();
        let delta = encode_block(CompressionMode::DeltaVarint, &input).unwrap();
        assert!(delta.len() < plain.len());
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let result = encode_block(CompressionMode::Plain, &[(2, 0), (1, 0)]);
        assert!(matches!(result, Err(TesseraError::InvalidArgument(_))));
    }

    #[test]
    fn test_truncated_block_rejected() {
        let block = encode_block(CompressionMode::DeltaVarint, &[(1, 2), (3, 4)]).unwrap();
        for len in [0, 4, BLOCK_HEADER_LEN, block.len() - 1] {
            let result = decode_block(&block[..len], &field());
            assert!(
                matches!(result, Err(TesseraError::CorruptBlock(_))),
                "length {len} should be rejected"
            );
        }
    }

    #[test]
    fn test_flipped_payload_byte_rejected() {
        let mut block = encode_block(CompressionMode::Plain, &[(1, 2)]).unwrap();
        let last = block.len() - 1;
        block[last] ^= 0xFF;
        assert!(matches!(
            decode_block(&block, &field()),
            Err(TesseraError::CorruptBlock(_))
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut block = encode_block(CompressionMode::Plain, &[(1, 2)]).unwrap();
        block[1] = 2;
        assert!(decode_block(&block, &field()).is_err());
    }

    #[test]
    fn test_unknown_codec_rejected() {
        let mut block = encode_block(CompressionMode::Plain, &[(1, 2)]).unwrap();
        block[0] = 42;
        assert!(decode_block(&block, &field()).is_err());
    }

    #[test]
    fn test_writer_addresses_blocks() {
        let mut writer = PostingsWriter::new(CompressionMode::DeltaVarint);
        let first = writer.append(&[(0, 0)]).unwrap();
        let second = writer.append(&[(5, 1), (6, 2)]).unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, first.end());

        let store = writer.into_bytes();
        let decoded = decode_block(slice_block(&store, second).unwrap(), &field()).unwrap();
        assert_eq!(pairs(&decoded), vec![(5, 1), (6, 2)]);
    }

    #[test]
    fn test_out_of_range_address_rejected() {
        let store = vec![0u8; 16];
        assert!(slice_block(&store, BlockInfo::new(10, 10)).is_err());
        assert!(slice_block(&store, BlockInfo::new(u64::MAX, 1)).is_err());
    }
}
