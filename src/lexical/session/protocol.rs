//! Wire format between [`RemoteReadSession`](super::RemoteReadSession) and
//! [`SessionServer`](super::SessionServer).
//!
//! Each message is one frame:
//!
//! ```text
//! [u32: length][json: Request | Response]
//! ```
//!
//! One request is answered by exactly one response on the same connection.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::{DocumentId, DocumentPosting};
use crate::lexical::core::segment::{DocHashEntry, SegmentInfo, SegmentVersion};
use crate::lexical::core::term::Word;
use crate::lexical::session::{AddressRow, PositionsRow};

/// Frames above this size are rejected before allocation.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// A call against the server. Every segment-scoped call names its segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Metadata of every live segment.
    ListSegments,
    IsWord {
        version: SegmentVersion,
        field: String,
        token: String,
    },
    StartsWith {
        version: SegmentVersion,
        field: String,
        prefix: String,
    },
    SemanticallyNear {
        version: SegmentVersion,
        field: String,
        token: String,
        max_edits: u32,
    },
    ReadPositions {
        version: SegmentVersion,
        rows: Vec<AddressRow>,
    },
    ReadDocHashes {
        version: SegmentVersion,
        ids: Vec<DocumentId>,
    },
}

/// One decoded row on the wire. Postings travel as `(document_id, data)`
/// pairs; the field is known from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRow {
    Postings(Vec<(DocumentId, u32)>),
    Corrupt(String),
}

impl WireRow {
    /// Encode a session row.
    pub fn from_row(row: &PositionsRow) -> Self {
        match row {
            Ok(postings) => {
                WireRow::Postings(postings.iter().map(|p| (p.document_id, p.data)).collect())
            }
            Err(e) => WireRow::Corrupt(e.to_string()),
        }
    }

    /// Decode into a session row for `field`.
    pub fn into_row(self, field: &str) -> PositionsRow {
        match self {
            WireRow::Postings(pairs) => {
                let field: std::sync::Arc<str> = field.into();
                Ok(pairs
                    .into_iter()
                    .map(|(doc, data)| DocumentPosting::new(doc, field.clone(), data))
                    .collect())
            }
            WireRow::Corrupt(message) => Err(TesseraError::CorruptBlock(message)),
        }
    }
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Response {
    Segments(Vec<SegmentInfo>),
    Word(Option<Word>),
    Words(Vec<Word>),
    Positions(Vec<WireRow>),
    DocHashes(Vec<DocHashEntry>),
    /// The call failed on the server.
    Error(String),
}

fn check_len(len: u32) -> Result<()> {
    if len > MAX_FRAME_LEN {
        return Err(TesseraError::remote(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN}-byte limit"
        )));
    }
    Ok(())
}

fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(message)?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| TesseraError::remote("message too large to frame"))?;
    check_len(len)?;
    Ok(bytes)
}

/// Write one frame to a blocking stream.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = encode(message)?;
    writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame from a blocking stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let len = reader.read_u32::<LittleEndian>()?;
    check_len(len)?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write one frame to an async stream.
pub async fn write_frame_async<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(message)?;
    writer.write_u32_le(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from an async stream. `Ok(None)` on a clean end of stream
/// before the length prefix.
pub async fn read_frame_async<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    check_len(len)?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
