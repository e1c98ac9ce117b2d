//! Segment metadata and per-document liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Orders segments by recency: a higher version is a newer segment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SegmentVersion(pub u64);

impl std::fmt::Display for SegmentVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How postings blocks of a segment are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionMode {
    /// Fixed-width `(u32, u32)` records.
    Plain,
    /// Delta-encoded varints.
    #[default]
    DeltaVarint,
}

impl CompressionMode {
    /// Codec byte written into every block header.
    pub fn codec_id(self) -> u8 {
        match self {
            CompressionMode::Plain => 0,
            CompressionMode::DeltaVarint => 1,
        }
    }

    /// Inverse of [`CompressionMode::codec_id`].
    pub fn from_codec_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CompressionMode::Plain),
            1 => Some(CompressionMode::DeltaVarint),
            _ => None,
        }
    }
}

/// Immutable metadata of a sealed segment.
///
/// Only the version takes part in result resolution; none of it affects scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Recency of the segment.
    pub version: SegmentVersion,
    /// Number of documents in the segment, obsolete ones included.
    pub document_count: u32,
    /// Postings encoding.
    pub compression: CompressionMode,
    /// Fields that have a term dictionary in this segment.
    #[serde(default)]
    pub fields: Vec<String>,
    /// When the segment was sealed.
    pub created_at: DateTime<Utc>,
}

/// Liveness and identity of one document inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocHashEntry {
    /// Identity of the logical document across segments.
    pub hash: u64,
    /// Set once the document has been deleted or superseded.
    pub is_obsolete: bool,
}

impl DocHashEntry {
    /// A live document.
    pub fn live(hash: u64) -> Self {
        DocHashEntry {
            hash,
            is_obsolete: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_id_roundtrip() {
        for mode in [CompressionMode::Plain, CompressionMode::DeltaVarint] {
            assert_eq!(CompressionMode::from_codec_id(mode.codec_id()), Some(mode));
        }
        assert_eq!(CompressionMode::from_codec_id(9), None);
    }

    #[test]
    fn test_version_ordering() {
        assert!(SegmentVersion(2) > SegmentVersion(1));
        assert_eq!(SegmentVersion(7).to_string(), "7");
    }
}
