//! Index directory status: which sealed segments are live.
//!
//! `manifest.json` at the directory root lists live segment versions. Readers
//! only ever open segments the manifest names; a segment directory that is not
//! listed (half-written, or retired by a merge) is invisible.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::lexical::core::segment::{SegmentInfo, SegmentVersion};
use crate::lexical::index::doc_hash;
use crate::lexical::index::segment::{self, DOC_HASH_FILE, SegmentBuilder};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persistent list of live segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Live segment versions, ascending.
    pub segments: Vec<SegmentVersion>,
    /// Highest version ever assigned, so retired versions are never reused.
    #[serde(default)]
    pub last_version: u64,
}

/// Summary of an index directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStatus {
    /// Number of live segments.
    pub segments: usize,
    /// Documents across live segments, obsolete ones included.
    pub documents: u64,
}

/// An index directory on the local file system.
#[derive(Debug, Clone)]
pub struct IndexDirectory {
    root: PathBuf,
}

impl IndexDirectory {
    /// Open an index directory, creating it if it does not exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(IndexDirectory {
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Root path of the directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the segment with `version`.
    pub fn segment_path(&self, version: SegmentVersion) -> PathBuf {
        self.root.join(segment::segment_dir_name(version))
    }

    /// Read the manifest; a directory without one has no live segments.
    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Metadata of every live segment, oldest first.
    pub fn live_segments(&self) -> Result<Vec<SegmentInfo>> {
        self.manifest()?
            .segments
            .into_iter()
            .map(|version| segment::read_info(&self.segment_path(version)))
            .collect()
    }

    /// Seal `builder` as the next segment and publish it in the manifest.
    pub fn commit(&self, builder: SegmentBuilder) -> Result<SegmentInfo> {
        let mut manifest = self.manifest()?;
        let newest = manifest.segments.iter().map(|v| v.0).max().unwrap_or(0);
        let version = SegmentVersion(newest.max(manifest.last_version) + 1);

        let info = builder.seal(&self.segment_path(version), version)?;
        manifest.segments.push(version);
        manifest.last_version = version.0;
        self.write_manifest(&manifest)?;
        Ok(info)
    }

    /// Remove a segment from the live set. Its files are left for cleanup.
    pub fn retire(&self, version: SegmentVersion) -> Result<()> {
        let mut manifest = self.manifest()?;
        let before = manifest.segments.len();
        manifest.segments.retain(|v| *v != version);
        if manifest.segments.len() == before {
            return Err(TesseraError::not_found(format!("segment {version}")));
        }
        self.write_manifest(&manifest)
    }

    /// Mark every live copy of the document with `hash` obsolete.
    ///
    /// Returns the number of documents flagged.
    pub fn delete_by_hash(&self, hash: u64) -> Result<usize> {
        let mut flagged = 0;
        for version in self.manifest()?.segments {
            let path = self.segment_path(version).join(DOC_HASH_FILE);
            let table = std::fs::read(&path)?;
            for document_id in doc_hash::find_by_hash(&table, hash)? {
                if !doc_hash::read_entry(&table, document_id)?.is_obsolete {
                    doc_hash::mark_obsolete(&path, document_id)?;
                    flagged += 1;
                }
            }
        }
        Ok(flagged)
    }

    /// Segment and document counts.
    pub fn status(&self) -> Result<DirectoryStatus> {
        let segments = self.live_segments()?;
        Ok(DirectoryStatus {
            segments: segments.len(),
            documents: segments.iter().map(|s| s.document_count as u64).sum(),
        })
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let tmp = self.root.join(format!("{MANIFEST_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)?;
        std::fs::rename(tmp, self.root.join(MANIFEST_FILE))?;
        Ok(())
    }
}
