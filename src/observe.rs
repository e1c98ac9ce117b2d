//! Structured events emitted while a query is evaluated.
//!
//! The scoring core never logs directly. It reports to a [`SearchObserver`]
//! handed to it by the caller; [`LogObserver`] forwards those events to the
//! `log` facade.

use std::time::Duration;

use crate::error::TesseraError;
use crate::lexical::core::segment::SegmentVersion;

/// Receives evaluation events. Implementations must be cheap and thread-safe,
/// since segments are evaluated in parallel.
pub trait SearchObserver: Send + Sync + std::fmt::Debug {
    /// A query token was looked up in a field dictionary.
    fn term_lookup(
        &self,
        _segment: SegmentVersion,
        _field: &str,
        _token: &str,
        _hits: usize,
        _elapsed: Duration,
    ) {
    }

    /// A proximity weight matrix was built and summed.
    fn weights_scored(&self, _segment: SegmentVersion, _rows: usize, _elapsed: Duration) {}

    /// One pass of the proximity merge finished.
    fn pass_completed(&self, _segment: SegmentVersion, _pass: usize, _matches: usize) {}

    /// A postings block failed to decode; the term contributes nothing.
    fn corrupt_block(&self, _segment: SegmentVersion, _field: &str, _error: &TesseraError) {}

    /// A segment could not be searched and was left out of the result.
    fn segment_excluded(&self, _segment: SegmentVersion, _error: &TesseraError) {}

    /// A segment finished evaluating.
    fn segment_scored(&self, _segment: SegmentVersion, _documents: usize, _elapsed: Duration) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Forwards events to the `log` facade under the `tessera` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn term_lookup(
        &self,
        segment: SegmentVersion,
        field: &str,
        token: &str,
        hits: usize,
        elapsed: Duration,
    ) {
        log::debug!(
            target: "tessera",
            "segment {segment}: {hits} hit/-s for term {field}:{token} in {elapsed:?}"
        );
    }

    fn weights_scored(&self, segment: SegmentVersion, rows: usize, elapsed: Duration) {
        log::debug!(
            target: "tessera",
            "segment {segment}: scored weight matrix with {rows} rows in {elapsed:?}"
        );
    }

    fn pass_completed(&self, segment: SegmentVersion, pass: usize, matches: usize) {
        log::trace!(
            target: "tessera",
            "segment {segment}: found {matches} postings at word vector position {pass}"
        );
    }

    fn corrupt_block(&self, segment: SegmentVersion, field: &str, error: &TesseraError) {
        log::warn!(
            target: "tessera",
            "segment {segment}: dropping postings of field {field}: {error}"
        );
    }

    fn segment_excluded(&self, segment: SegmentVersion, error: &TesseraError) {
        log::warn!(
            target: "tessera",
            "segment {segment} excluded from results: {error}"
        );
    }

    fn segment_scored(&self, segment: SegmentVersion, documents: usize, elapsed: Duration) {
        log::debug!(
            target: "tessera",
            "segment {segment}: {documents} scored documents in {elapsed:?}"
        );
    }
}
