//! Searcher: runs a query over every live segment and resolves the results.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::Cancellation;
use crate::config::{FailurePolicy, SearchConfig};
use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentId;
use crate::lexical::core::segment::SegmentInfo;
use crate::lexical::index::directory::DirectoryStatus;
use crate::lexical::query::QueryNode;
use crate::lexical::score::DocumentScore;
use crate::lexical::search::evaluator::SegmentEvaluator;
use crate::lexical::search::resolver;
use crate::lexical::session::{self, ReadSession};
use crate::observe::{LogObserver, SearchObserver};

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Segment-local id, valid within [`SearchHit::segment`].
    pub document_id: DocumentId,
    /// Identity of the document across segments.
    pub doc_hash: u64,
    /// Relevance.
    pub score: f64,
    /// Segment the winning score came from; with `document_id` it locates the
    /// stored document.
    pub segment: SegmentInfo,
}

/// A page of hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Hits of the requested page, best first.
    pub hits: Vec<SearchHit>,
    /// Matching documents across all segments, independent of paging.
    pub total: usize,
}

/// A searcher over a fixed set of segment sessions.
#[derive(Debug)]
pub struct Searcher {
    /// Sessions ordered oldest segment first.
    sessions: Vec<Arc<dyn ReadSession>>,
    config: SearchConfig,
    observer: Arc<dyn SearchObserver>,
}

impl Searcher {
    /// Open sessions for every live segment of the index at `root`, using the
    /// session backend named in `config`. Events go to the `log` facade.
    pub fn open<P: AsRef<Path>>(root: P, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let sessions = session::open_sessions(root.as_ref(), &config.session)?;
        Ok(Searcher::from_sessions(sessions, config, Arc::new(LogObserver)))
    }

    /// A searcher over existing sessions.
    pub fn from_sessions(
        mut sessions: Vec<Arc<dyn ReadSession>>,
        config: SearchConfig,
        observer: Arc<dyn SearchObserver>,
    ) -> Self {
        sessions.sort_by_key(|s| s.version());
        Searcher {
            sessions,
            config,
            observer,
        }
    }

    /// Replace the event sink.
    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The sessions searched, oldest segment first.
    pub fn sessions(&self) -> &[Arc<dyn ReadSession>] {
        &self.sessions
    }

    /// The configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Return page `page` (zero-based) of `page_size` hits.
    ///
    /// A `page_size` of zero only counts matches.
    pub fn search(&self, query: &QueryNode, page: usize, page_size: usize) -> Result<SearchResults> {
        self.search_with_cancellation(query, page, page_size, &Cancellation::new())
    }

    /// [`Searcher::search`] that stops once `cancel` fires. A cancelled
    /// search returns [`TesseraError::Cancelled`] and nothing else.
    pub fn search_with_cancellation(
        &self,
        query: &QueryNode,
        page: usize,
        page_size: usize,
        cancel: &Cancellation,
    ) -> Result<SearchResults> {
        query.validate()?;
        let skip = page.checked_mul(page_size).ok_or_else(|| {
            TesseraError::invalid_argument(format!("page {page} of size {page_size} overflows"))
        })?;
        let cancel = match self.config.timeout_ms {
            Some(ms) => cancel
                .clone()
                .with_deadline(Instant::now() + Duration::from_millis(ms)),
            None => cancel.clone(),
        };

        let lists = self.score_segments(query, &cancel)?;
        let resolved = resolver::sort_by_score_and_take_latest_version(&lists, skip, page_size)?;

        let hits = resolved
            .scores
            .into_iter()
            .map(|score| self.hit(score))
            .collect::<Result<_>>()?;
        Ok(SearchResults {
            hits,
            total: resolved.total,
        })
    }

    /// Number of distinct documents matching `query`.
    pub fn count(&self, query: &QueryNode) -> Result<usize> {
        Ok(self.search(query, 0, 0)?.total)
    }

    /// Live segments and the documents they hold.
    pub fn status(&self) -> DirectoryStatus {
        DirectoryStatus {
            segments: self.sessions.len(),
            documents: self
                .sessions
                .iter()
                .map(|s| s.info().document_count as u64)
                .sum(),
        }
    }

    /// Per-segment score lists, oldest segment first, with failed segments
    /// handled according to the failure policy.
    fn score_segments(
        &self,
        query: &QueryNode,
        cancel: &Cancellation,
    ) -> Result<Vec<Vec<DocumentScore>>> {
        if self.sessions.is_empty() {
            return Ok(Vec::new());
        }

        let evaluate = |session: &Arc<dyn ReadSession>| {
            let timer = Instant::now();
            let result = SegmentEvaluator::new(
                session.as_ref(),
                Arc::clone(&self.observer),
                cancel,
                self.config.fuzzy,
            )
            .evaluate(query);
            if let Ok(scores) = &result {
                self.observer
                    .segment_scored(session.version(), scores.len(), timer.elapsed());
            }
            result
        };
        let results: Vec<Result<Vec<DocumentScore>>> = if self.config.parallel {
            self.sessions.par_iter().map(evaluate).collect()
        } else {
            self.sessions.iter().map(evaluate).collect()
        };

        // Cancellation wins over every other outcome.
        if results
            .iter()
            .any(|r| matches!(r, Err(TesseraError::Cancelled)))
        {
            return Err(TesseraError::Cancelled);
        }

        let mut lists = Vec::with_capacity(results.len());
        let mut excluded = 0;
        for (session, result) in self.sessions.iter().zip(results) {
            match result {
                Ok(scores) => lists.push(scores),
                Err(e) if self.is_excludable(&e) => {
                    self.observer.segment_excluded(session.version(), &e);
                    excluded += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if excluded == self.sessions.len() {
            return Err(TesseraError::NoReachableSegments);
        }
        Ok(lists)
    }

    /// Only session-level failures may drop a segment; query and contract
    /// errors always surface.
    fn is_excludable(&self, error: &TesseraError) -> bool {
        self.config.failure_policy == FailurePolicy::ExcludeAndWarn
            && error.is_session_failure()
    }

    fn hit(&self, score: DocumentScore) -> Result<SearchHit> {
        let session = self
            .sessions
            .iter()
            .find(|s| s.version() == score.segment_version)
            .ok_or_else(|| {
                TesseraError::other(format!(
                    "score refers to unknown segment {}",
                    score.segment_version
                ))
            })?;
        Ok(SearchHit {
            document_id: score.document_id,
            doc_hash: score.doc_hash,
            score: score.score,
            segment: session.info().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::index::directory::IndexDirectory;
    use crate::lexical::index::segment::SegmentBuilder;
    use crate::lexical::query::{PhraseQuery, TermQuery};
    use crate::observe::NoopObserver;

    fn commit(index: &IndexDirectory, docs: &[(u64, &str)]) {
        let mut builder = SegmentBuilder::new();
        for (hash, text) in docs {
            let doc = builder.add_document(*hash);
            builder.add_text(doc, "body", text).unwrap();
        }
        index.commit(builder).unwrap();
    }

    fn searcher(root: &Path) -> Searcher {
        Searcher::open(root, SearchConfig::default())
            .unwrap()
            .with_observer(Arc::new(NoopObserver))
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let results = searcher(dir.path())
            .search(&TermQuery::new("body", "fox").into(), 0, 10)
            .unwrap();
        assert_eq!(results, SearchResults::default());
    }

    #[test]
    fn test_newest_version_of_a_document_wins() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexDirectory::open(dir.path()).unwrap();
        commit(&index, &[(1, "red fox"), (2, "red red red")]);
        commit(&index, &[(1, "red red fox")]);

        let results = searcher(dir.path())
            .search(&TermQuery::new("body", "red").into(), 0, 10)
            .unwrap();
        assert_eq!(results.total, 2);
        let hits: Vec<_> = results
            .hits
            .iter()
            .map(|h| (h.doc_hash, h.score, h.segment.version.0))
            .collect();
        assert_eq!(hits, vec![(2, 3.0, 1), (1, 2.0, 2)]);
    }

    #[test]
    fn test_paging_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexDirectory::open(dir.path()).unwrap();
        commit(
            &index,
            &[(1, "a"), (2, "a a"), (3, "a a a"), (4, "a a a a"), (5, "a a a a a")],
        );
        let searcher = searcher(dir.path());
        let query: QueryNode = TermQuery::new("body", "a").into();

        let first = searcher.search(&query, 0, 2).unwrap();
        let hashes: Vec<_> = first.hits.iter().map(|h| h.doc_hash).collect();
        assert_eq!(hashes, vec![5, 4]);

        let second = searcher.search(&query, 1, 2).unwrap();
        let hashes: Vec<_> = second.hits.iter().map(|h| h.doc_hash).collect();
        assert_eq!(hashes, vec![3, 2]);
        assert_eq!(second.total, 5);

        assert_eq!(searcher.count(&query).unwrap(), 5);
        assert!(searcher.search(&query, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_invalid_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = PhraseQuery::new("body", Vec::<String>::new());
        let result = searcher(dir.path()).search(&empty.into(), 0, 10);
        assert!(matches!(result, Err(TesseraError::InvalidQuery(_))));
    }

    #[test]
    fn test_status_counts_live_segments() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexDirectory::open(dir.path()).unwrap();
        commit(&index, &[(1, "a"), (2, "b")]);
        commit(&index, &[(3, "c")]);

        let status = searcher(dir.path()).status();
        assert_eq!(status.segments, 2);
        assert_eq!(status.documents, 3);
    }
}
