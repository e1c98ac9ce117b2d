use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use tessera::lexical::index::segment::POSTINGS_FILE;
use tessera::lexical::{
    AddressRow, DocHashEntry, DocumentId, ReadSession, SegmentInfo, SegmentVersion, Word,
};
use tessera::lexical::session::PositionsRow;
use tessera::{
    BooleanQuery, Cancellation, FailurePolicy, IndexDirectory, NoopObserver, PhraseQuery,
    QueryNode, SearchConfig, SearchObserver, Searcher, SegmentBuilder, TermQuery, TesseraError,
};

fn commit(index: &IndexDirectory, docs: &[(u64, &str)]) -> tessera::Result<SegmentInfo> {
    let mut builder = SegmentBuilder::new();
    for (hash, text) in docs {
        let doc = builder.add_document(*hash);
        builder.add_text(doc, "body", text)?;
    }
    index.commit(builder)
}

fn open(dir: &TempDir) -> tessera::Result<Searcher> {
    Ok(Searcher::open(dir.path(), SearchConfig::default())?.with_observer(Arc::new(NoopObserver)))
}

#[test]
fn test_updated_document_resolves_to_newest_segment() -> tessera::Result<()> {
    // 1. Segment 1 holds the first version of document 0xA1
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(0xA1, "brown fox"), (0xB2, "grey wolf")])?;

    // 2. Segment 2 holds an update of the same document
    commit(&index, &[(0xA1, "brown fox brown bear")])?;

    // 3. The document is found once, scored and located in segment 2
    let searcher = open(&temp_dir)?;
    let results = searcher.search(&TermQuery::new("body", "brown").into(), 0, 10)?;
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].doc_hash, 0xA1);
    assert_eq!(results.hits[0].segment.version, SegmentVersion(2));
    assert_eq!(results.hits[0].score, 2.0);
    assert_eq!(results.hits[0].document_id, 0);

    Ok(())
}

#[test]
fn test_deleted_document_disappears_from_results() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "fox fox fox fox"), (2, "fox")])?;

    let searcher = open(&temp_dir)?;
    let query: QueryNode = TermQuery::new("body", "fox").into();
    assert_eq!(searcher.search(&query, 0, 10)?.hits[0].doc_hash, 1);

    // Deletion flips the flag the open session reads.
    assert_eq!(index.delete_by_hash(1)?, 1);
    let results = searcher.search(&query, 0, 10)?;
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].doc_hash, 2);

    Ok(())
}

#[test]
fn test_phrase_ranks_in_order_occurrences_first() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(
        &index,
        &[
            (1, "the quick brown fox"),
            (2, "brown and quick"),
            (3, "quick red brown"),
        ],
    )?;

    let searcher = open(&temp_dir)?;
    let results = searcher.search(&PhraseQuery::from_text("body", "quick brown").into(), 0, 10)?;

    // Only the adjacent pair lies within a two-token span.
    let hashes: Vec<_> = results.hits.iter().map(|h| h.doc_hash).collect();
    assert_eq!(hashes, vec![1]);
    assert_eq!(results.hits[0].score, 1.0);

    // A three-token phrase tolerates distance two, with a penalty out of order.
    let results = searcher.search(
        &PhraseQuery::from_text("body", "brown quick fox").into(),
        0,
        10,
    )?;
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].doc_hash, 1);
    // "quick" one before "brown": 1 - ln 1; "fox" one after: 1.
    assert!((results.hits[0].score - 2.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_boolean_query_across_segments() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "rust search engine"), (2, "rust compiler")])?;
    commit(&index, &[(3, "search engine in go"), (4, "rust engine")])?;

    let searcher = open(&temp_dir)?;
    let query = BooleanQuery::new()
        .must(TermQuery::new("body", "engine"))
        .should(TermQuery::new("body", "rust"))
        .must_not(TermQuery::new("body", "go"));
    let results = searcher.search(&query.into(), 0, 10)?;

    let hits: Vec<_> = results.hits.iter().map(|h| (h.doc_hash, h.score)).collect();
    assert_eq!(hits, vec![(1, 2.0), (4, 2.0)]);
    assert_eq!(searcher.count(&TermQuery::new("body", "engin").prefix().into())?, 3);
    assert_eq!(searcher.count(&TermQuery::new("body", "rast").fuzzy().into())?, 3);

    Ok(())
}

#[test]
fn test_cancelled_search_returns_nothing() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "fox")])?;
    let searcher = open(&temp_dir)?;

    let cancel = Cancellation::new();
    cancel.cancel();
    let result =
        searcher.search_with_cancellation(&TermQuery::new("body", "fox").into(), 0, 10, &cancel);
    assert!(matches!(result, Err(TesseraError::Cancelled)));

    let expired = Cancellation::with_timeout(Duration::ZERO);
    let result =
        searcher.search_with_cancellation(&TermQuery::new("body", "fox").into(), 0, 10, &expired);
    assert!(matches!(result, Err(TesseraError::Cancelled)));

    Ok(())
}

#[derive(Debug, Default)]
struct CountingObserver {
    corrupt: AtomicUsize,
    excluded: AtomicUsize,
}

impl SearchObserver for CountingObserver {
    fn corrupt_block(&self, _segment: SegmentVersion, _field: &str, _error: &TesseraError) {
        self.corrupt.fetch_add(1, Ordering::SeqCst);
    }

    fn segment_excluded(&self, _segment: SegmentVersion, _error: &TesseraError) {
        self.excluded.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_corrupt_block_drops_only_that_term() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    let info = commit(&index, &[(1, "alpha beta")])?;

    // "alpha" sorts first, so its block starts at offset 0; damage its payload.
    let path = index.segment_path(info.version).join(POSTINGS_FILE);
    let mut bytes = std::fs::read(&path)?;
    bytes[9] ^= 0xFF;
    std::fs::write(&path, bytes)?;

    let observer = Arc::new(CountingObserver::default());
    let searcher =
        Searcher::open(temp_dir.path(), SearchConfig::default())?.with_observer(observer.clone());

    let alpha = searcher.search(&TermQuery::new("body", "alpha").into(), 0, 10)?;
    assert_eq!(alpha.total, 0);
    assert_eq!(observer.corrupt.load(Ordering::SeqCst), 1);

    let beta = searcher.search(&TermQuery::new("body", "beta").into(), 0, 10)?;
    assert_eq!(beta.total, 1);

    Ok(())
}

/// A session whose every call fails with the same error.
#[derive(Debug)]
struct FailingSession {
    info: SegmentInfo,
    error: fn() -> TesseraError,
}

impl FailingSession {
    fn unreachable(info: SegmentInfo) -> Self {
        FailingSession {
            info,
            error: || TesseraError::remote("connection refused"),
        }
    }

    fn fail<T>(&self) -> tessera::Result<T> {
        Err((self.error)())
    }
}

impl ReadSession for FailingSession {
    fn info(&self) -> &SegmentInfo {
        &self.info
    }

    fn is_word(&self, _field: &str, _token: &str) -> tessera::Result<Option<Word>> {
        self.fail()
    }

    fn starts_with(&self, _field: &str, _prefix: &str) -> tessera::Result<Vec<Word>> {
        self.fail()
    }

    fn semantically_near(
        &self,
        _field: &str,
        _token: &str,
        _max_edits: u32,
    ) -> tessera::Result<Vec<Word>> {
        self.fail()
    }

    fn read_positions(&self, _rows: &[AddressRow]) -> tessera::Result<Vec<PositionsRow>> {
        self.fail()
    }

    fn read_doc_hash(&self, _document_id: DocumentId) -> tessera::Result<DocHashEntry> {
        self.fail()
    }
}

#[test]
fn test_failure_policy_decides_about_unreachable_segments() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "fox")])?;
    let reachable = tessera::lexical::open_sessions(temp_dir.path(), &Default::default())?;

    let mut info = reachable[0].info().clone();
    info.version = SegmentVersion(9);
    let unreachable: Arc<dyn ReadSession> = Arc::new(FailingSession::unreachable(info));
    let query: QueryNode = TermQuery::new("body", "fox").into();

    // 1. Default: exclude the segment and warn
    let observer = Arc::new(CountingObserver::default());
    let sessions = vec![reachable[0].clone(), unreachable.clone()];
    let searcher = Searcher::from_sessions(sessions, SearchConfig::default(), observer.clone());
    assert_eq!(searcher.search(&query, 0, 10)?.total, 1);
    assert_eq!(observer.excluded.load(Ordering::SeqCst), 1);

    // 2. Fail the whole query when asked to
    let strict = SearchConfig::default().with_failure_policy(FailurePolicy::FailQuery);
    let sessions = vec![reachable[0].clone(), unreachable.clone()];
    let searcher = Searcher::from_sessions(sessions, strict, Arc::new(NoopObserver));
    assert!(matches!(searcher.search(&query, 0, 10), Err(TesseraError::Remote(_))));

    // 3. Nothing reachable at all is an error even when excluding
    let searcher =
        Searcher::from_sessions(vec![unreachable], SearchConfig::default(), Arc::new(NoopObserver));
    assert!(matches!(
        searcher.search(&query, 0, 10),
        Err(TesseraError::NoReachableSegments)
    ));

    Ok(())
}

#[test]
fn test_query_errors_are_never_excluded() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "fox")])?;
    let reachable = tessera::lexical::open_sessions(temp_dir.path(), &Default::default())?;
    let query: QueryNode = TermQuery::new("body", "fox").into();

    let mut info = reachable[0].info().clone();
    info.version = SegmentVersion(9);
    for error in [
        (|| TesseraError::invalid_argument("bad edit budget")) as fn() -> TesseraError,
        || TesseraError::not_found("document 3"),
        || TesseraError::other("unexpected"),
    ] {
        let failing: Arc<dyn ReadSession> = Arc::new(FailingSession {
            info: info.clone(),
            error,
        });
        let observer = Arc::new(CountingObserver::default());
        let searcher = Searcher::from_sessions(
            vec![reachable[0].clone(), failing],
            SearchConfig::default(),
            observer.clone(),
        );

        let result = searcher.search(&query, 0, 10);
        assert_eq!(
            std::mem::discriminant(&result.unwrap_err()),
            std::mem::discriminant(&error())
        );
        assert_eq!(observer.excluded.load(Ordering::SeqCst), 0);
    }

    Ok(())
}

#[test]
fn test_fuzzy_search_with_wide_edit_budget() -> tessera::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let index = IndexDirectory::open(temp_dir.path())?;
    commit(&index, &[(1, "internationalization matters"), (2, "nation")])?;
    let searcher = open(&temp_dir)?;

    for edits in [1, 2, 3, 4, 5, 8] {
        let query = TermQuery::new("body", "internationalisation").max_edits(edits);
        let results = searcher.search(&query.into(), 0, 10)?;
        assert_eq!(results.total, 1, "edit budget {edits}");
        assert_eq!(results.hits[0].doc_hash, 1);
    }

    Ok(())
}
