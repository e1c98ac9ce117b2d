//! TCP server exposing the live segments of an index directory to
//! [`RemoteReadSession`](super::RemoteReadSession)s.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Result, TesseraError};
use crate::lexical::core::segment::SegmentVersion;
use crate::lexical::index::directory::IndexDirectory;
use crate::lexical::session::protocol::{self, Request, Response, WireRow};
use crate::lexical::session::{LocalReadSession, ReadSession};

/// Serves read-session calls for every live segment of one directory.
///
/// Segments are opened on first use and cached. Only segments listed in the
/// manifest can be opened.
#[derive(Debug)]
pub struct SessionServer {
    directory: IndexDirectory,
    sessions: RwLock<AHashMap<SegmentVersion, Arc<LocalReadSession>>>,
}

impl SessionServer {
    /// Create a server for `directory`.
    pub fn new(directory: IndexDirectory) -> Self {
        SessionServer {
            directory,
            sessions: RwLock::new(AHashMap::new()),
        }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            log::debug!(target: "tessera", "session client connected: {peer}");
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    log::warn!(target: "tessera", "session client {peer}: {e}");
                }
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream) -> Result<()> {
        stream.set_nodelay(true)?;
        while let Some(request) = protocol::read_frame_async::<_, Request>(&mut stream).await? {
            let server = Arc::clone(&self);
            let response = tokio::task::spawn_blocking(move || server.dispatch(request))
                .await
                .unwrap_or_else(|e| Response::Error(format!("request handler failed: {e}")));
            protocol::write_frame_async(&mut stream, &response).await?;
        }
        Ok(())
    }

    /// Answer one request. Failures become [`Response::Error`].
    pub fn dispatch(&self, request: Request) -> Response {
        self.try_dispatch(request)
            .unwrap_or_else(|e| Response::Error(e.to_string()))
    }

    fn try_dispatch(&self, request: Request) -> Result<Response> {
        Ok(match request {
            Request::ListSegments => Response::Segments(self.directory.live_segments()?),
            Request::IsWord {
                version,
                field,
                token,
            } => Response::Word(self.session(version)?.is_word(&field, &token)?),
            Request::StartsWith {
                version,
                field,
                prefix,
            } => Response::Words(self.session(version)?.starts_with(&field, &prefix)?),
            Request::SemanticallyNear {
                version,
                field,
                token,
                max_edits,
            } => Response::Words(
                self.session(version)?
                    .semantically_near(&field, &token, max_edits)?,
            ),
            Request::ReadPositions { version, rows } => Response::Positions(
                self.session(version)?
                    .read_positions(&rows)?
                    .iter()
                    .map(WireRow::from_row)
                    .collect(),
            ),
            Request::ReadDocHashes { version, ids } => {
                Response::DocHashes(self.session(version)?.read_doc_hashes(&ids)?)
            }
        })
    }

    fn session(&self, version: SegmentVersion) -> Result<Arc<LocalReadSession>> {
        if let Some(session) = self.sessions.read().get(&version) {
            return Ok(Arc::clone(session));
        }

        if !self.directory.manifest()?.segments.contains(&version) {
            return Err(TesseraError::not_found(format!("segment {version} is not live")));
        }
        let session = Arc::new(LocalReadSession::open(
            self.directory.segment_path(version),
        )?);
        Ok(Arc::clone(
            self.sessions.write().entry(version).or_insert(session),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::index::segment::SegmentBuilder;

    fn directory(dir: &std::path::Path) -> IndexDirectory {
        let index = IndexDirectory::open(dir).unwrap();
        let mut builder = SegmentBuilder::new();
        let doc = builder.add_document(9);
        builder.add_text(doc, "body", "red fox").unwrap();
        index.commit(builder).unwrap();
        index
    }

    #[test]
    fn test_dispatch_answers_from_local_session() {
        let dir = tempfile::tempdir().unwrap();
        let server = SessionServer::new(directory(dir.path()));

        match server.dispatch(Request::ListSegments) {
            Response::Segments(segments) => assert_eq!(segments.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        match server.dispatch(Request::IsWord {
            version: SegmentVersion(1),
            field: "body".to_string(),
            token: "fox".to_string(),
        }) {
            Response::Word(word) => assert!(word.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_rejects_unknown_segment() {
        let dir = tempfile::tempdir().unwrap();
        let server = SessionServer::new(directory(dir.path()));
        let response = server.dispatch(Request::ReadDocHashes {
            version: SegmentVersion(7),
            ids: vec![0],
        });
        assert!(matches!(response, Response::Error(_)));
    }
}
