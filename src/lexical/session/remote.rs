//! RPC-backed read session.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, TesseraError};
use crate::lexical::core::posting::DocumentId;
use crate::lexical::core::segment::{DocHashEntry, SegmentInfo};
use crate::lexical::core::term::Word;
use crate::lexical::session::protocol::{self, Request, Response};
use crate::lexical::session::{AddressRow, PositionsRow, ReadSession};

/// Read session for one segment served by a [`SessionServer`](super::SessionServer).
///
/// Calls are blocking round trips. Each call takes an idle connection from a
/// small pool, or opens a new one, so concurrent callers do not wait on each
/// other. A connection goes back to the pool only after a clean round trip.
/// Every failure surfaces as [`TesseraError::Remote`].
#[derive(Debug)]
pub struct RemoteReadSession {
    address: String,
    info: SegmentInfo,
    timeout: Duration,
    idle: Mutex<Vec<TcpStream>>,
}

/// Idle connections kept per session.
const MAX_IDLE_CONNECTIONS: usize = 8;

impl RemoteReadSession {
    /// A session for the segment described by `info` at `address`.
    pub fn new<S: Into<String>>(address: S, info: SegmentInfo, timeout: Duration) -> Self {
        RemoteReadSession {
            address: address.into(),
            info,
            timeout,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connections currently idle in the pool.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    fn call(&self, request: &Request) -> Result<Response> {
        let pooled = self.idle.lock().pop();
        let mut stream = match pooled {
            Some(stream) => stream,
            None => connect(&self.address, self.timeout)?,
        };

        let result = protocol::write_frame(&mut stream, request)
            .and_then(|()| protocol::read_frame::<_, Response>(&mut stream));
        match result {
            Ok(response) => {
                let mut idle = self.idle.lock();
                if idle.len() < MAX_IDLE_CONNECTIONS {
                    idle.push(stream);
                }
                drop(idle);
                match response {
                    Response::Error(message) => Err(TesseraError::remote(message)),
                    response => Ok(response),
                }
            }
            Err(e) => Err(TesseraError::remote(format!("{}: {e}", self.address))),
        }
    }
}

fn connect(address: &str, timeout: Duration) -> Result<TcpStream> {
    let socket = address
        .to_socket_addrs()
        .map_err(|e| TesseraError::remote(format!("cannot resolve {address}: {e}")))?
        .next()
        .ok_or_else(|| TesseraError::remote(format!("{address} resolves to nothing")))?;

    let stream = TcpStream::connect_timeout(&socket, timeout)
        .map_err(|e| TesseraError::remote(format!("cannot connect to {address}: {e}")))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn unexpected(response: Response) -> TesseraError {
    TesseraError::remote(format!("unexpected response {response:?}"))
}

/// One session per segment live on the server at `address`, oldest first.
pub fn connect_all(address: &str, timeout: Duration) -> Result<Vec<RemoteReadSession>> {
    let mut stream = connect(address, timeout)?;
    protocol::write_frame(&mut stream, &Request::ListSegments)
        .map_err(|e| TesseraError::remote(format!("{address}: {e}")))?;
    let response: Response = protocol::read_frame(&mut stream)
        .map_err(|e| TesseraError::remote(format!("{address}: {e}")))?;

    match response {
        Response::Segments(mut segments) => {
            segments.sort_by_key(|info| info.version);
            Ok(segments
                .into_iter()
                .map(|info| RemoteReadSession::new(address, info, timeout))
                .collect())
        }
        Response::Error(message) => Err(TesseraError::remote(message)),
        other => Err(unexpected(other)),
    }
}

impl ReadSession for RemoteReadSession {
    fn info(&self) -> &SegmentInfo {
        &self.info
    }

    fn is_word(&self, field: &str, token: &str) -> Result<Option<Word>> {
        let request = Request::IsWord {
            version: self.info.version,
            field: field.to_string(),
            token: token.to_string(),
        };
        match self.call(&request)? {
            Response::Word(word) => Ok(word),
            other => Err(unexpected(other)),
        }
    }

    fn starts_with(&self, field: &str, prefix: &str) -> Result<Vec<Word>> {
        let request = Request::StartsWith {
            version: self.info.version,
            field: field.to_string(),
            prefix: prefix.to_string(),
        };
        match self.call(&request)? {
            Response::Words(words) => Ok(words),
            other => Err(unexpected(other)),
        }
    }

    fn semantically_near(&self, field: &str, token: &str, max_edits: u32) -> Result<Vec<Word>> {
        let request = Request::SemanticallyNear {
            version: self.info.version,
            field: field.to_string(),
            token: token.to_string(),
            max_edits,
        };
        match self.call(&request)? {
            Response::Words(words) => Ok(words),
            other => Err(unexpected(other)),
        }
    }

    fn read_positions(&self, rows: &[AddressRow]) -> Result<Vec<PositionsRow>> {
        let request = Request::ReadPositions {
            version: self.info.version,
            rows: rows.to_vec(),
        };
        match self.call(&request)? {
            Response::Positions(wire) if wire.len() == rows.len() => Ok(wire
                .into_iter()
                .zip(rows)
                .map(|(row, asked)| row.into_row(&asked.field))
                .collect()),
            Response::Positions(wire) => Err(TesseraError::remote(format!(
                "asked for {} rows, received {}",
                rows.len(),
                wire.len()
            ))),
            other => Err(unexpected(other)),
        }
    }

    fn read_doc_hash(&self, document_id: DocumentId) -> Result<DocHashEntry> {
        self.read_doc_hashes(&[document_id])?
            .pop()
            .ok_or_else(|| TesseraError::remote("empty document hash response"))
    }

    fn read_doc_hashes(&self, document_ids: &[DocumentId]) -> Result<Vec<DocHashEntry>> {
        let request = Request::ReadDocHashes {
            version: self.info.version,
            ids: document_ids.to_vec(),
        };
        match self.call(&request)? {
            Response::DocHashes(entries) if entries.len() == document_ids.len() => Ok(entries),
            Response::DocHashes(entries) => Err(TesseraError::remote(format!(
                "asked for {} document hashes, received {}",
                document_ids.len(),
                entries.len()
            ))),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::core::segment::{CompressionMode, SegmentVersion};

    #[test]
    fn test_unreachable_server_is_a_remote_error() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let info = SegmentInfo {
            version: SegmentVersion(1),
            document_count: 0,
            compression: CompressionMode::Plain,
            fields: Vec::new(),
            created_at: chrono::Utc::now(),
        };
        let session = RemoteReadSession::new(
            format!("127.0.0.1:{port}"),
            info,
            Duration::from_millis(200),
        );

        assert!(matches!(
            session.is_word("body", "fox"),
            Err(TesseraError::Remote(_))
        ));
        assert!(connect_all(session.address(), Duration::from_millis(200)).is_err());
    }
}
