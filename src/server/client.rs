//! Client for connecting to the markdex daemon

use crate::index::IndexReport;
use crate::server::get_socket_path;
use crate::server::protocol::{
    ErrorKind, Request, Response, SearchResponse, StatusResponse, read_message, write_message,
};
use std::io::{BufReader, BufWriter};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// Read/write timeout. Reconciliation of a large tree can take a while.
const IO_TIMEOUT: Duration = Duration::from_secs(300);

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("markdex daemon is not running")]
    NotRunning,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Server reported a failure
    #[error("{message}")]
    Server { kind: ErrorKind, message: String },
    #[error("invalid response from server")]
    InvalidResponse,
}

impl ClientError {
    /// Whether the server turned the request away because a writer was busy
    pub fn is_busy(&self) -> bool {
        matches!(self, ClientError::Server { kind: ErrorKind::Busy, .. })
    }
}

/// Client for the markdex daemon
pub struct IndexClient {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
}

impl IndexClient {
    /// Try to connect to the running daemon
    /// Returns None if daemon is not running (allowing fallback to direct mode)
    pub fn connect() -> Option<Self> {
        Self::connect_to(&get_socket_path())
    }

    /// Connect to a daemon listening on a specific socket
    pub fn connect_to(socket_path: &Path) -> Option<Self> {
        if !socket_path.exists() {
            return None;
        }

        let stream = UnixStream::connect(socket_path).ok()?;

        let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
        let _ = stream.set_write_timeout(Some(IO_TIMEOUT));

        let reader = BufReader::new(stream.try_clone().ok()?);
        let writer = BufWriter::new(stream);

        Some(Self { reader, writer })
    }

    /// Connect or return an error (for when daemon is required)
    pub fn connect_required() -> ClientResult<Self> {
        Self::connect().ok_or(ClientError::NotRunning)
    }

    fn call(&mut self, request: &Request) -> ClientResult<Response> {
        write_message(&mut self.writer, request)?;
        match read_message(&mut self.reader)? {
            Response::Error { kind, message } => Err(ClientError::Server { kind, message }),
            response => Ok(response),
        }
    }

    pub fn search(&mut self, terms: &str) -> ClientResult<SearchResponse> {
        let request = Request::Search {
            terms: terms.to_string(),
        };
        match self.call(&request)? {
            Response::Search(sr) => Ok(sr),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    pub fn reconcile(&mut self) -> ClientResult<IndexReport> {
        match self.call(&Request::Reconcile)? {
            Response::Reconciled(report) => Ok(report),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    pub fn render(&mut self, path: &str) -> ClientResult<String> {
        let request = Request::Render {
            path: path.to_string(),
        };
        match self.call(&request)? {
            Response::Rendered { html } => Ok(html),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    /// Get server status
    pub fn status(&mut self) -> ClientResult<StatusResponse> {
        match self.call(&Request::Status)? {
            Response::Status(status) => Ok(status),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    /// Request graceful shutdown
    pub fn shutdown(&mut self) -> ClientResult<()> {
        match self.call(&Request::Shutdown)? {
            Response::ShuttingDown => Ok(()),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    /// Ping the server
    pub fn ping(&mut self) -> ClientResult<()> {
        match self.call(&Request::Ping)? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::InvalidResponse),
        }
    }
}
