//! Protocol messages for client-server communication
//!
//! Uses a simple length-prefixed JSON protocol:
//! - 4 bytes (little-endian u32): message length
//! - N bytes: JSON-encoded message

use crate::error::Error;
use crate::index::{IndexReport, SearchResults};
use crate::search::BackendKind;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Largest frame either side will accept
const MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Request from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Free-text search
    Search { terms: String },

    /// Reconcile the index with the document tree
    Reconcile,

    /// Render one markup file, path relative to the document root
    Render { path: String },

    /// Check server health and get stats
    Status,

    /// Graceful shutdown request
    Shutdown,

    /// Ping for connection testing
    Ping,
}

/// Response from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Search(SearchResponse),

    Reconciled(IndexReport),

    Rendered { html: String },

    Status(StatusResponse),

    /// Shutdown acknowledged
    ShuttingDown,

    Pong,

    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn from_error(err: &Error) -> Self {
        Response::Error {
            kind: ErrorKind::from(err),
            message: err.to_string(),
        }
    }
}

/// Failure category carried over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    /// Another writer holds the index; retry later
    Busy,
    SchemaMismatch,
    IndexBuild,
    Search,
    DuplicatePath,
    NotIndexed,
    Render,
    Config,
    Index,
    InvalidRequest,
}

impl From<&Error> for ErrorKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::Io(_) => ErrorKind::Io,
            Error::Lock => ErrorKind::Busy,
            Error::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Error::IndexBuild { .. } => ErrorKind::IndexBuild,
            Error::Search(_) => ErrorKind::Search,
            Error::DuplicatePath(_) => ErrorKind::DuplicatePath,
            Error::NotIndexed => ErrorKind::NotIndexed,
            Error::Render { .. } => ErrorKind::Render,
            Error::Config(_) => ErrorKind::Config,
            Error::Index(_) => ErrorKind::Index,
        }
    }
}

/// Search results response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: SearchResults,
    /// Time taken in milliseconds
    pub duration_ms: f64,
    /// Whether results came from cache
    pub cached: bool,
}

/// Server status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server uptime in seconds
    pub uptime_secs: u64,
    pub backend: BackendKind,
    pub document_root: PathBuf,
    /// Committed documents, None without an index
    pub doc_count: Option<u64>,
    /// Total queries served
    pub queries_served: u64,
    pub reconciliations: u64,
    /// Cache hit rate (0.0 - 1.0)
    pub cache_hit_rate: f32,
}

/// Write a message to a stream with length prefix
pub fn write_message<W: Write>(writer: &mut W, msg: &impl Serialize) -> std::io::Result<()> {
    let json = serde_json::to_vec(msg).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if json.len() > MAX_MESSAGE_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let len = json.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Read a message from a stream with length prefix
pub fn read_message<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> std::io::Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    serde_json::from_slice(&buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
