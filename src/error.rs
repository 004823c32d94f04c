use std::path::PathBuf;
use tantivy::TantivyError;
use tantivy::directory::error::LockError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another writer session holds the index. Callers should report "busy"
    /// and retry later rather than give up on the process.
    #[error("index is locked by another writer, try again later")]
    Lock,

    #[error("index at {} has an incompatible schema; delete it and rebuild", path.display())]
    SchemaMismatch { path: PathBuf },

    #[error("failed to index {}: {source}", path.display())]
    IndexBuild {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("search failed: {0}")]
    Search(String),

    #[error("document '{0}' is already queued in this writer session")]
    DuplicatePath(String),

    #[error("no index is configured")]
    NotIndexed,

    #[error("rendering {} failed: {message}", path.display())]
    Render { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("index error: {0}")]
    Index(TantivyError),
}

impl From<TantivyError> for Error {
    fn from(err: TantivyError) -> Self {
        match err {
            TantivyError::LockFailure(LockError::LockBusy, _) => Error::Lock,
            other => Error::Index(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_busy_maps_to_lock() {
        let err: Error = TantivyError::LockFailure(LockError::LockBusy, None).into();
        assert!(matches!(err, Error::Lock));
    }

    #[test]
    fn test_other_tantivy_errors_stay_index() {
        let err: Error = TantivyError::SchemaError("bad".to_string()).into();
        assert!(matches!(err, Error::Index(_)));
    }

    #[test]
    fn test_index_build_message_names_path() {
        let err = Error::IndexBuild {
            path: PathBuf::from("notes/a.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("notes/a.md"));
    }
}
