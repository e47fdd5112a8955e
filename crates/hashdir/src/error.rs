//! Errors surfaced by the hash directory.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::hash::{DigestError, HexDigest};

/// Everything a store operation can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Root is missing or not a directory. The caller has to fix its configuration.
    #[error("store root is not a directory: {}", path.display())]
    InvalidRoot { path: PathBuf },

    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] DigestError),

    #[error("no stored object for digest {0}")]
    NotFound(HexDigest),

    /// Two different byte sequences produced the same digest. The store's
    /// integrity is suspect; nothing was overwritten.
    #[error("digest collision: {digest} is already stored at {} with different content", path.display())]
    DigestCollision { digest: HexDigest, path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Fieldless view of [`StoreError`] for callers that map errors to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRoot,
    InvalidDigest,
    NotFound,
    DigestCollision,
    Io,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidRoot { .. } => ErrorKind::InvalidRoot,
            StoreError::InvalidDigest(_) => ErrorKind::InvalidDigest,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::DigestCollision { .. } => ErrorKind::DigestCollision,
            StoreError::Io { .. } => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Attach a short description to an I/O error, in the spirit of `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T>;

    fn with_io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| StoreError::Io {
            context: context.into(),
            source,
        })
    }

    fn with_io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| StoreError::Io {
            context: f().into(),
            source,
        })
    }
}
