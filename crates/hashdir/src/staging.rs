//! Staging: where incoming content lands before it has a name.
//!
//! Each put streams into its own staging file directly inside the store root,
//! so that placing it at its final path is a same-filesystem link or rename.
//! Names are random (`.staging-<uuid>`) and created exclusively, so
//! concurrent puts never share one. A staging file removes itself when
//! dropped, which covers every error path between creation and placement.
//!
//! Layout:
//! ```text
//! {root}/
//! ├── aa/
//! │   └── f4c61ddcc5e8...   # Placed content
//! └── .staging-3f2a...      # In-flight content
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{IoContext, Result};
use crate::hash::{ContentHasher, DigestAlgorithm, HexDigest};

/// File name prefix shared by all staging files.
pub const STAGING_PREFIX: &str = ".staging-";

/// Returns true if `name` looks like a staging file name.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

/// A staging file being filled and hashed.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    hasher: Option<ContentHasher>,
    bytes_written: u64,
    /// Set once the file has been renamed away; nothing left to clean up.
    persisted: bool,
}

impl StagingFile {
    /// Create a fresh, uniquely named staging file in `root`.
    pub(crate) fn create(root: &Path, algorithm: DigestAlgorithm) -> Result<Self> {
        let path = root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_io_context(|| format!("failed to create staging file {}", path.display()))?;

        debug!(path = %path.display(), "created staging file");

        Ok(Self {
            path,
            file: Some(file),
            hasher: Some(ContentHasher::new(algorithm)),
            bytes_written: 0,
            persisted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write a chunk, feeding it to the running digest.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staging file already closed"))?;
        file.write_all(data)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(data);
        }
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Drain `reader` into the staging file in `buffer_size` chunks.
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R, buffer_size: usize) -> io::Result<u64> {
        let mut buf = vec![0u8; buffer_size.max(1)];
        let start = self.bytes_written;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.write(&buf[..n])?;
        }
        Ok(self.bytes_written - start)
    }

    /// Flush to disk, close the handle, and return the content digest.
    pub fn finish(&mut self) -> io::Result<HexDigest> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        self.hasher
            .take()
            .map(ContentHasher::finalize)
            .ok_or_else(|| io::Error::other("staging file already finished"))
    }

    /// Record that the staging file was renamed to its final path.
    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed staging file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staging file"),
        }
    }
}
