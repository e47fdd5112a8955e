//! HashDir: filesystem-backed content-addressed store with two-level sharding.
//!
//! Layout:
//! ```text
//! {root}/
//! ├── aa/
//! │   └── f4c61ddcc5e8a2dabede0f3b482cd9aea9434d   # Content file (remainder of digest)
//! └── da/
//!     └── 39a3ee5e6b4b0d3255bfef95601890afd80709
//! ```
//!
//! There is no index and no cache: every call derives paths from the digest
//! and asks the filesystem. Correctness under concurrent puts rests on
//! unique staging names plus a no-clobber placement step.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::compare::files_differ_with;
use crate::config::StoreConfig;
use crate::error::{IoContext, Result, StoreError};
use crate::hash::{ContentHasher, HexDigest};
use crate::staging::{is_staging_name, StagingFile};

/// Where the bytes of a put come from.
pub enum PutSource<'a> {
    /// A named, existing regular file. Eligible for move-on-put.
    Path(&'a Path),
    /// An anonymous stream; always copied.
    Reader(&'a mut dyn Read),
}

/// Result of a successful put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutOutcome {
    pub digest: HexDigest,
    /// Final path of the object.
    pub path: PathBuf,
    pub size_bytes: u64,
    /// The object was already stored with identical content.
    pub deduplicated: bool,
    /// The source file was consumed (moved or removed) rather than copied.
    ///
    /// False in move mode when the object was stored but the source could
    /// not be removed; the put still succeeds.
    pub moved: bool,
}

/// Trait for content-addressed storage backends.
pub trait ContentStore: Send + Sync {
    /// Store the source's bytes under their digest.
    fn put(&self, source: PutSource<'_>) -> Result<PutOutcome>;

    /// Path where the object for `digest` lives (or would live).
    fn path_for(&self, digest: &str) -> Result<PathBuf>;

    /// Open a stored object for reading.
    fn open_for_read(&self, digest: &str) -> Result<File>;

    /// Check whether an object is stored, without opening it.
    fn exists(&self, digest: &HexDigest) -> bool;

    /// Re-hash a stored object and report whether it still matches its digest.
    fn verify(&self, digest: &HexDigest) -> Result<bool>;
}

/// Outcome of putting a file at its final path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// A second name was linked; the original name still exists.
    Linked,
    /// The file was renamed; the original name is gone.
    Renamed,
    /// Something was already at the target. Nothing changed.
    Occupied,
}

/// Put `src` at `target`, never replacing an existing target.
///
/// Hard links fail with `AlreadyExists` instead of overwriting, which closes
/// the window between checking for the target and creating it. Filesystems
/// without hard links fall back to check-then-rename.
fn place_no_clobber(src: &Path, target: &Path) -> io::Result<Placement> {
    match fs::hard_link(src, target) {
        Ok(()) => Ok(Placement::Linked),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(Placement::Occupied),
        Err(e) if is_cross_device(&e) => Err(e),
        Err(e) => {
            debug!(error = %e, "hard link unavailable, falling back to rename");
            if target.exists() {
                return Ok(Placement::Occupied);
            }
            fs::rename(src, target)?;
            Ok(Placement::Renamed)
        }
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        // ERROR_NOT_SAME_DEVICE
        e.raw_os_error() == Some(17)
    }
}

fn is_shard_name(name: &str) -> bool {
    name.len() == 2 && name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Filesystem-based content store.
#[derive(Debug, Clone)]
pub struct HashDir {
    config: StoreConfig,
}

impl HashDir {
    /// Open a store over an existing root directory.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self { config };
        store.ensure_root()?;
        Ok(store)
    }

    /// Open a store at a specific root with default options.
    pub fn at_path(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::with_root(root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn ensure_root(&self) -> Result<()> {
        match fs::metadata(&self.config.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(StoreError::InvalidRoot {
                path: self.config.root.clone(),
            }),
        }
    }

    /// Validate a digest string against the configured algorithm.
    pub fn parse_digest(&self, digest: &str) -> Result<HexDigest> {
        Ok(HexDigest::parse_for(self.config.algorithm, digest)?)
    }

    /// Path for an already-validated digest. Does not touch the filesystem.
    pub fn object_path(&self, digest: &HexDigest) -> PathBuf {
        self.config
            .root
            .join(digest.prefix())
            .join(digest.remainder())
    }

    /// Store a named file, honoring `move_source`.
    pub fn put_path(&self, path: impl AsRef<Path>) -> Result<HexDigest> {
        Ok(self.put(PutSource::Path(path.as_ref()))?.digest)
    }

    /// Store everything `reader` yields.
    pub fn put_reader<R: Read>(&self, mut reader: R) -> Result<HexDigest> {
        Ok(self.put(PutSource::Reader(&mut reader))?.digest)
    }

    /// Read a whole object into memory.
    pub fn read(&self, digest: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open_for_read(digest)?
            .read_to_end(&mut data)
            .with_io_context(|| format!("failed to read object {}", digest))?;
        Ok(data)
    }

    /// List every stored object's digest, sorted.
    ///
    /// Staging files and names that are not digests of the configured
    /// algorithm are skipped.
    pub fn digests(&self) -> Result<Vec<HexDigest>> {
        self.ensure_root()?;
        let mut found = Vec::new();

        let shards = fs::read_dir(&self.config.root).io_context("failed to list store root")?;
        for shard in shards {
            let shard = shard.io_context("failed to read store root entry")?;
            let shard_name = shard.file_name().to_string_lossy().into_owned();
            if !is_shard_name(&shard_name) || !shard.path().is_dir() {
                continue;
            }

            let entries = fs::read_dir(shard.path())
                .with_io_context(|| format!("failed to list shard {}", shard_name))?;
            for entry in entries {
                let entry = entry.with_io_context(|| format!("failed to read shard {}", shard_name))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_staging_name(&name) || !entry.path().is_file() {
                    continue;
                }
                let candidate = format!("{}{}", shard_name, name);
                if let Ok(digest) = HexDigest::parse_for(self.config.algorithm, &candidate) {
                    if digest.as_str() == candidate {
                        found.push(digest);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// Create the shard directory for `digest` if needed and return the object path.
    fn prepare_target(&self, digest: &HexDigest) -> Result<PathBuf> {
        let shard = self.config.root.join(digest.prefix());
        match fs::create_dir(&shard) {
            Ok(()) => debug!(shard = %shard.display(), "created shard directory"),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_io_context(|| {
                    format!("failed to create shard directory {}", shard.display())
                })
            }
        }
        Ok(self.object_path(digest))
    }

    /// Fail with `DigestCollision` unless `candidate` matches what is stored at `target`.
    fn ensure_identical(&self, candidate: &Path, digest: &HexDigest, target: &Path) -> Result<()> {
        let differ = files_differ_with(candidate, target, self.config.effective_buffer_size())
            .with_io_context(|| format!("failed to compare against {}", target.display()))?;

        if differ {
            warn!(digest = %digest, path = %target.display(), "digest collision with different content");
            return Err(StoreError::DigestCollision {
                digest: digest.clone(),
                path: target.to_path_buf(),
            });
        }

        debug!(digest = %digest, "content already stored");
        Ok(())
    }

    /// Stream `reader` through a staging file and place it.
    fn put_staged(&self, reader: &mut dyn Read) -> Result<PutOutcome> {
        let mut staging = StagingFile::create(&self.config.root, self.config.algorithm)?;
        staging
            .fill_from(reader, self.config.effective_buffer_size())
            .io_context("failed to write staging file")?;
        let digest = staging.finish().io_context("failed to flush staging file")?;
        let size_bytes = staging.bytes_written();

        let target = self.prepare_target(&digest)?;
        let placement = place_no_clobber(staging.path(), &target)
            .with_io_context(|| format!("failed to place object {}", target.display()))?;

        let deduplicated = match placement {
            Placement::Linked => false,
            Placement::Renamed => {
                staging.mark_persisted();
                false
            }
            Placement::Occupied => {
                self.ensure_identical(staging.path(), &digest, &target)?;
                true
            }
        };

        if !deduplicated {
            debug!(digest = %digest, size = size_bytes, "stored object");
        }

        // Dropping the staging handle removes any remaining staging name.
        drop(staging);

        Ok(PutOutcome {
            digest,
            path: target,
            size_bytes,
            deduplicated,
            moved: false,
        })
    }

    /// Hash a file in place, without copying it.
    fn hash_file(&self, path: &Path) -> Result<(HexDigest, u64)> {
        let mut file = File::open(path)
            .with_io_context(|| format!("failed to open {}", path.display()))?;
        let mut hasher = ContentHasher::new(self.config.algorithm);
        let mut buf = vec![0u8; self.config.effective_buffer_size()];
        let mut size = 0u64;
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e).with_io_context(|| format!("failed to read {}", path.display()))
                }
            };
            hasher.update(&buf[..n]);
            size += n as u64;
        }
        Ok((hasher.finalize(), size))
    }

    /// Move a named file straight into place.
    ///
    /// Returns `Ok(None)` when source and root are on different filesystems,
    /// in which case the caller copies instead.
    fn put_moved(&self, source: &Path) -> Result<Option<PutOutcome>> {
        let (digest, size_bytes) = self.hash_file(source)?;
        sync_file(source)?;
        let target = self.prepare_target(&digest)?;

        let placement = match place_no_clobber(source, &target) {
            Ok(placement) => placement,
            Err(e) if is_cross_device(&e) => {
                debug!(source = %source.display(), "source on another filesystem, copying instead");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_io_context(|| format!("failed to move {} into store", source.display()))
            }
        };

        let deduplicated = placement == Placement::Occupied;
        if deduplicated {
            if same_file(source, &target) {
                debug!(digest = %digest, "source is the stored object itself");
                return Ok(Some(PutOutcome {
                    digest,
                    path: target,
                    size_bytes,
                    deduplicated: true,
                    moved: false,
                }));
            }
            self.ensure_identical(source, &digest, &target)?;
        }

        let moved = placement == Placement::Renamed || consume_source(source);

        debug!(digest = %digest, source = %source.display(), "moved file into store");
        Ok(Some(PutOutcome {
            digest,
            path: target,
            size_bytes,
            deduplicated,
            moved,
        }))
    }

    fn put_from_path(&self, path: &Path) -> Result<PutOutcome> {
        let meta = fs::metadata(path).with_io_context(|| format!("failed to stat {}", path.display()))?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"))
                .with_io_context(|| format!("cannot store {}", path.display()));
        }

        // Linking a symlink stores the link, not the bytes; those get copied.
        let is_symlink = fs::symlink_metadata(path)
            .with_io_context(|| format!("failed to stat {}", path.display()))?
            .file_type()
            .is_symlink();

        if self.config.move_source && !is_symlink {
            if let Some(outcome) = self.put_moved(path)? {
                return Ok(outcome);
            }
        }

        let mut file = File::open(path).with_io_context(|| format!("failed to open {}", path.display()))?;
        let mut outcome = self.put_staged(&mut file)?;
        drop(file);

        if self.config.move_source {
            outcome.moved = consume_source(path);
        }
        Ok(outcome)
    }
}

/// Remove a source whose content is already placed.
///
/// The object is stored at this point, so a failed removal only downgrades
/// the outcome to a copy.
fn consume_source(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(source = %path.display(), error = %e, "object stored but source could not be removed");
            false
        }
    }
}

/// Flush a caller's file before it becomes an object, as staging files are.
fn sync_file(path: &Path) -> Result<()> {
    let file = File::open(path).with_io_context(|| format!("failed to open {}", path.display()))?;
    match file.sync_all() {
        Ok(()) => Ok(()),
        // Windows refuses to flush a handle opened without write access.
        Err(e) if cfg!(windows) && e.kind() == io::ErrorKind::PermissionDenied => Ok(()),
        Err(e) => Err(e).with_io_context(|| format!("failed to sync {}", path.display())),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl ContentStore for HashDir {
    fn put(&self, source: PutSource<'_>) -> Result<PutOutcome> {
        self.ensure_root()?;
        match source {
            PutSource::Path(path) => self.put_from_path(path),
            PutSource::Reader(reader) => self.put_staged(reader),
        }
    }

    fn path_for(&self, digest: &str) -> Result<PathBuf> {
        Ok(self.object_path(&self.parse_digest(digest)?))
    }

    fn open_for_read(&self, digest: &str) -> Result<File> {
        let digest = self.parse_digest(digest)?;
        let path = self.object_path(&digest);
        match File::open(&path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(digest)),
            Err(e) => Err(e).with_io_context(|| format!("failed to open object {}", path.display())),
        }
    }

    fn exists(&self, digest: &HexDigest) -> bool {
        digest.algorithm() == self.config.algorithm && self.object_path(digest).is_file()
    }

    fn verify(&self, digest: &HexDigest) -> Result<bool> {
        let path = self.object_path(digest);
        if !path.is_file() {
            return Err(StoreError::NotFound(digest.clone()));
        }
        let (actual, _) = self.hash_file(&path)?;
        if &actual != digest {
            warn!(digest = %digest, actual = %actual, "stored object does not match its digest");
        }
        Ok(&actual == digest)
    }
}
