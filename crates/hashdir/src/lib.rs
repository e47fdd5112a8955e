//! Content-addressed hash directory.
//!
//! Files and byte streams are stored under the hex digest of their content,
//! sharded two levels deep (`<root>/<digest[0:2]>/<digest[2:]>`). Putting the
//! same bytes twice is a no-op; putting different bytes that hash to an
//! occupied path fails loudly instead of overwriting.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hashdir::{ContentStore, HashDir, PutSource, StoreConfig};
//! use std::io::Read;
//!
//! // Root must already exist.
//! let store = HashDir::at_path("/srv/hashdir").unwrap();
//!
//! // Store a stream
//! let digest = store.put_reader(&b"hello"[..]).unwrap();
//! assert_eq!(digest.as_str(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
//!
//! // Store a named file, moving it in instead of copying
//! let mover = HashDir::open(StoreConfig::with_root("/srv/hashdir").move_source(true)).unwrap();
//! let outcome = mover.put(PutSource::Path("/tmp/upload.bin".as_ref())).unwrap();
//! println!("{} -> {}", outcome.digest, outcome.path.display());
//!
//! // Read it back
//! let mut data = Vec::new();
//! store.open_for_read(digest.as_str()).unwrap().read_to_end(&mut data).unwrap();
//! ```
//!
//! # Configuration
//!
//! Environment variables (see [`StoreConfig::from_env`]):
//! - `HASHDIR_ROOT`: Root directory (default: `~/.hashdir`)
//! - `HASHDIR_MOVE_SOURCE`: Set to "true" to move named files into the store
//! - `HASHDIR_ALGORITHM`: `sha1` (default) or `sha256`
//! - `HASHDIR_BUFFER_SIZE`: Chunk size in bytes
//!
//! # Concurrency
//!
//! No locks and no in-memory state. Each put writes its own uniquely named
//! staging file inside the root and places it with a link that refuses to
//! overwrite, so concurrent puts of the same content converge on one file.

pub mod compare;
pub mod config;
pub mod error;
pub mod hash;
pub mod staging;
pub mod store;

pub use compare::{files_differ, readers_differ};
pub use config::{StoreConfig, DEFAULT_BUFFER_SIZE};
pub use error::{ErrorKind, Result, StoreError};
pub use hash::{ContentHasher, DigestAlgorithm, DigestError, HexDigest};
pub use store::{ContentStore, HashDir, PutOutcome, PutSource};
