//! Byte-for-byte comparison of stored content.
//!
//! Used when a digest maps to a path that is already occupied: equal digests
//! are not proof of equal content, so the bytes themselves decide.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::config::DEFAULT_BUFFER_SIZE;

/// Return true if the two files' contents differ.
///
/// Sizes are compared first; only equal-sized files are read.
pub fn files_differ(a: &Path, b: &Path) -> io::Result<bool> {
    files_differ_with(a, b, DEFAULT_BUFFER_SIZE)
}

pub(crate) fn files_differ_with(a: &Path, b: &Path, buffer_size: usize) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(true);
    }
    readers_differ(File::open(a)?, File::open(b)?, buffer_size)
}

/// Return true if the two readers yield different byte sequences.
pub fn readers_differ<A: Read, B: Read>(
    mut a: A,
    mut b: B,
    buffer_size: usize,
) -> io::Result<bool> {
    let size = buffer_size.max(1);
    let mut buf_a = vec![0u8; size];
    let mut buf_b = vec![0u8; size];

    loop {
        let n_a = read_full(&mut a, &mut buf_a)?;
        let n_b = read_full(&mut b, &mut buf_b)?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(true);
        }
        if n_a < size {
            return Ok(false);
        }
    }
}

/// Fill `buf` unless EOF comes first. Returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
