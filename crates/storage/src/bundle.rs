// SPDX-License-Identifier: MIT

//! The downloadable bundle format (§4.5): a gzip-compressed tar, built with
//! dereferenced symlinks and owner/permission-agnostic metadata, safe to
//! extract into an untrusted target directory.

use crate::StorageError;
use std::io::Read;
use std::path::Path;

/// Cap on decompressed bundle size (§4.5).
pub const MAX_BUNDLE_DECOMPRESSED_BYTES: u64 = 100 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Build a gzip-compressed tar of `src_dir`. Symlinks are dereferenced
/// (`-h` semantics): `tar::Builder::follow_symlinks(true)` is the default,
/// so this is explicit for clarity. Owner/permission bits are not faithfully
/// preserved on extract (`--no-same-owner --no-same-permissions` semantics
/// are the *extractor's* job, handled in [`extract_bundle`]).
pub fn build_bundle(src_dir: &Path) -> Result<Vec<u8>, StorageError> {
    let gz_buf = Vec::new();
    let encoder = flate2::write::GzEncoder::new(gz_buf, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(true);
    builder.append_dir_all(".", src_dir)?;
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Extract a gzip-compressed tar produced by [`build_bundle`] into
/// `target_dir`. Verifies the gzip magic bytes up front, caps decompressed
/// size, and after extraction rejects any entry whose path resolves
/// outside `target_dir` (symlink-safe path-traversal guard).
pub fn extract_bundle(bytes: &[u8], target_dir: &Path) -> Result<(), StorageError> {
    if bytes.len() < 2 || bytes[0..2] != GZIP_MAGIC {
        return Err(StorageError::NotGzip);
    }

    std::fs::create_dir_all(target_dir)?;

    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut limited = LimitedReader { inner: decoder, remaining: MAX_BUNDLE_DECOMPRESSED_BYTES };
    let mut archive = tar::Archive::new(&mut limited);
    archive.set_preserve_permissions(false);
    archive.set_preserve_mtime(false);
    archive.unpack(target_dir)?;

    reject_path_escapes(target_dir, target_dir)?;
    Ok(())
}

struct LimitedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n as u64 > self.remaining {
            return Err(std::io::Error::other(format!(
                "bundle exceeds {} decompressed bytes",
                MAX_BUNDLE_DECOMPRESSED_BYTES
            )));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn reject_path_escapes(dir: &Path, root: &Path) -> Result<(), StorageError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !canonical.starts_with(root) {
            return Err(StorageError::PathEscape(path));
        }
        if entry.file_type()?.is_dir() {
            reject_path_escapes(&path, root)?;
        }
    }
    Ok(())
}
