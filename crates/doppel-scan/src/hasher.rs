//! File fingerprinting.
//!
//! Generic files get a streaming BLAKE3 digest. Files with a recognized image
//! extension get a perceptual average hash when perceptual matching is
//! enabled, falling back to the digest when the image cannot be decoded.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use thiserror::Error;
use tracing::debug;

use doppel_core::{Fingerprint, MatchPolicy, extension_of};

use crate::perceptual;

/// Size of each read when streaming file content into the digest.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Errors from fingerprinting a single file.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The file could not be opened or read.
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    fn unreadable(path: &Path, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The underlying I/O error.
    pub fn io_error(&self) -> &std::io::Error {
        match self {
            Self::Unreadable { source, .. } => source,
        }
    }
}

/// A fingerprint and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprinted {
    /// The fingerprint.
    pub fingerprint: Fingerprint,
    /// Whether the file has a recognized image extension.
    pub is_image: bool,
    /// An image that could not be decoded and was digested instead.
    pub fell_back: bool,
}

/// Computes fingerprints according to a [`MatchPolicy`].
#[derive(Debug, Clone, Default)]
pub struct FileHasher {
    policy: MatchPolicy,
}

impl FileHasher {
    /// Create a hasher for the given policy.
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Check if a path has a recognized image extension.
    pub fn is_image(&self, path: &Path) -> bool {
        self.policy.is_image_extension(&extension_of(path))
    }

    /// Fingerprint a file.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprinted, FingerprintError> {
        let is_image = self.is_image(path);

        if is_image && self.policy.perceptual {
            match perceptual::average_hash(path) {
                Ok(bits) => {
                    return Ok(Fingerprinted {
                        fingerprint: Fingerprint::perceptual(bits),
                        is_image,
                        fell_back: false,
                    });
                }
                Err(err) => {
                    debug!(
                        path = %path.display(),
                        error = %err,
                        "perceptual hash failed, falling back to content digest"
                    );
                    let fingerprint = Self::content_digest(path)?;
                    return Ok(Fingerprinted {
                        fingerprint,
                        is_image,
                        fell_back: true,
                    });
                }
            }
        }

        Ok(Fingerprinted {
            fingerprint: Self::content_digest(path)?,
            is_image,
            fell_back: false,
        })
    }

    /// Compute the BLAKE3 digest of a file's full content.
    pub fn content_digest(path: &Path) -> Result<Fingerprint, FingerprintError> {
        let mut file = File::open(path).map_err(|e| FingerprintError::unreadable(path, e))?;
        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FingerprintError::unreadable(path, e)),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Fingerprint::content(*hasher.finalize().as_bytes()))
    }
}
