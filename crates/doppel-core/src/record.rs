//! File records, fingerprints and duplicate pairs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// How a fingerprint was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    /// BLAKE3 digest over the full byte stream.
    Content,
    /// Average hash over decoded pixel data.
    Perceptual,
}

impl FingerprintKind {
    /// Stable string form, used by the scan store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Perceptual => "perceptual",
        }
    }

    /// Parse the string form produced by [`FingerprintKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "perceptual" => Some(Self::Perceptual),
            _ => None,
        }
    }
}

/// Opaque content fingerprint.
///
/// Two files are candidates for duplication when their fingerprints are
/// equal; the scanner additionally requires equal sizes (see
/// [`Fingerprint::composite_key`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    kind: FingerprintKind,
    hex: String,
}

impl Fingerprint {
    /// Create a content fingerprint from a 32-byte digest.
    pub fn content(bytes: [u8; 32]) -> Self {
        Self {
            kind: FingerprintKind::Content,
            hex: bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }

    /// Create a perceptual fingerprint from a 64-bit average hash.
    pub fn perceptual(bits: u64) -> Self {
        Self {
            kind: FingerprintKind::Perceptual,
            hex: format!("{bits:016x}"),
        }
    }

    /// Rebuild a fingerprint from stored parts.
    pub fn from_parts(kind: FingerprintKind, hex: impl Into<String>) -> Self {
        Self {
            kind,
            hex: hex.into(),
        }
    }

    /// The policy that produced this fingerprint.
    pub fn kind(&self) -> FingerprintKind {
        self.kind
    }

    /// Hex string form.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Raw hash bits of a perceptual fingerprint.
    pub fn perceptual_bits(&self) -> Option<u64> {
        match self.kind {
            FingerprintKind::Perceptual => u64::from_str_radix(&self.hex, 16).ok(),
            FingerprintKind::Content => None,
        }
    }

    /// Composite equality key: `fingerprint + "_" + size`.
    pub fn composite_key(&self, size: u64) -> String {
        format!("{}_{size}", self.hex)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// A file observed during one scan pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes at walk time.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Content fingerprint.
    pub fingerprint: Fingerprint,
    /// Whether the file has a recognized image extension.
    pub is_image: bool,
}

impl FileRecord {
    /// Create a new file record.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
        fingerprint: Fingerprint,
        is_image: bool,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            fingerprint,
            is_image,
        }
    }

    /// Lowercase extension without the dot, empty if there is none.
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// Composite key of this record's fingerprint and size.
    pub fn composite_key(&self) -> String {
        self.fingerprint.composite_key(self.size)
    }
}

/// Lowercase extension of a path without the dot, empty if there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// A duplicate file and the first-seen original it duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicatePair {
    /// The file classified as a duplicate.
    pub duplicate: PathBuf,
    /// The first file observed with the same key.
    pub original: PathBuf,
}

impl DuplicatePair {
    /// Create a new pair.
    pub fn new(duplicate: impl Into<PathBuf>, original: impl Into<PathBuf>) -> Self {
        Self {
            duplicate: duplicate.into(),
            original: original.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_fingerprint_hex() {
        let fp = Fingerprint::content([0xab; 32]);
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().starts_with("abab"));
        assert_eq!(fp.kind(), FingerprintKind::Content);
        assert!(fp.perceptual_bits().is_none());
    }

    #[test]
    fn test_perceptual_fingerprint_bits() {
        let fp = Fingerprint::perceptual(0x0f0f_0000_ffff_0001);
        assert_eq!(fp.as_str(), "0f0f0000ffff0001");
        assert_eq!(fp.perceptual_bits(), Some(0x0f0f_0000_ffff_0001));
    }

    #[test]
    fn test_composite_key_includes_size() {
        let fp = Fingerprint::perceptual(1);
        assert_eq!(fp.composite_key(42), "0000000000000001_42");
        assert_ne!(fp.composite_key(42), fp.composite_key(43));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/Photo.JPG")), "jpg");
        assert_eq!(extension_of(Path::new("/a/Makefile")), "");
        assert_eq!(extension_of(Path::new("/a/archive.tar.gz")), "gz");
    }

    #[test]
    fn test_kind_round_trip_str() {
        for kind in [FingerprintKind::Content, FingerprintKind::Perceptual] {
            assert_eq!(FingerprintKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FingerprintKind::parse("sha1"), None);
    }
}
