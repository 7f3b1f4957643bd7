//! Duplicate classification strategies.
//!
//! Records are fed to the classifier one at a time in walk order. Each
//! record is routed to the matcher for its fingerprint kind; the first
//! record registered under a key stays the original for the whole scan.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use doppel_core::{DuplicatePair, FileRecord, FingerprintKind, MatchPolicy};

use crate::perceptual::hamming_distance;

/// A duplicate-matching strategy.
pub trait Matcher {
    /// Find the registered original a record duplicates.
    fn find_original(&self, record: &FileRecord) -> Option<&Path>;

    /// Register a record as an original.
    fn register(&mut self, record: &FileRecord);

    /// Number of registered originals.
    fn len(&self) -> usize;

    /// Check if nothing has been registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte-identical matching on `digest + "_" + size`.
#[derive(Debug, Default)]
pub struct ExactMatcher {
    originals: IndexMap<String, PathBuf>,
}

impl ExactMatcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Matcher for ExactMatcher {
    fn find_original(&self, record: &FileRecord) -> Option<&Path> {
        self.originals
            .get(&record.composite_key())
            .map(PathBuf::as_path)
    }

    fn register(&mut self, record: &FileRecord) {
        self.originals
            .entry(record.composite_key())
            .or_insert_with(|| record.path.clone());
    }

    fn len(&self) -> usize {
        self.originals.len()
    }
}

#[derive(Debug)]
struct PerceptualOriginal {
    bits: u64,
    size: u64,
    path: PathBuf,
}

/// Visual matching on average hashes.
///
/// With zero tolerance this is a keyed lookup on `hash + "_" + size` (or the
/// bare hash when size is ignored). With a tolerance, the earliest
/// registered original within that Hamming distance wins.
#[derive(Debug, Default)]
pub struct PerceptualMatcher {
    ignores_size: bool,
    tolerance: u32,
    originals: IndexMap<String, PerceptualOriginal>,
}

impl PerceptualMatcher {
    /// Create a matcher from a match policy.
    pub fn new(policy: &MatchPolicy) -> Self {
        Self {
            ignores_size: policy.perceptual_ignores_size,
            tolerance: policy.perceptual_tolerance,
            originals: IndexMap::new(),
        }
    }

    fn key(&self, record: &FileRecord) -> String {
        if self.ignores_size {
            record.fingerprint.as_str().to_string()
        } else {
            record.composite_key()
        }
    }
}

impl Matcher for PerceptualMatcher {
    fn find_original(&self, record: &FileRecord) -> Option<&Path> {
        if self.tolerance == 0 {
            return self
                .originals
                .get(&self.key(record))
                .map(|o| o.path.as_path());
        }

        let bits = record.fingerprint.perceptual_bits()?;
        self.originals
            .values()
            .find(|o| {
                (self.ignores_size || o.size == record.size)
                    && hamming_distance(o.bits, bits) <= self.tolerance
            })
            .map(|o| o.path.as_path())
    }

    fn register(&mut self, record: &FileRecord) {
        let Some(bits) = record.fingerprint.perceptual_bits() else {
            return;
        };
        let key = self.key(record);
        self.originals
            .entry(key)
            .or_insert_with(|| PerceptualOriginal {
                bits,
                size: record.size,
                path: record.path.clone(),
            });
    }

    fn len(&self) -> usize {
        self.originals.len()
    }
}

/// Single-writer classifier that turns records into duplicate pairs.
#[derive(Debug)]
pub struct DuplicateClassifier {
    exact: ExactMatcher,
    perceptual: PerceptualMatcher,
    pairs: Vec<DuplicatePair>,
}

impl DuplicateClassifier {
    /// Create a classifier for a match policy.
    pub fn new(policy: &MatchPolicy) -> Self {
        Self {
            exact: ExactMatcher::new(),
            perceptual: PerceptualMatcher::new(policy),
            pairs: Vec::new(),
        }
    }

    /// Classify the next record in walk order.
    ///
    /// Returns the pair when the record duplicates an earlier original;
    /// otherwise registers it as an original and returns `None`.
    pub fn classify(&mut self, record: &FileRecord) -> Option<&DuplicatePair> {
        let matcher: &mut dyn Matcher = match record.fingerprint.kind() {
            FingerprintKind::Content => &mut self.exact,
            FingerprintKind::Perceptual => &mut self.perceptual,
        };

        match matcher.find_original(record).map(Path::to_path_buf) {
            Some(original) => {
                self.pairs
                    .push(DuplicatePair::new(record.path.clone(), original));
                self.pairs.last()
            }
            None => {
                matcher.register(record);
                None
            }
        }
    }

    /// Number of distinct originals registered so far.
    pub fn original_count(&self) -> usize {
        self.exact.len() + self.perceptual.len()
    }

    /// Pairs emitted so far.
    pub fn pairs(&self) -> &[DuplicatePair] {
        &self.pairs
    }

    /// Consume the classifier, returning its pairs in emission order.
    pub fn into_pairs(self) -> Vec<DuplicatePair> {
        self.pairs
    }
}
