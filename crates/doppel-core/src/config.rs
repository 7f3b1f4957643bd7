//! Scan, filter and action configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Image extensions fingerprinted perceptually by default.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif", "webp"];

/// Normalize one configured extension entry.
///
/// `*.JPG`, `.jpg` and `jpg` all become `jpg`; `*` and `*.*` become the
/// wildcard `*`. Empty or whitespace-only entries yield `None`.
pub fn normalize_extension(entry: &str) -> Option<String> {
    let trimmed = entry.trim();
    if trimmed == "*" || trimmed == "*.*" {
        return Some("*".to_string());
    }
    let ext = trimmed.trim_start_matches('*').trim_start_matches('.').trim();
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// Eligibility rules applied to every discovered file.
///
/// Size bounds are inclusive on both ends: a file is skipped only when
/// `size < min_size` or `size > max_size`.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct FilterConfig {
    /// Allowed extensions. Empty, or containing `*`, accepts everything.
    #[builder(default)]
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Minimum file size in bytes (inclusive).
    #[builder(default = "0")]
    #[serde(default)]
    pub min_size: u64,

    /// Maximum file size in bytes (inclusive).
    #[builder(default = "u64::MAX")]
    #[serde(default = "default_max_size", skip_serializing_if = "is_unbounded")]
    pub max_size: u64,
}

fn default_max_size() -> u64 {
    u64::MAX
}

// TOML integers are i64, so the unbounded default is left out.
fn is_unbounded(max: &u64) -> bool {
    *max == u64::MAX
}

impl FilterConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let min = self.min_size.unwrap_or(0);
        let max = self.max_size.unwrap_or(u64::MAX);
        if min > max {
            return Err(format!("min_size ({min}) is greater than max_size ({max})"));
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            min_size: 0,
            max_size: u64::MAX,
        }
    }
}

impl FilterConfig {
    /// Create a new filter config builder.
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    /// Split a `;`/`,` separated extension list into normalized entries.
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split([';', ','])
            .filter_map(normalize_extension)
            .collect()
    }

    /// Replace the allow-list with a parsed `;`/`,` separated list.
    pub fn with_extension_list(mut self, list: &str) -> Self {
        self.extensions = Self::parse_extensions(list);
        self
    }

    /// Normalized allow-list entries, wildcards included.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .filter_map(|e| normalize_extension(e))
            .collect()
    }

    /// Whether every extension is accepted.
    pub fn accepts_all_extensions(&self) -> bool {
        let normalized = self.normalized_extensions();
        normalized.is_empty() || normalized.iter().any(|e| e == "*")
    }

    /// Whether the size bounds are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size ({}) is greater than max_size ({})",
                self.min_size, self.max_size
            ));
        }
        Ok(())
    }
}

/// How files are matched against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Fingerprint recognized images perceptually instead of by content.
    #[serde(default = "default_true")]
    pub perceptual: bool,

    /// Ignore the size component of the key for perceptual matches.
    ///
    /// With this off (the default), visually identical images that differ
    /// in byte size are not duplicates.
    #[serde(default)]
    pub perceptual_ignores_size: bool,

    /// Maximum Hamming distance between two perceptual hashes that still
    /// counts as a match.
    #[serde(default)]
    pub perceptual_tolerance: u32,

    /// Extensions treated as images.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_image_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            perceptual: true,
            perceptual_ignores_size: false,
            perceptual_tolerance: 0,
            image_extensions: default_image_extensions(),
        }
    }
}

impl MatchPolicy {
    /// Policy that fingerprints everything by content.
    pub fn exact_only() -> Self {
        Self {
            perceptual: false,
            ..Self::default()
        }
    }

    /// Check if a (lowercase, dotless) extension is a recognized image.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        !ext.is_empty()
            && self
                .image_extensions
                .iter()
                .filter_map(|e| normalize_extension(e))
                .any(|e| e == ext)
    }
}

/// Configuration for one scan pass.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// File eligibility rules.
    #[builder(default)]
    #[serde(default)]
    pub filter: FilterConfig,

    /// Duplicate matching policy.
    #[builder(default)]
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Patterns to ignore (gitignore-style globs matched against names).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of threads for walking and hashing (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Paths never walked, along with everything beneath them.
    #[builder(default)]
    #[serde(default)]
    pub exclude_paths: Vec<PathBuf>,
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if let Some(ref filter) = self.filter {
            filter.validate()?;
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: FilterConfig::default(),
            match_policy: MatchPolicy::default(),
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
            exclude_paths: Vec::new(),
        }
    }

    /// Replace the filter.
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the match policy.
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Add paths to leave out of the walk.
    pub fn with_exclusions(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.exclude_paths.extend(paths);
        self
    }

    /// Check if hidden files should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Directories the action executor and recovery ledger write into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRoots {
    /// Destination for `move` actions.
    pub quarantine: PathBuf,
    /// Destination for `soft_delete` actions.
    pub trash: PathBuf,
    /// Recovery ledger directory.
    pub recovery: PathBuf,
}

impl ActionRoots {
    /// Lay out all three roots under one base directory.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            quarantine: base.join("quarantine"),
            trash: base.join("trash"),
            recovery: base.join("recovery"),
        }
    }
}
