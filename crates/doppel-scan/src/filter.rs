//! File eligibility filter.

use std::collections::HashSet;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use doppel_core::{FilterConfig, ScanConfig, ScanError, normalize_extension};

/// Decides whether a discovered file takes part in a scan.
#[derive(Debug, Clone)]
pub struct Filter {
    /// `None` accepts every extension.
    extensions: Option<HashSet<String>>,
    min_size: u64,
    max_size: u64,
    ignore: GlobSet,
}

impl Filter {
    /// Build a filter from an extension/size config alone.
    pub fn from_config(config: &FilterConfig) -> Self {
        let extensions = if config.accepts_all_extensions() {
            None
        } else {
            Some(config.normalized_extensions().into_iter().collect())
        };

        Self {
            extensions,
            min_size: config.min_size,
            max_size: config.max_size,
            ignore: GlobSet::empty(),
        }
    }

    /// Build a filter for a full scan config, including ignore patterns.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        config
            .filter
            .validate()
            .map_err(|message| ScanError::InvalidConfig { message })?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
                message: format!("Bad ignore pattern '{pattern}': {e}"),
            })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })?;

        Ok(Self {
            ignore,
            ..Self::from_config(&config.filter)
        })
    }

    /// Check a file name and size against the allow-list and size bounds.
    pub fn accepts(&self, filename: &str, size: u64) -> bool {
        if size < self.min_size || size > self.max_size {
            return false;
        }

        match &self.extensions {
            None => true,
            Some(allowed) => Path::new(filename)
                .extension()
                .and_then(|e| normalize_extension(&e.to_string_lossy()))
                .is_some_and(|ext| allowed.contains(&ext)),
        }
    }

    /// Check if any component of a root-relative path matches an ignore pattern.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        relative
            .components()
            .any(|c| self.ignore.is_match(c.as_os_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(list: &str, min: u64, max: u64) -> Filter {
        let config = FilterConfig::builder()
            .extensions(FilterConfig::parse_extensions(list))
            .min_size(min)
            .max_size(max)
            .build()
            .unwrap();
        Filter::from_config(&config)
    }

    #[test]
    fn test_accept_all_by_default() {
        let filter = Filter::from_config(&FilterConfig::default());
        assert!(filter.accepts("a.txt", 0));
        assert!(filter.accepts("Makefile", 10));
        assert!(filter.accepts("photo.JPG", u64::MAX));
    }

    #[test]
    fn test_extensions_case_insensitive() {
        let filter = filter("*.JPG;png", 0, u64::MAX);
        assert!(filter.accepts("a.jpg", 1));
        assert!(filter.accepts("a.Jpg", 1));
        assert!(filter.accepts("b.PNG", 1));
        assert!(!filter.accepts("c.txt", 1));
        assert!(!filter.accepts("noext", 1));
    }

    #[test]
    fn test_blank_entries_behave_as_accept_all() {
        let filter = filter(" ; , ", 0, u64::MAX);
        assert!(filter.accepts("anything.bin", 3));
    }

    #[test]
    fn test_size_bounds_inclusive() {
        let filter = filter("*", 10, 20);
        assert!(!filter.accepts("a.txt", 9));
        assert!(filter.accepts("a.txt", 10));
        assert!(filter.accepts("a.txt", 20));
        assert!(!filter.accepts("a.txt", 21));
    }

    #[test]
    fn test_ignore_patterns_match_components() {
        let config = ScanConfig::builder()
            .root("/test")
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();
        let filter = Filter::new(&config).unwrap();

        assert!(filter.is_ignored(Path::new("node_modules/pkg/index.js")));
        assert!(filter.is_ignored(Path::new("build/output.log")));
        assert!(!filter.is_ignored(Path::new("src/main.rs")));
    }

    #[test]
    fn test_bad_ignore_pattern_is_config_error() {
        let config = ScanConfig::builder()
            .root("/test")
            .ignore_patterns(vec!["[".to_string()])
            .build()
            .unwrap();
        assert!(matches!(
            Filter::new(&config),
            Err(ScanError::InvalidConfig { .. })
        ));
    }
}
