//! User configuration loaded from `config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use doppel_core::{ActionRoots, FilterConfig, MatchPolicy, ScanConfig};

use crate::error::EngineError;

/// Everything the engine needs, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoppelConfig {
    /// Quarantine, trash and recovery directories.
    pub roots: ActionRoots,

    /// SQLite scan log. `None` turns scan history off.
    pub scan_store: Option<PathBuf>,

    /// Default filter, used when a scan is started without one.
    pub filter: FilterConfig,

    /// Duplicate matching policy.
    pub match_policy: MatchPolicy,

    /// Gitignore-style names to skip while walking.
    pub ignore_patterns: Vec<String>,

    /// Worker threads for walking and hashing (0 = auto-detect).
    pub threads: usize,

    /// Include hidden files (starting with .).
    pub include_hidden: bool,
}

impl Default for DoppelConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doppel");
        Self::under(base)
    }
}

impl DoppelConfig {
    /// A config keeping every doppel-owned file under `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            roots: ActionRoots::under(base),
            scan_store: Some(base.join("scan_store.db")),
            filter: FilterConfig::default(),
            match_policy: MatchPolicy::default(),
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
        }
    }

    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("doppel").join("config.toml"))
    }

    /// Load the default config file, or return defaults when there is none.
    pub fn load() -> Result<Self, EngineError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| EngineError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse TOML config text.
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        config.filter.validate()?;
        Ok(config)
    }

    /// Scan config for one pass over `root`.
    pub fn scan_config(&self, root: impl Into<PathBuf>, filter: FilterConfig) -> ScanConfig {
        ScanConfig {
            root: root.into(),
            filter,
            match_policy: self.match_policy.clone(),
            ignore_patterns: self.ignore_patterns.clone(),
            threads: self.threads,
            include_hidden: self.include_hidden,
            exclude_paths: self.owned_paths(),
        }
    }

    /// Every path doppel writes to, so a scan never walks its own state.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![
            self.roots.quarantine.clone(),
            self.roots.trash.clone(),
            self.roots.recovery.clone(),
        ];
        if let Some(store) = &self.scan_store {
            paths.push(store.clone());
            for suffix in ["-wal", "-shm", "-journal"] {
                let mut sibling = store.clone().into_os_string();
                sibling.push(suffix);
                paths.push(PathBuf::from(sibling));
            }
        }
        paths
    }
}
