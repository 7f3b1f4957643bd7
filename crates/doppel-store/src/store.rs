//! The SQLite [`ScanStore`] and its schema.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use doppel_core::{Fingerprint, FingerprintKind, ScanReport};

use crate::error::StoreError;
use crate::models::{ScanDiff, ScanSession, SessionId, StoredFile};

/// SQLite-backed scan log.
pub struct ScanStore {
    conn: Connection,
}

/// Raw `scanned_file` row before the fingerprint kind is validated.
struct FileRow {
    path: String,
    fingerprint: String,
    kind: String,
    size: i64,
    modified: i64,
    is_duplicate: bool,
    original: Option<String>,
}

impl ScanStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.configure()?;
        debug!(path = %path.display(), "scan store opened");
        Ok(store)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.configure()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Record a completed scan as one session, all-or-nothing.
    pub fn record_scan(
        &mut self,
        root: &Path,
        report: &ScanReport,
    ) -> Result<SessionId, StoreError> {
        let completed_at: DateTime<Utc> = report.scanned_at.into();
        let started_at: DateTime<Utc> = report
            .scanned_at
            .checked_sub(report.scan_duration)
            .unwrap_or(report.scanned_at)
            .into();
        let originals: HashMap<&Path, &Path> = report
            .pairs
            .iter()
            .map(|p| (p.duplicate.as_path(), p.original.as_path()))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO scan_session \
             (root, started_at, completed_at, files_recorded, duplicates_found) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                root.to_string_lossy(),
                started_at,
                completed_at,
                report.records.len() as i64,
                report.pairs.len() as i64,
            ],
        )?;
        let session_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO scanned_file \
                 (session_id, path, fingerprint, fingerprint_kind, size, modified, \
                  is_duplicate, original_path) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in &report.records {
                let original = originals.get(record.path.as_path());
                stmt.execute(params![
                    session_id,
                    record.path.to_string_lossy(),
                    record.fingerprint.as_str(),
                    record.fingerprint.kind().as_str(),
                    record.size as i64,
                    unix_seconds(record.modified),
                    original.is_some(),
                    original.map(|p| p.to_string_lossy()),
                ])?;
            }
        }
        tx.commit()?;

        info!(
            session = session_id,
            files = report.records.len(),
            duplicates = report.pairs.len(),
            "scan recorded"
        );
        Ok(SessionId(session_id))
    }

    /// All sessions, newest first.
    pub fn sessions(&self) -> Result<Vec<ScanSession>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, root, started_at, completed_at, files_recorded, duplicates_found \
             FROM scan_session ORDER BY id DESC",
        )?;
        let sessions = stmt
            .query_map([], |row| {
                Ok(ScanSession {
                    id: SessionId(row.get(0)?),
                    root: PathBuf::from(row.get::<_, String>(1)?),
                    started_at: row.get(2)?,
                    completed_at: row.get(3)?,
                    files_recorded: row.get::<_, i64>(4)? as u64,
                    duplicates_found: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Look up one session.
    pub fn session(&self, id: SessionId) -> Result<ScanSession, StoreError> {
        self.sessions()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::SessionNotFound(id))
    }

    /// Every file recorded in a session, in walk order.
    pub fn files(&self, id: SessionId) -> Result<Vec<StoredFile>, StoreError> {
        self.query_files(id, false)
    }

    /// Duplicate files recorded in a session, with their originals.
    pub fn duplicates(&self, id: SessionId) -> Result<Vec<StoredFile>, StoreError> {
        self.query_files(id, true)
    }

    fn query_files(&self, id: SessionId, duplicates_only: bool) -> Result<Vec<StoredFile>, StoreError> {
        self.ensure_session(id)?;

        let mut stmt = self.conn.prepare(
            "SELECT path, fingerprint, fingerprint_kind, size, modified, is_duplicate, \
                    original_path \
             FROM scanned_file \
             WHERE session_id = ?1 AND (?2 = 0 OR is_duplicate = 1) \
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![id.0, duplicates_only], |row| {
                Ok(FileRow {
                    path: row.get(0)?,
                    fingerprint: row.get(1)?,
                    kind: row.get(2)?,
                    size: row.get(3)?,
                    modified: row.get(4)?,
                    is_duplicate: row.get(5)?,
                    original: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredFile::try_from).collect()
    }

    fn ensure_session(&self, id: SessionId) -> Result<(), StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scan_session WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(id))
        }
    }

    /// Compare two sessions by path, fingerprint and size.
    pub fn diff(&self, old: SessionId, new: SessionId) -> Result<ScanDiff, StoreError> {
        let index = |id| -> Result<BTreeMap<PathBuf, (Fingerprint, u64)>, StoreError> {
            Ok(self
                .files(id)?
                .into_iter()
                .map(|f| (f.path, (f.fingerprint, f.size)))
                .collect())
        };
        let before = index(old)?;
        let after = index(new)?;

        let mut diff = ScanDiff::default();
        for (path, entry) in &after {
            match before.get(path) {
                None => diff.added.push(path.clone()),
                Some(old_entry) if old_entry != entry => diff.changed.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.removed = before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .cloned()
            .collect();
        Ok(diff)
    }

    /// Delete a session and its files.
    pub fn delete_session(&self, id: SessionId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM scan_session WHERE id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(StoreError::SessionNotFound(id));
        }
        Ok(())
    }
}

impl TryFrom<FileRow> for StoredFile {
    type Error = StoreError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let kind = FingerprintKind::parse(&row.kind).ok_or_else(|| StoreError::Malformed {
            message: format!("unknown fingerprint kind '{}' for {}", row.kind, row.path),
        })?;
        Ok(Self {
            path: PathBuf::from(row.path),
            fingerprint: Fingerprint::from_parts(kind, row.fingerprint),
            size: row.size as u64,
            modified: row.modified,
            is_duplicate: row.is_duplicate,
            original: row.original.map(PathBuf::from),
        })
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}
