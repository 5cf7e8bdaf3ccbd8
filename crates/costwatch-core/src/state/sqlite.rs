//! SQLite-backed alert state
//!
//! Schema:
//! - state_meta: key/value table holding the schema version
//! - alert_state: one row per period, JSON-encoded `AlertState` plus a
//!   monotonically increasing version used for compare-and-set
//!
//! Multiple processes may share the file. WAL mode lets readers proceed during
//! a write; `busy_timeout` bounds how long a write waits for the lock before
//! failing with `StoreError::Timeout`.
//!
//! Schema Version History:
//! - v1: Initial version

use costwatch_types::{AlertState, PeriodKey};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::{DedupStateStore, VersionedState, WriteOutcome};
use crate::error::StoreError;

/// Current schema version. Unlike a cache, alert history is never cleared
/// on mismatch: a newer schema is refused instead.
const SCHEMA_VERSION: i64 = 1;

/// Default wait for a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// SQLite-based dedup state store (thread-safe)
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    timeout_ms: u64,
}

impl SqliteStateStore {
    /// Create or open the state database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Unavailable {
            operation: "open",
            source,
        })?;

        let store = Self::init(conn, busy_timeout, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "Alert state store initialized");
        Ok(store)
    }

    /// Private database, gone when the store is dropped
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Unavailable {
            operation: "open",
            source,
        })?;
        Self::init(conn, DEFAULT_BUSY_TIMEOUT, None)
    }

    fn init(
        conn: Connection,
        busy_timeout: Duration,
        path: Option<PathBuf>,
    ) -> Result<Self, StoreError> {
        let timeout_ms = busy_timeout.as_millis() as u64;
        let fail =
            |operation: &'static str| move |e: rusqlite::Error| classify(operation, timeout_ms, e);

        conn.busy_timeout(busy_timeout).map_err(fail("configure"))?;

        // Enable WAL mode for concurrent readers
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(fail("configure"))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS state_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alert_state (
                period TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(fail("create schema"))?;

        let stored_version: Option<i64> = conn
            .query_row(
                "SELECT value FROM state_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(fail("read schema version"))?;

        match stored_version {
            None => {
                conn.execute(
                    "INSERT OR IGNORE INTO state_meta (key, value) VALUES ('schema_version', ?)",
                    params![SCHEMA_VERSION],
                )
                .map_err(fail("write schema version"))?;
                debug!("State schema version initialized to {}", SCHEMA_VERSION);
            }
            Some(v) if v != SCHEMA_VERSION => {
                warn!(stored = v, current = SCHEMA_VERSION, "State schema version mismatch");
                return Err(StoreError::SchemaMismatch {
                    found: v,
                    expected: SCHEMA_VERSION,
                });
            }
            Some(_) => {}
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            timeout_ms,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Periods with stored state, oldest first
    pub fn periods(&self) -> Result<Vec<PeriodKey>, StoreError> {
        let conn = self.conn.lock();
        let fail = |e: rusqlite::Error| classify("list periods", self.timeout_ms, e);

        let mut stmt = conn
            .prepare("SELECT period FROM alert_state ORDER BY period")
            .map_err(fail)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(fail)?;

        let mut periods = Vec::new();
        for row in rows {
            let raw = row.map_err(fail)?;
            let period = PeriodKey::parse(&raw).map_err(|message| StoreError::Corrupt {
                period: raw.clone(),
                message,
            })?;
            periods.push(period);
        }
        Ok(periods)
    }

    /// Delete state of every period strictly before `period`
    ///
    /// # Returns
    /// Number of periods removed
    pub fn prune_before(&self, period: &PeriodKey) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        // YYYY-MM keys sort chronologically as text
        let removed = conn
            .execute(
                "DELETE FROM alert_state WHERE period < ?",
                params![period.as_str()],
            )
            .map_err(|e| classify("prune", self.timeout_ms, e))?;

        debug!(before = %period, removed, "Pruned alert state");
        Ok(removed)
    }
}

impl DedupStateStore for SqliteStateStore {
    fn read(&self, period: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
        let conn = self.conn.lock();

        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, data FROM alert_state WHERE period = ?",
                params![period.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| classify("read", self.timeout_ms, e))?;

        let Some((version, data)) = row else {
            debug!(period = %period, "No alert state stored");
            return Ok(None);
        };

        let state: AlertState = serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
            period: period.to_string(),
            message: e.to_string(),
        })?;
        if &state.period != period {
            return Err(StoreError::Corrupt {
                period: period.to_string(),
                message: format!("row holds state for {}", state.period),
            });
        }

        Ok(Some(VersionedState {
            state,
            version: version as u64,
        }))
    }

    fn write(
        &self,
        period: &PeriodKey,
        state: &AlertState,
        expected_version: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        let data = serde_json::to_string(state).map_err(|e| StoreError::Corrupt {
            period: period.to_string(),
            message: e.to_string(),
        })?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock();

        let (affected, version) = match expected_version {
            None => {
                let affected = conn
                    .execute(
                        "INSERT INTO alert_state (period, version, data, updated_at)
                         VALUES (?1, 1, ?2, ?3)
                         ON CONFLICT(period) DO NOTHING",
                        params![period.as_str(), data, updated_at],
                    )
                    .map_err(|e| classify("write", self.timeout_ms, e))?;
                (affected, 1)
            }
            Some(expected) => {
                let affected = conn
                    .execute(
                        "UPDATE alert_state
                         SET version = version + 1, data = ?1, updated_at = ?2
                         WHERE period = ?3 AND version = ?4",
                        params![data, updated_at, period.as_str(), expected as i64],
                    )
                    .map_err(|e| classify("write", self.timeout_ms, e))?;
                (affected, expected + 1)
            }
        };

        if affected == 1 {
            debug!(period = %period, version, "Alert state written");
            Ok(WriteOutcome::Written { version })
        } else {
            debug!(period = %period, ?expected_version, "Alert state write conflict");
            Ok(WriteOutcome::Conflict)
        }
    }
}

/// Lock contention past `busy_timeout` is a timeout, everything else is unavailability
fn classify(operation: &'static str, timeout_ms: u64, err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Timeout {
            operation,
            timeout_ms,
        },
        _ => StoreError::Unavailable {
            operation,
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn period(raw: &str) -> PeriodKey {
        PeriodKey::parse(raw).unwrap()
    }

    fn setup() -> (TempDir, SqliteStateStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStateStore::open(&dir.path().join("state.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_state_round_trip() {
        let (_dir, store) = setup();
        let mut state = AlertState::empty(period("2026-03"));
        state.fired_levels.extend([50, 75]);
        state.adhoc_fired = true;

        store.write(&period("2026-03"), &state, None).unwrap();
        let stored = store.read(&period("2026-03")).unwrap().unwrap();

        assert_eq!(stored.state, state);
        assert_eq!(stored.version, 1);
        assert!(store.read(&period("2026-04")).unwrap().is_none());
    }

    #[test]
    fn test_compare_and_set_conflicts() {
        let (_dir, store) = setup();
        let state = AlertState::empty(period("2026-03"));

        assert_eq!(
            store.write(&period("2026-03"), &state, None).unwrap(),
            WriteOutcome::Written { version: 1 }
        );
        assert_eq!(
            store.write(&period("2026-03"), &state, None).unwrap(),
            WriteOutcome::Conflict
        );
        assert_eq!(
            store.write(&period("2026-03"), &state, Some(1)).unwrap(),
            WriteOutcome::Written { version: 2 }
        );
        assert_eq!(
            store.write(&period("2026-03"), &state, Some(1)).unwrap(),
            WriteOutcome::Conflict
        );
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let mut state = AlertState::empty(period("2026-03"));
        state.fired_levels.insert(90);

        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.write(&period("2026-03"), &state, None).unwrap();
        }

        let store = SqliteStateStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let stored = store.read(&period("2026-03")).unwrap().unwrap();
        assert!(stored.state.has_fired(90));
        assert!(SqliteStateStore::in_memory().unwrap().path().is_none());
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let (_dir, store) = setup();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO alert_state (period, version, data, updated_at)
                 VALUES ('2026-03', 1, 'not json', '')",
                [],
            )
            .unwrap();

        let err = store.read(&period("2026-03")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store
                .conn
                .lock()
                .execute("UPDATE state_meta SET value = 99 WHERE key = 'schema_version'", [])
                .unwrap();
        }

        let err = SqliteStateStore::open(&path).err().unwrap();
        assert!(matches!(
            err,
            StoreError::SchemaMismatch {
                found: 99,
                expected: 1
            }
        ));
    }

    #[test]
    fn test_periods_and_prune() {
        let store = SqliteStateStore::in_memory().unwrap();
        for raw in ["2026-03", "2025-12", "2026-01"] {
            store
                .write(&period(raw), &AlertState::empty(period(raw)), None)
                .unwrap();
        }

        let listed: Vec<_> = store.periods().unwrap().iter().map(|p| p.to_string()).collect();
        assert_eq!(listed, vec!["2025-12", "2026-01", "2026-03"]);

        assert_eq!(store.prune_before(&period("2026-02")).unwrap(), 2);
        assert_eq!(store.periods().unwrap(), vec![period("2026-03")]);
    }
}
