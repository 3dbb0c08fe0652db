//! SQLite-backed document store.
//!
//! Each user document is one JSON row keyed by username. Schema changes are
//! tracked through `PRAGMA user_version`; mutations run inside `IMMEDIATE`
//! transactions so a read-modify-write of one document cannot interleave with
//! another writer, in this process or any other.

use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::{error, info};

use super::store::{DocumentStore, StoreError};
use crate::model::UserDocument;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE users (
              username TEXT PRIMARY KEY NOT NULL,
              document TEXT NOT NULL
          );",
}];

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let started_at = Instant::now();
        let conn = Connection::open(path.as_ref()).map_err(|err| {
            error!(path = %path.as_ref().display(), error = %err, "failed to open sqlite store");
            map_sqlite_error(err)
        })?;
        let store = Self::bootstrap(conn)?;
        info!(
            path = %path.as_ref().display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "sqlite store ready"
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::bootstrap(conn)
    }

    fn bootstrap(mut conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_sqlite_error)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

fn apply_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(map_sqlite_error)?;
    let latest = latest_version();
    if current > latest {
        return Err(StoreError::Backend(format!(
            "database schema version {current} is newer than supported {latest}"
        )));
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction().map_err(map_sqlite_error)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql).map_err(map_sqlite_error)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            .map_err(map_sqlite_error)?;
    }
    tx.commit().map_err(map_sqlite_error)?;
    info!(from = current, to = latest, "applied sqlite migrations");
    Ok(())
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::Transient(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn decode(username: &str, raw: &str) -> Result<UserDocument, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Corrupt {
        user: username.to_string(),
        reason: err.to_string(),
    })
}

fn encode(document: &UserDocument) -> Result<String, StoreError> {
    serde_json::to_string(document).map_err(|err| StoreError::Backend(err.to_string()))
}

impl DocumentStore for SqliteStore {
    fn insert(&self, document: UserDocument) -> Result<(), StoreError> {
        let raw = encode(&document)?;
        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO users (username, document) VALUES (?1, ?2)",
            params![document.username, raw],
        ) {
            Ok(_) => Ok(()),
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(StoreError::Duplicate(document.username.clone()))
            }
            Err(err) => Err(map_sqlite_error(err)),
        }
    }

    fn find(&self, username: &str) -> Result<Option<UserDocument>, StoreError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_error)?;
        raw.map(|raw| decode(username, &raw)).transpose()
    }

    fn modify<T, E, F>(&self, username: &str, mutate: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut UserDocument) -> Result<T, E>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;
        let raw: Option<String> = tx
            .query_row(
                "SELECT document FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_error)?;
        let raw = raw.ok_or_else(|| StoreError::Missing(username.to_string()))?;
        let mut document = decode(username, &raw)?;

        // Dropping `tx` on the error path rolls back.
        let value = mutate(&mut document)?;

        let updated = encode(&document)?;
        tx.execute(
            "UPDATE users SET document = ?1 WHERE username = ?2",
            params![updated, username],
        )
        .map_err(map_sqlite_error)?;
        tx.commit().map_err(map_sqlite_error)?;
        Ok(value)
    }
}
