//! Append-only record store using SQLite.
//!
//! Holds the credential rows and the request audit log. Token columns only
//! ever receive ciphertext.

use super::{Credential, CredentialStore, SealedTokens};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// One audited marketplace request.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    /// Credential row that authorized the request
    pub credential_id: Option<i64>,
    pub status_code: u16,
}

/// SQLite-backed record store.
///
/// # Schema
/// ```sql
/// CREATE TABLE credentials (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     created_at TEXT NOT NULL,      -- RFC 3339 timestamp
///     access_token TEXT NOT NULL,    -- Encrypted
///     refresh_token TEXT NOT NULL    -- Encrypted
/// );
///
/// CREATE TABLE request_log (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     created_at TEXT NOT NULL,
///     url TEXT NOT NULL,
///     credential_id INTEGER,
///     status_code INTEGER NOT NULL
/// );
/// ```
///
/// `AUTOINCREMENT` keeps ids monotonic, so the highest id is always the
/// most recent credential.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Creates or opens a record store. `":memory:"` opens a private
    /// in-memory database.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS request_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                url TEXT NOT NULL,
                credential_id INTEGER,
                status_code INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to create schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("Record store lock poisoned".to_string()))
    }

    /// Persists a credential row with an explicit creation time.
    pub fn append_at(&self, tokens: &SealedTokens, created_at: DateTime<Utc>) -> Result<Credential> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO credentials (created_at, access_token, refresh_token) VALUES (?1, ?2, ?3)",
            params![
                created_at.to_rfc3339(),
                tokens.access_token(),
                tokens.refresh_token()
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to store credential: {}", e)))?;
        let id = tx.last_insert_rowid();

        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit credential: {}", e)))?;

        Ok(Credential {
            id,
            created_at,
            access_token: tokens.access_token().to_string(),
            refresh_token: tokens.refresh_token().to_string(),
        })
    }

    pub fn credential_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM credentials", [], |row| row.get(0))?)
    }

    /// Records a marketplace request made with the given credential.
    pub fn log_request(
        &self,
        url: &str,
        credential_id: Option<i64>,
        status_code: u16,
    ) -> Result<RequestLog> {
        let created_at = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO request_log (created_at, url, credential_id, status_code) VALUES (?1, ?2, ?3, ?4)",
            params![created_at.to_rfc3339(), url, credential_id, status_code],
        )
        .map_err(|e| Error::Storage(format!("Failed to log request: {}", e)))?;

        Ok(RequestLog {
            id: conn.last_insert_rowid(),
            created_at,
            url: url.to_string(),
            credential_id,
            status_code,
        })
    }

    #[cfg(test)]
    fn latest_request(&self) -> Result<Option<RequestLog>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, created_at, url, credential_id, status_code
                FROM request_log
                ORDER BY id DESC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, u16>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, created_at, url, credential_id, status_code)| {
            Ok(RequestLog {
                id,
                created_at: parse_timestamp(&created_at)?,
                url,
                credential_id,
                status_code,
            })
        })
        .transpose()
    }

    pub fn request_log_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM request_log", [], |row| row.get(0))?)
    }
}

impl CredentialStore for SqliteStore {
    fn latest(&self) -> Result<Option<Credential>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, created_at, access_token, refresh_token
                FROM credentials
                ORDER BY id DESC
                LIMIT 1
                "#,
                [],
                read_credential_row,
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to read latest credential: {}", e)))?;

        row.map(|(id, created_at, access_token, refresh_token)| {
            Ok(Credential {
                id,
                created_at: parse_timestamp(&created_at)?,
                access_token,
                refresh_token,
            })
        })
        .transpose()
    }

    fn append(&self, tokens: &SealedTokens) -> Result<Credential> {
        self.append_at(tokens, Utc::now())
    }
}

fn read_credential_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid stored timestamp {:?}: {}", raw, e)))
}
