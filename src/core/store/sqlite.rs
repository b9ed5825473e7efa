use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::{RequestStore, StoreError};
use crate::core::requests::{AgentRequest, RequestStatus, now_utc};
use crate::platform::{NativePlatform, Platform};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "SELECT request_id, prompt, context, status, result, created_at, updated_at FROM agent_requests";

/// SQLite-backed request store. Each operation opens its own connection on
/// the blocking pool and drops it when the unit of work ends.
#[derive(Debug, Clone)]
pub struct SqliteRequestStore {
    path: PathBuf,
}

impl SqliteRequestStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and the `agent_requests` table if needed.
    pub async fn init(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
            NativePlatform::restrict_dir_permissions(parent);
        }

        self.with_connection(|db| {
            let mode: String =
                db.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            db.execute(
                "CREATE TABLE IF NOT EXISTS agent_requests (
                    request_id TEXT PRIMARY KEY,
                    prompt TEXT NOT NULL,
                    context TEXT,
                    status TEXT NOT NULL,
                    result TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )?;
            Ok(mode)
        })
        .await
        .map(|mode| {
            NativePlatform::restrict_file_permissions(&self.path);
            info!(
                "Request store ready at {} (journal_mode={})",
                self.path.display(),
                mode
            );
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let db = Connection::open(&path)?;
            db.busy_timeout(BUSY_TIMEOUT)?;
            f(&db)
        })
        .await?
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(request_id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            request_id: request_id.to_string(),
            detail: format!("bad timestamp '{}': {}", value, e),
        })
}

struct RawRow {
    request_id: String,
    prompt: String,
    context: Option<String>,
    status: String,
    result: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<AgentRequest, StoreError> {
        let status = RequestStatus::from_status(&self.status).ok_or_else(|| StoreError::Corrupt {
            request_id: self.request_id.clone(),
            detail: format!("unknown status '{}'", self.status),
        })?;
        let created_at = parse_timestamp(&self.request_id, &self.created_at)?;
        let updated_at = parse_timestamp(&self.request_id, &self.updated_at)?;
        Ok(AgentRequest {
            request_id: self.request_id,
            prompt: self.prompt,
            context: self.context,
            status,
            result: self.result,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl RequestStore for SqliteRequestStore {
    async fn insert(&self, record: &AgentRequest) -> Result<(), StoreError> {
        let record = record.clone();
        self.with_connection(move |db| {
            let inserted = db.execute(
                "INSERT INTO agent_requests (request_id, prompt, context, status, result, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.request_id,
                    record.prompt,
                    record.context,
                    record.status.as_str(),
                    record.result,
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.updated_at),
                ],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateKey(record.request_id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        result: Option<&str>,
    ) -> Result<bool, StoreError> {
        let request_id = request_id.to_string();
        let result = result.map(str::to_string);
        let updated_at = format_timestamp(&now_utc());
        self.with_connection(move |db| {
            let rows = db.execute(
                "UPDATE agent_requests SET status = ?1, result = ?2, updated_at = ?3 WHERE request_id = ?4",
                params![status.as_str(), result, updated_at, request_id],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    async fn update_status_from(
        &self,
        request_id: &str,
        from: RequestStatus,
        status: RequestStatus,
        result: Option<&str>,
    ) -> Result<bool, StoreError> {
        let request_id = request_id.to_string();
        let result = result.map(str::to_string);
        let updated_at = format_timestamp(&now_utc());
        self.with_connection(move |db| {
            let rows = db.execute(
                "UPDATE agent_requests SET status = ?1, result = ?2, updated_at = ?3
                 WHERE request_id = ?4 AND status = ?5",
                params![status.as_str(), result, updated_at, request_id, from.as_str()],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    async fn get(&self, request_id: &str) -> Result<Option<AgentRequest>, StoreError> {
        let request_id = request_id.to_string();
        self.with_connection(move |db| {
            let raw = db
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE request_id = ?1"),
                    params![request_id],
                    |row| {
                        Ok(RawRow {
                            request_id: row.get(0)?,
                            prompt: row.get(1)?,
                            context: row.get(2)?,
                            status: row.get(3)?,
                            result: row.get(4)?,
                            created_at: row.get(5)?,
                            updated_at: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            raw.map(RawRow::into_record).transpose()
        })
        .await
    }
}
