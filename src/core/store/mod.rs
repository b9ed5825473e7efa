mod sqlite;

use async_trait::async_trait;

use crate::core::requests::{AgentRequest, RequestStatus};

pub use sqlite::SqliteRequestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request '{0}' already exists")]
    DuplicateKey(String),
    #[error("stored request '{request_id}' is unreadable: {detail}")]
    Corrupt { request_id: String, detail: String },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Durable storage of agent requests keyed by `request_id`.
///
/// Every call commits before returning. Implementations must be safe to
/// share across request handlers without an outer lock.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicateKey`] rather
    /// than overwriting an existing id.
    async fn insert(&self, record: &AgentRequest) -> Result<(), StoreError>;

    /// Set `status`, `result` and `updated_at` on one record. Returns `false`
    /// when the id is unknown.
    async fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        result: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Like [`RequestStore::update_status`] but only applies while the
    /// record is still in `from`. Returns `false` when the id is unknown or
    /// the record has already moved on.
    async fn update_status_from(
        &self,
        request_id: &str,
        from: RequestStatus,
        status: RequestStatus,
        result: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, request_id: &str) -> Result<Option<AgentRequest>, StoreError>;
}
