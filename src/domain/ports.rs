use crate::domain::model::{DeleteItem, GetItem, PutItem, ScanItems, UpdateItem};
use crate::utils::error::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// The document store the dispatcher talks to. Every primitive is addressed
/// by table name and returns the backend's own JSON result.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(false)` when the table does not exist.
    async fn table_exists(&self, table: &str) -> BackendResult<bool>;

    async fn put(&self, table: &str, request: PutItem) -> BackendResult<Value>;

    async fn get(&self, table: &str, request: GetItem) -> BackendResult<Value>;

    async fn update(&self, table: &str, request: UpdateItem) -> BackendResult<Value>;

    async fn delete(&self, table: &str, request: DeleteItem) -> BackendResult<Value>;

    async fn scan(&self, table: &str, request: ScanItems) -> BackendResult<Value>;
}

pub trait ConfigProvider: Send + Sync {
    fn max_concurrency(&self) -> usize;
    fn invocation_timeout(&self) -> Duration;
}
