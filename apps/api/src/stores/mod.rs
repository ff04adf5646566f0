#![allow(dead_code)]

//! External storage collaborators behind object-safe traits.
//!
//! The pipeline never talks to S3 or Redis directly — it holds
//! `Arc<dyn DocumentStore>` / `Arc<dyn RecordStore>` so tests can substitute
//! in-memory doubles.

pub mod memory;
pub mod redis;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("upload returned no handle")]
    NoHandle,

    #[error("object not found: {0}")]
    NotFound(String),
}

/// The stable handle returned by an upload. Write-once for the lifetime of
/// the record that references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// Content store for uploaded binaries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Uploads a payload and returns its stable path handle.
    async fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredFile, StoreError>;

    /// Reads a previously returned handle back into bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

/// String key→value store with prefix-wildcard listing. The only concurrency
/// guarantee callers rely on is last-write-wins per key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Enumerates all entries whose key starts with `prefix`, in the store's
    /// own order. No ordering layer is added on top.
    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, StoreError>;
}
