//! Content store gateway.
//!
//! Two independent capability groups sit behind async traits so backends can
//! be swapped without touching the pipeline:
//!
//! - [`ObjectStore`]: existence check, fetch and put of raw artifacts under
//!   deterministic, identity-derived keys.
//! - [`MediaStore`]: idempotent get-or-create / upsert of media source rows
//!   and lookup/creation of their summaries.
//!
//! Errors are returned unmodified; retries, if any, are the caller's business.

pub mod filesystem;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use filesystem::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use sqlite::SqliteMediaStore;

/// Default bucket for every artifact the pipeline stores.
pub const DOCUMENT_BUCKET: &str = "file-buc";

/// Object key for the acquired audio of a video.
pub fn youtube_audio_key(video_id: &str) -> String {
    format!("youtube/{}.wav", video_id)
}

/// Object key for an uploaded document, by content hash and extension.
pub fn upload_doc_key(file_hash: &str, extension: &str) -> String {
    format!("uploads/doc/{}.{}", file_hash, extension)
}

/// Object key for uploaded audio, always stored as normalized WAV.
pub fn upload_audio_key(file_hash: &str) -> String {
    format!("uploads/audio/{}.wav", file_hash)
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;

    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Stores `bytes` under `key` and returns the key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

/// Kind of media a source row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    Document,
}

/// Reference to exactly one media source, used as the summary's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceRef {
    Youtube(String),
    Document(String),
}

/// Durable, content-addressed record for one piece of source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    pub id: String,
    pub kind: SourceKind,
    /// Video id or content hash.
    pub natural_key: String,
    /// Object key of the acquired artifact. A hint only; the object store
    /// decides whether the artifact is actually present.
    pub storage_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub page_count: Option<u32>,
    pub created_at: String,
}

impl MediaSource {
    pub fn source_ref(&self) -> SourceRef {
        match self.kind {
            SourceKind::Youtube => SourceRef::Youtube(self.id.clone()),
            SourceKind::Document => SourceRef::Document(self.id.clone()),
        }
    }
}

/// One finished summary for a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub source: SourceRef,
    /// Extracted raw text the summary was generated from.
    pub content: String,
    pub summary: String,
    pub created_at: String,
}

/// Attributes of an uploaded document keyed by its content hash.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_hash: String,
    pub original_name: String,
    /// `doc` or `audio`.
    pub file_type: String,
    pub mime_type: String,
    pub size: u64,
    pub duration_seconds: Option<f64>,
    pub page_count: Option<u32>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Returns the record for `video_id`, creating it when absent.
    async fn get_or_create_video(&self, video_id: &str, link: &str)
        -> Result<MediaSource, StoreError>;

    /// Records the storage path of acquired audio on an existing video record.
    async fn set_video_audio_path(
        &self,
        video_id: &str,
        audio_path: &str,
        duration_seconds: Option<f64>,
    ) -> Result<MediaSource, StoreError>;

    /// Insert-or-return-existing keyed by content hash.
    async fn upsert_document(&self, doc: &NewDocument) -> Result<MediaSource, StoreError>;

    /// Records the storage path of a stored upload.
    async fn set_document_storage_path(
        &self,
        file_hash: &str,
        storage_path: &str,
    ) -> Result<MediaSource, StoreError>;

    async fn get_summary_by_source(
        &self,
        source: &SourceRef,
    ) -> Result<Option<SummaryRecord>, StoreError>;

    /// Persists a summary; if the source already has one, that one is returned.
    async fn create_summary(
        &self,
        source: &SourceRef,
        content: &str,
        summary: &str,
    ) -> Result<SummaryRecord, StoreError>;
}
