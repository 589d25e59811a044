//! [`MediaStore`] backed by the SQLite repositories.
//!
//! Repository calls are synchronous and hold the connection mutex, so each
//! one runs on tokio's blocking pool instead of an async worker.

use async_trait::async_trait;

use crate::db::media_repo::{self, NewUpload, UploadRow, YoutubeRow};
use crate::db::summary_repo::{self, SummaryOwner, SummaryRow};
use crate::db::{Database, DatabaseError};
use crate::error::StoreError;

use super::{MediaSource, MediaStore, NewDocument, SourceKind, SourceRef, SummaryRecord};

#[derive(Clone)]
pub struct SqliteMediaStore {
    db: Database,
}

impl SqliteMediaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs a repository call against a clone of the handle on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Database(DatabaseError::TaskFailed(e.to_string())))?
    }
}

impl From<YoutubeRow> for MediaSource {
    fn from(row: YoutubeRow) -> Self {
        Self {
            id: row.id,
            kind: SourceKind::Youtube,
            natural_key: row.video_id,
            storage_path: row.audio_path.filter(|p| !p.is_empty()),
            duration_seconds: row.duration_seconds,
            page_count: None,
            created_at: row.created_at,
        }
    }
}

impl From<UploadRow> for MediaSource {
    fn from(row: UploadRow) -> Self {
        Self {
            id: row.id,
            kind: SourceKind::Document,
            natural_key: row.file_hash,
            storage_path: row.storage_path.filter(|p| !p.is_empty()),
            duration_seconds: row.duration_seconds,
            page_count: row.page_count.and_then(|c| u32::try_from(c).ok()),
            created_at: row.created_at,
        }
    }
}

fn summary_record(row: SummaryRow) -> Result<SummaryRecord, StoreError> {
    let source = match (row.youtube_id, row.document_id) {
        (Some(id), None) => SourceRef::Youtube(id),
        (None, Some(id)) => SourceRef::Document(id),
        _ => return Err(StoreError::MissingSource(row.id)),
    };
    Ok(SummaryRecord {
        id: row.id,
        source,
        content: row.content,
        summary: row.summary,
        created_at: row.created_at,
    })
}

fn owner(source: &SourceRef) -> SummaryOwner<'_> {
    match source {
        SourceRef::Youtube(id) => SummaryOwner::Youtube(id),
        SourceRef::Document(id) => SummaryOwner::Document(id),
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn get_or_create_video(
        &self,
        video_id: &str,
        link: &str,
    ) -> Result<MediaSource, StoreError> {
        let (video_id, link) = (video_id.to_string(), link.to_string());
        self.blocking(move |db| Ok(media_repo::get_or_create_youtube(db, &video_id, &link)?.into()))
            .await
    }

    async fn set_video_audio_path(
        &self,
        video_id: &str,
        audio_path: &str,
        duration_seconds: Option<f64>,
    ) -> Result<MediaSource, StoreError> {
        let (video_id, audio_path) = (video_id.to_string(), audio_path.to_string());
        self.blocking(move |db| {
            media_repo::update_youtube_audio_path(db, &video_id, &audio_path, duration_seconds)?
                .map(Into::into)
                .ok_or(StoreError::MissingSource(video_id))
        })
        .await
    }

    async fn upsert_document(&self, doc: &NewDocument) -> Result<MediaSource, StoreError> {
        let upload = NewUpload {
            file_hash: doc.file_hash.clone(),
            original_name: doc.original_name.clone(),
            file_type: doc.file_type.clone(),
            mime_type: doc.mime_type.clone(),
            size: i64::try_from(doc.size).unwrap_or(i64::MAX),
            duration_seconds: doc.duration_seconds,
            page_count: doc.page_count.map(i64::from),
        };
        self.blocking(move |db| Ok(media_repo::upsert_upload(db, &upload)?.into()))
            .await
    }

    async fn set_document_storage_path(
        &self,
        file_hash: &str,
        storage_path: &str,
    ) -> Result<MediaSource, StoreError> {
        let (file_hash, storage_path) = (file_hash.to_string(), storage_path.to_string());
        self.blocking(move |db| {
            media_repo::update_upload_storage_path(db, &file_hash, &storage_path)?
                .map(Into::into)
                .ok_or(StoreError::MissingSource(file_hash))
        })
        .await
    }

    async fn get_summary_by_source(
        &self,
        source: &SourceRef,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let source = source.clone();
        self.blocking(move |db| {
            summary_repo::find_by_owner(db, owner(&source))?
                .map(summary_record)
                .transpose()
        })
        .await
    }

    async fn create_summary(
        &self,
        source: &SourceRef,
        content: &str,
        summary: &str,
    ) -> Result<SummaryRecord, StoreError> {
        let (source, content, summary) = (source.clone(), content.to_string(), summary.to_string());
        self.blocking(move |db| {
            summary_record(summary_repo::insert(db, owner(&source), &content, &summary)?)
        })
        .await
    }
}
