//! Media source repository: the `youtube` and `uploaded_files` tables.
//!
//! Both tables are keyed by a natural identity (video id, content hash)
//! under a UNIQUE constraint, so every write here converges on one row per
//! key no matter how many callers race.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};

/// A raw row from the `youtube` table.
#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeRow {
    pub id: String,
    pub video_id: String,
    pub link: String,
    pub audio_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: String,
}

impl YoutubeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            link: row.get("link")?,
            audio_path: row.get("audio_path")?,
            duration_seconds: row.get("duration_seconds")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A raw row from the `uploaded_files` table.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRow {
    pub id: String,
    pub file_hash: String,
    pub original_name: String,
    pub file_type: String,
    pub mime_type: String,
    pub size: i64,
    pub storage_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub page_count: Option<i64>,
    pub created_at: String,
}

impl UploadRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_hash: row.get("file_hash")?,
            original_name: row.get("original_name")?,
            file_type: row.get("file_type")?,
            mime_type: row.get("mime_type")?,
            size: row.get("size")?,
            storage_path: row.get("storage_path")?,
            duration_seconds: row.get("duration_seconds")?,
            page_count: row.get("page_count")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Attributes for a new `uploaded_files` row.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_hash: String,
    pub original_name: String,
    pub file_type: String,
    pub mime_type: String,
    pub size: i64,
    pub duration_seconds: Option<f64>,
    pub page_count: Option<i64>,
}

/// Finds a video row by its natural key.
pub fn find_youtube(db: &Database, video_id: &str) -> Result<Option<YoutubeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM youtube WHERE video_id = ?1",
                params![video_id],
                YoutubeRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns the row for `video_id`, inserting it first when absent.
///
/// A racing insert for the same id is absorbed by `ON CONFLICT DO NOTHING`
/// and the follow-up read returns the winner's row.
pub fn get_or_create_youtube(
    db: &Database,
    video_id: &str,
    link: &str,
) -> Result<YoutubeRow, DatabaseError> {
    if let Some(existing) = find_youtube(db, video_id)? {
        return Ok(existing);
    }

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO youtube (id, video_id, link, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(video_id) DO NOTHING",
            params![
                uuid::Uuid::new_v4().to_string(),
                video_id,
                link,
                now_timestamp()
            ],
        )?;
        let row = conn.query_row(
            "SELECT * FROM youtube WHERE video_id = ?1",
            params![video_id],
            YoutubeRow::from_row,
        )?;
        Ok(row)
    })
}

/// Records where the acquired audio for `video_id` lives.
pub fn update_youtube_audio_path(
    db: &Database,
    video_id: &str,
    audio_path: &str,
    duration_seconds: Option<f64>,
) -> Result<Option<YoutubeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "UPDATE youtube
                 SET audio_path = ?2, duration_seconds = COALESCE(?3, duration_seconds)
                 WHERE video_id = ?1
                 RETURNING *",
                params![video_id, audio_path, duration_seconds],
                YoutubeRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds an upload row by content hash.
pub fn find_upload(db: &Database, file_hash: &str) -> Result<Option<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM uploaded_files WHERE file_hash = ?1",
                params![file_hash],
                UploadRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Inserts an upload or, when the hash already exists, touches a non-key
/// column and returns the existing row. One statement, so concurrent
/// identical uploads always end with a single row.
pub fn upsert_upload(db: &Database, upload: &NewUpload) -> Result<UploadRow, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn.query_row(
            "INSERT INTO uploaded_files (
                id, file_hash, original_name, file_type, mime_type, size,
                duration_seconds, page_count, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(file_hash) DO UPDATE SET file_type = excluded.file_type
             RETURNING *",
            params![
                uuid::Uuid::new_v4().to_string(),
                upload.file_hash,
                upload.original_name,
                upload.file_type,
                upload.mime_type,
                upload.size,
                upload.duration_seconds,
                upload.page_count,
                now_timestamp(),
            ],
            UploadRow::from_row,
        )?;
        Ok(row)
    })
}

/// Records where the stored artifact for an upload lives.
pub fn update_upload_storage_path(
    db: &Database,
    file_hash: &str,
    storage_path: &str,
) -> Result<Option<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "UPDATE uploaded_files SET storage_path = ?2 WHERE file_hash = ?1 RETURNING *",
                params![file_hash, storage_path],
                UploadRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
