//! Summary repository: CRUD operations for the `summaries` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};

/// A raw summary row. Exactly one of `youtube_id` / `document_id` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub id: String,
    pub youtube_id: Option<String>,
    pub document_id: Option<String>,
    pub content: String,
    pub summary: String,
    pub created_at: String,
}

impl SummaryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            youtube_id: row.get("youtube_id")?,
            document_id: row.get("document_id")?,
            content: row.get("content")?,
            summary: row.get("summary")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Which foreign key a summary hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOwner<'a> {
    Youtube(&'a str),
    Document(&'a str),
}

impl SummaryOwner<'_> {
    fn column(&self) -> &'static str {
        match self {
            SummaryOwner::Youtube(_) => "youtube_id",
            SummaryOwner::Document(_) => "document_id",
        }
    }

    fn id(&self) -> &str {
        match self {
            SummaryOwner::Youtube(id) | SummaryOwner::Document(id) => id,
        }
    }
}

/// Finds the summary belonging to a source, if any.
pub fn find_by_owner(
    db: &Database,
    owner: SummaryOwner<'_>,
) -> Result<Option<SummaryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT * FROM summaries WHERE {} = ?1", owner.column());
        let row = conn
            .query_row(&sql, params![owner.id()], SummaryRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Inserts a summary for `owner`. When one already exists (another job
/// finished first) the existing row is returned unchanged.
pub fn insert(
    db: &Database,
    owner: SummaryOwner<'_>,
    content: &str,
    summary: &str,
) -> Result<SummaryRow, DatabaseError> {
    let (youtube_id, document_id) = match owner {
        SummaryOwner::Youtube(id) => (Some(id), None),
        SummaryOwner::Document(id) => (None, Some(id)),
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO summaries (id, youtube_id, document_id, content, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT DO NOTHING",
            params![
                uuid::Uuid::new_v4().to_string(),
                youtube_id,
                document_id,
                content,
                summary,
                now_timestamp(),
            ],
        )?;
        let sql = format!("SELECT * FROM summaries WHERE {} = ?1", owner.column());
        let row = conn.query_row(&sql, params![owner.id()], SummaryRow::from_row)?;
        Ok(row)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::media_repo;

    #[test]
    fn test_insert_and_find_youtube_summary() {
        let db = Database::open_in_memory().unwrap();
        let yt = media_repo::get_or_create_youtube(&db, "dQw4w9WgXcQ", "link").unwrap();

        assert!(find_by_owner(&db, SummaryOwner::Youtube(&yt.id)).unwrap().is_none());

        let row = insert(&db, SummaryOwner::Youtube(&yt.id), "transcript", "short").unwrap();
        assert_eq!(row.youtube_id.as_deref(), Some(yt.id.as_str()));
        assert!(row.document_id.is_none());

        let found = find_by_owner(&db, SummaryOwner::Youtube(&yt.id)).unwrap().unwrap();
        assert_eq!(found, row);
    }

    #[test]
    fn test_second_insert_returns_first_summary() {
        let db = Database::open_in_memory().unwrap();
        let yt = media_repo::get_or_create_youtube(&db, "dQw4w9WgXcQ", "link").unwrap();

        let first = insert(&db, SummaryOwner::Youtube(&yt.id), "t1", "s1").unwrap();
        let second = insert(&db, SummaryOwner::Youtube(&yt.id), "t2", "s2").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.summary, "s1");
    }

    #[test]
    fn test_insert_for_unknown_source_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = insert(&db, SummaryOwner::Document("nope"), "c", "s");
        assert!(result.is_err());
    }
}
