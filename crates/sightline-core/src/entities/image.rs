use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{format_timestamp, parse_timestamp, ImageAnalysis, ImageRecord, SqliteStore};

type ImageRow = (String, String, Option<String>, Option<String>, String);

pub trait ImageStore: Send + Sync + 'static {
    /// Insert an unprocessed record for a freshly stored file. The store
    /// assigns the id and the creation timestamp.
    fn create_image(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ImageRecord, sqlx::Error>> + Send;

    fn get_image(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;

    /// The record with the greatest `created_at` strictly before `before`.
    fn previous_image(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;

    /// Write the description step's result. The other column is cleared so a
    /// record never carries both. Returns `false` if no row matched `id`.
    fn set_analysis(
        &self,
        id: &str,
        analysis: &ImageAnalysis,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// All records, newest first.
    fn list_images(&self) -> impl Future<Output = Result<Vec<ImageRecord>, sqlx::Error>> + Send;

    /// The `limit` most recent records, newest first.
    fn recent_images(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ImageRecord>, sqlx::Error>> + Send;
}

impl ImageStore for SqliteStore {
    async fn create_image(&self, url: &str) -> Result<ImageRecord, sqlx::Error> {
        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            url: url.to_owned(),
            description: None,
            delta: None,
            created_at: self.clock.next(),
        };
        sqlx::query(
            "INSERT INTO images (id, url, description, delta, created_at) \
             VALUES (?1, ?2, NULL, NULL, ?3)",
        )
        .bind(&record.id)
        .bind(&record.url)
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, sqlx::Error> {
        let row: Option<ImageRow> = sqlx::query_as(
            "SELECT id, url, description, delta, created_at FROM images WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_record))
    }

    async fn previous_image(&self, before: DateTime<Utc>) -> Result<Option<ImageRecord>, sqlx::Error> {
        let row: Option<ImageRow> = sqlx::query_as(
            "SELECT id, url, description, delta, created_at FROM images \
             WHERE created_at < ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(format_timestamp(&before))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_record))
    }

    async fn set_analysis(&self, id: &str, analysis: &ImageAnalysis) -> Result<bool, sqlx::Error> {
        let (description, delta) = match analysis {
            ImageAnalysis::Description(text) => (Some(text.as_str()), None),
            ImageAnalysis::Delta(text) => (None, Some(text.as_str())),
        };
        let result = sqlx::query("UPDATE images SET description = ?1, delta = ?2 WHERE id = ?3")
            .bind(description)
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, sqlx::Error> {
        let rows: Vec<ImageRow> = sqlx::query_as(
            "SELECT id, url, description, delta, created_at FROM images ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn recent_images(&self, limit: usize) -> Result<Vec<ImageRecord>, sqlx::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<ImageRow> = sqlx::query_as(
            "SELECT id, url, description, delta, created_at FROM images \
             ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_record).collect())
    }
}

fn into_record((id, url, description, delta, created_at): ImageRow) -> ImageRecord {
    ImageRecord {
        id,
        url,
        description,
        delta,
        created_at: parse_timestamp(&created_at),
    }
}
