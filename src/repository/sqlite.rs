use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, VideoRepository};
use crate::models::video::Video;

const VIDEO_COLUMNS: &str = "id, user_id, title, description, thumbnail_url, video_url, \
                             version, created_at, updated_at";

/// `VideoRepository` on the shared SQLite pool.
#[derive(Clone)]
pub struct SqliteVideoRepository {
    db: Arc<SqlitePool>,
}

impl SqliteVideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a record. Records are normally created by another service.
    #[cfg(test)]
    pub async fn insert_video(&self, video: &Video) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO videos (id, user_id, title, description, thumbnail_url, video_url,
                                 version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.version)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(video)
    }

    async fn update_video(&self, video: &Video) -> RepositoryResult<Video> {
        let updated = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos
             SET title = ?, description = ?, thumbnail_url = ?, video_url = ?,
                 version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(Utc::now())
        .bind(video.id)
        .bind(video.version)
        .fetch_optional(&*self.db)
        .await?;

        updated.ok_or(RepositoryError::Conflict(video.id))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> SqliteVideoRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteVideoRepository::new(Arc::new(pool))
    }

    fn video(owner: Uuid) -> Video {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4(),
            user_id: owner,
            title: "boots".into(),
            description: Some("a short clip".into()),
            thumbnail_url: None,
            video_url: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn missing_video_is_none() {
        let repo = repository().await;
        assert!(repo.get_video(Uuid::new_v4()).await.unwrap().is_none());
        repo.ping().await.unwrap();
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let repo = repository().await;
        let mut record = video(Uuid::new_v4());
        repo.insert_video(&record).await.unwrap();

        record.video_url = Some("https://objects.test/media/landscape/a.mp4".into());
        let stored = repo.update_video(&record).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.video_url, record.video_url);
        assert_eq!(stored.user_id, record.user_id);

        let fetched = repo.get_video(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let repo = repository().await;
        let record = video(Uuid::new_v4());
        repo.insert_video(&record).await.unwrap();

        let mut first = record.clone();
        first.thumbnail_url = Some("first".into());
        repo.update_video(&first).await.unwrap();

        let mut second = record.clone();
        second.thumbnail_url = Some("second".into());
        let err = repo.update_video(&second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(id) if id == record.id));

        let fetched = repo.get_video(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.thumbnail_url.as_deref(), Some("first"));
    }
}
