//! Video record persistence.

pub mod sqlite;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::video::Video;

pub use sqlite::SqliteVideoRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The stored version no longer matches the one the caller read.
    #[error("video `{0}` changed since it was read")]
    Conflict(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>>;

    /// Persist `video`'s mutable fields if its `version` is still current.
    ///
    /// Returns the stored row with the bumped version.
    async fn update_video(&self, video: &Video) -> RepositoryResult<Video>;

    async fn ping(&self) -> RepositoryResult<()>;
}

const INIT_MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

/// Apply the embedded schema. Statements are idempotent.
pub async fn run_migrations(db: &SqlitePool) -> RepositoryResult<()> {
    let statements = INIT_MIGRATION
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
