use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, VideoRepository};
use crate::models::video::Video;

/// In-memory `VideoRepository` for tests.
#[derive(Clone, Default)]
pub struct FakeVideoRepository {
    videos: Arc<Mutex<HashMap<Uuid, Video>>>,
    reads: Arc<AtomicUsize>,
    fail_updates: Arc<AtomicBool>,
    /// Reassigns the owner right before the given read number (1-based).
    owner_swap: Arc<Mutex<Option<(usize, Uuid)>>>,
}

impl FakeVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh record owned by `owner` and return it.
    pub fn fake_add_video(&self, owner: Uuid) -> Video {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            user_id: owner,
            title: "test video".into(),
            description: None,
            thumbnail_url: None,
            video_url: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.videos.lock().unwrap().insert(video.id, video.clone());
        video
    }

    pub fn fake_video(&self, id: Uuid) -> Option<Video> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    pub fn fake_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Simulate an ownership transfer landing between two reads.
    pub fn fake_swap_owner_on_read(&self, read: usize, new_owner: Uuid) {
        *self.owner_swap.lock().unwrap() = Some((read, new_owner));
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRepository for FakeVideoRepository {
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut videos = self.videos.lock().unwrap();
        if let Some((at, owner)) = *self.owner_swap.lock().unwrap() {
            if at == read {
                if let Some(video) = videos.get_mut(&id) {
                    video.user_id = owner;
                    video.version += 1;
                }
            }
        }
        Ok(videos.get(&id).cloned())
    }

    async fn update_video(&self, video: &Video) -> RepositoryResult<Video> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Sqlx(sqlx::Error::PoolTimedOut));
        }

        let mut videos = self.videos.lock().unwrap();
        let current = videos
            .get_mut(&video.id)
            .ok_or(RepositoryError::Conflict(video.id))?;
        if current.version != video.version {
            return Err(RepositoryError::Conflict(video.id));
        }

        current.thumbnail_url = video.thumbnail_url.clone();
        current.video_url = video.video_url.clone();
        current.title = video.title.clone();
        current.description = video.description.clone();
        current.version += 1;
        current.updated_at = Utc::now();
        Ok(current.clone())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}
