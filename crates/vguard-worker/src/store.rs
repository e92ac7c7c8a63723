//! Job persistence contract.
//!
//! The pipeline keeps live jobs in memory and writes terminal snapshots
//! through a [`JobStore`]. The storage format is up to the implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use vguard_models::{ProcessingJob, VideoId};

use crate::error::WorkerResult;

/// Async key-value store for job snapshots, keyed by video id.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, job: &ProcessingJob) -> WorkerResult<()>;

    async fn get(&self, video_id: &VideoId) -> WorkerResult<Option<ProcessingJob>>;

    /// Remove a snapshot; removing an absent key is not an error.
    async fn remove(&self, video_id: &VideoId) -> WorkerResult<()>;
}

/// In-process [`JobStore`].
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<VideoId, ProcessingJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, job: &ProcessingJob) -> WorkerResult<()> {
        self.jobs
            .write()
            .await
            .insert(job.video_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, video_id: &VideoId) -> WorkerResult<Option<ProcessingJob>> {
        Ok(self.jobs.read().await.get(video_id).cloned())
    }

    async fn remove(&self, video_id: &VideoId) -> WorkerResult<()> {
        self.jobs.write().await.remove(video_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vguard_models::ProcessingOptions;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryJobStore::new();
        let video_id = VideoId::from("dock-2");
        let job = ProcessingJob::new(video_id.clone(), "/videos/dock-2.mp4", ProcessingOptions::default());

        store.put(&job).await.unwrap();
        assert_eq!(store.get(&video_id).await.unwrap().unwrap().id, job.id);

        store.remove(&video_id).await.unwrap();
        store.remove(&video_id).await.unwrap();
        assert!(store.get(&video_id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
