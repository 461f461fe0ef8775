// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Avatar upload to object storage.

use crate::db::paths;
use crate::error::{AppError, Result};
use crate::models::ProfileUpdate;
use crate::services::{AuthSession, Notice, NoticeSink, ProfileStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Bytes sent so far for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_transferred.min(self.total_bytes) * 100) / self.total_bytes) as u8
    }
}

/// Blob storage consumed by the client.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `bytes` to `path`, reporting progress as chunks are sent.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> Result<()>;

    /// Public download URL for an uploaded object.
    async fn download_url(&self, path: &str) -> Result<String>;
}

const CHUNK_SIZE: usize = 64 * 1024;

/// In-process object storage with Firebase Storage style download URLs.
#[derive(Clone)]
pub struct MemoryObjectStorage {
    bucket: String,
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::new(DashMap::new()),
        }
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.get(path).map(|o| o.value().clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> Result<()> {
        if path.trim_matches('/').is_empty() {
            return Err(AppError::Storage("Empty object path".to_string()));
        }

        let total_bytes = bytes.len() as u64;
        let mut sent = 0u64;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            sent += chunk.len() as u64;
            progress(UploadProgress {
                bytes_transferred: sent,
                total_bytes,
            });
        }

        self.objects.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        if !self.objects.contains_key(path) {
            return Err(AppError::Storage(format!("Object not found: {}", path)));
        }
        Ok(format!(
            "https://firebasestorage.googleapis.com/v0/b/{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(path)
        ))
    }
}

/// Uploads a driver's avatar and records its URL on the profile.
#[derive(Clone)]
pub struct AvatarService {
    storage: Arc<dyn ObjectStorage>,
    profiles: Arc<dyn ProfileStore>,
    notices: Arc<dyn NoticeSink>,
}

impl AvatarService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        profiles: Arc<dyn ProfileStore>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            storage,
            profiles,
            notices,
        }
    }

    /// Upload `bytes` to `avatars/<uid>` and return the download URL.
    pub async fn upload(&self, session: &mut AuthSession, bytes: Vec<u8>) -> Result<String> {
        let result = self.try_upload(session, bytes).await;
        if let Err(e) = &result {
            self.notices.report(e);
        }
        result
    }

    async fn try_upload(&self, session: &mut AuthSession, bytes: Vec<u8>) -> Result<String> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Avatar image is empty".to_string()));
        }

        let path = paths::child(paths::AVATARS, session.id());
        let driver_id = session.id().to_string();
        let report = move |p: UploadProgress| {
            tracing::debug!(driver_id = %driver_id, percent = p.percent(), "Avatar upload progress");
        };
        self.storage.put(&path, bytes, &report).await?;

        let url = self.storage.download_url(&path).await?;
        let profile = self
            .profiles
            .update_profile(session.id(), &ProfileUpdate::avatar(url.clone()))
            .await?;
        session.replace_profile(profile);

        tracing::info!(driver_id = %session.id(), "Avatar updated");
        self.notices.notify(Notice::info("avatar", "Avatar updated"));
        Ok(url)
    }
}
