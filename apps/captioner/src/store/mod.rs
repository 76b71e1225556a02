//! Local asset store.
//!
//! A single flat directory holds every generated or downloaded file, each
//! named with a random hex token plus an extension chosen by media kind.
//! The directory itself is the store — there is no index; the sweeper and
//! callers both work by listing it. Local references have the shape
//! `<base>/static/<token>.<ext>`.

pub mod sweeper;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hard cap on a single media download. One attempt, no retries — on
/// failure the caller keeps the remote reference.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// What a cached file contains, which decides its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => ".png",
            MediaKind::Video => ".mp4",
        }
    }
}

#[derive(Debug, Error)]
enum DownloadError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Content store rooted at one directory, rewriting remote URLs into stable
/// local ones.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    base_url: String,
    http: reqwest::Client,
}

impl AssetStore {
    /// Creates the store, making the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(AssetStore {
            dir,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The local URL a stored `filename` is served under.
    pub fn local_url(&self, filename: &str) -> String {
        format!("{}/static/{filename}", self.base_url)
    }

    /// True if `url` already points into this store's namespace.
    pub fn is_local(&self, url: &str) -> bool {
        url.starts_with(&format!("{}/static/", self.base_url))
    }

    /// Maps a store-local URL back to its backing file path.
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let prefix = format!("{}/static/", self.base_url);
        let filename = url.strip_prefix(&prefix)?;
        if filename.is_empty() || filename.contains('/') {
            return None;
        }
        Some(self.dir.join(filename))
    }

    /// Rewrites a remote URL into a local one by downloading its content.
    ///
    /// Idempotent on already-local references and a pass-through for
    /// non-http strings, both without I/O. Never fails the caller: any
    /// download or write problem is logged and the original reference is
    /// returned so the caller still holds a usable (remote) URL.
    pub async fn resolve(&self, url: &str, kind: MediaKind) -> String {
        if !url.starts_with("http") || self.is_local(url) {
            return url.to_string();
        }
        debug!("downloading {url}");
        match self.download(url, kind).await {
            Ok(local) => {
                info!("cached {url} as {local}");
                local
            }
            Err(e) => {
                warn!("download of {url} failed: {e}; keeping remote reference");
                url.to_string()
            }
        }
    }

    /// Persists in-memory content under a fresh token.
    ///
    /// Unlike [`AssetStore::resolve`] there is no reference to degrade to,
    /// so a write failure is returned to the caller.
    pub async fn save(&self, bytes: &[u8], kind: MediaKind) -> std::io::Result<String> {
        let filename = fresh_filename(kind);
        tokio::fs::write(self.dir.join(&filename), bytes).await?;
        Ok(self.local_url(&filename))
    }

    async fn download(&self, url: &str, kind: MediaKind) -> Result<String, DownloadError> {
        let response = self
            .http
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        let filename = fresh_filename(kind);
        tokio::fs::write(self.dir.join(&filename), &bytes).await?;
        Ok(self.local_url(&filename))
    }
}

/// Random token + extension. Collisions are treated as impossible.
fn fresh_filename(kind: MediaKind) -> String {
    format!("{}{}", Uuid::new_v4().simple(), kind.extension())
}
