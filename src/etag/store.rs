//! ETag entry storage
//!
//! Entries are keyed by absolute request URL. The file store keeps one JSON
//! file per URL, named by the SHA-256 of the URL, so arbitrary user ids in
//! paths never turn into file names.

use crate::error::{PaywireError, PaywireResult};
use crate::http::body::JsonObject;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, warn};

/// Response captured together with the ETag the backend sent for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtagEntry {
    /// Absolute request URL
    pub url: String,

    /// Opaque version token
    pub etag: String,

    /// Status code of the captured response
    pub status_code: u16,

    /// Captured response body
    pub body: JsonObject,

    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl EtagEntry {
    pub fn new(
        url: impl Into<String>,
        etag: impl Into<String>,
        status_code: u16,
        body: JsonObject,
    ) -> Self {
        Self {
            url: url.into(),
            etag: etag.into(),
            status_code,
            body,
            stored_at: Utc::now(),
        }
    }
}

/// Key-value storage for ETag entries
#[async_trait]
pub trait EtagStore: Send + Sync {
    /// Entry for `url`, if any
    async fn get(&self, url: &str) -> PaywireResult<Option<EtagEntry>>;

    /// Insert or replace the entry for `entry.url`
    async fn set(&self, entry: EtagEntry) -> PaywireResult<()>;

    /// Remove every entry
    async fn clear(&self) -> PaywireResult<()>;

    /// All stored entries, ordered by URL
    async fn entries(&self) -> PaywireResult<Vec<EtagEntry>>;
}

/// Store backed by a directory of JSON files
pub struct FileEtagStore {
    dir: PathBuf,
}

impl FileEtagStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn ensure_dir(&self) -> PaywireResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PaywireError::io(format!("creating ETag dir {}", self.dir.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.dir, perms)
                .await
                .map_err(|e| PaywireError::io("setting ETag dir permissions", e))?;
        }

        Ok(())
    }

    async fn read_entry(path: &Path) -> PaywireResult<Option<EtagEntry>> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PaywireError::io(format!("reading ETag entry {}", path.display()), e))?;

        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Ignoring unreadable ETag entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl EtagStore for FileEtagStore {
    async fn get(&self, url: &str) -> PaywireResult<Option<EtagEntry>> {
        let path = self.entry_path(url);
        if !path.exists() {
            return Ok(None);
        }

        let entry = Self::read_entry(&path).await?;
        Ok(entry.filter(|e| e.url == url))
    }

    async fn set(&self, entry: EtagEntry) -> PaywireResult<()> {
        self.ensure_dir().await?;

        let path = self.entry_path(&entry.url);
        let content = serde_json::to_string_pretty(&entry)?;
        fs::write(&path, content)
            .await
            .map_err(|e| PaywireError::io(format!("writing ETag entry {}", path.display()), e))?;

        debug!("Stored ETag {} for {}", entry.etag, entry.url);
        Ok(())
    }

    async fn clear(&self) -> PaywireResult<()> {
        if !self.dir.exists() {
            return Ok(());
        }

        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| PaywireError::io("reading ETag directory", e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| PaywireError::io("reading ETag directory entry", e))?
        {
            if item.path().extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(item.path())
                    .await
                    .map_err(|e| PaywireError::io("removing ETag entry", e))?;
            }
        }

        debug!("Cleared ETag store at {}", self.dir.display());
        Ok(())
    }

    async fn entries(&self) -> PaywireResult<Vec<EtagEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| PaywireError::io("reading ETag directory", e))?;

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| PaywireError::io("reading ETag directory entry", e))?
        {
            if item.path().extension().is_some_and(|ext| ext == "json") {
                if let Some(entry) = Self::read_entry(&item.path()).await? {
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }
}

/// Store that lives only as long as the process
#[derive(Default)]
pub struct MemoryEtagStore {
    entries: Mutex<HashMap<String, EtagEntry>>,
}

impl MemoryEtagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, EtagEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EtagStore for MemoryEtagStore {
    async fn get(&self, url: &str) -> PaywireResult<Option<EtagEntry>> {
        Ok(self.lock().get(url).cloned())
    }

    async fn set(&self, entry: EtagEntry) -> PaywireResult<()> {
        self.lock().insert(entry.url.clone(), entry);
        Ok(())
    }

    async fn clear(&self) -> PaywireResult<()> {
        self.lock().clear();
        Ok(())
    }

    async fn entries(&self) -> PaywireResult<Vec<EtagEntry>> {
        let mut entries: Vec<EtagEntry> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }
}
