//! Persistence and site metadata collaborators.
//!
//! `ArtifactStore` keeps section images and showcase records durable;
//! `SiteDirectory` supplies business details for a site key. Both are traits
//! so the capture engine never depends on a concrete backend.

use crate::error::{ShowcaseError, ShowcaseResult};
use crate::model::{Section, ShowcaseRecord, SiteInfo};
use crate::utils::sanitize_filename;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const RECORD_FILE: &str = "showcase.json";

/// Durable storage for generated showcases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Relative path a section image for `key` is stored under.
    fn artifact_path(&self, key: &str, section: Section) -> String;

    /// Writes a section image and returns its relative path.
    async fn write_artifact(
        &self,
        key: &str,
        section: Section,
        bytes: &[u8],
    ) -> ShowcaseResult<String>;

    /// Create or replace the record for `key`.
    async fn write_record(&self, key: &str, record: &ShowcaseRecord) -> ShowcaseResult<()>;

    /// Returns `Ok(None)` if nothing is stored for `key`.
    async fn read_record(&self, key: &str) -> ShowcaseResult<Option<ShowcaseRecord>>;

    async fn exists(&self, key: &str) -> ShowcaseResult<bool>;

    /// Removes every artifact for `key`. Returns `false` if there was nothing
    /// to remove.
    async fn delete_all(&self, key: &str) -> ShowcaseResult<bool>;

    async fn list_keys(&self) -> ShowcaseResult<Vec<String>>;
}

/// Stores each showcase in its own directory:
///
/// ```text
/// <root>/<key>/hero.png
/// <root>/<key>/services.png
/// <root>/<key>/showcase.json
/// ```
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_filename(key))
    }

    fn persistence_error(path: &Path, err: std::io::Error) -> ShowcaseError {
        ShowcaseError::Persistence(format!("{}: {}", path.display(), err))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    fn artifact_path(&self, key: &str, section: Section) -> String {
        format!("{}/{}.png", sanitize_filename(key), section)
    }

    async fn write_artifact(
        &self,
        key: &str,
        section: Section,
        bytes: &[u8],
    ) -> ShowcaseResult<String> {
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Self::persistence_error(&dir, e))?;

        let relative = self.artifact_path(key, section);
        let path = self.root.join(&relative);
        fs::write(&path, bytes)
            .await
            .map_err(|e| Self::persistence_error(&path, e))?;

        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(relative)
    }

    async fn write_record(&self, key: &str, record: &ShowcaseRecord) -> ShowcaseResult<()> {
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Self::persistence_error(&dir, e))?;

        let json = serde_json::to_vec_pretty(record)?;

        // Write then rename so readers never see a half-written record.
        let path = dir.join(RECORD_FILE);
        let tmp = dir.join(format!("{RECORD_FILE}.tmp"));
        fs::write(&tmp, json)
            .await
            .map_err(|e| Self::persistence_error(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Self::persistence_error(&path, e))?;
        Ok(())
    }

    async fn read_record(&self, key: &str) -> ShowcaseResult<Option<ShowcaseRecord>> {
        let path = self.key_dir(key).join(RECORD_FILE);
        match fs::read(&path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::persistence_error(&path, e)),
        }
    }

    async fn exists(&self, key: &str) -> ShowcaseResult<bool> {
        match fs::metadata(self.key_dir(key)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::persistence_error(&self.key_dir(key), e)),
        }
    }

    async fn delete_all(&self, key: &str) -> ShowcaseResult<bool> {
        if !self.exists(key).await? {
            return Ok(false);
        }
        let dir = self.key_dir(key);
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| Self::persistence_error(&dir, e))?;
        Ok(true)
    }

    async fn list_keys(&self) -> ShowcaseResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::persistence_error(&self.root, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::persistence_error(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                keys.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Source of business details for a site.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Returns `Ok(None)` for unknown sites.
    async fn get_basic_info(&self, key: &str) -> ShowcaseResult<Option<SiteInfo>>;
}

/// Site directory held in memory, optionally seeded from a JSON map of
/// `key -> {business_name, template}`.
#[derive(Debug, Default)]
pub struct InMemorySiteDirectory {
    sites: DashMap<String, SiteInfo>,
}

impl InMemorySiteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_file(path: &Path) -> ShowcaseResult<Self> {
        let content = fs::read_to_string(path).await?;
        let sites: HashMap<String, SiteInfo> = serde_json::from_str(&content)?;
        Ok(sites.into_iter().collect())
    }

    pub fn insert(&self, key: impl Into<String>, info: SiteInfo) {
        self.sites.insert(key.into(), info);
    }

    pub fn remove(&self, key: &str) -> Option<SiteInfo> {
        self.sites.remove(key).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl FromIterator<(String, SiteInfo)> for InMemorySiteDirectory {
    fn from_iter<I: IntoIterator<Item = (String, SiteInfo)>>(iter: I) -> Self {
        Self {
            sites: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SiteDirectory for InMemorySiteDirectory {
    async fn get_basic_info(&self, key: &str) -> ShowcaseResult<Option<SiteInfo>> {
        Ok(self.sites.get(key).map(|entry| entry.value().clone()))
    }
}
