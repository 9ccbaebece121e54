//! Tracked URL persistence
//!
//! The tracked URL set lives in `url.json`; it is loaded once per process,
//! mutated in memory and written back after every successful add/remove.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::domain::snapshot::{AddUrlError, TrackedUrls};

/// In-memory tracked URL set plus its backing file.
#[derive(Debug)]
pub struct UrlStore {
    path: PathBuf,
    tracked: TrackedUrls,
}

impl UrlStore {
    /// Load the set from `path`, creating an empty file when missing or
    /// unreadable so a corrupt file never blocks startup.
    pub async fn load(path: &Path) -> Result<Self> {
        let tracked = match fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(tracked) => tracked,
                Err(err) => {
                    info!(error = %err, "url file invalid; starting with an empty set");
                    TrackedUrls::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("url file not found; creating one");
                TrackedUrls::new()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read url file {}", path.display()))
            }
        };

        let store = Self {
            path: path.to_path_buf(),
            tracked,
        };
        store.save().await?;
        Ok(store)
    }

    pub fn tracked(&self) -> &TrackedUrls {
        &self.tracked
    }

    /// Register a vendor so lookups for it never miss.
    pub fn ensure_vendor(&mut self, vendor: &str) {
        self.tracked.ensure_vendor(vendor);
    }

    /// Add a canonical URL and persist on success.
    pub async fn add(&mut self, vendor: &str, url: String) -> Result<Result<(), AddUrlError>> {
        match self.tracked.add(vendor, url) {
            Ok(()) => {
                self.save().await?;
                Ok(Ok(()))
            }
            Err(err) => Ok(Err(err)),
        }
    }

    /// Remove a URL and persist when it was present.
    pub async fn remove(&mut self, vendor: &str, url: &str) -> Result<bool> {
        if self.tracked.remove(vendor, url) {
            self.save().await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.tracked)?;
        fs::write(&self.path, contents)
            .await
            .with_context(|| format!("failed to write url file {}", self.path.display()))
    }
}
