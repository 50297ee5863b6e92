//! Durable storage for pinned messages.
//!
//! Pins survive process restarts: the store is a JSON-lines file loaded
//! once at startup and appended to as new pins arrive. Appends are
//! serialized through an async mutex so concurrent requests cannot
//! interleave partial lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A message flagged to survive context compaction indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedItem {
    pub text: String,
    pub pinned_at: DateTime<Utc>,
}

/// Append-mostly pin store backed by a JSON-lines file.
pub struct PinStore {
    path: PathBuf,
    inner: Mutex<Vec<PinnedItem>>,
}

impl PinStore {
    /// Load the store, tolerating a missing file and skipping lines that
    /// fail to parse (a torn write must not take pinning down with it).
    pub async fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let mut items = Vec::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match serde_json::from_str::<PinnedItem>(line) {
                        Ok(item) => items.push(item),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "Skipping malformed pin line")
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        Ok(Self {
            path,
            inner: Mutex::new(items),
        })
    }

    /// Record a pinned message. Returns true when the pin was new.
    pub async fn record(&self, text: &str) -> io::Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.iter().any(|item| item.text == text) {
            return Ok(false);
        }

        let item = PinnedItem {
            text: text.to_string(),
            pinned_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = serde_json::to_string(&item).expect("pin serializes");
        line.push('\n');
        file.write_all(line.as_bytes()).await?;

        inner.push(item);
        Ok(true)
    }

    /// All pins, oldest first.
    pub async fn all(&self) -> Vec<PinnedItem> {
        self.inner.lock().await.clone()
    }
}
