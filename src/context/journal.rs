//! Dated journal of rolling summaries.
//!
//! One markdown file per day, one appended block per summarization. Writes
//! from concurrent requests are independent appends; no ordering across
//! requests is guaranteed or needed.

use crate::registry::Tier;
use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// One summarization event.
#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub written_at: DateTime<Utc>,
    /// How many messages the summary replaced.
    pub span_messages: usize,
    /// Tier that generated the summary.
    pub tier: Tier,
    pub text: String,
}

pub struct SummaryJournal {
    dir: PathBuf,
}

impl SummaryJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Append one entry to today's journal file, returning its path.
    pub async fn append(&self, entry: &SummaryEntry) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(format!("{}.md", entry.written_at.format("%Y-%m-%d")));

        let block = format!(
            "## {} · {} · {} messages\n\n{}\n\n",
            entry.written_at.format("%H:%M:%S"),
            entry.tier,
            entry.span_messages,
            entry.text.trim()
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        Ok(path)
    }
}
