//! File-backed work-item queue.
//!
//! Items come from a JSON array (the local development layout of the
//! automation platform):
//!
//! ```json
//! [
//!   { "id": "42", "payload": { "email": { "from": { "address": "a@b.c" } } },
//!     "files": ["input.xlsx"] }
//! ]
//! ```
//!
//! File references resolve relative to the JSON file's directory. Items
//! without an `id` get `item-{index}`.
//!
//! Consumption follows the event-log pattern: each release is appended as a
//! JSON line, and the set of released ids is derived by replaying the log.
//! A released item is never handed out again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::{Release, WorkItemQueue};
use crate::domain::WorkItem;

/// Item as written in the input file
#[derive(Debug, Clone, Deserialize)]
struct RawWorkItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    files: Vec<String>,
}

/// Final state recorded for a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Done,
    Failed,
}

/// One line of the release log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEvent {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub state: ReleaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Work items from a local JSON file, consumption tracked in a JSONL log
pub struct FileWorkItems {
    items_path: PathBuf,
    releases_path: PathBuf,
}

impl FileWorkItems {
    pub fn new(items_path: impl Into<PathBuf>, releases_path: impl Into<PathBuf>) -> Self {
        Self {
            items_path: items_path.into(),
            releases_path: releases_path.into(),
        }
    }

    fn base_dir(&self) -> &Path {
        self.items_path.parent().unwrap_or(Path::new("."))
    }

    /// All items in file order
    pub async fn load_items(&self) -> Result<Vec<WorkItem>> {
        let content = fs::read_to_string(&self.items_path).await.with_context(|| {
            format!("Failed to read work items file: {}", self.items_path.display())
        })?;
        let raw: Vec<RawWorkItem> = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse work items file: {}", self.items_path.display())
        })?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(index, item)| WorkItem {
                id: item.id.unwrap_or_else(|| format!("item-{}", index)),
                files: item.files,
                payload: item.payload,
            })
            .collect())
    }

    /// Replay the release log
    pub async fn replay(&self) -> Result<Vec<ReleaseEvent>> {
        let mut events = Vec::new();

        if !self.releases_path.exists() {
            return Ok(events);
        }

        let file = File::open(&self.releases_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: ReleaseEvent = serde_json::from_str(&line)
                .with_context(|| format!("Corrupt release log line: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    async fn append_event(&self, event: &ReleaseEvent) -> Result<()> {
        if let Some(parent) = self.releases_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.releases_path)
            .await
            .with_context(|| {
                format!("Failed to open release log: {}", self.releases_path.display())
            })?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl WorkItemQueue for FileWorkItems {
    fn name(&self) -> &str {
        "file"
    }

    async fn next_item(&self) -> Result<Option<WorkItem>> {
        let released: HashSet<String> = self
            .replay()
            .await?
            .into_iter()
            .map(|e| e.item_id)
            .collect();

        let items = self.load_items().await?;
        debug!(
            total = items.len(),
            released = released.len(),
            "Loaded work items"
        );

        Ok(items.into_iter().find(|item| !released.contains(&item.id)))
    }

    async fn get_file(&self, item: &WorkItem, file_ref: &str) -> Result<PathBuf> {
        if !item.files.iter().any(|f| f == file_ref) {
            anyhow::bail!("Work item {} has no file named '{}'", item.id, file_ref);
        }

        let path = Path::new(file_ref);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        })
    }

    async fn release(&self, item_id: &str, release: Release) -> Result<()> {
        let event = match release {
            Release::Done => ReleaseEvent {
                timestamp: Utc::now(),
                item_id: item_id.to_string(),
                state: ReleaseState::Done,
                code: None,
                message: None,
            },
            Release::Failed { code, message } => ReleaseEvent {
                timestamp: Utc::now(),
                item_id: item_id.to_string(),
                state: ReleaseState::Failed,
                code: Some(code),
                message: Some(message),
            },
        };
        self.append_event(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_queue(items: &str) -> (FileWorkItems, TempDir) {
        let temp = TempDir::new().unwrap();
        let items_path = temp.path().join("work-items.json");
        fs::write(&items_path, items).await.unwrap();
        let queue = FileWorkItems::new(items_path, temp.path().join("out/releases.jsonl"));
        (queue, temp)
    }

    #[tokio::test]
    async fn test_next_item_assigns_default_ids() {
        let (queue, _temp) =
            create_test_queue(r#"[{"files": ["a.xlsx"]}, {"id": "custom", "files": []}]"#).await;

        let items = queue.load_items().await.unwrap();
        assert_eq!(items[0].id, "item-0");
        assert_eq!(items[1].id, "custom");

        let next = queue.next_item().await.unwrap().unwrap();
        assert_eq!(next.id, "item-0");
        assert_eq!(next.files, vec!["a.xlsx"]);
    }

    #[tokio::test]
    async fn test_released_items_are_skipped() {
        let (queue, _temp) =
            create_test_queue(r#"[{"id": "one"}, {"id": "two"}]"#).await;

        queue.release("one", Release::Done).await.unwrap();
        let next = queue.next_item().await.unwrap().unwrap();
        assert_eq!(next.id, "two");

        queue
            .release(
                "two",
                Release::Failed {
                    code: "SendFailed".to_string(),
                    message: "relay refused".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(queue.next_item().await.unwrap().is_none());

        let events = queue.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].state, ReleaseState::Failed);
        assert_eq!(events[1].code.as_deref(), Some("SendFailed"));
    }

    #[tokio::test]
    async fn test_get_file_resolves_against_items_dir() {
        let (queue, temp) = create_test_queue(r#"[{"files": ["in/data.xlsx"]}]"#).await;
        let item = queue.next_item().await.unwrap().unwrap();

        let path = queue.get_file(&item, "in/data.xlsx").await.unwrap();
        assert_eq!(path, temp.path().join("in/data.xlsx"));

        assert!(queue.get_file(&item, "other.xlsx").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_items_file() {
        let (queue, _temp) = create_test_queue("{not json").await;
        assert!(queue.next_item().await.is_err());
    }
}
