//! Work item intake.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapters::{Release, WorkItemQueue};
use crate::domain::WorkItem;
use crate::error::WrapperError;

/// What the rest of the run needs from a work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    pub item_id: String,
    /// Local path of the first attached file
    pub file_path: PathBuf,
    /// `email.from.address` of the payload, when present
    pub requesting_user: Option<String>,
}

/// Takes work off the queue and acknowledges it afterwards
pub struct WorkItemIntake {
    queue: Arc<dyn WorkItemQueue>,
}

impl WorkItemIntake {
    pub fn new(queue: Arc<dyn WorkItemQueue>) -> Self {
        Self { queue }
    }

    /// Fetch the next work item's first file and requesting user
    pub async fn fetch_next(&self) -> Result<Intake, WrapperError> {
        info!(queue = self.queue.name(), "Retrieving file from work item");

        let item = self
            .queue
            .next_item()
            .await
            .map_err(|e| WrapperError::IntakeFailed(format!("{:#}", e)))?
            .ok_or(WrapperError::NoWorkItem)?;

        debug!(item_id = %item.id, files = ?item.files, "Obtained work item");

        // The item is dequeued; an unusable one is released so it does not
        // block the items behind it.
        match self.locate_input(&item).await {
            Ok(file_path) => {
                let requesting_user = item.requesting_user();
                debug!(requesting_user = ?requesting_user, "Requesting user");
                Ok(Intake {
                    item_id: item.id,
                    file_path,
                    requesting_user,
                })
            }
            Err(e) => {
                self.fail(&item.id, &e).await;
                Err(e)
            }
        }
    }

    async fn locate_input(&self, item: &WorkItem) -> Result<PathBuf, WrapperError> {
        let file_ref = item
            .first_file()
            .ok_or_else(|| WrapperError::NoAttachment {
                item_id: item.id.clone(),
            })?;

        let file_path = self
            .queue
            .get_file(item, file_ref)
            .await
            .map_err(|e| WrapperError::IntakeFailed(format!("{:#}", e)))?;

        if !tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
            return Err(WrapperError::AttachmentMissing {
                item_id: item.id.clone(),
                path: file_path.display().to_string(),
            });
        }

        Ok(file_path)
    }

    /// Mark the item as processed
    pub async fn complete(&self, item_id: &str) {
        if let Err(e) = self.queue.release(item_id, Release::Done).await {
            warn!(item_id, error = %e, "Failed to release work item as done");
        }
    }

    /// Mark the item as failed with the error that stopped the run
    pub async fn fail(&self, item_id: &str, error: &WrapperError) {
        let release = Release::Failed {
            code: error.kind().to_string(),
            message: error.to_string(),
        };
        if let Err(e) = self.queue.release(item_id, release).await {
            warn!(item_id, error = %e, "Failed to release work item as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileWorkItems;
    use tempfile::TempDir;

    async fn intake_with(items: &str) -> (WorkItemIntake, TempDir) {
        let temp = TempDir::new().unwrap();
        let items_path = temp.path().join("work-items.json");
        tokio::fs::write(&items_path, items).await.unwrap();
        tokio::fs::write(temp.path().join("input.xlsx"), b"data")
            .await
            .unwrap();
        let queue = FileWorkItems::new(items_path, temp.path().join("releases.jsonl"));
        (WorkItemIntake::new(Arc::new(queue)), temp)
    }

    #[tokio::test]
    async fn test_fetch_next() {
        let (intake, temp) = intake_with(
            r#"[{"id": "7", "files": ["input.xlsx", "extra.txt"],
                 "payload": {"email": {"from": {"address": "req@example.com"}}}}]"#,
        )
        .await;

        let result = intake.fetch_next().await.unwrap();
        assert_eq!(result.item_id, "7");
        assert_eq!(result.file_path, temp.path().join("input.xlsx"));
        assert_eq!(result.requesting_user.as_deref(), Some("req@example.com"));
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (intake, _temp) = intake_with("[]").await;
        assert!(matches!(
            intake.fetch_next().await,
            Err(WrapperError::NoWorkItem)
        ));
    }

    #[tokio::test]
    async fn test_zero_files_is_no_attachment() {
        let (intake, _temp) = intake_with(r#"[{"id": "7", "files": []}]"#).await;
        assert!(matches!(
            intake.fetch_next().await,
            Err(WrapperError::NoAttachment { ref item_id }) if item_id == "7"
        ));

        // Released as failed, so it is not handed out again
        assert!(matches!(
            intake.fetch_next().await,
            Err(WrapperError::NoWorkItem)
        ));
    }

    #[tokio::test]
    async fn test_missing_payload_path_yields_none() {
        let (intake, _temp) =
            intake_with(r#"[{"files": ["input.xlsx"], "payload": {"email": {}}}]"#).await;
        let result = intake.fetch_next().await.unwrap();
        assert_eq!(result.requesting_user, None);
    }

    #[tokio::test]
    async fn test_attachment_not_on_disk() {
        let (intake, _temp) = intake_with(r#"[{"files": ["gone.xlsx"]}]"#).await;
        assert!(matches!(
            intake.fetch_next().await,
            Err(WrapperError::AttachmentMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_completed_item_not_fetched_again() {
        let (intake, _temp) = intake_with(r#"[{"id": "a", "files": ["input.xlsx"]}]"#).await;

        let first = intake.fetch_next().await.unwrap();
        intake.complete(&first.item_id).await;

        assert!(matches!(
            intake.fetch_next().await,
            Err(WrapperError::NoWorkItem)
        ));
    }
}
