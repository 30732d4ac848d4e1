//! File-backed operation log sink.

use async_trait::async_trait;
use reachmap_core::{OpLogError, OperationEvent, OperationId, OperationLog};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Append-only JSONL event sink on the local filesystem.
///
/// Each line is one serialized [`OperationEvent`] tagged with the operation
/// id, so an external consumer can follow batch progress and audit a run
/// after the fact.
pub struct FileOperationLog {
    operation: OperationId,
    file: Mutex<File>,
}

impl FileOperationLog {
    /// Open (or create) the log file for appending.
    pub async fn open(path: &Path, operation: OperationId) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        info!(operation = %operation, path = %path.display(), "Operation log opened");
        Ok(Self {
            operation,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl OperationLog for FileOperationLog {
    async fn append(&self, event: OperationEvent) -> Result<(), OpLogError> {
        let mut entry = serde_json::to_value(&event).map_err(|e| OpLogError(e.to_string()))?;
        entry["operation"] = serde_json::Value::from(self.operation.as_str());
        let line = serde_json::to_string(&entry).map_err(|e| OpLogError(e.to_string()))?;

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| OpLogError(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| OpLogError(e.to_string()))?;
        file.flush().await.map_err(|e| OpLogError(e.to_string()))?;
        Ok(())
    }
}
