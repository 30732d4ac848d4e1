//! Artifact storage boundary.
//!
//! Durable storage is an external collaborator; the core hands over one
//! content blob per artifact with a logical name and nothing more.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Destination for finished result artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store one artifact under a logical name.
    async fn put(&self, name: &str, contents: &[u8]) -> std::io::Result<()>;
}

/// Artifact store writing into a local directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`; the directory is created on first
    /// write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn put(&self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.target(name);
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), bytes = contents.len(), "Artifact stored");
        Ok(())
    }
}

/// The timestamped logical artifact name, e.g. `results_all-csv_1700000000000`.
pub fn artifact_name(kind: &str, timestamp_ms: i64) -> String {
    format!("results_all-{kind}_{timestamp_ms}")
}
