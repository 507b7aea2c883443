use crate::types::*;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// The document returned by a successful submission
#[derive(Debug, Clone)]
pub struct Artifact {
    pub operation: Operation,
    /// Default name offered for the download
    pub filename: String,
    pub bytes: Bytes,
}

impl Artifact {
    /// Write the artifact. A directory target receives the default filename.
    pub async fn save(&self, target: impl AsRef<Path>) -> Result<PathBuf> {
        let target = target.as_ref();
        let path = if tokio::fs::metadata(target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            target.join(&self.filename)
        } else {
            target.to_path_buf()
        };
        tokio::fs::write(&path, &self.bytes).await?;
        log::info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}
