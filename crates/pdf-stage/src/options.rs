use crate::types::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How page metadata and file content are laid out in the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireFormat {
    /// `operation`, `files` and a `pages` JSON list of page descriptors
    #[default]
    Structured,
    /// Field layout of the older merge/split endpoints
    Legacy,
}

/// How originating file content is attached for the structured format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilePartLayout {
    /// One file part per submitted page, repeating files as needed
    #[default]
    PerPage,
    /// One file part per distinct source, in order of first use
    Deduplicated,
}

/// Remote service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    // Endpoints
    pub base_url: String,
    pub merge_path: String,
    pub extract_path: String,

    // Request layout
    pub wire_format: WireFormat,
    pub file_parts: FilePartLayout,

    // Artifact naming
    pub merge_filename: String,
    pub extract_filename: String,

    /// Deadline for a whole submission; none by default
    pub timeout_secs: Option<u64>,

    /// Scale previews are rendered at, relative to 72 dpi
    pub preview_scale: f32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            merge_path: "/unir-pdf/".to_string(),
            extract_path: "/dividir-pdf/".to_string(),
            wire_format: WireFormat::Structured,
            file_parts: FilePartLayout::PerPage,
            merge_filename: "unido.pdf".to_string(),
            extract_filename: "paginas_divididas.pdf".to_string(),
            timeout_secs: None,
            preview_scale: 0.7,
        }
    }
}

impl ServiceOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| StageError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StageError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| StageError::Config(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StageError::Config(format!(
                "Base URL must be http or https, got {}",
                url.scheme()
            )));
        }

        for (label, path) in [("merge", &self.merge_path), ("extract", &self.extract_path)] {
            if !path.starts_with('/') {
                return Err(StageError::Config(format!(
                    "The {} path must start with '/', got {:?}",
                    label, path
                )));
            }
        }

        for (label, name) in [
            ("merge", &self.merge_filename),
            ("extract", &self.extract_filename),
        ] {
            if name.trim().is_empty() {
                return Err(StageError::Config(format!(
                    "The {} artifact filename is empty",
                    label
                )));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(StageError::Config(
                "Timeout must be at least one second".to_string(),
            ));
        }

        if !(self.preview_scale > 0.0 && self.preview_scale <= 8.0) {
            return Err(StageError::Config(format!(
                "Preview scale must be in (0, 8], got {}",
                self.preview_scale
            )));
        }

        Ok(())
    }

    /// Full endpoint URL for an operation
    pub fn endpoint(&self, operation: Operation) -> String {
        let path = match operation {
            Operation::Merge => &self.merge_path,
            Operation::Extract => &self.extract_path,
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn artifact_filename(&self, operation: Operation) -> &str {
        match operation {
            Operation::Merge => &self.merge_filename,
            Operation::Extract => &self.extract_filename,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
