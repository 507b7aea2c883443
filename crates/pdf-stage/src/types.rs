use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Unknown page entry: {0}")]
    UnknownEntry(PageId),
    #[error("Reorder does not match the staged pages")]
    InvalidPermutation,
    #[error("No pages selected")]
    EmptySelection,
    #[error("A submission is already in progress")]
    SubmissionInProgress,
    #[error("No artifact to save")]
    NoArtifact,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Whether the error should reach the user. Stale ids, corrupted drag
    /// events and commands issued mid-submission are dropped silently.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            StageError::UnknownEntry(_)
                | StageError::InvalidPermutation
                | StageError::SubmissionInProgress
        )
    }
}

pub type Result<T> = std::result::Result<T, StageError>;

/// A selected file that could not be opened as a PDF document
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{name}: PDF error: {source}")]
    Pdf {
        name: String,
        #[source]
        source: lopdf::Error,
    },
    #[error("{name}: IO error: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name}: document has no pages")]
    NoPages { name: String },
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl LoadError {
    pub fn file_name(&self) -> Option<&str> {
        match self {
            LoadError::Pdf { name, .. } | LoadError::Io { name, .. } | LoadError::NoPages { name } => {
                Some(name)
            }
            LoadError::TaskJoin(_) => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("Renderer failed: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Service returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("Submission aborted")]
    Aborted,
    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid request: {0}")]
    Request(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Staged pages cannot be expressed in the legacy format: {0}")]
    Unrepresentable(String),
    #[error("Failed to encode page metadata: {0}")]
    Metadata(String),
}

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a staged page. Never reused within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    pub(crate) fn next() -> Self {
        PageId(NEXT_PAGE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Identity of a loaded source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// Clockwise rotation applied to a page by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Clockwise90),
            180 => Some(Rotation::Clockwise180),
            270 => Some(Rotation::Clockwise270),
            _ => None,
        }
    }

    /// Quarter turn clockwise, wrapping 270 back to 0
    pub fn next(self) -> Self {
        match self {
            Rotation::None => Rotation::Clockwise90,
            Rotation::Clockwise90 => Rotation::Clockwise180,
            Rotation::Clockwise180 => Rotation::Clockwise270,
            Rotation::Clockwise270 => Rotation::None,
        }
    }

    pub fn radians(self) -> f32 {
        f32::from(self.degrees()).to_radians()
    }
}

impl serde::Serialize for Rotation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.degrees())
    }
}

impl<'de> serde::Deserialize<'de> for Rotation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let degrees = u16::deserialize(deserializer)?;
        Rotation::from_degrees(degrees).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid rotation: {}", degrees))
        })
    }
}

/// Edit requested from the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Combine the staged pages into one document
    Merge,
    /// Pull the staged pages out of their source into a new document
    Extract,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Merge => "merge",
            Operation::Extract => "extract",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
