//! Client error types
//!
//! Every coordinator failure is a [`SaveError`] tagged with the stage it
//! reached, so callers can tell a cheap retry from one that would re-upload
//! assets or burn another identifier.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use shared::error::{CodecError, ValidationError};

/// Remote document store error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store unreachable or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conditional write lost a race
    #[error("Precondition failed: {path}")]
    PreconditionFailed { path: String },

    /// Store refused the operation (permissions, invalid payload, ...)
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Blob host upload error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Upload failed ({}): {message}", .status.map_or_else(|| "network".to_string(), |s| s.to_string()))]
pub struct UploadError {
    /// HTTP status, `None` when the host was unreachable
    pub status: Option<u16>,
    pub message: String,
}

impl UploadError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Identifier allocation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Counter read or write failed
    #[error("Counter I/O failed: {0}")]
    Store(#[from] StoreError),

    /// Conditional increments kept losing to concurrent writers
    #[error("Counter contention: gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    /// Stored counter cannot be advanced without wrapping
    #[error("Counter overflow: {value} cannot be advanced")]
    CounterOverflow { value: String },
}

/// Store create/update/delete error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {source}")]
pub struct WriteError {
    pub operation: WriteOperation,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteOperation::Create => "Create",
            WriteOperation::Update => "Update",
            WriteOperation::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// Change-feed error; terminates the subscription
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Opening the subscription failed
    #[error("Subscribe failed: {0}")]
    Subscribe(StoreError),

    /// The feed delivered a terminal error event
    #[error("Feed error: {0}")]
    Stream(StoreError),

    /// The feed closed without an error event
    #[error("Feed closed by the store")]
    Closed,
}

// ============================================================================
// Save state machine
// ============================================================================

/// Stages of a save operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStage {
    Validating,
    Uploading,
    /// Create only
    Allocating,
    Committing,
    Done,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaveStage::Validating => "validating",
            SaveStage::Uploading => "uploading",
            SaveStage::Allocating => "allocating",
            SaveStage::Committing => "committing",
            SaveStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Failure kind, independent of stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveErrorKind {
    Validation,
    Upload,
    Allocation,
    Write,
}

/// Cause of a failed save
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl SaveFailure {
    pub fn kind(&self) -> SaveErrorKind {
        match self {
            SaveFailure::Validation(_) => SaveErrorKind::Validation,
            SaveFailure::Upload(_) => SaveErrorKind::Upload,
            SaveFailure::Allocation(_) => SaveErrorKind::Allocation,
            SaveFailure::Write(_) => SaveErrorKind::Write,
        }
    }
}

/// Resources a failed save leaves unreferenced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Orphans {
    /// Blob-host URLs uploaded by this save
    pub asset_urls: Vec<String>,
    /// Identifier consumed from the counter
    pub identifier: Option<String>,
}

impl Orphans {
    pub fn is_empty(&self) -> bool {
        self.asset_urls.is_empty() && self.identifier.is_none()
    }
}

/// Terminal `Failed(stage, cause)` state of a save
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Save failed while {stage}: {cause}")]
pub struct SaveError {
    pub stage: SaveStage,
    #[source]
    pub cause: SaveFailure,
    pub orphans: Orphans,
}

impl SaveError {
    pub fn new(stage: SaveStage, cause: impl Into<SaveFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            orphans: Orphans::default(),
        }
    }

    pub fn with_orphans(mut self, orphans: Orphans) -> Self {
        self.orphans = orphans;
        self
    }

    pub fn kind(&self) -> SaveErrorKind {
        self.cause.kind()
    }
}

/// Result type for save operations
pub type SaveResult<T> = Result<T, SaveError>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
