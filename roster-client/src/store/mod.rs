//! Remote document store seam
//!
//! The directory only needs five capabilities from its store: keyed
//! create/merge/delete on the member collection, versioned point reads and
//! conditional writes for the counter, and a snapshot change feed. Wire
//! details belong to the implementation behind [`DocumentStore`].

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{StoreError, StoreResult};
pub use shared::codec::{Fields, RawDocument};

/// A point-read document with its write version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub fields: Fields,
    /// Incremented by the store on every write
    pub version: u64,
}

/// Condition attached to a single-document write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Write unconditionally
    Overwrite,
    /// Only if the document does not exist yet
    Absent,
    /// Only if the document is still at this version
    Version(u64),
}

/// Change-feed event
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Every document of the collection as of one point in the feed
    Snapshot(Vec<RawDocument>),
    /// Terminal error; no further events follow
    Error(StoreError),
}

/// Persistent collection subscription; dropping it releases the feed
pub type FeedStream = BoxStream<'static, FeedEvent>;

/// Remote document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document under a store-generated key. The store stamps
    /// `createdAt` and `updatedAt` and returns the materialized document.
    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<RawDocument>;

    /// Merge top-level fields into an existing document, stamping
    /// `updatedAt`. Unknown keys fail with [`StoreError::NotFound`].
    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<RawDocument>;

    /// Delete a document; deleting a missing key succeeds
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()>;

    /// Point read by full document path
    async fn get(&self, path: &str) -> StoreResult<Option<VersionedDocument>>;

    /// Replace a document by full path if `precondition` holds; returns the
    /// new version. A violated precondition fails with
    /// [`StoreError::PreconditionFailed`].
    async fn put(&self, path: &str, fields: Fields, precondition: Precondition) -> StoreResult<u64>;

    /// Open a snapshot feed over a collection. The first event is the
    /// current contents.
    async fn subscribe(&self, collection: &str) -> StoreResult<FeedStream>;
}

/// Full path of a document in a collection
pub fn document_path(collection: &str, key: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), key)
}
