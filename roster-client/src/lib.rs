//! Roster Client - membership directory sync layer
//!
//! Keeps a live local mirror of the member collection, registers and
//! updates members (uploading their photos to the blob host first) and
//! hands out sequential member identifiers.

pub mod allocator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logger;
pub mod mirror;
pub mod roles;
pub mod store;
pub mod upload;

pub use allocator::IdentifierAllocator;
pub use config::{AllocationStrategy, BlobHostConfig, DirectoryConfig};
pub use coordinator::PersistenceCoordinator;
pub use error::{
    AllocationError, FeedError, Orphans, SaveError, SaveErrorKind, SaveFailure, SaveResult,
    SaveStage, StoreError, UploadError, WriteError, WriteOperation,
};
pub use mirror::{DirectoryMirror, MirrorSubscription};
pub use roles::{Role, fetch_user_role};
pub use store::{DocumentStore, FeedEvent, FeedStream, MemoryStore, Precondition};
pub use upload::{AssetUploader, BlobHostClient};

// Re-export shared types for convenience
pub use shared::models::{AssetSlot, Member, MemberDraft, MemberProfile, PendingAsset};
pub use shared::query;
