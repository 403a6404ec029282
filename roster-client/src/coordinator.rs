//! Multi-stage member persistence
//!
//! ```text
//! Validating ──▶ Uploading ──▶ Allocating (create only) ──▶ Committing ──▶ Done
//!      │              │                 │                       │
//!      └──────────────┴─────────────────┴───────────────────────┴──▶ Failed(stage, cause)
//! ```
//!
//! Uploads and the store write are not linked transactionally. A failure
//! after an upload or an allocation reports the stranded resources in
//! [`SaveError::orphans`]; nothing is rolled back and the counter is never
//! decremented.
//!
//! The coordinator never touches a local mirror. Writes show up through
//! the change feed like anyone else's.

use std::sync::Arc;

use shared::codec::{self, Fields, field};
use shared::models::{AssetSlot, Member, MemberDraft};
use shared::validation::validate_profile;

use crate::allocator::IdentifierAllocator;
use crate::config::DirectoryConfig;
use crate::error::{
    Orphans, SaveError, SaveResult, SaveStage, StoreError, UploadError, WriteError, WriteOperation,
};
use crate::store::{DocumentStore, RawDocument};
use crate::upload::AssetUploader;

const PHOTO_TAGS: &[&str] = &["member", "photo"];
const ID_PHOTO_TAGS: &[&str] = &["member", "id_photo"];

/// Result of resolving one asset slot
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotOutcome {
    Empty,
    /// Already persisted, no upload needed
    Kept(String),
    /// Uploaded by this save
    Uploaded(String),
}

impl SlotOutcome {
    fn url(&self) -> Option<&str> {
        match self {
            SlotOutcome::Empty => None,
            SlotOutcome::Kept(url) | SlotOutcome::Uploaded(url) => Some(url),
        }
    }

    fn uploaded(&self) -> Option<&str> {
        match self {
            SlotOutcome::Uploaded(url) => Some(url),
            _ => None,
        }
    }
}

struct ResolvedAssets {
    photo: SlotOutcome,
    id_photo: SlotOutcome,
}

impl ResolvedAssets {
    fn uploaded_urls(&self) -> Vec<String> {
        [&self.photo, &self.id_photo]
            .into_iter()
            .filter_map(|o| o.uploaded().map(str::to_string))
            .collect()
    }
}

/// Coordinates validate → upload → allocate → commit for member saves
#[derive(Clone)]
pub struct PersistenceCoordinator {
    store: Arc<dyn DocumentStore>,
    uploader: Arc<dyn AssetUploader>,
    allocator: IdentifierAllocator,
    collection: String,
    owner_id: Option<String>,
}

impl PersistenceCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        uploader: Arc<dyn AssetUploader>,
        config: &DirectoryConfig,
    ) -> Self {
        let allocator = IdentifierAllocator::new(store.clone(), config);
        Self::with_allocator(store, uploader, allocator, config)
    }

    /// Use a preconfigured allocator (e.g. shared across coordinators)
    pub fn with_allocator(
        store: Arc<dyn DocumentStore>,
        uploader: Arc<dyn AssetUploader>,
        allocator: IdentifierAllocator,
        config: &DirectoryConfig,
    ) -> Self {
        Self {
            store,
            uploader,
            allocator,
            collection: config.members_collection.clone(),
            owner_id: config.owner_id.clone(),
        }
    }

    /// Register a new member.
    ///
    /// Pending assets are uploaded concurrently, then an identifier is
    /// allocated and the record committed with it.
    pub async fn create_member(&self, draft: MemberDraft) -> SaveResult<Member> {
        tracing::debug!(stage = %SaveStage::Validating, "Creating member");
        validate_profile(&draft.profile).map_err(|e| SaveError::new(SaveStage::Validating, e))?;

        tracing::debug!(stage = %SaveStage::Uploading, "Resolving assets");
        let assets = self.upload_assets(&draft).await?;
        let mut orphans = Orphans {
            asset_urls: assets.uploaded_urls(),
            identifier: None,
        };

        tracing::debug!(stage = %SaveStage::Allocating, "Allocating identifier");
        let identifier = match self.allocator.next().await {
            Ok(identifier) => identifier,
            Err(e) => {
                log_orphans(&orphans);
                return Err(SaveError::new(SaveStage::Allocating, e).with_orphans(orphans));
            }
        };
        orphans.identifier = Some(identifier.clone());

        tracing::debug!(stage = %SaveStage::Committing, identifier = %identifier, "Committing member");
        let mut fields = Fields::new();
        fields.insert(field::MEMBER_IDENTIFIER.into(), identifier.clone().into());
        codec::encode_profile(&draft.profile, &mut fields);
        fields.insert(
            field::PHOTO_URL.into(),
            assets.photo.url().unwrap_or_default().into(),
        );
        fields.insert(
            field::ID_PHOTO_URL.into(),
            assets.id_photo.url().unwrap_or_default().into(),
        );
        self.stamp_owner(&mut fields);

        let raw = match self.store.create(&self.collection, fields).await {
            Ok(raw) => raw,
            Err(source) => {
                log_orphans(&orphans);
                let cause = WriteError {
                    operation: WriteOperation::Create,
                    source,
                };
                return Err(SaveError::new(SaveStage::Committing, cause).with_orphans(orphans));
            }
        };

        let member = materialize(&raw, WriteOperation::Create)?;
        tracing::info!(
            stage = %SaveStage::Done,
            member_id = %member.id,
            identifier = %member.member_identifier,
            "Member registered"
        );
        Ok(member)
    }

    /// Update an existing member with merge semantics.
    ///
    /// The identifier is never rewritten. Only freshly staged assets are
    /// uploaded; empty slots leave the stored URL untouched.
    pub async fn update_member(&self, id: &str, draft: MemberDraft) -> SaveResult<Member> {
        tracing::debug!(stage = %SaveStage::Validating, member_id = %id, "Updating member");
        validate_profile(&draft.profile).map_err(|e| SaveError::new(SaveStage::Validating, e))?;

        tracing::debug!(stage = %SaveStage::Uploading, member_id = %id, "Resolving assets");
        let assets = self.upload_assets(&draft).await?;
        let orphans = Orphans {
            asset_urls: assets.uploaded_urls(),
            identifier: None,
        };

        tracing::debug!(stage = %SaveStage::Committing, member_id = %id, "Merging member");
        let mut fields = Fields::new();
        codec::encode_profile(&draft.profile, &mut fields);
        if let Some(url) = assets.photo.url() {
            fields.insert(field::PHOTO_URL.into(), url.into());
        }
        if let Some(url) = assets.id_photo.url() {
            fields.insert(field::ID_PHOTO_URL.into(), url.into());
        }
        self.stamp_owner(&mut fields);

        let raw = match self.store.merge(&self.collection, id, fields).await {
            Ok(raw) => raw,
            Err(source) => {
                log_orphans(&orphans);
                let cause = WriteError {
                    operation: WriteOperation::Update,
                    source,
                };
                return Err(SaveError::new(SaveStage::Committing, cause).with_orphans(orphans));
            }
        };

        let member = materialize(&raw, WriteOperation::Update)?;
        tracing::info!(stage = %SaveStage::Done, member_id = %member.id, "Member updated");
        Ok(member)
    }

    /// Delete the member document. Blob-host assets are left in place.
    pub async fn delete_member(&self, id: &str) -> SaveResult<()> {
        self.store
            .delete(&self.collection, id)
            .await
            .map_err(|source| {
                tracing::error!(member_id = %id, error = %source, "Member delete failed");
                SaveError::new(
                    SaveStage::Committing,
                    WriteError {
                        operation: WriteOperation::Delete,
                        source,
                    },
                )
            })?;

        tracing::info!(member_id = %id, "Member deleted");
        Ok(())
    }

    fn stamp_owner(&self, fields: &mut Fields) {
        if let Some(owner) = &self.owner_id {
            fields.insert(field::USER_ID.into(), owner.clone().into());
        }
    }

    async fn resolve_slot(&self, slot: &AssetSlot, tags: &[&str]) -> Result<SlotOutcome, UploadError> {
        match slot {
            AssetSlot::Empty => Ok(SlotOutcome::Empty),
            AssetSlot::Persisted(url) => Ok(SlotOutcome::Kept(url.clone())),
            AssetSlot::Pending(asset) => self.uploader.upload(asset, tags).await.map(SlotOutcome::Uploaded),
        }
    }

    /// Upload both slots concurrently and wait for both
    async fn upload_assets(&self, draft: &MemberDraft) -> SaveResult<ResolvedAssets> {
        let (photo, id_photo) = tokio::join!(
            self.resolve_slot(&draft.photo, PHOTO_TAGS),
            self.resolve_slot(&draft.id_photo, ID_PHOTO_TAGS),
        );

        match (photo, id_photo) {
            (Ok(photo), Ok(id_photo)) => Ok(ResolvedAssets { photo, id_photo }),
            // The sibling upload may have succeeded; it is not rolled back
            (Err(cause), sibling) | (sibling, Err(cause)) => {
                let asset_urls = sibling
                    .ok()
                    .and_then(|o| o.uploaded().map(str::to_string))
                    .into_iter()
                    .collect();

                let orphans = Orphans {
                    asset_urls,
                    identifier: None,
                };
                log_orphans(&orphans);
                Err(SaveError::new(SaveStage::Uploading, cause).with_orphans(orphans))
            }
        }
    }
}

fn materialize(raw: &RawDocument, operation: WriteOperation) -> SaveResult<Member> {
    codec::decode(raw).map_err(|e| {
        SaveError::new(
            SaveStage::Committing,
            WriteError {
                operation,
                source: StoreError::Rejected(e.to_string()),
            },
        )
    })
}

fn log_orphans(orphans: &Orphans) {
    if !orphans.is_empty() {
        tracing::warn!(
            asset_urls = ?orphans.asset_urls,
            identifier = ?orphans.identifier,
            "Save aborted, resources left unreferenced"
        );
    }
}
