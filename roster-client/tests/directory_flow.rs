// roster-client/tests/directory_flow.rs
// Save pipeline and identifier allocation against in-memory stores

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{BarrierStore, CountingStore, StubUploader, jpeg, profile, seed_counter};
use roster_client::store::document_path;
use roster_client::{
    AllocationStrategy, AssetSlot, DirectoryConfig, IdentifierAllocator, MemberDraft,
    MemoryStore, PersistenceCoordinator, SaveErrorKind, SaveFailure, SaveStage, StoreError,
    UploadError,
};
use shared::codec::field;

fn coordinator(
    store: Arc<dyn roster_client::DocumentStore>,
    uploader: Arc<StubUploader>,
    config: &DirectoryConfig,
) -> PersistenceCoordinator {
    PersistenceCoordinator::new(store, uploader, config)
}

#[tokio::test]
async fn test_create_member_with_both_photos() {
    let config = DirectoryConfig::default();
    let store = Arc::new(MemoryStore::new());
    seed_counter(store.as_ref(), &config.counter_path, 7).await;
    let uploader = Arc::new(
        StubUploader::new()
            .with_url("face.jpg", "u1")
            .with_url("id.jpg", "u2"),
    );

    let draft = MemberDraft::new(profile("Abel Tesfaye"))
        .with_photo(AssetSlot::Pending(jpeg("face.jpg")))
        .with_id_photo(AssetSlot::Pending(jpeg("id.jpg")));

    let member = coordinator(store.clone(), uploader.clone(), &config)
        .create_member(draft)
        .await
        .unwrap();

    assert_eq!(member.member_identifier, "UR0008");
    assert_eq!(member.photo_url, "u1");
    assert_eq!(member.id_photo_url, "u2");
    assert_eq!(member.profile.full_name, "Abel Tesfaye");
    assert!(member.created_at.is_some());
    assert_eq!(uploader.calls(), 2);

    let stored = store
        .document(&document_path(&config.members_collection, &member.id))
        .unwrap();
    assert_eq!(stored[field::MEMBER_IDENTIFIER], "UR0008");
    assert_eq!(stored[field::PHOTO_URL], "u1");
    assert_eq!(store.document(&config.counter_path).unwrap()["current"], 8);
}

#[tokio::test]
async fn test_create_without_photos_writes_empty_urls() {
    let config = DirectoryConfig::default();
    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(StubUploader::new());

    let member = coordinator(store.clone(), uploader.clone(), &config)
        .create_member(MemberDraft::new(profile("Hanna Girma")))
        .await
        .unwrap();

    assert_eq!(member.member_identifier, "UR0001");
    assert_eq!(member.photo_url, "");
    assert_eq!(member.id_photo_url, "");
    assert_eq!(uploader.calls(), 0);
}

#[tokio::test]
async fn test_owner_is_stamped_on_writes() {
    let config = DirectoryConfig::default().with_owner("admin-7");
    let store = Arc::new(MemoryStore::new());

    let member = coordinator(store.clone(), Arc::new(StubUploader::new()), &config)
        .create_member(MemberDraft::new(profile("Abel Tesfaye")))
        .await
        .unwrap();

    let stored = store
        .document(&document_path(&config.members_collection, &member.id))
        .unwrap();
    assert_eq!(stored[field::USER_ID], "admin-7");
}

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let config = DirectoryConfig::default();
    let store = Arc::new(CountingStore::new());
    let uploader = Arc::new(StubUploader::new());

    let mut incomplete = profile("");
    incomplete.emergency_contact.phone.clear();
    let draft = MemberDraft::new(incomplete).with_photo(AssetSlot::Pending(jpeg("face.jpg")));

    let err = coordinator(store.clone(), uploader.clone(), &config)
        .create_member(draft)
        .await
        .unwrap_err();

    assert_eq!(err.stage, SaveStage::Validating);
    assert_eq!(err.kind(), SaveErrorKind::Validation);
    match &err.cause {
        SaveFailure::Validation(v) => {
            assert!(v.contains(field::FULL_NAME));
            assert!(v.contains("emergencyContact.phone"));
        }
        other => panic!("unexpected cause: {other:?}"),
    }
    assert_eq!(uploader.calls(), 0);
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn test_failed_upload_skips_allocation_and_write() {
    let config = DirectoryConfig::default();
    let store = Arc::new(CountingStore::new());
    let uploader = Arc::new(
        StubUploader::new()
            .with_url("face.jpg", "u1")
            .failing("id.jpg", UploadError::http(400, "Invalid image file")),
    );

    let draft = MemberDraft::new(profile("Abel Tesfaye"))
        .with_photo(AssetSlot::Pending(jpeg("face.jpg")))
        .with_id_photo(AssetSlot::Pending(jpeg("id.jpg")));

    let err = coordinator(store.clone(), uploader.clone(), &config)
        .create_member(draft)
        .await
        .unwrap_err();

    assert_eq!(err.stage, SaveStage::Uploading);
    assert_eq!(err.kind(), SaveErrorKind::Upload);
    // Both uploads ran; the successful one is reported as stranded
    assert_eq!(uploader.calls(), 2);
    assert_eq!(err.orphans.asset_urls, vec!["u1".to_string()]);
    assert!(err.orphans.identifier.is_none());
    assert_eq!(store.total_calls(), 0);
    assert!(store.inner.is_empty(&config.members_collection));
}

#[tokio::test]
async fn test_allocation_failure_reports_uploaded_assets() {
    let config = DirectoryConfig::default();
    let store = Arc::new(CountingStore::new());
    store.fail_counter.store(true, Ordering::SeqCst);
    let uploader = Arc::new(StubUploader::new().with_url("face.jpg", "u1"));

    let draft =
        MemberDraft::new(profile("Abel Tesfaye")).with_photo(AssetSlot::Pending(jpeg("face.jpg")));

    let err = coordinator(store.clone(), uploader, &config)
        .create_member(draft)
        .await
        .unwrap_err();

    assert_eq!(err.stage, SaveStage::Allocating);
    assert_eq!(err.kind(), SaveErrorKind::Allocation);
    assert_eq!(err.orphans.asset_urls, vec!["u1".to_string()]);
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_commit_failure_reports_consumed_identifier() {
    let config = DirectoryConfig::default();
    let store = Arc::new(CountingStore::new());
    store.fail_writes.store(true, Ordering::SeqCst);

    let err = coordinator(store.clone(), Arc::new(StubUploader::new()), &config)
        .create_member(MemberDraft::new(profile("Abel Tesfaye")))
        .await
        .unwrap_err();

    assert_eq!(err.stage, SaveStage::Committing);
    assert_eq!(err.kind(), SaveErrorKind::Write);
    assert_eq!(err.orphans.identifier.as_deref(), Some("UR0001"));
    // The counter is never rolled back
    assert_eq!(store.inner.document(&config.counter_path).unwrap()["current"], 1);
}

#[tokio::test]
async fn test_update_keeps_identifier_and_persisted_urls() {
    let config = DirectoryConfig::default();
    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(
        StubUploader::new()
            .with_url("face.jpg", "u1")
            .with_url("id.jpg", "u2")
            .with_url("face-2.jpg", "u3"),
    );
    let coordinator = coordinator(store.clone(), uploader.clone(), &config);

    let created = coordinator
        .create_member(
            MemberDraft::new(profile("Abel Tesfaye"))
                .with_photo(AssetSlot::Pending(jpeg("face.jpg")))
                .with_id_photo(AssetSlot::Pending(jpeg("id.jpg"))),
        )
        .await
        .unwrap();

    // Persisted slots are kept without re-uploading
    let mut draft = MemberDraft::from_member(&created);
    draft.profile.phone = "+251933000000".to_string();
    let updated = coordinator.update_member(&created.id, draft).await.unwrap();

    assert_eq!(uploader.calls(), 2);
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.member_identifier, "UR0001");
    assert_eq!(updated.profile.phone, "+251933000000");
    assert_eq!(updated.photo_url, "u1");
    assert_eq!(updated.id_photo_url, "u2");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    // A new photo replaces one URL; an empty slot leaves the other untouched
    let draft = MemberDraft::from_member(&updated)
        .with_photo(AssetSlot::Pending(jpeg("face-2.jpg")))
        .with_id_photo(AssetSlot::Empty);
    let replaced = coordinator.update_member(&created.id, draft).await.unwrap();

    assert_eq!(uploader.calls(), 3);
    assert_eq!(replaced.photo_url, "u3");
    assert_eq!(replaced.id_photo_url, "u2");
    assert_eq!(replaced.member_identifier, "UR0001");
    assert_eq!(store.document(&config.counter_path).unwrap()["current"], 1);
}

#[tokio::test]
async fn test_update_missing_member_fails_at_commit() {
    let config = DirectoryConfig::default();
    let store = Arc::new(MemoryStore::new());

    let err = coordinator(store, Arc::new(StubUploader::new()), &config)
        .update_member("missing", MemberDraft::new(profile("Abel Tesfaye")))
        .await
        .unwrap_err();

    assert_eq!(err.stage, SaveStage::Committing);
    match err.cause {
        SaveFailure::Write(write) => assert!(matches!(write.source, StoreError::NotFound(_))),
        other => panic!("unexpected cause: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_member() {
    let config = DirectoryConfig::default();
    let store = Arc::new(CountingStore::new());
    let coordinator = coordinator(store.clone(), Arc::new(StubUploader::new()), &config);

    let member = coordinator
        .create_member(MemberDraft::new(profile("Abel Tesfaye")))
        .await
        .unwrap();
    assert_eq!(store.inner.len(&config.members_collection), 1);

    coordinator.delete_member(&member.id).await.unwrap();
    assert!(store.inner.is_empty(&config.members_collection));

    // Deleting again is not an error
    coordinator.delete_member(&member.id).await.unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);
    let err = coordinator.delete_member("other").await.unwrap_err();
    assert_eq!(err.stage, SaveStage::Committing);
    assert_eq!(err.kind(), SaveErrorKind::Write);
}

// ============================================================================
// Allocation under concurrency
// ============================================================================

const RACERS: usize = 4;

async fn race(strategy: AllocationStrategy) -> Vec<String> {
    let config = DirectoryConfig::default().with_allocation_strategy(strategy);
    let store = Arc::new(BarrierStore::new(RACERS));
    seed_counter(store.as_ref(), &config.counter_path, 7).await;
    let allocator = IdentifierAllocator::new(store, &config);

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.next().await })
        })
        .collect();

    let mut identifiers = Vec::new();
    for handle in handles {
        identifiers.push(handle.await.unwrap().unwrap());
    }
    identifiers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unconditional_allocation_can_duplicate() {
    let identifiers = race(AllocationStrategy::Unconditional).await;

    // Every racer read 7 before anyone wrote
    assert!(identifiers.iter().all(|id| id == "UR0008"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conditional_allocation_is_unique() {
    let identifiers = race(AllocationStrategy::Conditional).await;

    let distinct: HashSet<_> = identifiers.iter().cloned().collect();
    assert_eq!(distinct.len(), RACERS);
    let expected: HashSet<_> = (8..8 + RACERS as u64).map(|n| format!("UR{n:04}")).collect();
    assert_eq!(distinct, expected);
}
