// roster-client/tests/common/mod.rs
// Test doubles shared by the integration suites

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::{Barrier, mpsc};

use roster_client::error::{StoreResult, UploadError};
use roster_client::store::{
    DocumentStore, FeedEvent, FeedStream, Fields, MemoryStore, Precondition, RawDocument,
    VersionedDocument,
};
use roster_client::{AssetUploader, PendingAsset, StoreError};
use shared::codec::{field, timestamp_value};
use shared::models::{EmergencyContact, MemberProfile, ServiceMonth};

pub fn profile(full_name: &str) -> MemberProfile {
    MemberProfile {
        full_name: full_name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 2, 16),
        gender: "Male".to_string(),
        phone: "+251911000000".to_string(),
        address_region: "Harar".to_string(),
        address_details: "Jugol".to_string(),
        job_status: "Employed".to_string(),
        membership_date: NaiveDate::from_ymd_opt(2020, 9, 11),
        service_month: ServiceMonth::September.label().to_string(),
        emergency_contact: EmergencyContact {
            name: "Hanna".to_string(),
            phone: "+251922000000".to_string(),
            address: String::new(),
        },
        ..Default::default()
    }
}

pub fn jpeg(file_name: &str) -> PendingAsset {
    PendingAsset::new(file_name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
}

/// Raw member document with an optional creation time (unix seconds)
pub fn raw_member(key: &str, full_name: &str, created_secs: Option<i64>) -> RawDocument {
    let mut fields = Fields::new();
    fields.insert(field::FULL_NAME.into(), json!(full_name));
    if let Some(secs) = created_secs {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        fields.insert(field::CREATED_AT.into(), timestamp_value(at));
    }
    RawDocument::new(key, fields)
}

pub async fn seed_counter(store: &dyn DocumentStore, path: &str, value: u64) {
    let mut fields = Fields::new();
    fields.insert("current".into(), json!(value));
    store.put(path, fields, Precondition::Overwrite).await.unwrap();
}

// ============================================================================
// Uploader
// ============================================================================

/// Returns `https://blob.test/<file_name>` unless the file is scripted to fail
#[derive(Default)]
pub struct StubUploader {
    urls: HashMap<String, String>,
    failures: HashMap<String, UploadError>,
    pub calls: AtomicUsize,
}

impl StubUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, file_name: &str, url: &str) -> Self {
        self.urls.insert(file_name.to_string(), url.to_string());
        self
    }

    pub fn failing(mut self, file_name: &str, error: UploadError) -> Self {
        self.failures.insert(file_name.to_string(), error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetUploader for StubUploader {
    async fn upload(&self, asset: &PendingAsset, _tags: &[&str]) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(error) = self.failures.get(&asset.file_name) {
            return Err(error.clone());
        }
        Ok(self
            .urls
            .get(&asset.file_name)
            .cloned()
            .unwrap_or_else(|| format!("https://blob.test/{}", asset.file_name)))
    }
}

// ============================================================================
// Stores
// ============================================================================

/// MemoryStore wrapper counting calls, with switchable failures
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub creates: AtomicUsize,
    pub merges: AtomicUsize,
    pub fail_counter: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_calls(&self) -> usize {
        [&self.gets, &self.puts, &self.creates, &self.merges]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<RawDocument> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".to_string()));
        }
        self.inner.create(collection, fields).await
    }

    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<RawDocument> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".to_string()));
        }
        self.inner.merge(collection, key, fields).await
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("offline".to_string()));
        }
        self.inner.delete(collection, key).await
    }

    async fn get(&self, path: &str) -> StoreResult<Option<VersionedDocument>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_counter.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("counter unreachable".to_string()));
        }
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, fields: Fields, precondition: Precondition) -> StoreResult<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(path, fields, precondition).await
    }

    async fn subscribe(&self, collection: &str) -> StoreResult<FeedStream> {
        self.inner.subscribe(collection).await
    }
}

/// Holds the first `parties` point reads at a barrier after they have read,
/// so every caller observes the same counter value
pub struct BarrierStore {
    inner: MemoryStore,
    barrier: Barrier,
    parties: usize,
    reads: AtomicUsize,
}

impl BarrierStore {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            barrier: Barrier::new(parties),
            parties,
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for BarrierStore {
    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<RawDocument> {
        self.inner.create(collection, fields).await
    }

    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<RawDocument> {
        self.inner.merge(collection, key, fields).await
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.inner.delete(collection, key).await
    }

    async fn get(&self, path: &str) -> StoreResult<Option<VersionedDocument>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.get(path).await;
        if read < self.parties {
            self.barrier.wait().await;
        }
        result
    }

    async fn put(&self, path: &str, fields: Fields, precondition: Precondition) -> StoreResult<u64> {
        self.inner.put(path, fields, precondition).await
    }

    async fn subscribe(&self, collection: &str) -> StoreResult<FeedStream> {
        self.inner.subscribe(collection).await
    }
}

/// Store whose change feed is driven by the test through a channel
pub struct ScriptedFeedStore {
    feed: Mutex<Option<mpsc::UnboundedReceiver<FeedEvent>>>,
    subscribe_error: Option<StoreError>,
}

impl ScriptedFeedStore {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            feed: Mutex::new(Some(rx)),
            subscribe_error: None,
        };
        (Arc::new(store), tx)
    }

    pub fn refusing(error: StoreError) -> Arc<Self> {
        Arc::new(Self {
            feed: Mutex::new(None),
            subscribe_error: Some(error),
        })
    }
}

#[async_trait]
impl DocumentStore for ScriptedFeedStore {
    async fn create(&self, _collection: &str, _fields: Fields) -> StoreResult<RawDocument> {
        Err(StoreError::Rejected("read-only".to_string()))
    }

    async fn merge(&self, _collection: &str, _key: &str, _fields: Fields) -> StoreResult<RawDocument> {
        Err(StoreError::Rejected("read-only".to_string()))
    }

    async fn delete(&self, _collection: &str, _key: &str) -> StoreResult<()> {
        Err(StoreError::Rejected("read-only".to_string()))
    }

    async fn get(&self, _path: &str) -> StoreResult<Option<VersionedDocument>> {
        Ok(None)
    }

    async fn put(&self, _path: &str, _fields: Fields, _precondition: Precondition) -> StoreResult<u64> {
        Err(StoreError::Rejected("read-only".to_string()))
    }

    async fn subscribe(&self, _collection: &str) -> StoreResult<FeedStream> {
        if let Some(error) = &self.subscribe_error {
            return Err(error.clone());
        }
        let rx = self
            .feed
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| StoreError::Unavailable("feed already taken".to_string()))?;

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}
