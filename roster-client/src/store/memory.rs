//! In-process document store
//!
//! ```text
//! create / merge / delete / put
//!       │ (under the state lock)
//!       ▼
//! documents: path → StoredDoc { fields, version }
//!       │ full collection snapshot
//!       ▼
//! feeds: collection → broadcast::Sender<FeedEvent> ──▶ subscribers
//! ```
//!
//! Snapshots are sent while the lock is held, so every subscriber sees
//! mutations in commit order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{DocumentStore, FeedEvent, FeedStream, Fields, Precondition, RawDocument, VersionedDocument, document_path};
use crate::error::{StoreError, StoreResult};
use shared::codec::{field, timestamp_value};

/// Per-collection broadcast capacity; a lagging subscriber skips to the
/// newest snapshot
const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct StoredDoc {
    fields: Fields,
    version: u64,
}

#[derive(Default)]
struct State {
    /// full path → document
    documents: BTreeMap<String, StoredDoc>,
    /// collection path → feed
    feeds: HashMap<String, broadcast::Sender<FeedEvent>>,
    /// last issued server timestamp
    clock: Option<DateTime<Utc>>,
}

impl State {
    /// Server timestamp, strictly increasing across writes
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.clock
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        self.clock = Some(now);
        now
    }

    fn snapshot(&self, collection: &str) -> Vec<RawDocument> {
        let prefix = format!("{}/", collection.trim_end_matches('/'));
        self.documents
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, doc)| {
                let key = &path[prefix.len()..];
                (!key.contains('/')).then(|| RawDocument::new(key, doc.fields.clone()))
            })
            .collect()
    }

    fn feed(&mut self, collection: &str) -> &broadcast::Sender<FeedEvent> {
        self.feeds
            .entry(collection.trim_end_matches('/').to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
    }

    fn publish(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        tracing::trace!(collection = %collection, docs = snapshot.len(), "Publishing snapshot");
        // No subscribers is fine
        let _ = self.feed(collection).send(FeedEvent::Snapshot(snapshot));
    }

    fn bump(&mut self, path: &str, fields: Fields) -> u64 {
        let version = self.documents.get(path).map_or(1, |d| d.version + 1);
        self.documents
            .insert(path.to_string(), StoredDoc { fields, version });
        version
    }
}

/// Document store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fields of a document by full path
    pub fn document(&self, path: &str) -> Option<Fields> {
        self.state().documents.get(path).map(|d| d.fields.clone())
    }

    /// Number of documents directly under a collection
    pub fn len(&self, collection: &str) -> usize {
        self.state().snapshot(collection).len()
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Terminate every subscription on `collection` with an error event
    pub fn fail_feed(&self, collection: &str, message: impl Into<String>) {
        let mut state = self.state();
        let _ = state
            .feed(collection)
            .send(FeedEvent::Error(StoreError::Unavailable(message.into())));
    }
}

/// Discard buffered snapshots up to the newest one. An error event is
/// terminal and returned as soon as it is reached.
fn drain_to_newest(rx: &mut broadcast::Receiver<FeedEvent>) -> Option<FeedEvent> {
    let mut newest = None;
    loop {
        match rx.try_recv() {
            Ok(event @ FeedEvent::Error(_)) => return Some(event),
            Ok(event) => newest = Some(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return newest,
        }
    }
}

fn split_path(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(collection, _)| collection)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<RawDocument> {
        let key = Uuid::new_v4().simple().to_string();
        let path = document_path(collection, &key);

        let mut state = self.state();
        let now = timestamp_value(state.now());
        fields.insert(field::CREATED_AT.into(), now.clone());
        fields.insert(field::UPDATED_AT.into(), now);
        state.bump(&path, fields.clone());
        state.publish(collection);

        tracing::debug!(collection = %collection, key = %key, "Document created");
        Ok(RawDocument::new(key, fields))
    }

    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<RawDocument> {
        let path = document_path(collection, key);

        let mut state = self.state();
        let mut merged = state
            .documents
            .get(&path)
            .map(|d| d.fields.clone())
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        // createdAt is store-owned and survives any merge
        let created = merged.get(field::CREATED_AT).cloned();
        merged.extend(fields);
        match created {
            Some(created) => merged.insert(field::CREATED_AT.into(), created),
            None => merged.remove(field::CREATED_AT),
        };
        let now = timestamp_value(state.now());
        merged.insert(field::UPDATED_AT.into(), now);
        state.bump(&path, merged.clone());
        state.publish(collection);

        tracing::debug!(collection = %collection, key = %key, "Document merged");
        Ok(RawDocument::new(key, merged))
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let path = document_path(collection, key);

        let mut state = self.state();
        if state.documents.remove(&path).is_some() {
            state.publish(collection);
            tracing::debug!(collection = %collection, key = %key, "Document deleted");
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Option<VersionedDocument>> {
        Ok(self.state().documents.get(path).map(|d| VersionedDocument {
            fields: d.fields.clone(),
            version: d.version,
        }))
    }

    async fn put(&self, path: &str, fields: Fields, precondition: Precondition) -> StoreResult<u64> {
        let mut state = self.state();
        let current = state.documents.get(path).map(|d| d.version);

        let holds = match precondition {
            Precondition::Overwrite => true,
            Precondition::Absent => current.is_none(),
            Precondition::Version(expected) => current == Some(expected),
        };
        if !holds {
            return Err(StoreError::PreconditionFailed {
                path: path.to_string(),
            });
        }

        let version = state.bump(path, fields);
        let collection = split_path(path).to_string();
        if state.feeds.contains_key(&collection) {
            state.publish(&collection);
        }
        Ok(version)
    }

    async fn subscribe(&self, collection: &str) -> StoreResult<FeedStream> {
        let (initial, rx) = {
            let mut state = self.state();
            let initial = state.snapshot(collection);
            let rx = state.feed(collection).subscribe();
            (initial, rx)
        };

        let updates = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Feed subscriber lagged, skipping to newest snapshot");
                        if let Some(event) = drain_to_newest(&mut rx) {
                            return Some((event, rx));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(futures::stream::once(async move { FeedEvent::Snapshot(initial) })
            .chain(updates)
            .boxed())
    }
}
