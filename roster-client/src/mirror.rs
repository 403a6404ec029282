//! Realtime member mirror
//!
//! ```text
//! DocumentStore::subscribe(collection)
//!       │ FeedEvent::Snapshot(docs) / FeedEvent::Error
//!       ▼
//! mirror task ── decode (skip unidentifiable) ── dedupe by id ── newest first
//!       │
//!       ├──▶ on_change(collection)        (in feed order, whole collection)
//!       └──▶ watch::Sender<latest>        (MirrorSubscription::latest)
//! ```
//!
//! A feed error or close ends the subscription after one `on_error`;
//! callers resubscribe to resume.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use shared::codec::decode_snapshot;
use shared::models::Member;
use shared::query::sort_newest_first;

use crate::config::DirectoryConfig;
use crate::error::FeedError;
use crate::store::{DocumentStore, FeedEvent, RawDocument};

/// Decode, dedupe and order one feed snapshot
pub fn build_collection(docs: &[RawDocument]) -> Vec<Member> {
    let mut seen = HashSet::new();
    let mut members: Vec<Member> = decode_snapshot(docs)
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    sort_newest_first(&mut members);
    members
}

/// Mirrors the member collection from the store's change feed
#[derive(Clone)]
pub struct DirectoryMirror {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl DirectoryMirror {
    pub fn new(store: Arc<dyn DocumentStore>, config: &DirectoryConfig) -> Self {
        Self {
            store,
            collection: config.members_collection.clone(),
        }
    }

    /// Open a subscription. Must be called inside a tokio runtime.
    ///
    /// `on_change` receives the complete collection after every feed event.
    /// `on_error` fires at most once, when the feed fails or closes; it is
    /// not called after `unsubscribe`.
    pub fn subscribe<C, E>(&self, mut on_change: C, on_error: E) -> MirrorSubscription
    where
        C: FnMut(Vec<Member>) + Send + 'static,
        E: FnOnce(FeedError) + Send + 'static,
    {
        let token = CancellationToken::new();
        let (latest_tx, latest_rx) = watch::channel(Arc::new(Vec::new()));
        let store = self.store.clone();
        let collection = self.collection.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            let token = task_token;

            let opened = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                opened = store.subscribe(&collection) => opened,
            };

            let failure = match opened {
                Err(e) => Some(FeedError::Subscribe(e)),
                Ok(mut feed) => {
                    tracing::info!(collection = %collection, "Mirror subscribed");
                    loop {
                        let event = tokio::select! {
                            biased;
                            _ = token.cancelled() => break None,
                            event = feed.next() => event,
                        };

                        match event {
                            Some(FeedEvent::Snapshot(docs)) => {
                                let members = build_collection(&docs);
                                if token.is_cancelled() {
                                    break None;
                                }
                                tracing::debug!(
                                    collection = %collection,
                                    docs = docs.len(),
                                    members = members.len(),
                                    "Mirror snapshot"
                                );
                                latest_tx.send_replace(Arc::new(members.clone()));
                                on_change(members);
                            }
                            Some(FeedEvent::Error(e)) => break Some(FeedError::Stream(e)),
                            None => break Some(FeedError::Closed),
                        }
                    }
                    // feed dropped here, releasing the connection
                }
            };

            let unsubscribed = token.is_cancelled();
            token.cancel();

            match failure {
                Some(err) if !unsubscribed => {
                    tracing::error!(collection = %collection, error = %err, "Mirror subscription terminated");
                    on_error(err);
                }
                _ => tracing::info!(collection = %collection, "Mirror unsubscribed"),
            }
        });

        MirrorSubscription {
            token,
            latest: latest_rx,
        }
    }
}

/// Handle to a running mirror subscription.
///
/// Dropping the handle unsubscribes.
pub struct MirrorSubscription {
    token: CancellationToken,
    latest: watch::Receiver<Arc<Vec<Member>>>,
}

impl MirrorSubscription {
    /// Stop further callbacks and release the feed. Idempotent.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// False once unsubscribed or terminated by a feed error
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Most recently published collection (empty before the first event)
    pub fn latest(&self) -> Arc<Vec<Member>> {
        self.latest.borrow().clone()
    }

    /// Watch channel over the published collection
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<Member>>> {
        self.latest.clone()
    }
}

impl Drop for MirrorSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
