#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use community_hub::{
    config::Config,
    error::{AppError, AppResult},
    infrastructure::{
        document_store::{Document, DocumentStore, Fields, Query, WriteOp},
        MemoryStore, ReconciliationLog, ViewerContext,
    },
    models::NewUser,
    services::{FollowGraph, FollowWritePolicy, Services},
};

struct FailRule {
    fragment: String,
    remaining: u32,
}

struct PausedSet {
    fragment: String,
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Non-transactional store whose writes can be made to fail on demand.
/// Writes to a collection whose path contains a registered fragment fail until the
/// rule's budget is used up. One `set` can also be held back until released.
pub struct FlakyStore {
    inner: MemoryStore,
    rules: Mutex<Vec<FailRule>>,
    paused: Mutex<Option<PausedSet>>,
}

impl FlakyStore {
    pub fn new(max_in_values: usize) -> Self {
        Self {
            inner: MemoryStore::new(max_in_values),
            rules: Mutex::new(Vec::new()),
            paused: Mutex::new(None),
        }
    }

    /// Hold the next `set` on a matching collection. The first receiver fires once the
    /// write is waiting; sending on the returned sender lets it through.
    pub fn pause_next_set(&self, fragment: &str) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.paused.lock().unwrap() = Some(PausedSet {
            fragment: fragment.to_string(),
            reached: reached_tx,
            release: release_rx,
        });
        (reached_rx, release_tx)
    }

    async fn wait_if_paused(&self, collection: &str) {
        let paused = {
            let mut slot = self.paused.lock().unwrap();
            match slot.as_ref() {
                Some(p) if collection.contains(&p.fragment) => slot.take(),
                _ => None,
            }
        };
        if let Some(p) = paused {
            let _ = p.reached.send(());
            let _ = p.release.await;
        }
    }

    pub fn fail_writes(&self, fragment: &str, times: u32) {
        self.rules.lock().unwrap().push(FailRule {
            fragment: fragment.to_string(),
            remaining: times,
        });
    }

    pub fn clear_failures(&self) {
        self.rules.lock().unwrap().clear();
    }

    fn check(&self, collection: &str) -> AppResult<()> {
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if rule.remaining > 0 && collection.contains(&rule.fragment) {
                rule.remaining -= 1;
                return Err(AppError::WriteFailed(format!("injected failure on {}", collection)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> AppResult<()> {
        self.wait_if_paused(collection).await;
        self.check(collection)?;
        self.inner.set(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        self.check(collection)?;
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.check(collection)?;
        self.inner.delete(collection, id).await
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
        self.check(collection)?;
        self.inner.increment(collection, id, field, delta).await
    }

    async fn query(&self, query: Query) -> AppResult<Vec<Document>> {
        self.inner.query(query).await
    }

    async fn list_ids(&self, collection: &str) -> AppResult<Vec<String>> {
        self.inner.list_ids(collection).await
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> AppResult<()> {
        for op in &writes {
            let collection = match op {
                WriteOp::Set { collection, .. } | WriteOp::Delete { collection, .. } => collection,
            };
            self.check(collection)?;
        }
        self.inner.commit(writes).await
    }

    fn max_in_values(&self) -> usize {
        self.inner.max_in_values()
    }
}

pub fn fast_policy(retries: u32) -> FollowWritePolicy {
    FollowWritePolicy {
        retries,
        retry_delay: Duration::from_millis(1),
    }
}

pub fn graph_over(store: Arc<dyn DocumentStore>, retries: u32, max_attempts: u32) -> FollowGraph {
    FollowGraph::new(
        store,
        Arc::new(ReconciliationLog::new(max_attempts).with_backoff(Duration::ZERO)),
        fast_policy(retries),
    )
}

pub fn memory_services(max_in_values: usize) -> (Arc<dyn DocumentStore>, Services) {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new(max_in_values));
    let services = Services::new(store.clone(), &Config::default());
    (store, services)
}

pub async fn sign_up(services: &Services, user_id: &str, name: &str) {
    services
        .profiles
        .create_profile(
            user_id,
            NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", user_id),
                avatar_url: None,
            },
        )
        .await
        .unwrap();
}

pub fn viewer(user_id: &str) -> ViewerContext {
    ViewerContext::authenticated(user_id)
}
