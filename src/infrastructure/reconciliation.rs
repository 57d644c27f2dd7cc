// Follow-edge reconciliation - repairs for dual writes that only half landed
//
// A follow edge a -> b lives in two documents. The following-index entry is always
// written first and is the primary copy; the followers-index entry mirrors it. When
// the mirror write fails after retries, a repair is queued here. Repairs are applied
// on the next read that touches either user (or by an explicit drain). Applying a
// repair re-reads the primary copy and makes the mirror match it, so a repair that
// was overtaken by a later follow/unfollow still converges to the right state.
//
// Repairs are never dropped. Reads back off exponentially between failed attempts;
// an explicit drain ignores the backoff. Reaching `max_attempts` only escalates the
// log level and the `exhausted` counter.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::infrastructure::document_store::{DocumentStore, Fields, WriteOp};
use crate::infrastructure::id_generator::current_time_millis;
use crate::models::{fields, FollowIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeAction {
    Insert,
    Remove,
}

/// Index entry payload: `{ "userId": other }`.
pub fn entry_fields(other: &str) -> Fields {
    let mut data = Fields::new();
    data.insert(fields::USER_ID.to_string(), Value::String(other.to_string()));
    data
}

/// The store write that puts `owner`'s `index` entry for `other` into the wanted state.
pub fn edge_write(index: FollowIndex, owner: &str, other: &str, action: EdgeAction) -> WriteOp {
    match action {
        EdgeAction::Insert => WriteOp::Set {
            collection: index.collection(owner),
            id: other.to_string(),
            data: entry_fields(other),
        },
        EdgeAction::Remove => WriteOp::Delete {
            collection: index.collection(owner),
            id: other.to_string(),
        },
    }
}

/// Current state of edge `follower -> followee` according to the primary copy.
pub async fn primary_state(
    store: &dyn DocumentStore,
    follower: &str,
    followee: &str,
) -> AppResult<EdgeAction> {
    let entry = store
        .get(&FollowIndex::Following.collection(follower), followee)
        .await?;
    Ok(if entry.is_some() {
        EdgeAction::Insert
    } else {
        EdgeAction::Remove
    })
}

pub async fn apply_write(store: &dyn DocumentStore, op: WriteOp) -> AppResult<()> {
    match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => store.set(&collection, &id, data).await,
        WriteOp::Delete { collection, id } => store.delete(&collection, &id).await,
    }
}

/// A mirror entry that may disagree with its primary copy.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorRepair {
    /// User whose index holds the entry.
    pub owner: String,
    pub index: FollowIndex,
    pub other: String,
    /// What the failed write was trying to do.
    pub intended: EdgeAction,
    /// Failed attempts so far.
    pub attempt_count: u32,
    pub created_at: i64,
    pub last_attempt_at: Option<i64>,
    pub error_reason: String,
    #[serde(skip)]
    seq: u64,
}

impl MirrorRepair {
    pub fn new(
        owner: &str,
        index: FollowIndex,
        other: &str,
        intended: EdgeAction,
        error_reason: String,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            index,
            other: other.to_string(),
            intended,
            attempt_count: 0,
            created_at: current_time_millis(),
            last_attempt_at: None,
            error_reason,
            seq: 0,
        }
    }

    /// (follower, followee) of the logical edge this entry belongs to.
    pub fn edge(&self) -> (&str, &str) {
        match self.index {
            FollowIndex::Following => (&self.owner, &self.other),
            FollowIndex::Followers => (&self.other, &self.owner),
        }
    }

    pub fn touches(&self, user_id: &str) -> bool {
        self.owner == user_id || self.other == user_id
    }

    fn same_entry(&self, other: &MirrorRepair) -> bool {
        self.owner == other.owner && self.index == other.index && self.other == other.other
    }

    pub fn describe(&self) -> String {
        let action = match self.intended {
            EdgeAction::Insert => "insert",
            EdgeAction::Remove => "remove",
        };
        format!(
            "{} of {} in {}",
            action,
            self.other,
            self.index.collection(&self.owner)
        )
    }

    /// Make the entry match its primary copy. `None` when the primary changed while
    /// the mirror was being written; the repair has to run again.
    async fn apply(&self, store: &dyn DocumentStore) -> AppResult<Option<EdgeAction>> {
        let (follower, followee) = self.edge();
        let action = primary_state(store, follower, followee).await?;
        apply_write(store, edge_write(self.index, &self.owner, &self.other, action)).await?;

        if primary_state(store, follower, followee).await? != action {
            return Ok(None);
        }
        Ok(Some(action))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileStats {
    pub queued: u64,
    pub repaired: u64,
    pub failed_attempts: u64,
    /// Repairs that reached the attempt limit. They stay queued.
    pub exhausted: u64,
    pub pending: u64,
}

const MAX_BACKOFF_MS: i64 = 60_000;

#[derive(Debug)]
pub struct ReconciliationLog {
    queue: Mutex<VecDeque<MirrorRepair>>,
    stats: RwLock<ReconcileStats>,
    next_seq: AtomicU64,
    max_attempts: u32,
    backoff: Duration,
}

impl ReconciliationLog {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            stats: RwLock::new(ReconcileStats::default()),
            next_seq: AtomicU64::new(1),
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(200),
        }
    }

    /// Base delay a read waits after a failed attempt; doubles per failure.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Marks the current position in the log. Repairs queued after the mark
    /// survive `discard_edge` calls that pass it.
    pub fn mark(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    fn backoff_millis(&self, attempts: u32) -> i64 {
        if attempts == 0 {
            return 0;
        }
        let base = self.backoff.as_millis().min(MAX_BACKOFF_MS as u128) as i64;
        base.saturating_mul(1i64 << (attempts - 1).min(16))
            .min(MAX_BACKOFF_MS)
    }

    fn is_due(&self, repair: &MirrorRepair, now: i64) -> bool {
        match repair.last_attempt_at {
            None => true,
            Some(at) => now - at >= self.backoff_millis(repair.attempt_count),
        }
    }

    /// Queue a repair. An older repair for the same entry is replaced.
    pub async fn enqueue(&self, mut repair: MirrorRepair) {
        repair.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.queue.lock().await;
        queue.retain(|r| !r.same_entry(&repair));
        warn!(
            owner = %repair.owner,
            index = repair.index.as_str(),
            other = %repair.other,
            reason = %repair.error_reason,
            "queued follow-edge repair"
        );
        queue.push_back(repair);

        let mut stats = self.stats.write().await;
        stats.queued += 1;
        stats.pending = queue.len() as u64;
    }

    /// Forget repairs queued before `mark` for an edge whose two halves were just
    /// written and verified.
    pub async fn discard_edge(&self, follower: &str, followee: &str, mark: u64) {
        let mut queue = self.queue.lock().await;
        let len = queue.len();
        queue.retain(|r| r.seq >= mark || r.edge() != (follower, followee));
        if queue.len() != len {
            debug!(follower, followee, "discarded superseded follow-edge repairs");
            self.stats.write().await.pending = queue.len() as u64;
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn pending(&self) -> Vec<MirrorRepair> {
        self.queue.lock().await.iter().cloned().collect()
    }

    pub async fn stats(&self) -> ReconcileStats {
        self.stats.read().await.clone()
    }

    /// Apply due repairs touching `user_id`. Returns how many were applied.
    pub async fn reconcile_user(&self, store: &dyn DocumentStore, user_id: &str) -> usize {
        let now = current_time_millis();
        self.reconcile_where(store, |r| r.touches(user_id) && self.is_due(r, now))
            .await
    }

    /// Apply every queued repair once, backoff or not.
    pub async fn reconcile_all(&self, store: &dyn DocumentStore) -> usize {
        self.reconcile_where(store, |_| true).await
    }

    async fn reconcile_where<F>(&self, store: &dyn DocumentStore, pred: F) -> usize
    where
        F: Fn(&MirrorRepair) -> bool,
    {
        let batch: Vec<MirrorRepair> = {
            let mut queue = self.queue.lock().await;
            if queue.is_empty() {
                return 0;
            }
            let (take, keep): (VecDeque<_>, VecDeque<_>) = queue.drain(..).partition(|r| pred(r));
            *queue = keep;
            take.into_iter().collect()
        };
        if batch.is_empty() {
            return 0;
        }

        let mut applied = 0;
        let mut retry = Vec::new();
        let mut failed_attempts = 0;
        let mut exhausted = 0;

        for mut repair in batch {
            match repair.apply(store).await {
                Ok(Some(action)) => {
                    applied += 1;
                    info!(
                        owner = %repair.owner,
                        index = repair.index.as_str(),
                        other = %repair.other,
                        ?action,
                        failed_attempts = repair.attempt_count,
                        "follow-edge repair applied"
                    );
                }
                Ok(None) => {
                    debug!(repair = %repair.describe(), "primary copy moved during repair, requeueing");
                    retry.push(repair);
                }
                Err(e) => {
                    failed_attempts += 1;
                    repair.attempt_count += 1;
                    repair.last_attempt_at = Some(current_time_millis());
                    repair.error_reason = e.to_string();
                    if repair.attempt_count == self.max_attempts {
                        exhausted += 1;
                        error!(
                            repair = %repair.describe(),
                            attempts = repair.attempt_count,
                            error = %e,
                            "follow-edge repair reached max attempts, keeping it queued"
                        );
                        retry.push(repair);
                    } else {
                        warn!(
                            repair = %repair.describe(),
                            attempt = repair.attempt_count,
                            error = %e,
                            "follow-edge repair failed, will retry"
                        );
                        retry.push(repair);
                    }
                }
            }
        }

        let mut queue = self.queue.lock().await;
        for repair in retry {
            // A newer repair for the same entry may have been queued meanwhile.
            if !queue.iter().any(|r| r.same_entry(&repair)) {
                queue.push_back(repair);
            }
        }

        let mut stats = self.stats.write().await;
        stats.repaired += applied as u64;
        stats.failed_attempts += failed_attempts;
        stats.exhausted += exhausted;
        stats.pending = queue.len() as u64;

        applied
    }

    pub fn summary(stats: &ReconcileStats) -> Value {
        json!({
            "queued": stats.queued,
            "repaired": stats.repaired,
            "failedAttempts": stats.failed_attempts,
            "exhausted": stats.exhausted,
            "pending": stats.pending,
        })
    }
}

impl Default for ReconciliationLog {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;

    #[test]
    fn test_edge_of_each_index() {
        let following = MirrorRepair::new("a", FollowIndex::Following, "b", EdgeAction::Insert, "x".into());
        let followers = MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Insert, "x".into());
        assert_eq!(following.edge(), ("a", "b"));
        assert_eq!(followers.edge(), ("a", "b"));
        assert!(followers.touches("a") && followers.touches("b"));
        assert!(!followers.touches("c"));
    }

    #[tokio::test]
    async fn test_repair_follows_primary_copy() {
        let store = MemoryStore::default();
        let log = ReconciliationLog::new(3);

        // primary present, mirror missing
        store
            .set(&FollowIndex::Following.collection("a"), "b", entry_fields("b"))
            .await
            .unwrap();
        log.enqueue(MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Insert, "timeout".into()))
            .await;

        assert_eq!(log.reconcile_user(&store, "c").await, 0);
        assert_eq!(log.pending_count().await, 1);

        assert_eq!(log.reconcile_user(&store, "a").await, 1);
        assert!(store
            .get(&FollowIndex::Followers.collection("b"), "a")
            .await
            .unwrap()
            .is_some());
        assert_eq!(log.pending_count().await, 0);
        assert_eq!(log.stats().await.repaired, 1);
    }

    #[tokio::test]
    async fn test_overtaken_insert_repair_removes_mirror() {
        let store = MemoryStore::default();
        let log = ReconciliationLog::default();

        // mirror exists but the primary was removed by a later unfollow
        store
            .set(&FollowIndex::Followers.collection("b"), "a", entry_fields("a"))
            .await
            .unwrap();
        log.enqueue(MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Insert, "x".into()))
            .await;

        assert_eq!(log.reconcile_all(&store).await, 1);
        assert!(store
            .get(&FollowIndex::Followers.collection("b"), "a")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_enqueue_replaces_and_discard_edge() {
        let log = ReconciliationLog::default();
        log.enqueue(MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Insert, "1".into()))
            .await;
        log.enqueue(MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Remove, "2".into()))
            .await;
        assert_eq!(log.pending_count().await, 1);
        assert_eq!(log.pending().await[0].intended, EdgeAction::Remove);

        let mark = log.mark();
        log.enqueue(MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Remove, "3".into()))
            .await;
        // queued after the mark, so it stays
        log.discard_edge("a", "b", mark).await;
        assert_eq!(log.pending_count().await, 1);

        log.discard_edge("a", "b", log.mark()).await;
        assert_eq!(log.pending_count().await, 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let log = ReconciliationLog::new(5).with_backoff(Duration::from_millis(100));
        assert_eq!(log.backoff_millis(0), 0);
        assert_eq!(log.backoff_millis(1), 100);
        assert_eq!(log.backoff_millis(3), 400);
        assert_eq!(log.backoff_millis(30), MAX_BACKOFF_MS);

        let mut repair = MirrorRepair::new("b", FollowIndex::Followers, "a", EdgeAction::Insert, "x".into());
        assert!(log.is_due(&repair, 0));
        repair.attempt_count = 2;
        repair.last_attempt_at = Some(1_000);
        assert!(!log.is_due(&repair, 1_100));
        assert!(log.is_due(&repair, 1_200));
    }
}
