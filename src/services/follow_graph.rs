// FollowGraph - symmetric follow relation kept in two per-user indexes
//
// Edge a -> b is `users/{a}/following/{b}` plus its mirror `users/{b}/followers/{a}`.
// Transactional backends get both writes in one commit. Otherwise the following-index
// entry is written first, then the mirror; a mirror that still fails after the inline
// retries is queued in the ReconciliationLog and the caller sees PartialConsistency.
// After the mirror lands the primary is read back; if a concurrent write flipped it in
// the meantime, a repair is queued so the mirror follows the primary again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::FollowConfig,
    error::{AppError, AppResult},
    infrastructure::{
        document_store::{DocumentStore, WriteOp},
        reconciliation::{
            apply_write, edge_write, primary_state, EdgeAction, MirrorRepair, ReconciliationLog,
        },
    },
    models::{FollowCounts, FollowIndex},
};

#[derive(Debug, Clone, Copy)]
pub struct FollowWritePolicy {
    /// Extra attempts per write after the first failure.
    pub retries: u32,
    /// Base delay; attempt n waits n times this.
    pub retry_delay: Duration,
}

impl FollowWritePolicy {
    pub fn from_config(config: &FollowConfig) -> Self {
        Self {
            retries: config.write_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

impl Default for FollowWritePolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_millis(25),
        }
    }
}

#[derive(Clone)]
pub struct FollowGraph {
    store: Arc<dyn DocumentStore>,
    log: Arc<ReconciliationLog>,
    policy: FollowWritePolicy,
}

impl FollowGraph {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        log: Arc<ReconciliationLog>,
        policy: FollowWritePolicy,
    ) -> Self {
        Self { store, log, policy }
    }

    pub fn reconciliation_log(&self) -> &Arc<ReconciliationLog> {
        &self.log
    }

    /// Insert edge `follower -> followee`. Following yourself is a no-op.
    pub async fn follow(&self, follower: &str, followee: &str) -> AppResult<()> {
        self.write_edge(follower, followee, EdgeAction::Insert).await
    }

    /// Remove edge `follower -> followee`. Removing an absent edge succeeds.
    pub async fn unfollow(&self, follower: &str, followee: &str) -> AppResult<()> {
        self.write_edge(follower, followee, EdgeAction::Remove).await
    }

    pub async fn is_following(&self, follower: &str, followee: &str) -> AppResult<bool> {
        self.log.reconcile_user(self.store.as_ref(), follower).await;
        let entry = self
            .store
            .get(&FollowIndex::Following.collection(follower), followee)
            .await?;
        Ok(entry.is_some())
    }

    /// Everyone `user_id` follows. The whole index is read; there is no page limit.
    pub async fn following_ids(&self, user_id: &str) -> AppResult<BTreeSet<String>> {
        self.index_ids(user_id, FollowIndex::Following).await
    }

    pub async fn follower_ids(&self, user_id: &str) -> AppResult<BTreeSet<String>> {
        self.index_ids(user_id, FollowIndex::Followers).await
    }

    pub async fn counts(&self, user_id: &str) -> AppResult<FollowCounts> {
        Ok(FollowCounts {
            following: self.following_ids(user_id).await?.len(),
            followers: self.follower_ids(user_id).await?.len(),
        })
    }

    /// Run every queued repair once. Returns how many were applied.
    pub async fn reconcile_pending(&self) -> usize {
        let applied = self.log.reconcile_all(self.store.as_ref()).await;
        if applied > 0 {
            info!(applied, "follow-edge reconciliation pass finished");
        }
        applied
    }

    async fn index_ids(&self, user_id: &str, index: FollowIndex) -> AppResult<BTreeSet<String>> {
        self.log.reconcile_user(self.store.as_ref(), user_id).await;
        let ids = self.store.list_ids(&index.collection(user_id)).await?;
        Ok(ids.into_iter().collect())
    }

    async fn write_edge(&self, follower: &str, followee: &str, action: EdgeAction) -> AppResult<()> {
        if follower.is_empty() || followee.is_empty() {
            return Err(AppError::BadRequest("follower and followee are required".to_string()));
        }
        if follower == followee {
            debug!(user_id = follower, ?action, "ignoring self follow edge");
            return Ok(());
        }

        let mark = self.log.mark();
        let primary = edge_write(FollowIndex::Following, follower, followee, action);
        let mirror = edge_write(FollowIndex::Followers, followee, follower, action);

        if self.store.supports_transactions() {
            self.store
                .commit(vec![primary, mirror])
                .await
                .map_err(as_write_failed)?;
        } else {
            // No half edge exists if this fails.
            self.write_with_retry(primary).await.map_err(as_write_failed)?;

            if let Err(e) = self.write_with_retry(mirror).await {
                let repair = MirrorRepair::new(
                    followee,
                    FollowIndex::Followers,
                    follower,
                    action,
                    e.to_string(),
                );
                let pending = repair.describe();
                self.log.enqueue(repair).await;
                return Err(AppError::PartialConsistency {
                    follower: follower.to_string(),
                    followee: followee.to_string(),
                    pending,
                });
            }

            let current = match primary_state(self.store.as_ref(), follower, followee).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(follower, followee, error = %e, "could not verify follow edge after write");
                    self.queue_mirror_repair(follower, followee, action, e.to_string()).await;
                    return Ok(());
                }
            };
            if current != action {
                info!(follower, followee, ?action, ?current, "follow edge changed during write");
                self.queue_mirror_repair(
                    follower,
                    followee,
                    current,
                    "primary copy changed while the mirror was written".to_string(),
                )
                .await;
                return Ok(());
            }
        }

        self.log.discard_edge(follower, followee, mark).await;
        debug!(follower, followee, ?action, "follow edge written");
        Ok(())
    }

    async fn queue_mirror_repair(
        &self,
        follower: &str,
        followee: &str,
        intended: EdgeAction,
        reason: String,
    ) {
        let repair = MirrorRepair::new(followee, FollowIndex::Followers, follower, intended, reason);
        self.log.enqueue(repair).await;
    }

    async fn write_with_retry(&self, op: WriteOp) -> AppResult<()> {
        let mut attempt = 0;
        loop {
            match apply_write(self.store.as_ref(), op.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.retries && e.is_retryable() => {
                    attempt += 1;
                    warn!(attempt, error = %e, "follow index write failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn as_write_failed(err: AppError) -> AppError {
    match err {
        AppError::WriteFailed(_) => err,
        other => AppError::WriteFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;

    fn graph() -> FollowGraph {
        FollowGraph::new(
            Arc::new(MemoryStore::default()),
            Arc::new(ReconciliationLog::default()),
            FollowWritePolicy::no_retry(),
        )
    }

    #[tokio::test]
    async fn test_follow_is_mirrored() {
        let graph = graph();
        graph.follow("a", "b").await.unwrap();

        assert!(graph.is_following("a", "b").await.unwrap());
        assert!(!graph.is_following("b", "a").await.unwrap());
        assert!(graph.following_ids("a").await.unwrap().contains("b"));
        assert!(graph.follower_ids("b").await.unwrap().contains("a"));
    }

    #[tokio::test]
    async fn test_follow_then_unfollow_round_trip() {
        let graph = graph();
        graph.follow("a", "b").await.unwrap();
        graph.unfollow("a", "b").await.unwrap();

        assert!(!graph.is_following("a", "b").await.unwrap());
        assert!(graph.follower_ids("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_follow_is_noop() {
        let graph = graph();
        graph.follow("a", "a").await.unwrap();
        assert!(!graph.is_following("a", "a").await.unwrap());
        assert_eq!(graph.counts("a").await.unwrap(), FollowCounts::default());
    }

    #[tokio::test]
    async fn test_unfollow_without_edge() {
        let graph = graph();
        graph.unfollow("a", "b").await.unwrap();
        assert!(graph.following_ids("a").await.unwrap().is_empty());
        assert!(graph.follower_ids("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_follow_is_idempotent() {
        let graph = graph();
        graph.follow("a", "b").await.unwrap();
        graph.follow("a", "b").await.unwrap();
        assert_eq!(
            graph.counts("a").await.unwrap(),
            FollowCounts { following: 1, followers: 0 }
        );
        assert_eq!(graph.counts("b").await.unwrap().followers, 1);
    }

    #[tokio::test]
    async fn test_empty_ids_rejected() {
        let graph = graph();
        assert!(matches!(graph.follow("", "b").await, Err(AppError::BadRequest(_))));
    }
}
