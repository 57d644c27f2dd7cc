// UpvoteCounter - atomic showcase upvotes
//
// The stored counter is only ever changed through the store's atomic increment, so
// concurrent upvotes never lose an add. The count handed back to the caller is the
// value read just before the increment plus one: it can lag the stored total when
// other upvotes interleave.
//
// ShowcaseBoard is the client-side view of an upvote-ordered list: bump locally
// first, then confirm with the server's count or roll back on failure.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    infrastructure::document_store::DocumentStore,
    models::{fields, EntityType, Showcase},
};

#[derive(Clone)]
pub struct UpvoteCounter {
    store: Arc<dyn DocumentStore>,
}

impl UpvoteCounter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Add one upvote. Returns the advisory post-increment count.
    pub async fn upvote(&self, showcase_id: &str) -> AppResult<u64> {
        let collection = EntityType::Showcase.as_str();
        let current = self
            .store
            .get(collection, showcase_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("showcase {}", showcase_id)))?
            .get_u64(fields::UPVOTES)
            .unwrap_or(0);

        self.store
            .increment(collection, showcase_id, fields::UPVOTES, 1)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(format!("showcase {}", showcase_id)),
                other => other,
            })?;

        debug!(showcase_id, upvotes = current + 1, "showcase upvoted");
        Ok(current + 1)
    }

    /// Optimistically bump `board`, then settle it with the outcome of `upvote`.
    pub async fn upvote_optimistic(
        &self,
        board: &mut ShowcaseBoard,
        showcase_id: &str,
    ) -> AppResult<u64> {
        let pending = board.apply_optimistic(showcase_id);
        match self.upvote(showcase_id).await {
            Ok(count) => {
                if let Some(pending) = pending {
                    board.confirm(&pending, count);
                }
                Ok(count)
            }
            Err(e) => {
                if let Some(pending) = pending {
                    warn!(showcase_id, error = %e, "upvote failed, rolling back");
                    board.rollback(&pending);
                }
                Err(e)
            }
        }
    }
}

/// A local bump waiting for the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpvote {
    pub showcase_id: String,
    pub previous: u64,
    pub optimistic: u64,
}

/// Showcases ordered by upvotes, most first. Equal counts list the newest first.
#[derive(Debug, Clone, Default)]
pub struct ShowcaseBoard {
    showcases: Vec<Showcase>,
}

impl ShowcaseBoard {
    pub fn new(showcases: Vec<Showcase>) -> Self {
        let mut board = Self { showcases };
        board.sort();
        board
    }

    pub fn showcases(&self) -> &[Showcase] {
        &self.showcases
    }

    pub fn ids(&self) -> Vec<&str> {
        self.showcases.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get(&self, showcase_id: &str) -> Option<&Showcase> {
        self.showcases.iter().find(|s| s.id == showcase_id)
    }

    /// Bump the local copy by one and re-sort. `None` if the showcase is not on the board.
    pub fn apply_optimistic(&mut self, showcase_id: &str) -> Option<PendingUpvote> {
        let showcase = self.showcases.iter_mut().find(|s| s.id == showcase_id)?;
        let previous = showcase.upvotes;
        showcase.upvotes += 1;
        let pending = PendingUpvote {
            showcase_id: showcase_id.to_string(),
            previous,
            optimistic: showcase.upvotes,
        };
        self.sort();
        Some(pending)
    }

    /// Adopt the server's count unless the local copy is already ahead of it.
    pub fn confirm(&mut self, pending: &PendingUpvote, server_count: u64) {
        if let Some(showcase) = self.find_mut(&pending.showcase_id) {
            showcase.upvotes = showcase.upvotes.max(server_count);
            self.sort();
        }
    }

    /// Undo one optimistic bump and re-sort.
    pub fn rollback(&mut self, pending: &PendingUpvote) {
        if let Some(showcase) = self.find_mut(&pending.showcase_id) {
            showcase.upvotes = showcase.upvotes.saturating_sub(1).max(pending.previous);
            self.sort();
        }
    }

    fn find_mut(&mut self, showcase_id: &str) -> Option<&mut Showcase> {
        self.showcases.iter_mut().find(|s| s.id == showcase_id)
    }

    fn sort(&mut self) {
        self.showcases.sort_by(|a, b| {
            b.upvotes
                .cmp(&a.upvotes)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{document_store::to_fields, MemoryStore};

    fn showcase(id: &str, upvotes: u64, created_at: i64) -> Showcase {
        Showcase {
            id: id.to_string(),
            user_id: "ada".into(),
            title: id.to_string(),
            description: "d".into(),
            image_url: String::new(),
            tags: vec![],
            upvotes,
            created_at,
        }
    }

    async fn seeded(store: &Arc<dyn DocumentStore>, s: &Showcase) {
        store
            .set(EntityType::Showcase.as_str(), &s.id, to_fields(s).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sequential_upvotes_return_one_then_two() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        seeded(&store, &showcase("showcase-1", 0, 1)).await;
        let counter = UpvoteCounter::new(store);

        assert_eq!(counter.upvote("showcase-1").await.unwrap(), 1);
        assert_eq!(counter.upvote("showcase-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_showcase() {
        let counter = UpvoteCounter::new(Arc::new(MemoryStore::default()));
        assert!(matches!(counter.upvote("nope").await, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_board_order_and_rollback() {
        let mut board = ShowcaseBoard::new(vec![
            showcase("a", 2, 1),
            showcase("b", 2, 2),
            showcase("c", 5, 3),
        ]);
        assert_eq!(board.ids(), vec!["c", "b", "a"]);

        let pending = board.apply_optimistic("a").unwrap();
        assert_eq!(pending.previous, 2);
        assert_eq!(board.ids(), vec!["c", "a", "b"]);

        board.rollback(&pending);
        assert_eq!(board.get("a").unwrap().upvotes, 2);
        assert_eq!(board.ids(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_confirm_adopts_higher_server_count() {
        let mut board = ShowcaseBoard::new(vec![showcase("a", 0, 1), showcase("b", 3, 2)]);
        let pending = board.apply_optimistic("a").unwrap();
        board.confirm(&pending, 7);
        assert_eq!(board.get("a").unwrap().upvotes, 7);
        assert_eq!(board.ids(), vec!["a", "b"]);

        assert!(board.apply_optimistic("missing").is_none());
    }

    #[tokio::test]
    async fn test_optimistic_upvote_against_store() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        let a = showcase("a", 0, 1);
        seeded(&store, &a).await;
        let counter = UpvoteCounter::new(store);

        let mut board = ShowcaseBoard::new(vec![a, showcase("gone", 1, 2)]);
        assert_eq!(counter.upvote_optimistic(&mut board, "a").await.unwrap(), 1);
        assert_eq!(board.get("a").unwrap().upvotes, 1);

        // not in the store: the server call fails and the local bump is undone
        assert!(counter.upvote_optimistic(&mut board, "gone").await.is_err());
        assert_eq!(board.get("gone").unwrap().upvotes, 1);
    }
}
