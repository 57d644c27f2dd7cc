// CommentStore - comments in `posts/{post}/comments`, each one bumping the parent's
// commentsCount.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        current_time_millis,
        document_store::{to_fields, Direction, DocumentStore, Query},
        DocumentIdGenerator, ViewerContext,
    },
    models::{
        comments_collection, fields,
        validation::{validate_length, MAX_COMMENT_LENGTH},
        AuthorSnapshot, Comment, EntityType, NewComment,
    },
    services::profile_store::ProfileStore,
};

#[derive(Clone)]
pub struct CommentStore {
    store: Arc<dyn DocumentStore>,
    profiles: ProfileStore,
    ids: Arc<DocumentIdGenerator>,
}

impl CommentStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        profiles: ProfileStore,
        ids: Arc<DocumentIdGenerator>,
    ) -> Self {
        Self { store, profiles, ids }
    }

    pub async fn create_comment(
        &self,
        viewer: &ViewerContext,
        post_id: &str,
        input: NewComment,
    ) -> AppResult<Comment> {
        let user_id = viewer.require_user()?;
        validate_length("content", &input.content, 1, MAX_COMMENT_LENGTH)?;

        if self.store.get(EntityType::Post.as_str(), post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        let author = self.profiles.author_snapshot(user_id).await?;
        let comment = Comment {
            id: self.ids.next_string_id(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            content: input.content.trim().to_string(),
            created_at: current_time_millis(),
            author_name: Some(author.name),
            author_avatar: Some(author.avatar),
        };

        self.store
            .set(&comments_collection(post_id), &comment.id, to_fields(&comment)?)
            .await?;

        if let Err(e) = self
            .store
            .increment(EntityType::Post.as_str(), post_id, fields::COMMENTS_COUNT, 1)
            .await
        {
            // The comment is stored; only the counter lags.
            warn!(post_id, comment_id = %comment.id, error = %e, "commentsCount increment failed");
            return Err(e);
        }

        info!(post_id, comment_id = %comment.id, user_id, "comment created");
        Ok(comment)
    }

    /// Comments of a post, oldest first.
    pub async fn list_comments(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        let docs = self
            .store
            .query(
                Query::collection(comments_collection(post_id))
                    .order_by(fields::CREATED_AT, Direction::Asc),
            )
            .await?;
        let mut comments: Vec<Comment> = docs
            .into_iter()
            .map(|d| d.into_model())
            .collect::<AppResult<_>>()?;

        // Older comments were stored without a snapshot; resolve those once per author.
        let mut resolved: HashMap<String, AuthorSnapshot> = HashMap::new();
        for comment in comments.iter_mut().filter(|c| c.author_name.is_none()) {
            if !resolved.contains_key(&comment.user_id) {
                let snapshot = self.profiles.author_snapshot(&comment.user_id).await?;
                resolved.insert(comment.user_id.clone(), snapshot);
            }
            if let Some(snapshot) = resolved.get(&comment.user_id) {
                comment.author_name = Some(snapshot.name.clone());
                comment.author_avatar = Some(snapshot.avatar.clone());
            }
        }

        Ok(comments)
    }
}
