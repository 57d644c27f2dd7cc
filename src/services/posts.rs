// PostStore - posts with their author snapshot and engagement counters

use std::sync::Arc;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        current_time_millis,
        document_store::{to_fields, Direction, DocumentStore, Filter, Query},
        DocumentIdGenerator, ViewerContext,
    },
    models::{
        fields,
        validation::{normalize_tags, validate_length, MAX_POST_LENGTH, MAX_TITLE_LENGTH},
        EntityType, NewPost, Post,
    },
    services::profile_store::ProfileStore,
};

#[derive(Clone)]
pub struct PostStore {
    store: Arc<dyn DocumentStore>,
    profiles: ProfileStore,
    ids: Arc<DocumentIdGenerator>,
}

impl PostStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        profiles: ProfileStore,
        ids: Arc<DocumentIdGenerator>,
    ) -> Self {
        Self { store, profiles, ids }
    }

    pub async fn create_post(&self, viewer: &ViewerContext, input: NewPost) -> AppResult<Post> {
        let user_id = viewer.require_user()?;
        validate_length("title", &input.title, 1, MAX_TITLE_LENGTH)?;
        validate_length("content", &input.content, 1, MAX_POST_LENGTH)?;

        let author = self.profiles.author_snapshot(user_id).await?;
        let post = Post {
            id: self.ids.next_string_id(),
            user_id: user_id.to_string(),
            title: input.title.trim().to_string(),
            content: input.content.trim().to_string(),
            tags: normalize_tags(&input.tags),
            created_at: current_time_millis(),
            views: 0,
            reactions: 0,
            comments_count: 0,
            author_name: Some(author.name),
            author_avatar: Some(author.avatar),
        };

        self.store
            .set(EntityType::Post.as_str(), &post.id, to_fields(&post)?)
            .await?;
        info!(post_id = %post.id, user_id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> AppResult<Option<Post>> {
        match self.store.get(EntityType::Post.as_str(), post_id).await? {
            Some(doc) => Ok(Some(doc.into_model()?)),
            None => Ok(None),
        }
    }

    /// All posts, newest first.
    pub async fn list_posts(&self) -> AppResult<Vec<Post>> {
        self.run(Self::newest_first()).await
    }

    pub async fn posts_by_author(&self, user_id: &str) -> AppResult<Vec<Post>> {
        self.run(Self::newest_first().filter(Filter::eq(fields::USER_ID, user_id)))
            .await
    }

    /// Most-reacted posts first.
    pub async fn trending_posts(&self, limit: usize) -> AppResult<Vec<Post>> {
        let query = Query::collection(EntityType::Post.as_str())
            .order_by(fields::REACTIONS, Direction::Desc)
            .limit(limit);
        self.run(query).await
    }

    pub async fn record_view(&self, post_id: &str) -> AppResult<()> {
        self.bump(post_id, fields::VIEWS).await
    }

    pub async fn react(&self, post_id: &str) -> AppResult<()> {
        self.bump(post_id, fields::REACTIONS).await
    }

    /// Base query for newest-first post listings.
    pub fn newest_first() -> Query {
        Query::collection(EntityType::Post.as_str()).order_by(fields::CREATED_AT, Direction::Desc)
    }

    async fn bump(&self, post_id: &str, field: &str) -> AppResult<()> {
        self.store
            .increment(EntityType::Post.as_str(), post_id, field, 1)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(format!("post {}", post_id)),
                other => other,
            })
    }

    async fn run(&self, query: Query) -> AppResult<Vec<Post>> {
        let docs = self.store.query(query).await?;
        docs.into_iter().map(|d| d.into_model()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;
    use crate::models::{NewUser, ANONYMOUS_AUTHOR};

    fn posts() -> (PostStore, ProfileStore) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        let profiles = ProfileStore::new(store.clone());
        let posts = PostStore::new(store, profiles.clone(), Arc::new(DocumentIdGenerator::default()));
        (posts, profiles)
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "body".to_string(),
            tags: vec!["Rust".into(), "#rust".into()],
        }
    }

    #[tokio::test]
    async fn test_create_requires_viewer() {
        let (posts, _) = posts();
        let err = posts
            .create_post(&ViewerContext::anonymous(), new_post("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_create_snapshots_author() {
        let (posts, profiles) = posts();
        profiles
            .create_profile("ada", NewUser { name: "Ada".into(), ..Default::default() })
            .await
            .unwrap();

        let post = posts
            .create_post(&ViewerContext::authenticated("ada"), new_post("Hello"))
            .await
            .unwrap();
        assert_eq!(post.author_name.as_deref(), Some("Ada"));
        assert_eq!(post.tags, vec!["rust".to_string()]);
        assert_eq!((post.views, post.reactions, post.comments_count), (0, 0, 0));

        let ghost = posts
            .create_post(&ViewerContext::authenticated("ghost"), new_post("Boo"))
            .await
            .unwrap();
        assert_eq!(ghost.author_name.as_deref(), Some(ANONYMOUS_AUTHOR));
    }

    #[tokio::test]
    async fn test_listing_order_and_counters() {
        let (posts, _) = posts();
        let vc = ViewerContext::authenticated("ada");
        let first = posts.create_post(&vc, new_post("first")).await.unwrap();
        let second = posts.create_post(&vc, new_post("second")).await.unwrap();

        let all = posts.list_posts().await.unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        posts.react(&first.id).await.unwrap();
        posts.react(&first.id).await.unwrap();
        posts.record_view(&first.id).await.unwrap();

        let trending = posts.trending_posts(1).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].id, first.id);
        assert_eq!(trending[0].reactions, 2);
        assert_eq!(trending[0].views, 1);
    }

    #[tokio::test]
    async fn test_counter_on_missing_post() {
        let (posts, _) = posts();
        assert!(matches!(posts.react("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_validation() {
        let (posts, _) = posts();
        let vc = ViewerContext::authenticated("ada");
        let err = posts.create_post(&vc, new_post("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
