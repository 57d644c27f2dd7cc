// Domain services over the document store
pub mod comments;
pub mod feed;
pub mod follow_graph;
pub mod posts;
pub mod profile_store;
pub mod showcases;
pub mod tag_suggestions;
pub mod upvotes;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    infrastructure::{DocumentIdGenerator, DocumentStore, ReconciliationLog},
};

pub use comments::CommentStore;
pub use feed::FeedAssembler;
pub use follow_graph::{FollowGraph, FollowWritePolicy};
pub use posts::PostStore;
pub use profile_store::ProfileStore;
pub use showcases::ShowcaseStore;
pub use tag_suggestions::{HttpTagSuggester, TagSuggester};
pub use upvotes::{PendingUpvote, ShowcaseBoard, UpvoteCounter};

/// Every service wired to one store, one id generator and one repair log.
#[derive(Clone)]
pub struct Services {
    pub profiles: ProfileStore,
    pub graph: FollowGraph,
    pub posts: PostStore,
    pub showcases: ShowcaseStore,
    pub comments: CommentStore,
    pub upvotes: UpvoteCounter,
    pub feed: FeedAssembler,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        let log = Arc::new(
            ReconciliationLog::new(config.follow.reconcile_max_attempts)
                .with_backoff(Duration::from_millis(config.follow.reconcile_backoff_ms)),
        );
        Self::with_log(store, config, log)
    }

    pub fn with_log(
        store: Arc<dyn DocumentStore>,
        config: &Config,
        log: Arc<ReconciliationLog>,
    ) -> Self {
        let ids = Arc::new(DocumentIdGenerator::new(config.database.id_shard));
        let profiles = ProfileStore::new(store.clone());
        let graph = FollowGraph::new(
            store.clone(),
            log,
            FollowWritePolicy::from_config(&config.follow),
        );
        let posts = PostStore::new(store.clone(), profiles.clone(), ids.clone());
        let showcases = ShowcaseStore::new(store.clone(), ids.clone());
        let comments = CommentStore::new(store.clone(), profiles.clone(), ids);
        let upvotes = UpvoteCounter::new(store.clone());
        let feed = FeedAssembler::new(store, graph.clone(), posts.clone());

        Self {
            profiles,
            graph,
            posts,
            showcases,
            comments,
            upvotes,
            feed,
        }
    }
}
