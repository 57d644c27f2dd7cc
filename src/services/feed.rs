// FeedAssembler - discover feed and the personalized following feed
//
// The following feed resolves the viewer's following set, splits it into chunks no
// wider than the backend's `in` limit, queries each chunk newest-first and k-way
// merges the sorted chunk results. Nothing is dropped for users who follow more
// authors than one query can match.

use futures::future::try_join_all;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::AppResult,
    infrastructure::document_store::{DocumentStore, Filter},
    models::{fields, Post},
    services::{follow_graph::FollowGraph, posts::PostStore},
};

#[derive(Clone)]
pub struct FeedAssembler {
    store: Arc<dyn DocumentStore>,
    graph: FollowGraph,
    posts: PostStore,
}

impl FeedAssembler {
    pub fn new(store: Arc<dyn DocumentStore>, graph: FollowGraph, posts: PostStore) -> Self {
        Self { store, graph, posts }
    }

    /// Every post, newest first.
    pub async fn discover_feed(&self) -> AppResult<Vec<Post>> {
        self.posts.list_posts().await
    }

    /// Posts by everyone `user_id` follows, newest first. Following nobody is an empty feed.
    pub async fn following_feed(&self, user_id: &str) -> AppResult<Vec<Post>> {
        let authors: Vec<String> = self.graph.following_ids(user_id).await?.into_iter().collect();
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = self.store.max_in_values().max(1);
        let queries = authors.chunks(chunk_size).map(|chunk| {
            let query = PostStore::newest_first()
                .filter(Filter::is_in(fields::USER_ID, chunk.iter().map(String::as_str)));
            let store = self.store.clone();
            async move {
                let docs = store.query(query).await?;
                docs.into_iter()
                    .map(|d| d.into_model::<Post>())
                    .collect::<AppResult<Vec<_>>>()
            }
        });
        let batches = try_join_all(queries).await?;

        debug!(
            user_id,
            authors = authors.len(),
            chunks = batches.len(),
            "following feed assembled"
        );
        Ok(merge_newest_first(batches))
    }
}

/// Newest-first ordering; equal timestamps fall back to the larger id.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

struct HeapEntry {
    post: Post,
    batch: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap pops the greatest entry, so the newest post must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        newest_first(&other.post, &self.post)
    }
}

/// Merge batches that are each already newest-first into one newest-first list.
pub fn merge_newest_first(batches: Vec<Vec<Post>>) -> Vec<Post> {
    let total = batches.iter().map(Vec::len).sum();
    let mut iters: Vec<std::vec::IntoIter<Post>> =
        batches.into_iter().map(Vec::into_iter).collect();

    let mut heap = BinaryHeap::with_capacity(iters.len());
    for (batch, iter) in iters.iter_mut().enumerate() {
        if let Some(post) = iter.next() {
            heap.push(HeapEntry { post, batch });
        }
    }

    let mut merged = Vec::with_capacity(total);
    while let Some(HeapEntry { post, batch }) = heap.pop() {
        merged.push(post);
        if let Some(next) = iters[batch].next() {
            heap.push(HeapEntry { post: next, batch });
        }
    }
    merged
}
