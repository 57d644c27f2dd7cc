// ShowcaseStore - project showcases ranked by upvotes

use std::sync::Arc;
use tracing::info;

use crate::{
    error::AppResult,
    infrastructure::{
        current_time_millis,
        document_store::{to_fields, Direction, DocumentStore, Filter, Query},
        DocumentIdGenerator, ViewerContext,
    },
    models::{
        fields,
        validation::{
            normalize_tags, validate_length, validate_url, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
        },
        EntityType, NewShowcase, Showcase,
    },
};

#[derive(Clone)]
pub struct ShowcaseStore {
    store: Arc<dyn DocumentStore>,
    ids: Arc<DocumentIdGenerator>,
}

impl ShowcaseStore {
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<DocumentIdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn create_showcase(
        &self,
        viewer: &ViewerContext,
        input: NewShowcase,
    ) -> AppResult<Showcase> {
        let user_id = viewer.require_user()?;
        validate_length("title", &input.title, 1, MAX_TITLE_LENGTH)?;
        validate_length("description", &input.description, 1, MAX_DESCRIPTION_LENGTH)?;
        let image_url = input.image_url.trim().to_string();
        if !image_url.is_empty() {
            validate_url("imageUrl", &image_url)?;
        }

        let showcase = Showcase {
            id: self.ids.next_string_id(),
            user_id: user_id.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            image_url,
            tags: normalize_tags(&input.tags),
            upvotes: 0,
            created_at: current_time_millis(),
        };

        self.store
            .set(EntityType::Showcase.as_str(), &showcase.id, to_fields(&showcase)?)
            .await?;
        info!(showcase_id = %showcase.id, user_id, "showcase created");
        Ok(showcase)
    }

    pub async fn get_showcase(&self, showcase_id: &str) -> AppResult<Option<Showcase>> {
        match self.store.get(EntityType::Showcase.as_str(), showcase_id).await? {
            Some(doc) => Ok(Some(doc.into_model()?)),
            None => Ok(None),
        }
    }

    pub async fn list_showcases(&self) -> AppResult<Vec<Showcase>> {
        self.run(Self::collection().order_by(fields::CREATED_AT, Direction::Desc))
            .await
    }

    pub async fn showcases_by_user(&self, user_id: &str) -> AppResult<Vec<Showcase>> {
        self.run(
            Self::collection()
                .filter(Filter::eq(fields::USER_ID, user_id))
                .order_by(fields::CREATED_AT, Direction::Desc),
        )
        .await
    }

    /// Most-upvoted first; equal counts fall back to newest first.
    pub async fn top_showcases(&self, limit: usize) -> AppResult<Vec<Showcase>> {
        self.run(
            Self::collection()
                .order_by(fields::UPVOTES, Direction::Desc)
                .limit(limit),
        )
        .await
    }

    fn collection() -> Query {
        Query::collection(EntityType::Showcase.as_str())
    }

    async fn run(&self, query: Query) -> AppResult<Vec<Showcase>> {
        let docs = self.store.query(query).await?;
        docs.into_iter().map(|d| d.into_model()).collect()
    }
}
