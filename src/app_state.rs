use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{open_store, DocumentStore},
    services::{HttpTagSuggester, Services, TagSuggester},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub services: Services,
    pub tag_suggester: Option<Arc<dyn TagSuggester>>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let store = open_store(&config).await?;
        let tag_suggester = HttpTagSuggester::from_config(&config.tags)?
            .map(|s| Arc::new(s) as Arc<dyn TagSuggester>);
        Ok(Self::with_store(config, store, tag_suggester))
    }

    /// Wire services around an already opened store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn DocumentStore>,
        tag_suggester: Option<Arc<dyn TagSuggester>>,
    ) -> Self {
        let services = Services::new(store.clone(), &config);
        Self {
            config,
            store,
            services,
            tag_suggester,
        }
    }
}
