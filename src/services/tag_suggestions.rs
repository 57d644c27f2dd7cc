// Tag suggestions from an external text-to-tags service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::TagSuggestConfig,
    error::{AppError, AppResult},
    models::validation::normalize_tags,
};

#[async_trait]
pub trait TagSuggester: Send + Sync {
    /// Suggested tags for `content`, normalised like post tags.
    async fn suggest_tags(&self, content: &str) -> AppResult<Vec<String>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestRequest<'a> {
    post_content: &'a str,
}

#[derive(Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    tags: Vec<String>,
}

/// POSTs `{"postContent": ...}` and reads `{"tags": [...]}`.
pub struct HttpTagSuggester {
    url: String,
    http_client: reqwest::Client,
}

impl HttpTagSuggester {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("tag suggest client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    /// `None` when no suggestion service is configured.
    pub fn from_config(config: &TagSuggestConfig) -> AppResult<Option<Self>> {
        match &config.url {
            Some(url) => Ok(Some(Self::new(
                url.clone(),
                Duration::from_millis(config.timeout_ms),
            )?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TagSuggester for HttpTagSuggester {
    async fn suggest_tags(&self, content: &str) -> AppResult<Vec<String>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http_client
            .post(&self.url)
            .json(&SuggestRequest {
                post_content: content,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "tag suggestion request failed");
                AppError::UpstreamError(format!("tag suggestion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamError(format!(
                "tag suggestion service returned {}",
                status
            )));
        }

        let body: SuggestResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamError(format!("invalid tag suggestion body: {}", e)))?;

        let tags = normalize_tags(&body.tags);
        debug!(count = tags.len(), "tag suggestions received");
        Ok(tags)
    }
}
