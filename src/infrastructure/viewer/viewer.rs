// ViewerContext - who is making the request
//
// Authentication happens upstream. The identity provider (or the gateway in front of
// this service) forwards the stable user id in `x-user-id`, or as `Authorization:
// Bearer <id>`. This module only reads that identity; it never verifies credentials.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: Option<String>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            request_id: format!("req-{}", Uuid::new_v4()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            request_id: format!("req-{}", Uuid::new_v4()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The signed-in user's id, or `Unauthorized`.
    pub fn require_user(&self) -> AppResult<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }

    /// `Forbidden` unless the viewer is `owner_id`.
    pub fn require_owner(&self, owner_id: &str) -> AppResult<()> {
        if self.require_user()? == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("only the owner may do this".to_string()))
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> AppResult<Self> {
        let user_id = extract_user_id(headers)?;
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()));
        Ok(Self {
            user_id,
            request_id,
        })
    }
}

fn extract_user_id(headers: &HeaderMap) -> AppResult<Option<String>> {
    if let Some(value) = headers.get(USER_ID_HEADER) {
        let id = value
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{} is not valid text", USER_ID_HEADER)))?
            .trim();
        return Ok((!id.is_empty()).then(|| id.to_string()));
    }

    if let Some(value) = headers.get("authorization") {
        let auth = value
            .to_str()
            .map_err(|_| AppError::BadRequest("authorization is not valid text".to_string()))?;
        if let Some(token) = auth.strip_prefix("Bearer ") {
            let token = token.trim();
            return Ok((!token.is_empty()).then(|| token.to_string()));
        }
    }

    Ok(None)
}

impl<S> FromRequestParts<S> for ViewerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(viewer) = parts.extensions.get::<ViewerContext>() {
            return Ok(viewer.clone());
        }
        ViewerContext::from_headers(&parts.headers)
    }
}
