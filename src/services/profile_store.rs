// ProfileStore - user profile records under `users/{id}`
// Profiles are created once at signup and afterwards only edited by their owner.

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        current_time_millis,
        document_store::{to_fields, Direction, DocumentStore, Query},
        ViewerContext,
    },
    models::{
        fields,
        validation::{
            default_avatar_url, normalize_skills, normalize_socials, validate_length, validate_url,
            MAX_BIO_LENGTH, MAX_NAME_LENGTH, MIN_NAME_LENGTH,
        },
        AuthorSnapshot, EntityType, NewUser, ProfileUpdate, User,
    },
};

#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the profile for a freshly signed-up identity.
    pub async fn create_profile(&self, user_id: &str, input: NewUser) -> AppResult<User> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::BadRequest("user id is required".to_string()));
        }
        validate_length("name", &input.name, MIN_NAME_LENGTH, MAX_NAME_LENGTH)?;
        let name = input.name.trim().to_string();

        let avatar_url = match input.avatar_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                validate_url("avatarUrl", url)?;
                url.to_string()
            }
            _ => default_avatar_url(&name),
        };

        let collection = EntityType::User.as_str();
        if self.store.get(collection, user_id).await?.is_some() {
            return Err(AppError::BadRequest(format!("profile {} already exists", user_id)));
        }

        let user = User {
            id: user_id.to_string(),
            name,
            email: input.email.trim().to_string(),
            avatar_url,
            bio: String::new(),
            skills: Vec::new(),
            socials: Vec::new(),
            current_company: None,
            current_role: None,
            education: None,
            created_at: current_time_millis(),
        };

        self.store.set(collection, user_id, to_fields(&user)?).await?;
        info!(user_id, "profile created");
        Ok(user)
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<Option<User>> {
        match self.store.get(EntityType::User.as_str(), user_id).await? {
            Some(doc) => Ok(Some(doc.into_model()?)),
            None => Ok(None),
        }
    }

    /// Every profile, newest signup first.
    pub async fn list_profiles(&self) -> AppResult<Vec<User>> {
        let docs = self
            .store
            .query(Query::collection(EntityType::User.as_str()).order_by(fields::CREATED_AT, Direction::Desc))
            .await?;
        docs.into_iter().map(|d| d.into_model()).collect()
    }

    /// Author fields to copy into new content. Absent profiles yield the anonymous snapshot.
    pub async fn author_snapshot(&self, user_id: &str) -> AppResult<AuthorSnapshot> {
        let user = self.get_profile(user_id).await?;
        Ok(AuthorSnapshot::of(user.as_ref()))
    }

    /// Owner-only partial edit. Fields left `None` keep their stored value.
    pub async fn update_profile(
        &self,
        viewer: &ViewerContext,
        user_id: &str,
        update: ProfileUpdate,
    ) -> AppResult<User> {
        viewer.require_owner(user_id)?;

        let mut user = self
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;

        if let Some(name) = update.name {
            validate_length("name", &name, MIN_NAME_LENGTH, MAX_NAME_LENGTH)?;
            user.name = name.trim().to_string();
        }
        if let Some(bio) = update.bio {
            validate_length("bio", &bio, 0, MAX_BIO_LENGTH)?;
            user.bio = bio.trim().to_string();
        }
        if let Some(avatar) = update.avatar_url {
            let avatar = avatar.trim();
            if avatar.is_empty() {
                user.avatar_url = default_avatar_url(&user.name);
            } else {
                validate_url("avatarUrl", avatar)?;
                user.avatar_url = avatar.to_string();
            }
        }
        if let Some(skills) = update.skills {
            user.skills = normalize_skills(skills);
        }
        if let Some(socials) = update.socials {
            user.socials = normalize_socials(socials)?;
        }
        if let Some(company) = update.current_company {
            user.current_company = non_empty(company);
        }
        if let Some(role) = update.current_role {
            user.current_role = non_empty(role);
        }
        if let Some(education) = update.education {
            user.education = non_empty(education);
        }

        // Whole-document write so cleared optional fields disappear from storage.
        self.store
            .set(EntityType::User.as_str(), user_id, to_fields(&user)?)
            .await?;
        debug!(user_id, "profile updated");
        Ok(user)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
