// Community data model - documents as they are stored and served

pub mod social_graph;
pub mod validation;

use serde::{Deserialize, Serialize};

pub use social_graph::{FollowCounts, FollowIndex};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

// Top-level collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Post,
    Showcase,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "users",
            EntityType::Post => "posts",
            EntityType::Showcase => "showcases",
        }
    }
}

/// Comments live in a sub-collection of their parent post.
pub fn comments_collection(post_id: &str) -> String {
    format!("{}/{}/comments", EntityType::Post.as_str(), post_id)
}

// Field names shared by queries and counters
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const CREATED_AT: &str = "createdAt";
    pub const VIEWS: &str = "views";
    pub const REACTIONS: &str = "reactions";
    pub const COMMENTS_COUNT: &str = "commentsCount";
    pub const UPVOTES: &str = "upvotes";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    #[serde(alias = "name")]
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub socials: Vec<SocialLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    pub created_at: Timestamp,
}

/// Author fields copied into content at write time. Later profile edits do not touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSnapshot {
    pub name: String,
    pub avatar: String,
}

impl AuthorSnapshot {
    pub fn of(user: Option<&User>) -> Self {
        match user {
            Some(u) => Self {
                name: u.name.clone(),
                avatar: u.avatar_url.clone(),
            },
            None => Self {
                name: ANONYMOUS_AUTHOR.to_string(),
                avatar: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub reactions: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showcase {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub upvotes: u64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
}

// Write inputs

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Partial profile edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub socials: Option<Vec<SocialLink>>,
    pub current_company: Option<String>,
    pub current_role: Option<String>,
    pub education: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShowcase {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_wire_format_is_camel_case() {
        let post = Post {
            id: "p1".into(),
            user_id: "u1".into(),
            title: "Hello".into(),
            content: "World".into(),
            tags: vec![],
            created_at: 42,
            views: 0,
            reactions: 0,
            comments_count: 3,
            author_name: Some("Ada".into()),
            author_avatar: None,
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["commentsCount"], 3);
        assert_eq!(value["authorName"], "Ada");
        assert!(value.get("authorAvatar").is_none());
    }

    #[test]
    fn test_social_link_accepts_legacy_name_field() {
        let link: SocialLink =
            serde_json::from_str(r#"{"name":"GitHub","url":"https://github.com/ada"}"#).unwrap();
        assert_eq!(link.platform, "GitHub");
    }

    #[test]
    fn test_snapshot_of_missing_author() {
        let snap = AuthorSnapshot::of(None);
        assert_eq!(snap.name, ANONYMOUS_AUTHOR);
        assert!(snap.avatar.is_empty());
    }
}
