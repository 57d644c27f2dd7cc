// Follow-edge indexes - one logical edge is stored twice, once per side

use serde::{Deserialize, Serialize};

use super::EntityType;

/// The two per-user indexes that together hold a follow edge.
/// `users/{a}/following/{b}` and `users/{b}/followers/{a}` describe the same edge a -> b.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FollowIndex {
    Following,
    Followers,
}

impl FollowIndex {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowIndex::Following => "following",
            FollowIndex::Followers => "followers",
        }
    }

    /// The index on the other side of the edge.
    pub fn inverse(&self) -> FollowIndex {
        match self {
            FollowIndex::Following => FollowIndex::Followers,
            FollowIndex::Followers => FollowIndex::Following,
        }
    }

    /// Collection path of this index for `owner`.
    pub fn collection(&self, owner: &str) -> String {
        format!("{}/{}/{}", EntityType::User.as_str(), owner, self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FollowCounts {
    pub following: usize,
    pub followers: usize,
}
