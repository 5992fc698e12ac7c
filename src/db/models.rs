use serde::{Deserialize, Serialize};

/// Full account record. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Lightweight author/follower card embedded in other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

/// What anyone may see about an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub posts: i64,
    pub likes_received: i64,
    pub followers: i64,
    pub following: i64,
}

/// A post as served to a viewer: author, counts, likers, comments and
/// whether the viewer liked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub user: UserSummary,
    pub likes: Vec<i64>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub is_liked: bool,
    pub likes_count: i64,
}
