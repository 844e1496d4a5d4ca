//! The remote-backend contract consumed by the state containers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lookym_shared::models::{Chat, Comment, User, Video};

use crate::error::Result;

/// A provider-held session for the signed-in account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
}

/// Profile fields that may be changed through `update_profile`.
///
/// Username and role are deliberately not representable here; they are
/// protected fields that never change through the profile-update path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Metadata row inserted after the raw media has reached the CDN.
#[derive(Debug, Clone, Serialize)]
pub struct NewVideo {
    pub user_id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub caption: String,
    pub hashtags: Vec<String>,
}

/// A message row. The id is minted client-side so the optimistic local copy
/// and the persisted row agree.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Hosted authentication, profile storage and row-level content API.
///
/// Fetches return fully formatted domain models: embedded authors resolved,
/// comments ordered by timestamp, chat participants validated to exactly
/// two, and derived chat fields (`last_message`, `unread_count`) computed at
/// the decode boundary.
#[async_trait]
pub trait Backend: Send + Sync {
    // --- authentication ---

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Alternate identity-provider path; the provider-issued token stands in
    /// for password verification.
    async fn sign_in_with_google(&self, id_token: &str) -> Result<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    /// Re-validate the held session against the provider. `None` when no
    /// session is active.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    // --- profiles ---

    async fn get_profile(&self, user_id: &str) -> Result<User>;

    async fn insert_profile(&self, profile: &User) -> Result<()>;

    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()>;

    // --- videos ---

    /// Page `p` of the global feed, creation time descending. Pages are
    /// 1-based.
    async fn fetch_videos(&self, page: u32, limit: u32) -> Result<Vec<Video>>;

    async fn fetch_videos_by_user(&self, user_id: &str) -> Result<Vec<Video>>;

    async fn fetch_videos_by_hashtag(&self, hashtag: &str) -> Result<Vec<Video>>;

    async fn insert_video(&self, video: &NewVideo) -> Result<Video>;

    /// Atomically adjust a like counter (floored at zero server-side) and
    /// return the new count.
    async fn bump_video_likes(&self, video_id: &str, delta: i64) -> Result<i64>;

    async fn insert_video_like(&self, user_id: &str, video_id: &str) -> Result<()>;

    async fn delete_video_like(&self, user_id: &str, video_id: &str) -> Result<()>;

    async fn insert_saved_video(&self, user_id: &str, video_id: &str) -> Result<()>;

    async fn delete_saved_video(&self, user_id: &str, video_id: &str) -> Result<()>;

    /// Insert a comment and return it formatted with full author detail.
    async fn insert_comment(&self, video_id: &str, user_id: &str, text: &str) -> Result<Comment>;

    // --- chats ---

    /// All chats the viewer participates in, with per-viewer derived fields.
    async fn fetch_chats(&self, viewer_id: &str) -> Result<Vec<Chat>>;

    async fn insert_message(&self, message: &NewMessage) -> Result<()>;

    /// Mark every message in the chat not sent by `reader_id` as read.
    async fn mark_messages_read(&self, chat_id: &str, reader_id: &str) -> Result<()>;
}
