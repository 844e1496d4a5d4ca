//! Domain model structs handed between the state containers, the backend
//! providers, and the persistence layer.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer or written into a local snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account classification. Business accounts gate the creator features
/// (video upload); everything else is a regular user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Business,
}

impl Role {
    pub fn is_business(self) -> bool {
        matches!(self, Role::Business)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Business => write!(f, "business"),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The full profile record of an account. The auth container holds at most
/// one of these at a time (the signed-in identity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Backend-issued account id.
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub verified: bool,
}

impl User {
    /// The embedded author form used by posts, videos, comments and chats.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            verified: self.verified,
            role: self.role,
        }
    }
}

/// Denormalized author record embedded in content entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment attached to exactly one post or video. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub user: UserSummary,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub likes: u32,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// An image-gallery feed post.
///
/// The viewer's liked/saved status is not stored inline; the feed container
/// keeps it in companion collections keyed by post id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub user: UserSummary,
    /// Ordered gallery image URLs.
    pub images: Vec<String>,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub likes: u32,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// A single-asset video post with a derived thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub user: UserSummary,
    pub video_url: String,
    pub thumbnail_url: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub likes: u32,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat / Message
// ---------------------------------------------------------------------------

/// A direct message inside exactly one chat. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// A two-party conversation. The fixed-size participants array carries the
/// exactly-two invariant in the type itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    pub participants: [UserSummary; 2],
    /// Messages ordered by timestamp ascending.
    pub messages: Vec<Message>,
    /// Always the most recently appended message.
    pub last_message: Option<Message>,
    /// Unread messages addressed to the viewer.
    pub unread_count: u32,
}

impl Chat {
    /// Append a message, keeping `last_message` in sync.
    pub fn push_message(&mut self, message: Message) {
        self.last_message = Some(message.clone());
        self.messages.push(message);
    }

    /// The participant who is not the viewer.
    pub fn peer_of(&self, viewer_id: &str) -> Option<&UserSummary> {
        self.participants.iter().find(|p| p.id != viewer_id)
    }
}
