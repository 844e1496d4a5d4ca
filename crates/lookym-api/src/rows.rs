//! Wire-format rows returned by the row-level REST API, and their mapping
//! into domain models.
//!
//! Derived fields (`last_message`, `unread_count`) and structural invariants
//! (exactly two chat participants, comments ordered by timestamp) are
//! enforced here, at the decode boundary, so the containers only ever see
//! well-formed models.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use lookym_shared::models::{Chat, Comment, Message, Role, User, UserSummary, Video};

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserRow {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub verified: bool,
}

impl UserRow {
    pub fn into_summary(self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username,
            avatar_url: self.avatar_url,
            verified: self.verified,
            role: self.role,
        }
    }

    /// Full profile conversion; the email column is mandatory here.
    pub fn into_user(self) -> Result<User, ApiError> {
        let email = self
            .email
            .ok_or_else(|| ApiError::Decode(format!("profile row {} has no email", self.id)))?;
        Ok(User {
            id: self.id,
            email,
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            bio: self.bio,
            role: self.role,
            verified: self.verified,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommentRow {
    pub id: String,
    pub user: UserRow,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: i64,
}

impl CommentRow {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            user: self.user.into_summary(),
            text: self.text,
            timestamp: self.created_at,
            likes: self.likes.max(0) as u32,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoRow {
    pub id: String,
    pub user: UserRow,
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: Vec<CommentRow>,
    pub created_at: DateTime<Utc>,
}

impl VideoRow {
    pub fn into_video(self) -> Video {
        let mut comments: Vec<Comment> =
            self.comments.into_iter().map(CommentRow::into_comment).collect();
        comments.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        Video {
            id: self.id,
            user: self.user.into_summary(),
            video_url: self.video_url,
            thumbnail_url: self.thumbnail_url,
            caption: self.caption,
            hashtags: self.hashtags,
            likes: self.likes.max(0) as u32,
            comments,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            text: self.text,
            timestamp: self.created_at,
            read: self.read,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParticipantRow {
    pub user: UserRow,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatRow {
    pub id: String,
    pub participants: Vec<ParticipantRow>,
    #[serde(default)]
    pub messages: Vec<MessageRow>,
}

impl ChatRow {
    /// Convert into a viewer-relative [`Chat`].
    ///
    /// Fails with a decode error unless the chat has exactly two
    /// participants.
    pub fn into_chat(self, viewer_id: &str) -> Result<Chat, ApiError> {
        let id = self.id;

        let summaries: Vec<UserSummary> = self
            .participants
            .into_iter()
            .map(|p| p.user.into_summary())
            .collect();
        let participants: [UserSummary; 2] = summaries.try_into().map_err(
            |got: Vec<UserSummary>| {
                ApiError::Decode(format!(
                    "chat {id} has {} participants, expected 2",
                    got.len()
                ))
            },
        )?;

        let mut messages: Vec<Message> =
            self.messages.into_iter().map(MessageRow::into_message).collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let last_message = messages.last().cloned();
        let unread_count = messages
            .iter()
            .filter(|m| !m.read && m.sender_id != viewer_id)
            .count() as u32;

        Ok(Chat {
            id,
            participants,
            messages,
            last_message,
            unread_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(id: &str) -> UserRow {
        UserRow {
            id: id.into(),
            username: format!("u-{id}"),
            email: None,
            display_name: None,
            avatar_url: None,
            bio: None,
            role: Role::User,
            verified: false,
        }
    }

    fn message_row(id: &str, sender: &str, offset_secs: i64, read: bool) -> MessageRow {
        MessageRow {
            id: id.into(),
            sender_id: sender.into(),
            text: "hi".into(),
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap(),
            read,
        }
    }

    #[test]
    fn chat_row_derives_viewer_relative_fields() {
        let row = ChatRow {
            id: "chat1".into(),
            participants: vec![
                ParticipantRow { user: user_row("a") },
                ParticipantRow { user: user_row("b") },
            ],
            // Out of order on the wire; newest is m3.
            messages: vec![
                message_row("m3", "b", 30, false),
                message_row("m1", "a", 10, true),
                message_row("m2", "b", 20, false),
            ],
        };

        let chat = row.into_chat("a").unwrap();

        assert_eq!(chat.messages[0].id, "m1");
        assert_eq!(chat.last_message.as_ref().unwrap().id, "m3");
        // m2 and m3 are unread and not from the viewer.
        assert_eq!(chat.unread_count, 2);
    }

    #[test]
    fn chat_row_rejects_wrong_participant_count() {
        let row = ChatRow {
            id: "chat1".into(),
            participants: vec![ParticipantRow { user: user_row("a") }],
            messages: Vec::new(),
        };

        assert!(matches!(row.into_chat("a"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn profile_row_requires_email() {
        assert!(matches!(
            user_row("a").into_user(),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn negative_like_counts_clamp_to_zero() {
        let row = VideoRow {
            id: "v1".into(),
            user: user_row("a"),
            video_url: "https://cdn/v1.mp4".into(),
            thumbnail_url: "https://cdn/v1.jpg".into(),
            caption: String::new(),
            hashtags: Vec::new(),
            likes: -3,
            comments: Vec::new(),
            created_at: Utc::now(),
        };

        assert_eq!(row.into_video().likes, 0);
    }
}
