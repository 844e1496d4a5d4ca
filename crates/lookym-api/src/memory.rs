//! In-memory backend provider.
//!
//! Stands in for the hosted backend in tests and offline development, the
//! same way the original client shipped seeded mock data. Supports failure
//! injection (`set_fail_writes`) so rollback paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use lookym_shared::models::{Chat, Comment, Message, Role, User, UserSummary, Video};

use crate::backend::{AuthSession, Backend, NewMessage, NewVideo, ProfileChanges};
use crate::error::{ApiError, Result};

struct Account {
    user_id: String,
    password: String,
}

struct StoredChat {
    id: String,
    participants: [UserSummary; 2],
    messages: Vec<Message>,
}

#[derive(Default)]
struct Inner {
    /// Credential records keyed by email.
    accounts: HashMap<String, Account>,
    /// Profile rows keyed by user id.
    profiles: HashMap<String, User>,
    session: Option<AuthSession>,
    videos: Vec<Video>,
    video_likes: HashSet<(String, String)>,
    saved_videos: HashSet<(String, String)>,
    chats: Vec<StoredChat>,
    fail_writes: bool,
}

/// Backend provider holding everything in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an account with credentials and its profile row.
    pub fn seed_account(&self, email: &str, password: &str, profile: User) {
        let mut inner = self.lock();
        inner.accounts.insert(
            email.to_string(),
            Account {
                user_id: profile.id.clone(),
                password: password.to_string(),
            },
        );
        inner.profiles.insert(profile.id.clone(), profile);
    }

    pub fn seed_video(&self, video: Video) {
        self.lock().videos.push(video);
    }

    pub fn seed_chat(&self, id: &str, participants: [UserSummary; 2], messages: Vec<Message>) {
        self.lock().chats.push(StoredChat {
            id: id.to_string(),
            participants,
            messages,
        });
    }

    /// While set, every mutating call fails with a 500-style error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn mint_session(inner: &mut Inner, user_id: &str, email: &str) -> AuthSession {
        let session = AuthSession {
            access_token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
        };
        inner.session = Some(session.clone());
        session
    }
}

fn write_guard(inner: &Inner) -> Result<()> {
    if inner.fail_writes {
        return Err(ApiError::Status {
            status: 500,
            message: "injected write failure".into(),
        });
    }
    Ok(())
}

fn author_summary(inner: &Inner, user_id: &str) -> Result<UserSummary> {
    inner
        .profiles
        .get(user_id)
        .map(User::summary)
        .ok_or(ApiError::NotFound)
}

fn derive_chat(stored: &StoredChat, viewer_id: &str) -> Chat {
    let mut messages = stored.messages.clone();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let last_message = messages.last().cloned();
    let unread_count = messages
        .iter()
        .filter(|m| !m.read && m.sender_id != viewer_id)
        .count() as u32;

    Chat {
        id: stored.id.clone(),
        participants: stored.participants.clone(),
        messages,
        last_message,
        unread_count,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut inner = self.lock();

        let user_id = match inner.accounts.get(email) {
            Some(account) if account.password == password => account.user_id.clone(),
            _ => return Err(ApiError::InvalidCredentials),
        };
        Ok(Self::mint_session(&mut inner, &user_id, email))
    }

    /// The provider token is taken to be the account email; unknown tokens
    /// get a fresh provider-verified profile, mirroring first-time Google
    /// sign-in.
    async fn sign_in_with_google(&self, id_token: &str) -> Result<AuthSession> {
        let mut inner = self.lock();

        if let Some(account) = inner.accounts.get(id_token) {
            let user_id = account.user_id.clone();
            return Ok(Self::mint_session(&mut inner, &user_id, id_token));
        }

        let username = id_token.split('@').next().unwrap_or(id_token).to_string();
        let profile = User {
            id: Uuid::new_v4().to_string(),
            email: id_token.to_string(),
            username,
            display_name: None,
            avatar_url: None,
            bio: None,
            role: Role::User,
            verified: true,
        };
        let user_id = profile.id.clone();
        inner.accounts.insert(
            id_token.to_string(),
            Account {
                user_id: user_id.clone(),
                password: String::new(),
            },
        );
        inner.profiles.insert(user_id.clone(), profile);
        Ok(Self::mint_session(&mut inner, &user_id, id_token))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        if inner.accounts.contains_key(email) {
            return Err(ApiError::Status {
                status: 422,
                message: "email already registered".into(),
            });
        }

        let user_id = Uuid::new_v4().to_string();
        inner.accounts.insert(
            email.to_string(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        Ok(Self::mint_session(&mut inner, &user_id, email))
    }

    async fn sign_out(&self) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        if inner.session.is_none() {
            return Err(ApiError::NoSession);
        }
        inner.session = None;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        Ok(self.lock().session.clone())
    }

    async fn get_profile(&self, user_id: &str) -> Result<User> {
        self.lock()
            .profiles
            .get(user_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn insert_profile(&self, profile: &User) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;
        inner.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let profile = inner.profiles.get_mut(user_id).ok_or(ApiError::NotFound)?;
        if let Some(display_name) = &changes.display_name {
            profile.display_name = Some(display_name.clone());
        }
        if let Some(avatar_url) = &changes.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        if let Some(bio) = &changes.bio {
            profile.bio = Some(bio.clone());
        }
        Ok(())
    }

    async fn fetch_videos(&self, page: u32, limit: u32) -> Result<Vec<Video>> {
        let inner = self.lock();

        let mut videos = inner.videos.clone();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let from = (page.max(1) - 1) as usize * limit as usize;
        Ok(videos.into_iter().skip(from).take(limit as usize).collect())
    }

    async fn fetch_videos_by_user(&self, user_id: &str) -> Result<Vec<Video>> {
        let inner = self.lock();

        let mut videos: Vec<Video> = inner
            .videos
            .iter()
            .filter(|v| v.user.id == user_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn fetch_videos_by_hashtag(&self, hashtag: &str) -> Result<Vec<Video>> {
        let inner = self.lock();

        let mut videos: Vec<Video> = inner
            .videos
            .iter()
            .filter(|v| v.hashtags.iter().any(|h| h == hashtag))
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let user = author_summary(&inner, &video.user_id)?;
        let formatted = Video {
            id: Uuid::new_v4().to_string(),
            user,
            video_url: video.video_url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            caption: video.caption.clone(),
            hashtags: video.hashtags.clone(),
            likes: 0,
            comments: Vec::new(),
            created_at: Utc::now(),
        };
        inner.videos.push(formatted.clone());
        Ok(formatted)
    }

    async fn bump_video_likes(&self, video_id: &str, delta: i64) -> Result<i64> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let video = inner
            .videos
            .iter_mut()
            .find(|v| v.id == video_id)
            .ok_or(ApiError::NotFound)?;

        let new_count = (i64::from(video.likes) + delta).max(0);
        video.likes = new_count as u32;
        Ok(new_count)
    }

    async fn insert_video_like(&self, user_id: &str, video_id: &str) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;
        inner
            .video_likes
            .insert((user_id.to_string(), video_id.to_string()));
        Ok(())
    }

    async fn delete_video_like(&self, user_id: &str, video_id: &str) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;
        inner
            .video_likes
            .remove(&(user_id.to_string(), video_id.to_string()));
        Ok(())
    }

    async fn insert_saved_video(&self, user_id: &str, video_id: &str) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;
        inner
            .saved_videos
            .insert((user_id.to_string(), video_id.to_string()));
        Ok(())
    }

    async fn delete_saved_video(&self, user_id: &str, video_id: &str) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;
        inner
            .saved_videos
            .remove(&(user_id.to_string(), video_id.to_string()));
        Ok(())
    }

    async fn insert_comment(&self, video_id: &str, user_id: &str, text: &str) -> Result<Comment> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let user = author_summary(&inner, user_id)?;
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            user,
            text: text.to_string(),
            timestamp: Utc::now(),
            likes: 0,
        };

        let video = inner
            .videos
            .iter_mut()
            .find(|v| v.id == video_id)
            .ok_or(ApiError::NotFound)?;
        video.comments.push(comment.clone());
        Ok(comment)
    }

    async fn fetch_chats(&self, viewer_id: &str) -> Result<Vec<Chat>> {
        let inner = self.lock();

        Ok(inner
            .chats
            .iter()
            .filter(|c| c.participants.iter().any(|p| p.id == viewer_id))
            .map(|c| derive_chat(c, viewer_id))
            .collect())
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let chat = inner
            .chats
            .iter_mut()
            .find(|c| c.id == message.chat_id)
            .ok_or(ApiError::NotFound)?;

        chat.messages.push(Message {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            text: message.text.clone(),
            timestamp: message.created_at,
            read: message.read,
        });
        Ok(())
    }

    async fn mark_messages_read(&self, chat_id: &str, reader_id: &str) -> Result<()> {
        let mut inner = self.lock();
        write_guard(&inner)?;

        let chat = inner
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or(ApiError::NotFound)?;

        for message in chat.messages.iter_mut() {
            if message.sender_id != reader_id {
                message.read = true;
            }
        }
        Ok(())
    }
}
