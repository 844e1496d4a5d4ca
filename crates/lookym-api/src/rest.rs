//! REST provider for the hosted backend.
//!
//! Speaks the provider's two surfaces: the auth endpoints under `auth/v1/`
//! and the row-level relational API under `rest/v1/` (PostgREST-style
//! filters, `Range` pagination, and RPC endpoints for atomic counter
//! updates).

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use lookym_shared::models::{Chat, Comment, User, Video};

use crate::backend::{AuthSession, Backend, NewMessage, NewVideo, ProfileChanges};
use crate::config::BackendConfig;
use crate::error::{ApiError, Result};
use crate::rows::{ChatRow, CommentRow, UserRow, VideoRow};

/// Embed expression resolving video authors and comment authors in one read.
const VIDEO_SELECT: &str = "*,user:users(*),comments(*,user:users(*))";
const COMMENT_SELECT: &str = "*,user:users(*)";

#[derive(Debug, Deserialize)]
struct AuthUserRow {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user: AuthUserRow,
}

/// Client for the hosted backend. Holds the active session so every request
/// after sign-in carries the user's bearer token.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
}

impl RestBackend {
    pub fn new(api_url: &str, anon_key: &str) -> Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if api_url.ends_with('/') {
            api_url.to_string()
        } else {
            format!("{api_url}/")
        };

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&normalized)?,
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.api_url, &config.anon_key)
    }

    fn session_token(&self) -> Option<String> {
        let guard = match self.session.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().map(|s| s.access_token.clone())
    }

    fn set_session(&self, session: Option<AuthSession>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path)?;
        let bearer = self
            .session_token()
            .unwrap_or_else(|| self.anon_key.clone());

        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer))
    }

    /// Map non-success statuses into [`ApiError::Status`] with the body text.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %message, "backend rejected request");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn session_from(&self, token: TokenResponse) -> Result<AuthSession> {
        let access_token = token
            .access_token
            .ok_or_else(|| ApiError::Decode("auth response carried no session".into()))?;

        let session = AuthSession {
            access_token,
            user_id: token.user.id,
            email: token.user.email.unwrap_or_default(),
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }
}

/// Item range for 1-based page/limit pagination, inclusive on both ends.
fn page_range(page: u32, limit: u32) -> (u64, u64) {
    let from = u64::from(page.max(1) - 1) * u64::from(limit);
    let to = from + u64::from(limit) - 1;
    (from, to)
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .request(Method::POST, "auth/v1/token?grant_type=password")?
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if matches!(
            resp.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(ApiError::InvalidCredentials);
        }
        let token: TokenResponse = Self::check(resp).await?.json().await?;
        self.session_from(token)
    }

    async fn sign_in_with_google(&self, id_token: &str) -> Result<AuthSession> {
        let resp = self
            .request(Method::POST, "auth/v1/token?grant_type=id_token")?
            .json(&json!({ "provider": "google", "id_token": id_token }))
            .send()
            .await?;

        if matches!(
            resp.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(ApiError::InvalidCredentials);
        }
        let token: TokenResponse = Self::check(resp).await?.json().await?;
        self.session_from(token)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .request(Method::POST, "auth/v1/signup")?
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = Self::check(resp).await?.json().await?;
        self.session_from(token)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session_token().is_none() {
            return Err(ApiError::NoSession);
        }

        let resp = self.request(Method::POST, "auth/v1/logout")?.send().await?;
        Self::check(resp).await?;

        self.set_session(None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        let Some(access_token) = self.session_token() else {
            return Ok(None);
        };

        let resp = self.request(Method::GET, "auth/v1/user")?.send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            // The token expired server-side; the session is gone.
            self.set_session(None);
            return Ok(None);
        }

        let user: AuthUserRow = Self::check(resp).await?.json().await?;
        Ok(Some(AuthSession {
            access_token,
            user_id: user.id,
            email: user.email.unwrap_or_default(),
        }))
    }

    async fn get_profile(&self, user_id: &str) -> Result<User> {
        let id_filter = format!("eq.{user_id}");
        let resp = self
            .request(Method::GET, "rest/v1/users")?
            .query(&[("select", "*"), ("id", id_filter.as_str())])
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_ACCEPTABLE {
            return Err(ApiError::NotFound);
        }
        let row: UserRow = Self::check(resp).await?.json().await?;
        row.into_user()
    }

    async fn insert_profile(&self, profile: &User) -> Result<()> {
        let resp = self
            .request(Method::POST, "rest/v1/users")?
            .header("Prefer", "return=minimal")
            .json(&[profile])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()> {
        let resp = self
            .request(Method::PATCH, "rest/v1/users")?
            .query(&[("id", &format!("eq.{user_id}"))])
            .json(changes)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn fetch_videos(&self, page: u32, limit: u32) -> Result<Vec<Video>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let (from, to) = page_range(page, limit);

        let resp = self
            .request(Method::GET, "rest/v1/videos")?
            .query(&[("select", VIDEO_SELECT), ("order", "created_at.desc")])
            .header("Range-Unit", "items")
            .header("Range", format!("{from}-{to}"))
            .send()
            .await?;

        let rows: Vec<VideoRow> = Self::check(resp).await?.json().await?;
        Ok(rows.into_iter().map(VideoRow::into_video).collect())
    }

    async fn fetch_videos_by_user(&self, user_id: &str) -> Result<Vec<Video>> {
        let user_filter = format!("eq.{user_id}");
        let resp = self
            .request(Method::GET, "rest/v1/videos")?
            .query(&[
                ("select", VIDEO_SELECT),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;

        let rows: Vec<VideoRow> = Self::check(resp).await?.json().await?;
        Ok(rows.into_iter().map(VideoRow::into_video).collect())
    }

    async fn fetch_videos_by_hashtag(&self, hashtag: &str) -> Result<Vec<Video>> {
        let tag_filter = format!("cs.{{{hashtag}}}");
        let resp = self
            .request(Method::GET, "rest/v1/videos")?
            .query(&[
                ("select", VIDEO_SELECT),
                ("hashtags", tag_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;

        let rows: Vec<VideoRow> = Self::check(resp).await?.json().await?;
        Ok(rows.into_iter().map(VideoRow::into_video).collect())
    }

    async fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        let resp = self
            .request(Method::POST, "rest/v1/videos")?
            .query(&[("select", VIDEO_SELECT)])
            .header("Prefer", "return=representation")
            .json(&[video])
            .send()
            .await?;

        let mut rows: Vec<VideoRow> = Self::check(resp).await?.json().await?;
        if rows.is_empty() {
            return Err(ApiError::Decode("insert returned no video row".into()));
        }
        Ok(rows.remove(0).into_video())
    }

    async fn bump_video_likes(&self, video_id: &str, delta: i64) -> Result<i64> {
        let resp = self
            .request(Method::POST, "rest/v1/rpc/bump_video_likes")?
            .json(&json!({ "video_id": video_id, "delta": delta }))
            .send()
            .await?;

        let count: i64 = Self::check(resp).await?.json().await?;
        Ok(count)
    }

    async fn insert_video_like(&self, user_id: &str, video_id: &str) -> Result<()> {
        let resp = self
            .request(Method::POST, "rest/v1/video_likes")?
            .header("Prefer", "return=minimal")
            .json(&json!({ "user_id": user_id, "video_id": video_id }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_video_like(&self, user_id: &str, video_id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, "rest/v1/video_likes")?
            .query(&[
                ("user_id", &format!("eq.{user_id}")),
                ("video_id", &format!("eq.{video_id}")),
            ])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn insert_saved_video(&self, user_id: &str, video_id: &str) -> Result<()> {
        let resp = self
            .request(Method::POST, "rest/v1/saved_videos")?
            .header("Prefer", "return=minimal")
            .json(&json!({ "user_id": user_id, "video_id": video_id }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_saved_video(&self, user_id: &str, video_id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, "rest/v1/saved_videos")?
            .query(&[
                ("user_id", &format!("eq.{user_id}")),
                ("video_id", &format!("eq.{video_id}")),
            ])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn insert_comment(&self, video_id: &str, user_id: &str, text: &str) -> Result<Comment> {
        let resp = self
            .request(Method::POST, "rest/v1/comments")?
            .query(&[("select", COMMENT_SELECT)])
            .header("Prefer", "return=representation")
            .json(&json!({ "video_id": video_id, "user_id": user_id, "text": text }))
            .send()
            .await?;

        let mut rows: Vec<CommentRow> = Self::check(resp).await?.json().await?;
        if rows.is_empty() {
            return Err(ApiError::Decode("insert returned no comment row".into()));
        }
        Ok(rows.remove(0).into_comment())
    }

    async fn fetch_chats(&self, viewer_id: &str) -> Result<Vec<Chat>> {
        let resp = self
            .request(Method::POST, "rest/v1/rpc/chats_for_viewer")?
            .json(&json!({ "viewer_id": viewer_id }))
            .send()
            .await?;

        let rows: Vec<ChatRow> = Self::check(resp).await?.json().await?;
        rows.into_iter().map(|row| row.into_chat(viewer_id)).collect()
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<()> {
        let resp = self
            .request(Method::POST, "rest/v1/messages")?
            .header("Prefer", "return=minimal")
            .json(&[message])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn mark_messages_read(&self, chat_id: &str, reader_id: &str) -> Result<()> {
        let resp = self
            .request(Method::PATCH, "rest/v1/messages")?
            .query(&[
                ("chat_id", &format!("eq.{chat_id}")),
                ("sender_id", &format!("neq.{reader_id}")),
                ("read", &"is.false".to_string()),
            ])
            .json(&json!({ "read": true }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let backend = RestBackend::new("http://localhost:54321", "key").unwrap();
        assert_eq!(backend.base_url.as_str(), "http://localhost:54321/");

        let joined = backend.base_url.join("auth/v1/user").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:54321/auth/v1/user");
    }

    #[test]
    fn page_range_is_one_based_and_inclusive() {
        assert_eq!(page_range(1, 10), (0, 9));
        assert_eq!(page_range(2, 10), (10, 19));
        // Page 0 is treated as page 1.
        assert_eq!(page_range(0, 5), (0, 4));
    }
}
