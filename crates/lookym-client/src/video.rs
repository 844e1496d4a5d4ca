//! Video state container.
//!
//! Holds the video collection plus the viewer's liked/saved sets, and
//! drives the backend-synchronized actions: like/save relations, comment
//! insertion, paginated and filtered fetches, and the creator upload flow.
//!
//! Every backend-synchronized mutation here follows one policy: apply the
//! local change optimistically, issue the backend write, and roll the local
//! change back if the write fails.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use lookym_api::{Backend, MediaCdn, NewVideo};
use lookym_shared::error::{ClientError, Result};
use lookym_shared::models::{Role, User, Video};
use lookym_store::{Database, VideoSnapshot};

use crate::auth::AuthStore;
use crate::convert::{fetch_err, write_err};

/// CDN folder receiving creator uploads.
const UPLOAD_FOLDER: &str = "videos";

/// Observable video state.
#[derive(Debug, Clone, Default)]
pub struct VideoState {
    pub videos: Vec<Video>,
    /// Ids of videos the viewer has liked.
    pub liked_videos: HashSet<String>,
    /// Ids of videos the viewer has saved.
    pub saved_videos: HashSet<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Pre-mutation copy used to undo an optimistic change.
struct Rollback {
    videos: Vec<Video>,
    liked_videos: HashSet<String>,
    saved_videos: HashSet<String>,
}

pub struct VideoStore {
    backend: Arc<dyn Backend>,
    cdn: Arc<dyn MediaCdn>,
    auth: Arc<AuthStore>,
    db: Option<Arc<Database>>,
    state: Mutex<VideoState>,
}

impl VideoStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        cdn: Arc<dyn MediaCdn>,
        auth: Arc<AuthStore>,
        db: Option<Arc<Database>>,
    ) -> Self {
        let mut state = VideoState::default();

        if let Some(db) = &db {
            match db.load_video_snapshot() {
                Ok(Some(snapshot)) => {
                    state.liked_videos = snapshot.liked_videos;
                    state.saved_videos = snapshot.saved_videos;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "failed to hydrate video state"),
            }
        }

        Self {
            backend,
            cdn,
            auth,
            db,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VideoState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> VideoState {
        self.lock().clone()
    }

    pub fn is_liked(&self, video_id: &str) -> bool {
        self.lock().liked_videos.contains(video_id)
    }

    pub fn is_saved(&self, video_id: &str) -> bool {
        self.lock().saved_videos.contains(video_id)
    }

    fn viewer(&self) -> Result<User> {
        self.auth.current_user().ok_or(ClientError::NotAuthenticated)
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    fn clear_loading(&self) {
        self.lock().is_loading = false;
    }

    fn finish_err(&self, error: &ClientError) {
        let mut state = self.lock();
        state.error = Some(error.to_string());
        state.is_loading = false;
    }

    fn capture(&self) -> Rollback {
        let state = self.lock();
        Rollback {
            videos: state.videos.clone(),
            liked_videos: state.liked_videos.clone(),
            saved_videos: state.saved_videos.clone(),
        }
    }

    fn restore(&self, rollback: Rollback) {
        let mut state = self.lock();
        state.videos = rollback.videos;
        state.liked_videos = rollback.liked_videos;
        state.saved_videos = rollback.saved_videos;
    }

    /// Persist the liked/saved sets. The collection itself is re-derivable
    /// and stays out of the snapshot.
    fn persist(&self) {
        let Some(db) = &self.db else { return };

        let snapshot = {
            let state = self.lock();
            VideoSnapshot {
                liked_videos: state.liked_videos.clone(),
                saved_videos: state.saved_videos.clone(),
            }
        };

        if let Err(e) = db.save_video_snapshot(&snapshot) {
            tracing::warn!(error = %e, "failed to persist video snapshot");
        }
    }

    /// Apply or undo a like locally. Returns false for unknown ids.
    fn apply_like(&self, video_id: &str, liked: bool) -> bool {
        let mut state = self.lock();
        let Some(video) = state.videos.iter_mut().find(|v| v.id == video_id) else {
            return false;
        };

        if liked {
            video.likes = video.likes.saturating_add(1);
            state.liked_videos.insert(video_id.to_string());
        } else {
            video.likes = video.likes.saturating_sub(1);
            state.liked_videos.remove(video_id);
        }
        true
    }

    pub async fn like_video(&self, video_id: &str) -> Result<()> {
        self.set_liked(video_id, true).await
    }

    pub async fn unlike_video(&self, video_id: &str) -> Result<()> {
        self.set_liked(video_id, false).await
    }

    async fn set_liked(&self, video_id: &str, liked: bool) -> Result<()> {
        let viewer = self.viewer()?;
        self.begin();

        let rollback = self.capture();
        if !self.apply_like(video_id, liked) {
            self.clear_loading();
            return Ok(());
        }
        self.persist();

        let delta = if liked { 1 } else { -1 };
        let result = async {
            self.backend
                .bump_video_likes(video_id, delta)
                .await
                .map_err(write_err)?;
            if liked {
                self.backend
                    .insert_video_like(&viewer.id, video_id)
                    .await
                    .map_err(write_err)
            } else {
                self.backend
                    .delete_video_like(&viewer.id, video_id)
                    .await
                    .map_err(write_err)
            }
        }
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(video_id, liked, "like state synced");
                self.clear_loading();
                Ok(())
            }
            Err(e) => {
                tracing::error!(video_id, liked, error = %e, "like sync failed; rolling back");
                self.restore(rollback);
                self.persist();
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    pub async fn save_video(&self, video_id: &str) -> Result<()> {
        self.set_saved(video_id, true).await
    }

    pub async fn unsave_video(&self, video_id: &str) -> Result<()> {
        self.set_saved(video_id, false).await
    }

    async fn set_saved(&self, video_id: &str, saved: bool) -> Result<()> {
        let viewer = self.viewer()?;
        self.begin();

        let rollback = self.capture();
        {
            let mut state = self.lock();
            if saved {
                state.saved_videos.insert(video_id.to_string());
            } else {
                state.saved_videos.remove(video_id);
            }
        }
        self.persist();

        let result = if saved {
            self.backend
                .insert_saved_video(&viewer.id, video_id)
                .await
                .map_err(write_err)
        } else {
            self.backend
                .delete_saved_video(&viewer.id, video_id)
                .await
                .map_err(write_err)
        };

        match result {
            Ok(()) => {
                self.clear_loading();
                Ok(())
            }
            Err(e) => {
                tracing::error!(video_id, saved, error = %e, "save sync failed; rolling back");
                self.restore(rollback);
                self.persist();
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Insert a comment and append the backend-formatted result. The append
    /// waits for confirmation because the backend supplies the canonical row
    /// (id and author detail).
    pub async fn add_comment(&self, video_id: &str, text: &str) -> Result<()> {
        let viewer = self.viewer()?;
        self.begin();

        match self
            .backend
            .insert_comment(video_id, &viewer.id, text)
            .await
            .map_err(write_err)
        {
            Ok(comment) => {
                {
                    let mut state = self.lock();
                    if let Some(video) = state.videos.iter_mut().find(|v| v.id == video_id) {
                        video.comments.push(comment);
                    }
                    state.is_loading = false;
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(video_id, error = %e, "comment insert failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Creator upload: raw media to the CDN, thumbnail derivation, metadata
    /// insert, then prepend the confirmed video. A failure at any step
    /// leaves local state untouched.
    pub async fn upload_video(
        &self,
        media_path: &Path,
        caption: &str,
        hashtags: Vec<String>,
    ) -> Result<()> {
        let viewer = self.viewer()?;
        if !viewer.role.is_business() {
            return Err(ClientError::Authorization(Role::Business));
        }

        self.begin();
        match self.upload_inner(&viewer, media_path, caption, hashtags).await {
            Ok(video) => {
                tracing::info!(video_id = %video.id, user_id = %viewer.id, "video uploaded");
                let mut state = self.lock();
                state.videos.insert(0, video);
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "video upload failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    async fn upload_inner(
        &self,
        viewer: &User,
        media_path: &Path,
        caption: &str,
        hashtags: Vec<String>,
    ) -> Result<Video> {
        let media = self
            .cdn
            .upload_video(media_path, UPLOAD_FOLDER)
            .await
            .map_err(write_err)?;
        let thumbnail_url = self.cdn.thumbnail_url(&media.secure_url);

        self.backend
            .insert_video(&NewVideo {
                user_id: viewer.id.clone(),
                video_url: media.secure_url,
                thumbnail_url,
                caption: caption.to_string(),
                hashtags,
            })
            .await
            .map_err(write_err)
    }

    /// Paginated global feed, newest first. Page 1 replaces local state;
    /// later pages append.
    pub async fn fetch_videos(&self, page: u32, limit: u32) -> Result<()> {
        self.begin();
        match self.backend.fetch_videos(page, limit).await.map_err(fetch_err) {
            Ok(fetched) => {
                let mut state = self.lock();
                if page <= 1 {
                    state.videos = fetched;
                } else {
                    state.videos.extend(fetched);
                }
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                tracing::error!(page, error = %e, "video fetch failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    pub async fn fetch_videos_by_user(&self, user_id: &str) -> Result<()> {
        self.begin();
        match self
            .backend
            .fetch_videos_by_user(user_id)
            .await
            .map_err(fetch_err)
        {
            Ok(fetched) => {
                let mut state = self.lock();
                state.videos = fetched;
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "user video fetch failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    pub async fn fetch_videos_by_hashtag(&self, hashtag: &str) -> Result<()> {
        self.begin();
        match self
            .backend
            .fetch_videos_by_hashtag(hashtag)
            .await
            .map_err(fetch_err)
        {
            Ok(fetched) => {
                let mut state = self.lock();
                state.videos = fetched;
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                tracing::error!(hashtag, error = %e, "hashtag video fetch failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use lookym_api::{MemoryBackend, MemoryCdn};
    use lookym_shared::models::UserSummary;

    fn profile(id: &str, role: Role) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            username: id.into(),
            display_name: None,
            avatar_url: None,
            bio: None,
            role,
            verified: false,
        }
    }

    fn summary(id: &str) -> UserSummary {
        profile(id, Role::Business).summary()
    }

    fn video(id: &str, likes: u32, day: u32) -> Video {
        Video {
            id: id.into(),
            user: summary("creator"),
            video_url: format!("https://cdn/upload/{id}.mp4"),
            thumbnail_url: format!("https://cdn/upload/so_0/{id}.jpg"),
            caption: "caption".into(),
            hashtags: vec!["dance".into()],
            likes,
            comments: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        cdn: Arc<MemoryCdn>,
        store: VideoStore,
    }

    async fn fixture(role: Role) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_account("ana@example.com", "secret", profile("ana", role));

        let cdn = Arc::new(MemoryCdn::new());
        let auth = Arc::new(AuthStore::new(backend.clone(), None));
        auth.login("ana@example.com", "secret").await.unwrap();

        let store = VideoStore::new(backend.clone(), cdn.clone(), auth, None);
        Fixture { backend, cdn, store }
    }

    #[tokio::test]
    async fn like_requires_authentication() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = Arc::new(AuthStore::new(backend.clone(), None));
        let store = VideoStore::new(backend, Arc::new(MemoryCdn::new()), auth, None);

        let err = store.like_video("v1").await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn like_then_unlike_restores_count_and_flag() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 5, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.store.like_video("v1").await.unwrap();
        assert_eq!(f.store.state().videos[0].likes, 6);
        assert!(f.store.is_liked("v1"));

        f.store.unlike_video("v1").await.unwrap();
        assert_eq!(f.store.state().videos[0].likes, 5);
        assert!(!f.store.is_liked("v1"));
    }

    #[tokio::test]
    async fn unlike_floors_at_zero() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 0, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.store.unlike_video("v1").await.unwrap();
        assert_eq!(f.store.state().videos[0].likes, 0);
    }

    #[tokio::test]
    async fn failed_like_rolls_back_count_and_flag() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 5, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.backend.set_fail_writes(true);
        let err = f.store.like_video("v1").await.unwrap_err();
        assert!(matches!(err, ClientError::Write(_)));

        let state = f.store.state();
        assert_eq!(state.videos[0].likes, 5);
        assert!(!f.store.is_liked("v1"));
        assert!(state.error.is_some());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn failed_save_rolls_back_saved_set() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 0, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.backend.set_fail_writes(true);
        assert!(f.store.save_video("v1").await.is_err());
        assert!(!f.store.is_saved("v1"));

        f.backend.set_fail_writes(false);
        f.store.save_video("v1").await.unwrap();
        assert!(f.store.is_saved("v1"));

        f.store.unsave_video("v1").await.unwrap();
        assert!(!f.store.is_saved("v1"));
    }

    #[tokio::test]
    async fn upload_rejects_non_business_accounts() {
        let f = fixture(Role::User).await;

        let err = f
            .store
            .upload_video(Path::new("/tmp/clip.mp4"), "caption", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Authorization(Role::Business)));
        assert!(f.store.state().videos.is_empty());
    }

    #[tokio::test]
    async fn upload_prepends_confirmed_video() {
        let f = fixture(Role::Business).await;
        f.backend.seed_video(video("v1", 0, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.store
            .upload_video(
                Path::new("/tmp/clip.mp4"),
                "my clip",
                vec!["dance".into()],
            )
            .await
            .unwrap();

        let state = f.store.state();
        assert_eq!(state.videos.len(), 2);
        let uploaded = &state.videos[0];
        assert_eq!(uploaded.caption, "my clip");
        assert_eq!(uploaded.user.id, "ana");
        assert_eq!(uploaded.likes, 0);
        assert!(uploaded.thumbnail_url.contains("/upload/so_0/"));
    }

    #[tokio::test]
    async fn failed_cdn_upload_leaves_state_untouched() {
        let f = fixture(Role::Business).await;
        f.cdn.set_fail_uploads(true);

        let err = f
            .store
            .upload_video(Path::new("/tmp/clip.mp4"), "caption", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Write(_)));
        assert!(f.store.state().videos.is_empty());
        // Nothing reached the metadata table either.
        assert!(f.backend.fetch_videos(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_page_one_replaces_and_later_pages_append() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 0, 1));
        f.backend.seed_video(video("v2", 0, 2));
        f.backend.seed_video(video("v3", 0, 3));

        f.store.fetch_videos(1, 2).await.unwrap();
        let ids: Vec<String> = f.store.state().videos.iter().map(|v| v.id.clone()).collect();
        // Newest first.
        assert_eq!(ids, vec!["v3", "v2"]);

        f.store.fetch_videos(2, 2).await.unwrap();
        let ids: Vec<String> = f.store.state().videos.iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, vec!["v3", "v2", "v1"]);

        f.store.fetch_videos(1, 2).await.unwrap();
        assert_eq!(f.store.state().videos.len(), 2);
    }

    #[tokio::test]
    async fn filtered_fetches_replace_local_state() {
        let f = fixture(Role::User).await;
        let mut other = video("v9", 0, 4);
        other.user = summary("someone-else");
        other.hashtags = vec!["food".into()];
        f.backend.seed_video(video("v1", 0, 1));
        f.backend.seed_video(other);

        f.store.fetch_videos_by_hashtag("food").await.unwrap();
        let state = f.store.state();
        assert_eq!(state.videos.len(), 1);
        assert_eq!(state.videos[0].id, "v9");

        f.store.fetch_videos_by_user("creator").await.unwrap();
        let state = f.store.state();
        assert_eq!(state.videos.len(), 1);
        assert_eq!(state.videos[0].id, "v1");
    }

    #[tokio::test]
    async fn add_comment_appends_backend_formatted_row() {
        let f = fixture(Role::User).await;
        f.backend.seed_video(video("v1", 0, 1));
        f.store.fetch_videos(1, 10).await.unwrap();

        f.store.add_comment("v1", "nice one").await.unwrap();

        let state = f.store.state();
        let comment = state.videos[0].comments.last().unwrap();
        assert_eq!(comment.text, "nice one");
        assert_eq!(comment.user.id, "ana");
    }

    #[tokio::test]
    async fn interaction_sets_survive_restart_but_videos_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let backend = Arc::new(MemoryBackend::new());
        backend.seed_account("ana@example.com", "secret", profile("ana", Role::User));
        backend.seed_video(video("v1", 0, 1));

        let auth = Arc::new(AuthStore::new(backend.clone(), None));
        auth.login("ana@example.com", "secret").await.unwrap();

        {
            let db = Arc::new(Database::open_at(&path).unwrap());
            let store =
                VideoStore::new(backend.clone(), Arc::new(MemoryCdn::new()), auth.clone(), Some(db));
            store.fetch_videos(1, 10).await.unwrap();
            store.like_video("v1").await.unwrap();
            store.save_video("v1").await.unwrap();
        }

        let db = Arc::new(Database::open_at(&path).unwrap());
        let store = VideoStore::new(backend, Arc::new(MemoryCdn::new()), auth, Some(db));

        assert!(store.state().videos.is_empty());
        assert!(store.is_liked("v1"));
        assert!(store.is_saved("v1"));
    }
}
