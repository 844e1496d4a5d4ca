//! Feed state container.
//!
//! Holds the post collection and the viewer's interaction state. All
//! operations are synchronous and local-only; the post collection comes
//! from its origin via [`set_posts`] and is never persisted, while the
//! liked/saved companion collections survive restarts.
//!
//! [`set_posts`]: FeedStore::set_posts

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use lookym_shared::models::{Comment, Post, Role, UserSummary};
use lookym_store::{Database, FeedSnapshot};

/// Observable feed state.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub posts: Vec<Post>,
    /// Per-post viewer liked flag, keyed by post id.
    pub liked_posts: HashMap<String, bool>,
    /// Saved post ids, insertion-ordered.
    pub saved_posts: Vec<String>,
}

pub struct FeedStore {
    db: Option<Arc<Database>>,
    state: Mutex<FeedState>,
}

/// Author attached to locally composed comments until a backend write
/// exists for the post comment path.
fn placeholder_commenter() -> UserSummary {
    UserSummary {
        id: "me".into(),
        username: "me".into(),
        avatar_url: None,
        verified: false,
        role: Role::User,
    }
}

impl FeedStore {
    pub fn new(db: Option<Arc<Database>>) -> Self {
        let mut state = FeedState::default();

        if let Some(db) = &db {
            match db.load_feed_snapshot() {
                Ok(Some(snapshot)) => {
                    state.liked_posts = snapshot.liked_posts;
                    state.saved_posts = snapshot.saved_posts;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "failed to hydrate feed state"),
            }
        }

        Self {
            db,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FeedState {
        self.lock().clone()
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.lock().liked_posts.get(post_id).copied().unwrap_or(false)
    }

    pub fn is_saved(&self, post_id: &str) -> bool {
        self.lock().saved_posts.iter().any(|id| id == post_id)
    }

    fn persist(&self) {
        let Some(db) = &self.db else { return };

        let snapshot = {
            let state = self.lock();
            FeedSnapshot {
                liked_posts: state.liked_posts.clone(),
                saved_posts: state.saved_posts.clone(),
            }
        };

        if let Err(e) = db.save_feed_snapshot(&snapshot) {
            tracing::warn!(error = %e, "failed to persist feed snapshot");
        }
    }

    /// Replace the post collection (mock or remote origin).
    pub fn set_posts(&self, posts: Vec<Post>) {
        self.lock().posts = posts;
    }

    /// Bump the post's like count and set the viewer's liked flag. No-op for
    /// unknown ids.
    pub fn like_post(&self, post_id: &str) {
        {
            let mut state = self.lock();
            let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
                return;
            };
            post.likes = post.likes.saturating_add(1);
            state.liked_posts.insert(post_id.to_string(), true);
        }
        self.persist();
    }

    /// Reverse of [`like_post`]; the count floors at zero.
    ///
    /// [`like_post`]: FeedStore::like_post
    pub fn unlike_post(&self, post_id: &str) {
        {
            let mut state = self.lock();
            let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
                return;
            };
            post.likes = post.likes.saturating_sub(1);
            state.liked_posts.remove(post_id);
        }
        self.persist();
    }

    /// Add the id to the saved collection. Idempotent.
    pub fn save_post(&self, post_id: &str) {
        {
            let mut state = self.lock();
            if !state.saved_posts.iter().any(|id| id == post_id) {
                state.saved_posts.push(post_id.to_string());
            }
        }
        self.persist();
    }

    pub fn unsave_post(&self, post_id: &str) {
        {
            let mut state = self.lock();
            state.saved_posts.retain(|id| id != post_id);
        }
        self.persist();
    }

    /// Append a locally composed comment to the target post. No-op for
    /// unknown ids.
    pub fn add_comment(&self, post_id: &str, text: &str) {
        let mut state = self.lock();
        let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
            return;
        };

        post.comments.push(Comment {
            id: Uuid::new_v4().to_string(),
            user: placeholder_commenter(),
            text: text.to_string(),
            timestamp: Utc::now(),
            likes: 0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    fn post(id: &str, likes: u32) -> Post {
        Post {
            id: id.into(),
            user: placeholder_commenter(),
            images: vec!["https://img/1.jpg".into()],
            caption: "caption".into(),
            hashtags: vec!["tag".into()],
            likes,
            comments: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn store_with(posts: Vec<Post>) -> FeedStore {
        let store = FeedStore::new(None);
        store.set_posts(posts);
        store
    }

    #[test]
    fn like_then_unlike_restores_count_and_flag() {
        let store = store_with(vec![post("p1", 7)]);

        store.like_post("p1");
        assert_eq!(store.state().posts[0].likes, 8);
        assert!(store.is_liked("p1"));

        store.unlike_post("p1");
        assert_eq!(store.state().posts[0].likes, 7);
        assert!(!store.is_liked("p1"));
    }

    #[test]
    fn unlike_never_goes_below_zero() {
        let store = store_with(vec![post("p1", 0)]);

        store.unlike_post("p1");
        store.unlike_post("p1");
        assert_eq!(store.state().posts[0].likes, 0);
    }

    #[test]
    fn save_is_idempotent() {
        let store = store_with(Vec::new());

        store.save_post("42");
        store.save_post("42");

        let saved = store.state().saved_posts;
        assert_eq!(saved, vec!["42".to_string()]);

        store.unsave_post("42");
        assert!(store.state().saved_posts.is_empty());
    }

    #[test]
    fn add_comment_appends_with_text_and_timestamp() {
        let before = Utc::now();
        let store = store_with(vec![post("p1", 0)]);

        store.add_comment("p1", "hello");

        let state = store.state();
        let comment = state.posts[0].comments.last().unwrap();
        assert_eq!(state.posts[0].comments.len(), 1);
        assert_eq!(comment.text, "hello");
        assert_eq!(comment.likes, 0);
        assert!(comment.timestamp >= before);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let store = store_with(vec![post("p1", 3)]);

        store.like_post("nope");
        store.unlike_post("nope");
        store.add_comment("nope", "hi");

        let state = store.state();
        assert_eq!(state.posts[0].likes, 3);
        assert!(state.liked_posts.is_empty());
        assert!(state.posts[0].comments.is_empty());
    }

    #[test]
    fn interaction_state_survives_restart_but_posts_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let db = Arc::new(Database::open_at(&path).unwrap());
            let store = FeedStore::new(Some(db));
            store.set_posts(vec![post("42", 0)]);
            store.like_post("42");
            store.save_post("42");
        }

        let db = Arc::new(Database::open_at(&path).unwrap());
        let store = FeedStore::new(Some(db));

        let state = store.state();
        assert!(state.posts.is_empty());
        assert!(store.is_liked("42"));
        assert_eq!(state.saved_posts, vec!["42".to_string()]);
    }
}
