//! # lookym-client
//!
//! The LOOKYM client core: four state containers (auth, feed, video, chat)
//! mediating between the presentation layer and the remote backend, with a
//! whitelisted subset of state persisted on device.
//!
//! Containers are plain context-injected structs; [`Stores`] wires one
//! instance of each against shared backend/CDN/database handles. Tests
//! construct isolated instances directly.

pub mod auth;
pub mod chat;
pub mod feed;
pub mod video;

mod convert;

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use lookym_api::{Backend, MediaCdn};
use lookym_store::Database;

pub use auth::{AuthState, AuthStore};
pub use chat::{ChatState, ChatStore};
pub use feed::{FeedState, FeedStore};
pub use video::{VideoState, VideoStore};

/// Composition root holding one instance of each state container.
pub struct Stores {
    pub auth: Arc<AuthStore>,
    pub feed: FeedStore,
    pub video: VideoStore,
    pub chat: ChatStore,
}

impl Stores {
    /// Wire the containers against shared handles. Each container hydrates
    /// its persisted snapshot here, before any network call.
    pub fn new(
        backend: Arc<dyn Backend>,
        cdn: Arc<dyn MediaCdn>,
        db: Option<Arc<Database>>,
    ) -> Self {
        let auth = Arc::new(AuthStore::new(backend.clone(), db.clone()));

        Self {
            feed: FeedStore::new(db.clone()),
            video: VideoStore::new(backend.clone(), cdn, auth.clone(), db),
            chat: ChatStore::new(backend, auth.clone()),
            auth,
        }
    }
}

/// Install the global tracing subscriber for the client process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("lookym_client=debug,lookym_api=debug,lookym_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    use lookym_api::{MemoryBackend, MemoryCdn};
    use lookym_shared::models::{Role, User};

    #[tokio::test]
    async fn stores_share_one_identity() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_account(
            "ana@example.com",
            "secret",
            User {
                id: "ana".into(),
                email: "ana@example.com".into(),
                username: "ana".into(),
                display_name: None,
                avatar_url: None,
                bio: None,
                role: Role::User,
                verified: false,
            },
        );

        let stores = Stores::new(backend, Arc::new(MemoryCdn::new()), None);

        // Video and chat actions see the identity signed in via auth.
        assert!(stores.video.like_video("v1").await.is_err());
        stores.auth.login("ana@example.com", "secret").await.unwrap();
        // Unknown id is now a no-op rather than an auth failure.
        stores.video.like_video("v1").await.unwrap();
        stores.chat.load_chats().await.unwrap();
    }
}
