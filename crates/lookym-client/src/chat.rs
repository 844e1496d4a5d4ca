//! Chat state container.
//!
//! Holds the viewer's conversations and message histories. Chat state is
//! never persisted locally; it is re-fetched through [`load_chats`].
//! Sends and read-state sweeps follow the same optimistic-with-rollback
//! policy as the video container.
//!
//! [`load_chats`]: ChatStore::load_chats

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use lookym_api::{Backend, NewMessage};
use lookym_shared::error::{ClientError, Result};
use lookym_shared::models::{Chat, Message, User};

use crate::auth::AuthStore;
use crate::convert::{fetch_err, write_err};

/// Observable chat state.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub chats: Vec<Chat>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct ChatStore {
    backend: Arc<dyn Backend>,
    auth: Arc<AuthStore>,
    state: Mutex<ChatState>,
}

impl ChatStore {
    pub fn new(backend: Arc<dyn Backend>, auth: Arc<AuthStore>) -> Self {
        Self {
            backend,
            auth,
            state: Mutex::new(ChatState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ChatState {
        self.lock().clone()
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

    /// Fetch every chat the viewer participates in. Idempotent: the last
    /// successful result wins.
    pub async fn load_chats(&self) -> Result<()> {
        let viewer = self.viewer()?;
        self.begin();

        match self
            .backend
            .fetch_chats(&viewer.id)
            .await
            .map_err(fetch_err)
        {
            Ok(chats) => {
                tracing::debug!(count = chats.len(), "chats loaded");
                let mut state = self.lock();
                state.chats = chats;
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "chat fetch failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Pure lookup; callers handle the not-found case.
    pub fn get_chat(&self, chat_id: &str) -> Option<Chat> {
        self.lock().chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Append a message to the target chat and persist it to the backend.
    ///
    /// Text that is empty after trimming is a successful no-op, as is an
    /// unknown chat id. On a failed backend write the optimistic append is
    /// rolled back.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let viewer = self.viewer()?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: viewer.id.clone(),
            text: trimmed.to_string(),
            timestamp: Utc::now(),
            read: false,
        };

        self.begin();
        let applied = {
            let mut state = self.lock();
            match state.chats.iter_mut().find(|c| c.id == chat_id) {
                Some(chat) => {
                    chat.push_message(message.clone());
                    true
                }
                None => false,
            }
        };
        if !applied {
            self.clear_loading();
            return Ok(());
        }

        let row = NewMessage {
            id: message.id.clone(),
            chat_id: chat_id.to_string(),
            sender_id: message.sender_id.clone(),
            text: message.text.clone(),
            created_at: message.timestamp,
            read: false,
        };

        match self.backend.insert_message(&row).await.map_err(write_err) {
            Ok(()) => {
                tracing::debug!(chat_id, message_id = %message.id, "message sent");
                self.clear_loading();
                Ok(())
            }
            Err(e) => {
                tracing::error!(chat_id, error = %e, "message send failed; rolling back");
                {
                    let mut state = self.lock();
                    if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
                        chat.messages.retain(|m| m.id != message.id);
                        chat.last_message = chat.messages.last().cloned();
                    }
                }
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Mark every message not sent by the viewer as read and zero the unread
    /// counter. No-op for unknown ids; rolled back if the backend write
    /// fails.
    pub async fn mark_chat_as_read(&self, chat_id: &str) -> Result<()> {
        let viewer = self.viewer()?;

        let Some(previous) = self.get_chat(chat_id) else {
            return Ok(());
        };

        self.begin();
        {
            let mut state = self.lock();
            if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
                for message in chat.messages.iter_mut() {
                    if message.sender_id != viewer.id {
                        message.read = true;
                    }
                }
                chat.last_message = chat.messages.last().cloned();
                chat.unread_count = 0;
            }
        }

        match self
            .backend
            .mark_messages_read(chat_id, &viewer.id)
            .await
            .map_err(write_err)
        {
            Ok(()) => {
                self.clear_loading();
                Ok(())
            }
            Err(e) => {
                tracing::error!(chat_id, error = %e, "read sync failed; rolling back");
                {
                    let mut state = self.lock();
                    if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
                        *chat = previous;
                    }
                }
                self.finish_err(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use lookym_api::MemoryBackend;
    use lookym_shared::models::{Role, UserSummary};

    fn profile(id: &str) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            username: id.into(),
            display_name: None,
            avatar_url: None,
            bio: None,
            role: Role::User,
            verified: false,
        }
    }

    fn summary(id: &str) -> UserSummary {
        profile(id).summary()
    }

    fn message(id: &str, sender: &str, minutes_ago: i64, read: bool) -> Message {
        Message {
            id: id.into(),
            sender_id: sender.into(),
            text: format!("text-{id}"),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            read,
        }
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        store: ChatStore,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_account("ana@example.com", "secret", profile("ana"));
        backend.seed_chat(
            "chat1",
            [summary("ana"), summary("shop")],
            vec![
                message("m1", "ana", 60, true),
                message("m2", "shop", 40, true),
                message("m3", "shop", 20, false),
                message("m4", "shop", 10, false),
                message("m5", "ana", 5, false),
            ],
        );

        let auth = Arc::new(AuthStore::new(backend.clone(), None));
        auth.login("ana@example.com", "secret").await.unwrap();

        let store = ChatStore::new(backend.clone(), auth);
        Fixture { backend, store }
    }

    #[tokio::test]
    async fn load_chats_requires_authentication() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = Arc::new(AuthStore::new(backend.clone(), None));
        let store = ChatStore::new(backend, auth);

        let err = store.load_chats().await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn load_chats_populates_viewer_relative_state() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();

        let chat = f.store.get_chat("chat1").unwrap();
        assert_eq!(chat.unread_count, 2);
        assert_eq!(chat.last_message.as_ref().unwrap().id, "m5");
        assert_eq!(chat.peer_of("ana").unwrap().id, "shop");
    }

    #[tokio::test]
    async fn get_chat_returns_none_for_unknown_ids() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();

        assert!(f.store.get_chat("missing-id").is_none());
    }

    #[tokio::test]
    async fn send_message_appends_and_updates_last_message() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();

        f.store.send_message("chat1", "  hello there  ").await.unwrap();

        let chat = f.store.get_chat("chat1").unwrap();
        let last = chat.last_message.unwrap();
        assert_eq!(last.text, "hello there");
        assert_eq!(last.sender_id, "ana");
        assert!(!last.read);
        assert_eq!(chat.messages.len(), 6);

        // The send reached the backend: a fresh load still shows it.
        f.store.load_chats().await.unwrap();
        let chat = f.store.get_chat("chat1").unwrap();
        assert_eq!(chat.last_message.unwrap().text, "hello there");
    }

    #[tokio::test]
    async fn blank_text_is_a_no_op_without_backend_write() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();
        let before = f.store.get_chat("chat1").unwrap();

        // Would fail loudly if any backend write were attempted.
        f.backend.set_fail_writes(true);
        f.store.send_message("chat1", "   ").await.unwrap();

        assert_eq!(f.store.get_chat("chat1").unwrap(), before);
    }

    #[tokio::test]
    async fn failed_send_rolls_back_the_append() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();
        let before = f.store.get_chat("chat1").unwrap();

        f.backend.set_fail_writes(true);
        let err = f.store.send_message("chat1", "hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Write(_)));

        let after = f.store.get_chat("chat1").unwrap();
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.last_message, before.last_message);
    }

    #[tokio::test]
    async fn mark_chat_as_read_spares_the_viewers_own_messages() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();
        assert_eq!(f.store.get_chat("chat1").unwrap().unread_count, 2);

        f.store.mark_chat_as_read("chat1").await.unwrap();

        let chat = f.store.get_chat("chat1").unwrap();
        assert_eq!(chat.unread_count, 0);
        for message in &chat.messages {
            if message.sender_id != "ana" {
                assert!(message.read);
            }
        }
        // The viewer's own unread message is untouched.
        let own = chat.messages.iter().find(|m| m.id == "m5").unwrap();
        assert!(!own.read);

        // Unknown ids are a no-op.
        f.store.mark_chat_as_read("missing-id").await.unwrap();
    }

    #[tokio::test]
    async fn failed_read_sync_rolls_back() {
        let f = fixture().await;
        f.store.load_chats().await.unwrap();
        let before = f.store.get_chat("chat1").unwrap();

        f.backend.set_fail_writes(true);
        assert!(f.store.mark_chat_as_read("chat1").await.is_err());

        assert_eq!(f.store.get_chat("chat1").unwrap(), before);
    }
}
