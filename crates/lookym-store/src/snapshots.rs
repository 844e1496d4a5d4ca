//! Whitelisted per-container snapshots.
//!
//! Each container persists a strict subset of its in-memory state: the auth
//! identity, the feed's interaction sets, and the video interaction sets.
//! Collections fetched from the backend (posts, videos, chats) are never
//! persisted; they are re-derivable from their origin.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::params;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use lookym_shared::models::User;

use crate::database::Database;
use crate::error::Result;

/// Persisted auth state: identity and authenticated flag only, never the
/// loading/error transients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub current_user: Option<User>,
    pub is_authenticated: bool,
}

/// Persisted feed interaction state. The post collection itself is not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub liked_posts: HashMap<String, bool>,
    pub saved_posts: Vec<String>,
}

/// Persisted video interaction state, keyed by video id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoSnapshot {
    pub liked_videos: HashSet<String>,
    pub saved_videos: HashSet<String>,
}

impl Database {
    pub fn load_auth_snapshot(&self) -> Result<Option<AuthSnapshot>> {
        self.get_json("auth")
    }

    pub fn save_auth_snapshot(&self, snapshot: &AuthSnapshot) -> Result<()> {
        self.put_json("auth", snapshot)
    }

    pub fn load_feed_snapshot(&self) -> Result<Option<FeedSnapshot>> {
        self.get_json("feed")
    }

    pub fn save_feed_snapshot(&self, snapshot: &FeedSnapshot) -> Result<()> {
        self.put_json("feed", snapshot)
    }

    pub fn load_video_snapshot(&self) -> Result<Option<VideoSnapshot>> {
        self.get_json("video")
    }

    pub fn save_video_snapshot(&self, snapshot: &VideoSnapshot) -> Result<()> {
        self.put_json("video", snapshot)
    }

    fn get_json<T: DeserializeOwned>(&self, container: &str) -> Result<Option<T>> {
        let conn = self.conn()?;
        let row: std::result::Result<String, _> = conn.query_row(
            "SELECT json FROM snapshots WHERE container = ?1",
            params![container],
            |row| row.get(0),
        );

        match row {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_json<T: Serialize>(&self, container: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;

        self.conn()?.execute(
            "INSERT OR REPLACE INTO snapshots (container, json, updated_at)
             VALUES (?1, ?2, ?3)",
            params![container, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lookym_shared::models::Role;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn missing_snapshot_is_none() {
        let (_dir, db) = open_temp();
        assert_eq!(db.load_feed_snapshot().unwrap(), None);
    }

    #[test]
    fn feed_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let snapshot = FeedSnapshot {
            liked_posts: HashMap::from([("p1".to_string(), true)]),
            saved_posts: vec!["42".to_string()],
        };

        {
            let db = Database::open_at(&path).unwrap();
            db.save_feed_snapshot(&snapshot).unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.load_feed_snapshot().unwrap(), Some(snapshot));
    }

    #[test]
    fn auth_snapshot_round_trips_identity() {
        let (_dir, db) = open_temp();

        let snapshot = AuthSnapshot {
            current_user: Some(User {
                id: "u1".into(),
                email: "u1@example.com".into(),
                username: "u1".into(),
                display_name: Some("User One".into()),
                avatar_url: None,
                bio: None,
                role: Role::Business,
                verified: true,
            }),
            is_authenticated: true,
        };

        db.save_auth_snapshot(&snapshot).unwrap();
        assert_eq!(db.load_auth_snapshot().unwrap(), Some(snapshot));
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let (_dir, db) = open_temp();

        db.save_video_snapshot(&VideoSnapshot {
            liked_videos: HashSet::from(["v1".to_string()]),
            saved_videos: HashSet::new(),
        })
        .unwrap();

        let updated = VideoSnapshot {
            liked_videos: HashSet::new(),
            saved_videos: HashSet::from(["v2".to_string()]),
        };
        db.save_video_snapshot(&updated).unwrap();

        assert_eq!(db.load_video_snapshot().unwrap(), Some(updated));
    }
}
