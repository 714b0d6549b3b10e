//! Username → chat id resolution.
//!
//! The bot records a user's chat id when they press /start; the send
//! endpoint later resolves the username from a submitted result. Storage
//! is behind a trait so the in-memory map can be swapped for a durable
//! backend without touching the callers.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// One recorded association. Last write wins; entries are only overwritten,
/// never deleted.
#[derive(Debug, Clone)]
pub struct ChatRegistration {
    pub chat_id: i64,
    pub updated_at: DateTime<Utc>,
}

/// Usernames are matched case-insensitively, ignoring a leading `@` and
/// surrounding whitespace.
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

pub trait ChatStore: Send + Sync {
    fn register(&self, username: &str, chat_id: i64);
    fn resolve(&self, username: &str) -> Option<i64>;
}

#[derive(Default)]
pub struct InMemoryChatStore {
    entries: RwLock<HashMap<String, ChatRegistration>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for InMemoryChatStore {
    fn register(&self, username: &str, chat_id: i64) {
        let key = normalize_username(username);
        if key.is_empty() {
            return;
        }
        self.entries
            .write()
            .expect("chat map lock poisoned")
            .insert(
                key,
                ChatRegistration {
                    chat_id,
                    updated_at: Utc::now(),
                },
            );
    }

    fn resolve(&self, username: &str) -> Option<i64> {
        self.entries
            .read()
            .expect("chat map lock poisoned")
            .get(&normalize_username(username))
            .map(|entry| entry.chat_id)
    }
}
