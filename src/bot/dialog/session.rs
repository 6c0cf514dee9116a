use std::collections::HashMap;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;

use super::state::DialogState;

/// Conversations are tracked per user per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: i64,
    pub chat_id: ChatId,
}

/// In-progress dialog for one [`SessionKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: DialogState,
    /// The message carrying the keyboard for the current state.
    pub prompt: Option<MessageId>,
    /// Messages to delete once the current pass finishes.
    pub cleanup: Vec<MessageId>,
}

impl Session {
    pub fn new(prompt: Option<MessageId>) -> Self {
        Self {
            state: DialogState::ChoosingAction,
            prompt,
            cleanup: Vec::new(),
        }
    }

    /// Feeding time resolved for the pending record, if any.
    pub fn feeding_at(&self) -> Option<&chrono::DateTime<chrono_tz::Tz>> {
        match &self.state {
            DialogState::ChooseFeedingType { feeding_at, .. } => Some(feeding_at),
            _ => None,
        }
    }

    /// Selected offset, present only while choosing the feeding type.
    pub fn minutes_ago(&self) -> Option<u32> {
        match &self.state {
            DialogState::ChooseFeedingType { minutes_ago, .. } => Some(*minutes_ago),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.lock().await.get(key).cloned()
    }

    pub async fn put(&self, key: SessionKey, session: Session) {
        self.sessions.lock().await.insert(key, session);
    }

    pub async fn remove(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.lock().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
