#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::types::{ChatId, MessageId};
use tempfile::{tempdir, TempDir};

use feeding_tracker_bot::bot::dialog::{FeedingDialog, Participant};
use feeding_tracker_bot::bot::presentation::Keyboard;
use feeding_tracker_bot::bot::transport::Messenger;
use feeding_tracker_bot::config::Whitelist;
use feeding_tracker_bot::database::connection::DatabaseManager;
use feeding_tracker_bot::services::timezone::{FixedClock, TimezoneService};

pub const ALICE_ID: i64 = 42;
pub const BOB_ID: i64 = 43;
pub const OFFSETS: [u32; 7] = [0, 5, 10, 15, 30, 45, 60];

pub async fn setup_test_db() -> (DatabaseManager, TempDir) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.to_string_lossy());

    let db = DatabaseManager::new(&db_url).await.unwrap();
    db.run_migrations().await.unwrap();
    (db, dir)
}

/// 2024-05-01 15:00:00 UTC, 12:00 in Buenos Aires.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap()
}

pub fn fixed_timezone(now: DateTime<Utc>) -> TimezoneService {
    TimezoneService::new(
        chrono_tz::America::Argentina::Buenos_Aires,
        chrono_tz::UTC,
        Arc::new(FixedClock(now)),
    )
}

pub fn participant(user_id: i64, username: Option<&str>) -> Participant {
    Participant {
        user_id,
        username: username.map(str::to_string),
        chat_id: ChatId(user_id),
    }
}

pub fn alice() -> Participant {
    participant(ALICE_ID, Some("alice"))
}

pub fn build_dialog(db: &DatabaseManager, messenger: Arc<RecordingMessenger>) -> FeedingDialog {
    FeedingDialog::new(
        messenger,
        db.clone(),
        fixed_timezone(test_now()),
        Whitelist::new(["alice", "bob"]),
        OFFSETS.to_vec(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        chat_id: ChatId,
        message_id: MessageId,
    },
}

/// In-memory [`Messenger`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    next_id: AtomicI32,
    log: Mutex<Vec<Outbound>>,
    failing_chats: Mutex<HashSet<i64>>,
    fail_edits: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_sends_to(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edited_texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Delete { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn sends_to(&self, chat_id: ChatId) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Send { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Id of the most recent message sent with a keyboard.
    pub fn last_prompt(&self) -> Option<MessageId> {
        self.log().into_iter().rev().find_map(|o| match o {
            Outbound::Send {
                message_id,
                keyboard: Some(_),
                ..
            } => Some(message_id),
            _ => None,
        })
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<MessageId> {
        if self.failing_chats.lock().unwrap().contains(&chat_id.0) {
            anyhow::bail!("chat {} is unreachable", chat_id.0);
        }
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.log.lock().unwrap().push(Outbound::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("message {} can't be edited", message_id.0);
        }
        self.log.lock().unwrap().push(Outbound::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("message {} can't be deleted", message_id.0);
        }
        self.log.lock().unwrap().push(Outbound::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }
}
