//! The feeding conversation.
//!
//! ```text
//! /start ──► CHOOSING_ACTION ──log──► CHOOSE_TIME_OPTION ──offset──► CHOOSE_FEEDING_TYPE
//!              ▲   │ last / stats        │ cancel                      │ back │ type
//!              │   └──────────┘          ▼                             ▼      │
//!              └───────────────── CHOOSING_ACTION ◄── CHOOSE_TIME_OPTION ◄────┘ (persist)
//! ```
//!
//! "Done" ends the conversation from any state. Updates for one chat arrive
//! in order (teloxide dispatches per chat sequentially), so a session is read,
//! acted upon and written back without holding the registry lock across I/O.

pub mod session;
pub mod state;

use chrono::Duration;
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use thiserror::Error;

use crate::bot::presentation::{self, Keyboard};
use crate::bot::transport::Messenger;
use crate::config::Whitelist;
use crate::database::connection::DatabaseManager;
use crate::database::models::{FeedingLog, FeedingType, User};
use crate::services::timezone::TimezoneService;
use crate::utils::logging::{
    log_delivery_error, log_dialog_transition, log_invalid_input, log_unauthorized,
};

use session::{Session, SessionKey, SessionRegistry};
use state::{Choice, DialogInput, DialogState, MenuAction};

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("delivery failure: {0}")]
    Transport(anyhow::Error),
    #[error("user {0} has no username")]
    MissingUsername(i64),
}

/// Who sent an input, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: i64,
    pub username: Option<String>,
    pub chat_id: ChatId,
}

impl Participant {
    pub fn key(&self) -> SessionKey {
        SessionKey {
            user_id: self.user_id,
            chat_id: self.chat_id,
        }
    }

    fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

pub struct FeedingDialog {
    messenger: Arc<dyn Messenger>,
    db: DatabaseManager,
    timezone: TimezoneService,
    whitelist: Whitelist,
    time_offsets: Vec<u32>,
    sessions: SessionRegistry,
}

impl FeedingDialog {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        db: DatabaseManager,
        timezone: TimezoneService,
        whitelist: Whitelist,
        time_offsets: Vec<u32>,
    ) -> Self {
        Self {
            messenger,
            db,
            timezone,
            whitelist,
            time_offsets,
            sessions: SessionRegistry::new(),
        }
    }

    pub async fn session(&self, who: &Participant) -> Option<Session> {
        self.sessions.get(&who.key()).await
    }

    /// Runs one input and reports failures to the user instead of the caller.
    ///
    /// Returns the state the conversation is in afterwards, `None` when there
    /// is no conversation.
    pub async fn process(
        &self,
        who: &Participant,
        input: DialogInput,
        origin: Option<MessageId>,
    ) -> Option<DialogState> {
        match self.handle(who, input, origin).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    "Dialog step failed for {}({}) in chat {}: {}",
                    who.display_name(),
                    who.user_id,
                    who.chat_id.0,
                    e
                );
                if matches!(e, DialogError::Storage(_)) {
                    self.notify(who.chat_id, presentation::STORAGE_FAILURE, None).await;
                }
                self.sessions.get(&who.key()).await.map(|s| s.state)
            }
        }
    }

    /// Runs one input. On error the stored session is left untouched.
    pub async fn handle(
        &self,
        who: &Participant,
        input: DialogInput,
        origin: Option<MessageId>,
    ) -> Result<Option<DialogState>, DialogError> {
        match input {
            DialogInput::Start => return self.start(who).await,
            DialogInput::Done => return self.finish(who).await,
            _ => {}
        }

        let key = who.key();
        let Some(mut session) = self.sessions.get(&key).await else {
            tracing::debug!(
                "Ignoring '{}' from {}({}): no active conversation",
                input.describe(),
                who.display_name(),
                who.user_id
            );
            return Ok(None);
        };

        // A button on an older keyboard supersedes the current prompt.
        if let (Some(pressed), Some(current)) = (origin, session.prompt) {
            if pressed != current && !session.cleanup.contains(&current) {
                session.cleanup.push(current);
            }
        }
        let prompt = origin.or(session.prompt);
        let next = match (&session.state, input) {
            (DialogState::ChoosingAction, DialogInput::Choice(Choice::Menu(action))) => {
                self.on_menu(who, &session, action, prompt).await?
            }
            (DialogState::ChooseTimeOption, DialogInput::Choice(Choice::TimeOffset(minutes)))
                if self.time_offsets.contains(&minutes) =>
            {
                self.on_time_chosen(who, &session, minutes, prompt).await?
            }
            (DialogState::ChooseTimeOption, DialogInput::Choice(Choice::Cancel)) => {
                self.on_cancel(who, &session, prompt).await
            }
            (
                DialogState::ChooseFeedingType { feeding_at, .. },
                DialogInput::Choice(Choice::FeedingType(feeding_type)),
            ) => {
                let feeding_at = *feeding_at;
                self.on_type_chosen(who, &session, feeding_at, feeding_type, prompt)
                    .await?
            }
            (DialogState::ChooseFeedingType { .. }, DialogInput::Choice(Choice::Back)) => {
                self.on_back(who, &session, prompt).await?
            }
            (state, other) => {
                log_invalid_input(
                    who.display_name(),
                    who.user_id,
                    who.chat_id.0,
                    state.name(),
                    &other.describe(),
                );
                self.reprompt(who, &session, prompt).await?
            }
        };

        if next.state.name() != session.state.name() {
            log_dialog_transition(
                who.display_name(),
                who.user_id,
                who.chat_id.0,
                session.state.name(),
                next.state.name(),
            );
        }

        let state = next.state.clone();
        self.sessions.put(key, next).await;
        Ok(Some(state))
    }

    async fn start(&self, who: &Participant) -> Result<Option<DialogState>, DialogError> {
        if !self.whitelist.contains(who.username.as_deref()) {
            log_unauthorized(who.display_name(), who.user_id, who.chat_id.0);
            self.messenger
                .send_text(who.chat_id, presentation::UNAUTHORIZED, None)
                .await
                .map_err(DialogError::Transport)?;
            return Ok(None);
        }

        let menu = self
            .messenger
            .send_text(who.chat_id, presentation::GREETING, Some(&presentation::main_menu()))
            .await
            .map_err(DialogError::Transport)?;

        if let Some(previous) = self.sessions.get(&who.key()).await {
            self.discard_all(who.chat_id, previous.prompt.into_iter().chain(previous.cleanup))
                .await;
        }

        self.sessions.put(who.key(), Session::new(Some(menu))).await;
        log_dialog_transition(
            who.display_name(),
            who.user_id,
            who.chat_id.0,
            "START",
            DialogState::ChoosingAction.name(),
        );
        Ok(Some(DialogState::ChoosingAction))
    }

    async fn finish(&self, who: &Participant) -> Result<Option<DialogState>, DialogError> {
        let Some(session) = self.sessions.remove(&who.key()).await else {
            return Ok(None);
        };

        self.discard_all(who.chat_id, session.prompt.into_iter().chain(session.cleanup))
            .await;
        self.notify(who.chat_id, presentation::FAREWELL, None).await;
        log_dialog_transition(
            who.display_name(),
            who.user_id,
            who.chat_id.0,
            session.state.name(),
            "END",
        );
        Ok(None)
    }

    async fn on_menu(
        &self,
        who: &Participant,
        session: &Session,
        action: MenuAction,
        prompt: Option<MessageId>,
    ) -> Result<Session, DialogError> {
        let report = match action {
            MenuAction::LogFeeding => {
                let mut cleanup = session.cleanup.clone();
                let prompt = self
                    .show_prompt(
                        who.chat_id,
                        prompt,
                        presentation::TIME_PROMPT,
                        &presentation::time_options(&self.time_offsets),
                        &mut cleanup,
                    )
                    .await?;
                return Ok(Session {
                    state: DialogState::ChooseTimeOption,
                    prompt: Some(prompt),
                    cleanup,
                });
            }
            MenuAction::LastFeeding => self.last_feeding_text(who).await?,
            MenuAction::DailyStats => self.daily_stats_text(who).await?,
        };

        self.messenger
            .send_text(who.chat_id, &report, None)
            .await
            .map_err(DialogError::Transport)?;

        // The menu moves below the report so it stays the latest message.
        if let Some(old) = prompt {
            self.discard(who.chat_id, old).await;
        }
        let menu = self
            .notify(who.chat_id, presentation::GREETING, Some(&presentation::main_menu()))
            .await;

        Ok(Session {
            state: DialogState::ChoosingAction,
            prompt: menu,
            cleanup: session.cleanup.clone(),
        })
    }

    async fn on_time_chosen(
        &self,
        who: &Participant,
        session: &Session,
        minutes_ago: u32,
        prompt: Option<MessageId>,
    ) -> Result<Session, DialogError> {
        let feeding_at = self.timezone.resolve_offset(minutes_ago);
        let mut cleanup = session.cleanup.clone();
        let prompt = self
            .show_prompt(
                who.chat_id,
                prompt,
                presentation::TYPE_PROMPT,
                &presentation::feeding_types(),
                &mut cleanup,
            )
            .await?;

        Ok(Session {
            state: DialogState::ChooseFeedingType {
                minutes_ago,
                feeding_at,
            },
            prompt: Some(prompt),
            cleanup,
        })
    }

    async fn on_cancel(
        &self,
        who: &Participant,
        session: &Session,
        prompt: Option<MessageId>,
    ) -> Session {
        self.discard_all(who.chat_id, prompt.into_iter().chain(session.cleanup.iter().copied()))
            .await;

        Session::new(None)
    }

    async fn on_back(
        &self,
        who: &Participant,
        session: &Session,
        prompt: Option<MessageId>,
    ) -> Result<Session, DialogError> {
        let mut cleanup = session.cleanup.clone();
        let prompt = self
            .show_prompt(
                who.chat_id,
                prompt,
                presentation::TIME_PROMPT,
                &presentation::time_options(&self.time_offsets),
                &mut cleanup,
            )
            .await?;

        Ok(Session {
            state: DialogState::ChooseTimeOption,
            prompt: Some(prompt),
            cleanup,
        })
    }

    async fn on_type_chosen(
        &self,
        who: &Participant,
        session: &Session,
        feeding_at: chrono::DateTime<chrono_tz::Tz>,
        feeding_type: FeedingType,
        prompt: Option<MessageId>,
    ) -> Result<Session, DialogError> {
        let username = who
            .username
            .as_deref()
            .ok_or(DialogError::MissingUsername(who.user_id))?;

        let user = User::get_or_create(&self.db.pool, username, who.user_id).await?;
        FeedingLog::append(&self.db.pool, user.id, feeding_at, feeding_type).await?;

        // The record is committed; from here on delivery problems are only logged.
        let confirmation =
            presentation::feeding_logged(&self.timezone.to_user(&feeding_at), feeding_type);
        self.notify(who.chat_id, &confirmation, None).await;
        self.discard_all(who.chat_id, prompt.into_iter().chain(session.cleanup.iter().copied()))
            .await;
        let menu = self
            .notify(who.chat_id, presentation::ADD_MORE, Some(&presentation::main_menu()))
            .await;

        Ok(Session::new(menu))
    }

    async fn reprompt(
        &self,
        who: &Participant,
        session: &Session,
        prompt: Option<MessageId>,
    ) -> Result<Session, DialogError> {
        let (text, keyboard) = match session.state {
            DialogState::ChoosingAction => {
                (presentation::INVALID_ACTION.to_string(), presentation::main_menu())
            }
            DialogState::ChooseTimeOption => (
                format!("{}\n{}", presentation::INVALID_TIME, presentation::TIME_PROMPT),
                presentation::time_options(&self.time_offsets),
            ),
            DialogState::ChooseFeedingType { .. } => (
                format!("{}\n{}", presentation::INVALID_TYPE, presentation::TYPE_PROMPT),
                presentation::feeding_types(),
            ),
        };

        let mut cleanup = session.cleanup.clone();
        let prompt = self
            .show_prompt(who.chat_id, prompt, &text, &keyboard, &mut cleanup)
            .await?;

        Ok(Session {
            state: session.state.clone(),
            prompt: Some(prompt),
            cleanup,
        })
    }

    async fn last_feeding_text(&self, who: &Participant) -> Result<String, DialogError> {
        let Some(username) = who.username.as_deref() else {
            return Ok(presentation::NO_RECORDS.to_string());
        };

        let last =
            FeedingLog::last_for_username(&self.db.pool, username, self.timezone.storage_tz())
                .await?;

        Ok(match last {
            Some(record) => presentation::last_feeding_summary(
                &self.timezone.to_user(&record.timestamp),
                record.feeding_type,
                self.timezone.elapsed_since(&record.timestamp),
            ),
            None => presentation::NO_RECORDS.to_string(),
        })
    }

    async fn daily_stats_text(&self, who: &Participant) -> Result<String, DialogError> {
        let Some(username) = who.username.as_deref() else {
            return Ok(presentation::NO_RECORDS_24H.to_string());
        };

        let since = self.timezone.now_utc() - Duration::hours(24);
        let records = FeedingLog::since_for_username(
            &self.db.pool,
            username,
            since,
            self.timezone.storage_tz(),
        )
        .await?;

        Ok(presentation::daily_stats(&records, self.timezone.user_tz()))
    }

    /// Puts `text` with `keyboard` on screen, editing `prompt` when possible.
    ///
    /// A prompt that cannot be edited (deleted, too old) is queued for cleanup
    /// and a fresh message is sent instead.
    async fn show_prompt(
        &self,
        chat_id: ChatId,
        prompt: Option<MessageId>,
        text: &str,
        keyboard: &Keyboard,
        cleanup: &mut Vec<MessageId>,
    ) -> Result<MessageId, DialogError> {
        if let Some(message_id) = prompt {
            match self
                .messenger
                .edit_text(chat_id, message_id, text, Some(keyboard))
                .await
            {
                Ok(()) => return Ok(message_id),
                Err(e) => {
                    log_delivery_error("edit", chat_id.0, &e.to_string());
                    cleanup.push(message_id);
                }
            }
        }

        self.messenger
            .send_text(chat_id, text, Some(keyboard))
            .await
            .map_err(DialogError::Transport)
    }

    async fn notify(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Option<MessageId> {
        match self.messenger.send_text(chat_id, text, keyboard).await {
            Ok(id) => Some(id),
            Err(e) => {
                log_delivery_error("send", chat_id.0, &e.to_string());
                None
            }
        }
    }

    async fn discard(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.messenger.delete(chat_id, message_id).await {
            log_delivery_error("delete", chat_id.0, &e.to_string());
        }
    }

    async fn discard_all(&self, chat_id: ChatId, messages: impl IntoIterator<Item = MessageId>) {
        let mut seen = Vec::new();
        for message_id in messages {
            if !seen.contains(&message_id) {
                seen.push(message_id);
                self.discard(chat_id, message_id).await;
            }
        }
    }
}
