pub mod callback;
pub mod message;

use std::sync::Arc;
use teloxide::{dispatching::UpdateHandler, prelude::*};

use crate::bot::dialog::{FeedingDialog, Participant};
use crate::bot::dialog::state::is_done_phrase;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), HandlerError>;

pub struct BotHandler {
    pub dialog: Arc<FeedingDialog>,
}

impl BotHandler {
    pub fn new(dialog: Arc<FeedingDialog>) -> Self {
        Self { dialog }
    }

    pub fn schema(&self) -> UpdateHandler<HandlerError> {
        use teloxide::dispatching::UpdateFilterExt;

        let dialog_cmd = self.dialog.clone();
        let dialog_done = self.dialog.clone();
        let dialog_text = self.dialog.clone();
        let dialog_callback = self.dialog.clone();

        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<crate::bot::commands::Command>()
                    .endpoint(move |bot, msg, cmd| {
                        let dialog = dialog_cmd.clone();
                        async move { message::command_handler(bot, msg, cmd, dialog).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().map(is_done_phrase).unwrap_or(false))
                    .endpoint(move |msg| {
                        let dialog = dialog_done.clone();
                        async move { message::done_handler(msg, dialog).await }
                    }),
            )
            .branch(Update::filter_message().endpoint(move |msg| {
                let dialog = dialog_text.clone();
                async move { message::text_handler(msg, dialog).await }
            }))
            .branch(Update::filter_callback_query().endpoint(move |bot, q| {
                let dialog = dialog_callback.clone();
                async move { callback::callback_handler(bot, q, dialog).await }
            }))
    }
}

/// Builds a [`Participant`] for a Telegram user in a chat.
pub fn participant(user: &teloxide::types::User, chat_id: ChatId) -> Participant {
    Participant {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        chat_id,
    }
}
