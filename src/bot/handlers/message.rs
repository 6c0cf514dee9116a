use std::sync::Arc;
use teloxide::prelude::*;

use super::{participant, HandlerResult};
use crate::bot::commands::Command;
use crate::bot::dialog::state::DialogInput;
use crate::bot::dialog::FeedingDialog;
use crate::bot::presentation;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialog: Arc<FeedingDialog>,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let who = participant(user, msg.chat.id);

    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, presentation::HELP).await?;
        }
        Command::Start => {
            dialog.process(&who, DialogInput::Start, None).await;
        }
        Command::Done => {
            dialog.process(&who, DialogInput::Done, None).await;
        }
    }
    Ok(())
}

/// The "Done" phrase typed as plain text.
pub async fn done_handler(msg: Message, dialog: Arc<FeedingDialog>) -> HandlerResult {
    if let Some(user) = msg.from() {
        let who = participant(user, msg.chat.id);
        dialog.process(&who, DialogInput::Done, None).await;
    }
    Ok(())
}

/// Any other text: the dialog re-prompts if a conversation is active.
pub async fn text_handler(msg: Message, dialog: Arc<FeedingDialog>) -> HandlerResult {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    let who = participant(user, msg.chat.id);
    dialog
        .process(&who, DialogInput::Unrecognized(text.to_string()), None)
        .await;
    Ok(())
}
