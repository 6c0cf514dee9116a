use std::sync::Arc;
use teloxide::prelude::*;

use super::{participant, HandlerResult};
use crate::bot::dialog::state::DialogInput;
use crate::bot::dialog::FeedingDialog;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialog: Arc<FeedingDialog>,
) -> HandlerResult {
    // Always acknowledge so the client stops its spinner.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        tracing::warn!("Failed to answer callback query {}: {}", q.id, e);
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or(ChatId(q.from.id.0 as i64));
    let origin = q.message.as_ref().map(|m| m.id);
    let who = participant(&q.from, chat_id);

    tracing::info!(
        "Callback received: '{}' from user {:?} ({}) in chat {}",
        data,
        who.username,
        who.user_id,
        chat_id.0
    );

    dialog
        .process(&who, DialogInput::from_callback_data(data), origin)
        .await;
    Ok(())
}
