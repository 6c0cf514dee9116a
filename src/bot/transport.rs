//! The few outbound operations the dialog and the reminder job need.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::bot::presentation::Keyboard;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a message and returns its id.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<MessageId>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<()>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()>;
}

pub fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl Messenger for Bot {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<MessageId> {
        let mut request = self.send_message(chat_id, text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(keyboard));
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<()> {
        let mut request = self.edit_message_text(chat_id, message_id, text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(keyboard));
        }
        request.await?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.delete_message(chat_id, message_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::presentation::main_menu;

    #[test]
    fn test_inline_markup_keeps_layout() {
        let markup = inline_markup(&main_menu());
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert!(markup.inline_keyboard.iter().all(|row| row.len() == 1));
        assert_eq!(markup.inline_keyboard[0][0].text, "Записать кормление");
    }
}
