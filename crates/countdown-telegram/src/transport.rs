//! [`Transport`] over the Telegram Bot API.

use async_trait::async_trait;
use countdown_core::{ConversationId, MessageRef, Transport, TransportError, View};
use teloxide::{
    prelude::*,
    types::{MessageId, ReplyMarkup},
    ApiError, RequestError,
};

use crate::{error::TelegramError, keyboard};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn telegram_id(message: &MessageRef) -> Result<(ChatId, MessageId), TelegramError> {
    let id = i32::try_from(message.message.0)
        .map_err(|_| TelegramError::MessageIdOutOfRange(message.message.0))?;
    Ok((ChatId(message.conversation.0), MessageId(id)))
}

fn failed(err: impl Into<TelegramError>) -> TransportError {
    TransportError::from(err.into())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        conversation: ConversationId,
        view: &View,
    ) -> Result<MessageRef, TransportError> {
        let mut request = self.bot.send_message(ChatId(conversation.0), &view.text);
        if let Some(markup) = keyboard::markup(view.controls) {
            request = request.reply_markup(ReplyMarkup::InlineKeyboard(markup));
        }
        let sent = request.await.map_err(failed)?;
        Ok(MessageRef::new(sent.chat.id.0, i64::from(sent.id.0)))
    }

    /// Editing without a keyboard removes the old one, which is what terminal
    /// views want.
    async fn edit_message(&self, message: &MessageRef, view: &View) -> Result<(), TransportError> {
        let (chat, id) = telegram_id(message).map_err(failed)?;
        let mut request = self.bot.edit_message_text(chat, id, &view.text);
        if let Some(markup) = keyboard::markup(view.controls) {
            request = request.reply_markup(markup);
        }
        match request.await {
            Ok(_) => Ok(()),
            // Same text as before (e.g. a re-render while paused): nothing to do.
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(failed(e)),
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        let (chat, id) = telegram_id(message).map_err(failed)?;
        self.bot.delete_message(chat, id).await.map_err(failed)?;
        Ok(())
    }

    async fn pin_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        let (chat, id) = telegram_id(message).map_err(failed)?;
        self.bot
            .pin_chat_message(chat, id)
            .disable_notification(true)
            .await
            .map_err(failed)?;
        Ok(())
    }
}
