//! Handlers registered in the teloxide Dispatcher.

use std::sync::Arc;

use countdown_core::MessageRef;
use teloxide::prelude::*;
use tracing::debug;

use crate::{
    context::{ChatCommand, TelegramContext},
    keyboard::{self, Action},
};

pub const WELCOME: &str = "Welcome! Set a countdown below, or send /countdown 10 minutes.";

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Chat(ChatCommand<'a>),
}

/// Parse `/name[@bot] [args]`. Unknown commands yield `None`.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);

    match name.to_ascii_lowercase().as_str() {
        "start" | "help" => Some(Command::Start),
        "countdown" => Some(Command::Chat(ChatCommand::Countdown(args))),
        "cancel" => Some(Command::Chat(ChatCommand::CancelAll)),
        "countdowns" | "list" => Some(Command::Chat(ChatCommand::List)),
        _ => None,
    }
}

/// Message handler. Commands first, then plain text.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    ctx: Arc<TelegramContext>,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat = msg.chat.id.0;
    let user = from.id.0;
    let anchor = i64::from(msg.id.0);

    match parse_command(text) {
        Some(Command::Start) => {
            bot.send_message(msg.chat.id, WELCOME)
                .reply_markup(keyboard::welcome())
                .await?;
        }
        Some(Command::Chat(command)) => ctx.on_command(chat, user, anchor, command).await,
        // Someone else's command.
        None if text.starts_with('/') => {}
        None => {
            ctx.on_text(chat, user, anchor, text, msg.chat.is_private())
                .await
        }
    }
    Ok(())
}

/// Inline button handler. Always answers the query so the client stops
/// spinning, with a short notice when there is something to say.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<TelegramContext>,
) -> ResponseResult<()> {
    let action = q.data.as_deref().and_then(|d| d.parse::<Action>().ok());
    let message = q
        .message
        .as_ref()
        .map(|m| MessageRef::new(m.chat().id.0, i64::from(m.id().0)));

    let notice = match (action, message) {
        (Some(action), Some(message)) => {
            ctx.press(message.conversation.0, q.from.id.0, message, action)
                .await
        }
        _ => {
            debug!(data = ?q.data, "Telegram: ignoring unusable callback");
            String::new()
        }
    };

    let mut answer = bot.answer_callback_query(q.id.clone());
    if !notice.is_empty() {
        answer = answer.text(notice);
    }
    answer.await?;
    Ok(())
}
