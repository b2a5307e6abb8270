//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives long polling until the
//! shutdown signal flips.

use std::sync::Arc;

use countdown_core::config::TelegramConfig;
use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::info;

use crate::{
    context::TelegramContext,
    error::TelegramError,
    handler::{handle_callback, handle_message},
};

pub struct TelegramAdapter {
    bot: Bot,
    ctx: Arc<TelegramContext>,
}

impl TelegramAdapter {
    /// Build the bot client. The same client backs the transport and the
    /// adapter.
    pub fn bot(config: &TelegramConfig) -> Result<Bot, TelegramError> {
        if config.bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        Ok(Bot::new(&config.bot_token))
    }

    pub fn new(bot: Bot, ctx: Arc<TelegramContext>) -> Self {
        Self { bot, ctx }
    }

    /// Run the long-polling dispatcher until `shutdown` becomes `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handle_message))
            .branch(Update::filter_callback_query().endpoint(handle_callback));

        let mut dispatcher = Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.ctx])
            .default_handler(|_upd| async {})
            .build();

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            if let Ok(stopped) = token.shutdown() {
                stopped.await;
            }
        });

        info!("Telegram: starting long-polling dispatcher");
        dispatcher.dispatch().await;
        info!("Telegram: dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_refused() {
        let config = TelegramConfig {
            bot_token: "  ".into(),
        };
        assert!(matches!(
            TelegramAdapter::bot(&config),
            Err(TelegramError::NoToken)
        ));
    }
}
