//! Chat-side state of the bot and the actions behind commands and buttons.
//!
//! Everything here talks to the chat through [`Transport`], so it runs the same
//! against Telegram and against a test double. The teloxide glue lives in
//! [`crate::handler`].

use std::sync::Arc;

use countdown_core::{ConversationId, MessageRef, SessionKey, Transport, View};
use countdown_timer::{views, ControlDispatcher, InboundIntent, Intent, Outcome, TimerError};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::keyboard::Action;

pub const ENTER_DURATION: &str = "Enter countdown duration (e.g. 2 hours 30 minutes):";
pub const ENTER_NEW_DURATION: &str = "Enter the new duration:";

/// Slash commands other than `/start` and `/help`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    /// `/countdown [text]`; empty text asks for a duration.
    Countdown(&'a str),
    /// `/cancel`: every live countdown in the chat.
    CancelAll,
    /// `/countdowns`
    List,
}

/// What a user's next plain message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    Duration,
    Modify(SessionKey),
}

pub struct TelegramContext {
    dispatcher: Arc<ControlDispatcher>,
    transport: Arc<dyn Transport>,
    /// Proposal prompt message → proposal key.
    prompts: DashMap<MessageRef, SessionKey>,
    /// (chat, user) → pending input.
    awaiting: DashMap<(i64, u64), Awaiting>,
}

impl TelegramContext {
    pub fn new(dispatcher: Arc<ControlDispatcher>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dispatcher,
            transport,
            prompts: DashMap::new(),
            awaiting: DashMap::new(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ControlDispatcher> {
        &self.dispatcher
    }

    pub fn awaiting(&self, chat: i64, user: u64) -> Option<Awaiting> {
        self.awaiting.get(&(chat, user)).map(|a| *a.value())
    }

    async fn reply(&self, chat: i64, text: impl Into<String>) {
        let view = View::plain(text);
        if let Err(e) = self.transport.send_message(ConversationId(chat), &view).await {
            warn!(chat, error = %e, "Telegram: failed to send reply");
        }
    }

    /// A plain (non-command) message. Private chats treat any text as a
    /// countdown request; groups only answer when input was asked for.
    pub async fn on_text(&self, chat: i64, user: u64, anchor: i64, text: &str, private: bool) {
        match self.awaiting.remove(&(chat, user)).map(|(_, a)| a) {
            Some(Awaiting::Modify(key)) => {
                if !self.revise(key, text).await {
                    self.awaiting.insert((chat, user), Awaiting::Modify(key));
                }
            }
            Some(Awaiting::Duration) => {
                if !self.offer(SessionKey::new(chat, anchor), text).await {
                    self.awaiting.insert((chat, user), Awaiting::Duration);
                }
            }
            None if private => {
                self.offer(SessionKey::new(chat, anchor), text).await;
            }
            None => {}
        }
    }

    pub async fn on_command(&self, chat: i64, user: u64, anchor: i64, command: ChatCommand<'_>) {
        match command {
            ChatCommand::Countdown(text) if text.trim().is_empty() => {
                self.awaiting.insert((chat, user), Awaiting::Duration);
                self.reply(chat, ENTER_DURATION).await;
            }
            ChatCommand::Countdown(text) => {
                self.offer(SessionKey::new(chat, anchor), text).await;
            }
            ChatCommand::CancelAll => {
                let cancelled = self.dispatcher.cancel_all(ConversationId(chat)).await;
                let text = match cancelled.len() {
                    0 => "No active countdown here.".to_string(),
                    1 => "Cancelled 1 countdown.".to_string(),
                    n => format!("Cancelled {n} countdowns."),
                };
                self.reply(chat, text).await;
            }
            ChatCommand::List => {
                let view = views::listing(&self.dispatcher.list(ConversationId(chat)));
                self.reply(chat, view.text).await;
            }
        }
    }

    /// Propose a countdown and post the confirmation prompt. Returns whether
    /// the text was accepted.
    pub async fn offer(&self, key: SessionKey, text: &str) -> bool {
        let proposal = match self.dispatcher.propose(key, text) {
            Ok(p) => p,
            Err(e) => {
                self.reply(key.conversation.0, e.user_message()).await;
                return false;
            }
        };
        let view = views::proposal(proposal.seconds, proposal.label.as_deref());
        match self.transport.send_message(key.conversation, &view).await {
            Ok(prompt) => {
                self.prompts
                    .retain(|_, k| self.dispatcher.proposal(k).is_some());
                self.prompts.insert(prompt, key);
            }
            Err(e) => warn!(key = %key, error = %e, "Telegram: failed to post proposal"),
        }
        true
    }

    /// Apply a modification and refresh the prompt in place.
    async fn revise(&self, key: SessionKey, text: &str) -> bool {
        let proposal = match self.dispatcher.modify(key, text) {
            Ok(p) => p,
            Err(e @ TimerError::InvalidDuration(_)) => {
                self.reply(key.conversation.0, e.user_message()).await;
                return false;
            }
            Err(e) => {
                self.reply(key.conversation.0, e.user_message()).await;
                return true;
            }
        };
        let view = views::proposal(proposal.seconds, proposal.label.as_deref());
        let prompt = self
            .prompts
            .iter()
            .find(|e| *e.value() == key)
            .map(|e| *e.key());
        let result = match prompt {
            Some(prompt) => self.transport.edit_message(&prompt, &view).await,
            None => self
                .transport
                .send_message(key.conversation, &view)
                .await
                .map(|prompt| {
                    self.prompts.insert(prompt, key);
                }),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Telegram: failed to refresh proposal");
        }
        true
    }

    /// A button press on `message`. Returns the short notice shown to the
    /// presser (empty for none).
    pub async fn press(&self, chat: i64, user: u64, message: MessageRef, action: Action) -> String {
        debug!(chat, user, action = action.as_str(), "Telegram: button pressed");
        match action {
            Action::SetCountdown => {
                self.awaiting.insert((chat, user), Awaiting::Duration);
                self.reply(chat, ENTER_DURATION).await;
                String::new()
            }
            Action::Confirm => {
                let Some(key) = self.prompts.get(&message).map(|k| *k.value()) else {
                    return "This proposal has expired.".to_string();
                };
                let intent = InboundIntent::new(key, Intent::Confirm { display: message });
                match self.dispatcher.dispatch(intent).await {
                    Ok(_) => {
                        self.prompts.remove(&message);
                        "Countdown started!".to_string()
                    }
                    Err(e) => e.user_message(),
                }
            }
            Action::Modify => {
                let Some(key) = self.prompts.get(&message).map(|k| *k.value()) else {
                    return "This proposal has expired.".to_string();
                };
                self.awaiting.insert((chat, user), Awaiting::Modify(key));
                self.reply(chat, ENTER_NEW_DURATION).await;
                String::new()
            }
            Action::Pause | Action::Resume | Action::Cancel => {
                let registry = self.dispatcher.engine().registry();
                let Some(timer) = registry.find_by_display(&message) else {
                    return TimerError::NotFound {
                        key: message.to_string(),
                    }
                    .user_message();
                };
                let intent = match action {
                    Action::Pause => Intent::Pause,
                    Action::Resume => Intent::Resume,
                    _ => Intent::Cancel,
                };
                match self.dispatcher.dispatch(InboundIntent::new(timer.key, intent)).await {
                    Ok(Outcome::Paused(_)) => "Countdown paused.".to_string(),
                    Ok(Outcome::Resumed(_)) => "Countdown resumed.".to_string(),
                    Ok(_) => "Countdown cancelled.".to_string(),
                    Err(e) => e.user_message(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use countdown_core::{config::TimerConfig, TransportError};
    use countdown_timer::{DisplayAdapter, TimerEngine, TimerRegistry, TimerState};

    use super::*;

    const CHAT: i64 = 77;
    const USER: u64 = 5;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<View>>,
        edited: Mutex<Vec<(MessageRef, View)>>,
    }

    impl Outbox {
        fn last_sent(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().text.clone()
        }
    }

    #[async_trait]
    impl Transport for Outbox {
        async fn send_message(
            &self,
            conversation: ConversationId,
            view: &View,
        ) -> Result<MessageRef, TransportError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(view.clone());
            Ok(MessageRef::new(conversation.0, 1_000 + sent.len() as i64))
        }

        async fn edit_message(&self, message: &MessageRef, view: &View) -> Result<(), TransportError> {
            self.edited.lock().unwrap().push((*message, view.clone()));
            Ok(())
        }

        async fn delete_message(&self, _message: &MessageRef) -> Result<(), TransportError> {
            Ok(())
        }

        async fn pin_message(&self, _message: &MessageRef) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn context() -> (Arc<Outbox>, TelegramContext) {
        let outbox = Arc::new(Outbox::default());
        let config = TimerConfig {
            pin: false,
            ..TimerConfig::default()
        };
        let registry = Arc::new(TimerRegistry::new());
        let display = Arc::new(DisplayAdapter::new(
            outbox.clone(),
            Arc::clone(&registry),
            &config,
        ));
        let engine = Arc::new(TimerEngine::new(registry, display, config));
        let dispatcher = Arc::new(ControlDispatcher::new(engine));
        (outbox.clone(), TelegramContext::new(dispatcher, outbox))
    }

    /// The prompt is the most recent message the bot sent.
    fn prompt_ref(outbox: &Outbox) -> MessageRef {
        MessageRef::new(CHAT, 1_000 + outbox.sent.lock().unwrap().len() as i64)
    }

    #[tokio::test(start_paused = true)]
    async fn private_text_proposes_and_confirm_starts() {
        let (outbox, ctx) = context();
        ctx.on_text(CHAT, USER, 10, "2 minutes quiz starts", true).await;
        assert_eq!(outbox.last_sent(), "Set countdown for 2 minutes (quiz starts)?");

        let prompt = prompt_ref(&outbox);
        let notice = ctx.press(CHAT, USER, prompt, Action::Confirm).await;
        assert_eq!(notice, "Countdown started!");

        let registry = ctx.dispatcher().engine().registry();
        let timer = registry.find_by_display(&prompt).unwrap();
        assert_eq!(timer.key, SessionKey::new(CHAT, 10));
        assert_eq!(timer.state, TimerState::Running);

        let again = ctx.press(CHAT, USER, prompt, Action::Confirm).await;
        assert_eq!(again, "This proposal has expired.");
    }

    #[tokio::test(start_paused = true)]
    async fn group_text_is_ignored_unless_asked_for() {
        let (outbox, ctx) = context();
        ctx.on_text(CHAT, USER, 10, "5 minutes", false).await;
        assert!(outbox.sent.lock().unwrap().is_empty());

        ctx.on_command(CHAT, USER, 11, ChatCommand::Countdown("")).await;
        assert_eq!(outbox.last_sent(), ENTER_DURATION);
        assert_eq!(ctx.awaiting(CHAT, USER), Some(Awaiting::Duration));

        ctx.on_text(CHAT, USER, 12, "5 minutes", false).await;
        assert_eq!(outbox.last_sent(), "Set countdown for 5 minutes?");
        assert_eq!(ctx.awaiting(CHAT, USER), None);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_duration_keeps_waiting_for_input() {
        let (outbox, ctx) = context();
        ctx.press(CHAT, USER, MessageRef::new(CHAT, 1), Action::SetCountdown)
            .await;
        ctx.on_text(CHAT, USER, 10, "whenever", false).await;
        assert!(outbox.last_sent().starts_with("Invalid time format!"));
        assert_eq!(ctx.awaiting(CHAT, USER), Some(Awaiting::Duration));
    }

    #[tokio::test(start_paused = true)]
    async fn modify_button_edits_the_prompt_in_place() {
        let (outbox, ctx) = context();
        ctx.on_text(CHAT, USER, 10, "2 minutes", true).await;
        let prompt = prompt_ref(&outbox);

        ctx.press(CHAT, USER, prompt, Action::Modify).await;
        assert_eq!(outbox.last_sent(), ENTER_NEW_DURATION);
        ctx.on_text(CHAT, USER, 11, "10 minutes", true).await;

        let edited = outbox.edited.lock().unwrap().clone();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].0, prompt);
        assert_eq!(edited[0].1.text, "Set countdown for 10 minutes?");

        ctx.press(CHAT, USER, prompt, Action::Confirm).await;
        let timer = ctx
            .dispatcher()
            .engine()
            .registry()
            .get(&SessionKey::new(CHAT, 10))
            .unwrap();
        assert_eq!(timer.total_seconds, 600);
    }

    #[tokio::test(start_paused = true)]
    async fn control_buttons_drive_the_timer() {
        let (outbox, ctx) = context();
        ctx.on_command(CHAT, USER, 10, ChatCommand::Countdown("1 hour"))
            .await;
        let prompt = prompt_ref(&outbox);
        ctx.press(CHAT, USER, prompt, Action::Confirm).await;

        assert_eq!(ctx.press(CHAT, USER, prompt, Action::Pause).await, "Countdown paused.");
        assert_eq!(
            ctx.press(CHAT, USER, prompt, Action::Pause).await,
            "The countdown is already paused."
        );
        assert_eq!(ctx.press(CHAT, USER, prompt, Action::Resume).await, "Countdown resumed.");
        assert_eq!(ctx.press(CHAT, USER, prompt, Action::Cancel).await, "Countdown cancelled.");
        assert_eq!(
            ctx.press(CHAT, USER, prompt, Action::Cancel).await,
            "No active countdown here."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_and_list_report_counts() {
        let (outbox, ctx) = context();
        for anchor in [10, 20] {
            ctx.on_command(CHAT, USER, anchor, ChatCommand::Countdown("1 hour"))
                .await;
            let prompt = prompt_ref(&outbox);
            ctx.press(CHAT, USER, prompt, Action::Confirm).await;
        }

        ctx.on_command(CHAT, USER, 30, ChatCommand::List).await;
        assert!(outbox.last_sent().starts_with("Active countdowns (2):"));

        ctx.on_command(CHAT, USER, 31, ChatCommand::CancelAll).await;
        assert_eq!(outbox.last_sent(), "Cancelled 2 countdowns.");
        ctx.on_command(CHAT, USER, 32, ChatCommand::CancelAll).await;
        assert_eq!(outbox.last_sent(), "No active countdown here.");
    }
}
