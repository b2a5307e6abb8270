//! Inline keyboards for the countdown messages.
//!
//! Callback data carries only the action. The message a button sits on tells
//! the handler which proposal or countdown it belongs to.

use countdown_core::Controls;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// What a button press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Ask the user for a duration.
    SetCountdown,
    Confirm,
    Modify,
    Pause,
    Resume,
    Cancel,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::SetCountdown => "set",
            Action::Confirm => "confirm",
            Action::Modify => "modify",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Cancel => "cancel",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Action::SetCountdown),
            "confirm" => Ok(Action::Confirm),
            "modify" => Ok(Action::Modify),
            "pause" => Ok(Action::Pause),
            "resume" => Ok(Action::Resume),
            "cancel" => Ok(Action::Cancel),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

fn button(label: &str, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.as_str())
}

/// Keyboard for a view's controls; `None` means the message carries no buttons.
pub fn markup(controls: Controls) -> Option<InlineKeyboardMarkup> {
    let row = match controls {
        Controls::None => return None,
        Controls::Proposal => vec![
            button("✅ Confirm", Action::Confirm),
            button("✏️ Modify", Action::Modify),
        ],
        Controls::Running => vec![
            button("⏸ Pause", Action::Pause),
            button("❌ Cancel", Action::Cancel),
        ],
        Controls::Paused => vec![
            button("▶️ Resume", Action::Resume),
            button("❌ Cancel", Action::Cancel),
        ],
    };
    Some(InlineKeyboardMarkup::new([row]))
}

/// The single button under the welcome message.
pub fn welcome() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[button("⏱ Set Countdown", Action::SetCountdown)]])
}
