use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform identifier of a conversation (chat, channel, group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform identifier of a single message inside a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one independent countdown slot.
///
/// Derived from the conversation *and* the message that anchors the countdown
/// (the user's request), so several countdowns can run side by side in the same
/// conversation without clobbering each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub conversation: ConversationId,
    pub anchor: MessageId,
}

impl SessionKey {
    pub fn new(conversation: i64, anchor: i64) -> Self {
        Self {
            conversation: ConversationId(conversation),
            anchor: MessageId(anchor),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation, self.anchor)
    }
}

/// Opaque handle to a message the bot can edit, delete or pin.
///
/// The engine never looks inside; only the display layer and the transport
/// implementation interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub conversation: ConversationId,
    pub message: MessageId,
}

impl MessageRef {
    pub fn new(conversation: i64, message: i64) -> Self {
        Self {
            conversation: ConversationId(conversation),
            message: MessageId(message),
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.conversation, self.message)
    }
}

/// Which inline controls a rendered message should carry.
///
/// Platforms that drop inline keyboards on every edit (Telegram does) need to
/// re-attach them, so the hint travels with each view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controls {
    /// Plain message, no buttons.
    #[default]
    None,
    /// Confirm / Modify for a pending proposal.
    Proposal,
    /// Pause / Cancel for a ticking countdown.
    Running,
    /// Resume / Cancel for a paused countdown.
    Paused,
}

/// A rendered message: text plus the controls to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub text: String,
    #[serde(default)]
    pub controls: Controls,
}

impl View {
    pub fn new(text: impl Into<String>, controls: Controls) -> Self {
        Self {
            text: text.into(),
            controls,
        }
    }

    /// A view without any inline controls.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Controls::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_in_same_conversation_do_not_collide() {
        let a = SessionKey::new(-100, 1);
        let b = SessionKey::new(-100, 2);
        assert_ne!(a, b);

        let set: HashSet<_> = [a, b, SessionKey::new(-100, 1)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn session_key_display() {
        assert_eq!(SessionKey::new(-42, 7).to_string(), "-42/7");
    }

    #[test]
    fn view_controls_default_to_none_when_absent() {
        let view: View = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(view.controls, Controls::None);
    }
}
