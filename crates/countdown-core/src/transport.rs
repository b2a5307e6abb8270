use async_trait::async_trait;

use crate::{
    error::TransportError,
    types::{ConversationId, MessageRef, View},
};

/// Outbound side of a messaging platform, as seen by the timer engine.
///
/// Implementations must be `Send + Sync`: one instance is shared by every tick
/// loop and by the control dispatcher. None of the methods retry; callers decide
/// what a failure means for them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a new message into `conversation` and return a handle to it.
    async fn send_message(
        &self,
        conversation: ConversationId,
        view: &View,
    ) -> Result<MessageRef, TransportError>;

    /// Replace the content (and inline controls) of an existing message.
    async fn edit_message(&self, message: &MessageRef, view: &View) -> Result<(), TransportError>;

    /// Delete a message previously sent by the bot.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError>;

    /// Pin a message in its conversation without notifying members.
    async fn pin_message(&self, message: &MessageRef) -> Result<(), TransportError>;
}
