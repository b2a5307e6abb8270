//! `countdown-core` — shared vocabulary for the countdown workspace.
//!
//! Holds the configuration loader, the strongly-typed identifiers every other
//! crate keys on ([`SessionKey`], [`MessageRef`]) and the [`Transport`] trait
//! through which the timer engine reaches a messaging platform.

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::CountdownConfig;
pub use error::{CoreError, TransportError};
pub use transport::Transport;
pub use types::{Controls, ConversationId, MessageId, MessageRef, SessionKey, View};
