//! `countdown-timer` — live countdowns rendered by editing one chat message.
//!
//! # Overview
//!
//! A user's text is parsed into a [`types::Proposal`]; on confirmation the
//! [`dispatcher::ControlDispatcher`] creates a timer in the
//! [`registry::TimerRegistry`] and the [`engine::TimerEngine`] spawns one tick
//! loop for it. Every second the loop decrements the timer and asks the
//! [`display::DisplayAdapter`] to edit the display message through a
//! [`countdown_core::Transport`].
//!
//! # Lifecycle
//!
//! | State       | Loop alive | In registry | Reached from                  |
//! |-------------|------------|-------------|-------------------------------|
//! | `Pending`   | no         | yes         | confirm (momentarily)         |
//! | `Running`   | yes        | yes         | confirm, resume               |
//! | `Paused`    | yes        | yes         | pause                         |
//! | `Completed` | no         | no          | zero reached, display lost    |
//! | `Cancelled` | no         | no          | cancel                        |
//!
//! Live timers can be snapshotted to SQLite with [`store::TimerStore`] and
//! restored on the next start.

pub mod db;
pub mod dispatcher;
pub mod display;
pub mod duration;
pub mod engine;
pub mod error;
pub mod registry;
pub mod store;
pub mod types;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{ControlDispatcher, InboundIntent, Intent, Outcome};
pub use display::{DisplayAdapter, Rendered};
pub use duration::{format_compact, format_duration, parse_duration, ParsedDuration, MAX_SECONDS};
pub use engine::TimerEngine;
pub use error::{DurationError, Result, TimerError};
pub use registry::{Advance, TimerRegistry};
pub use store::TimerStore;
pub use types::{Proposal, Timer, TimerRecord, TimerState};
