//! Control dispatcher: routes user intents to the registry and the engine.
//!
//! Proposals (parsed but unconfirmed countdowns) live here, not in the
//! registry. Confirm holds the proposal's map entry while it creates the timer,
//! so two confirms of the same proposal, or a confirm racing a modify, resolve
//! to exactly one outcome. Lock order is always proposals, then registry.

use std::sync::Arc;

use countdown_core::{ConversationId, MessageRef, SessionKey};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    duration::parse_duration,
    engine::TimerEngine,
    error::{Result, TimerError},
    types::{Proposal, Timer, TimerState},
    views,
};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Parse `text` into a new proposal.
    Propose { text: String },
    /// Replace the duration of a waiting proposal.
    Modify { text: String },
    /// Start the proposal; `display` is the message that will show the countdown.
    Confirm { display: MessageRef },
    Pause,
    Resume,
    Cancel,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Propose { .. } => "propose",
            Intent::Modify { .. } => "modify",
            Intent::Confirm { .. } => "confirm",
            Intent::Pause => "pause",
            Intent::Resume => "resume",
            Intent::Cancel => "cancel",
        }
    }
}

/// An intent addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundIntent {
    pub key: SessionKey,
    pub intent: Intent,
}

impl InboundIntent {
    pub fn new(key: SessionKey, intent: Intent) -> Self {
        Self { key, intent }
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Proposed(Proposal),
    Modified(Proposal),
    Started(Timer),
    Paused(Timer),
    Resumed(Timer),
    Cancelled(Timer),
}

pub struct ControlDispatcher {
    engine: Arc<TimerEngine>,
    proposals: DashMap<SessionKey, Proposal>,
}

impl ControlDispatcher {
    pub fn new(engine: Arc<TimerEngine>) -> Self {
        Self {
            engine,
            proposals: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<TimerEngine> {
        &self.engine
    }

    pub async fn dispatch(&self, inbound: InboundIntent) -> Result<Outcome> {
        let InboundIntent { key, intent } = inbound;
        let name = intent.name();
        let outcome = match intent {
            Intent::Propose { text } => self.propose(key, &text).map(Outcome::Proposed),
            Intent::Modify { text } => self.modify(key, &text).map(Outcome::Modified),
            Intent::Confirm { display } => self.confirm(key, display).map(Outcome::Started),
            Intent::Pause => self.pause(key).map(Outcome::Paused),
            Intent::Resume => self.resume(key).map(Outcome::Resumed),
            Intent::Cancel => self.cancel(key).await.map(Outcome::Cancelled),
        };
        if let Err(e) = &outcome {
            debug!(key = %key, intent = name, code = e.code(), "intent refused: {e}");
        }
        outcome
    }

    /// Parse `text` and store it as the proposal for `key`, replacing any
    /// earlier one. Expired proposals are dropped first.
    pub fn propose(&self, key: SessionKey, text: &str) -> Result<Proposal> {
        let parsed = parse_duration(text)?;
        self.prune_proposals();

        let proposal = Proposal {
            key,
            seconds: parsed.seconds,
            label: parsed.label,
            created_at: Instant::now(),
        };
        self.proposals.insert(key, proposal.clone());
        debug!(key = %key, seconds = proposal.seconds, "countdown proposed");
        Ok(proposal)
    }

    /// Replace the duration and label of the waiting proposal for `key`.
    pub fn modify(&self, key: SessionKey, text: &str) -> Result<Proposal> {
        let Some(mut proposal) = self.proposals.get_mut(&key) else {
            return Err(TimerError::NothingToModify {
                key: key.to_string(),
            });
        };
        let parsed = parse_duration(text)?;
        proposal.seconds = parsed.seconds;
        proposal.label = parsed.label;
        proposal.created_at = Instant::now();
        debug!(key = %key, seconds = proposal.seconds, "proposal modified");
        Ok(proposal.value().clone())
    }

    /// Turn the proposal for `key` into a running timer and start its loop.
    pub fn confirm(&self, key: SessionKey, display: MessageRef) -> Result<Timer> {
        let ttl = self.engine.config().proposal_ttl();
        let registry = self.engine.registry();

        let timer = match self.proposals.entry(key) {
            Entry::Vacant(_) if registry.contains(&key) => {
                return Err(TimerError::AlreadyExists {
                    key: key.to_string(),
                })
            }
            Entry::Vacant(_) => {
                return Err(TimerError::NotFound {
                    key: key.to_string(),
                })
            }
            Entry::Occupied(entry) if entry.get().created_at.elapsed() >= ttl => {
                entry.remove();
                return Err(TimerError::NotFound {
                    key: key.to_string(),
                });
            }
            Entry::Occupied(entry) => {
                if self.engine.config().one_per_conversation
                    && !registry.in_conversation(key.conversation).is_empty()
                {
                    return Err(TimerError::AlreadyExists {
                        key: key.conversation.to_string(),
                    });
                }
                let proposal = entry.get();
                registry.create(key, proposal.seconds, proposal.label.clone(), display)?;
                let timer = registry.set_state(&key, TimerState::Running)?;
                entry.remove();
                timer
            }
        };

        info!(
            key = %key,
            total_seconds = timer.total_seconds,
            label = timer.label.as_deref().unwrap_or(""),
            "countdown confirmed"
        );
        self.engine.start(timer.clone());
        Ok(timer)
    }

    pub fn pause(&self, key: SessionKey) -> Result<Timer> {
        let timer = self.engine.registry().set_state(&key, TimerState::Paused)?;
        info!(key = %key, remaining = timer.remaining_seconds, "pause requested");
        Ok(timer)
    }

    pub fn resume(&self, key: SessionKey) -> Result<Timer> {
        let timer = self.engine.registry().set_state(&key, TimerState::Running)?;
        info!(key = %key, remaining = timer.remaining_seconds, "resume requested");
        Ok(timer)
    }

    /// Cancel the timer under `key` and replace its display with the cancelled
    /// banner. The state change happens first; a failed render is only logged.
    pub async fn cancel(&self, key: SessionKey) -> Result<Timer> {
        let timer = self.engine.registry().set_state(&key, TimerState::Cancelled)?;
        info!(key = %key, remaining = timer.remaining_seconds, "countdown cancelled");

        let display = self.engine.display();
        if let Err(e) = display.finish(&timer, &views::cancelled(&timer)).await {
            warn!(key = %key, error = %e, "failed to show cancelled banner");
        }
        Ok(timer)
    }

    /// Cancel every live timer in `conversation`. Timers that end on their own
    /// while this runs are skipped.
    pub async fn cancel_all(&self, conversation: ConversationId) -> Vec<Timer> {
        let mut cancelled = Vec::new();
        for timer in self.engine.registry().in_conversation(conversation) {
            if let Ok(t) = self.cancel(timer.key).await {
                cancelled.push(t);
            }
        }
        cancelled
    }

    /// Live timers in `conversation`, ordered by anchor.
    pub fn list(&self, conversation: ConversationId) -> Vec<Timer> {
        self.engine.registry().in_conversation(conversation)
    }

    pub fn proposal(&self, key: &SessionKey) -> Option<Proposal> {
        self.proposals.get(key).map(|p| p.value().clone())
    }

    /// Drop proposals older than the configured TTL. Returns how many went.
    pub fn prune_proposals(&self) -> usize {
        let ttl = self.engine.config().proposal_ttl();
        let before = self.proposals.len();
        self.proposals.retain(|_, p| p.created_at.elapsed() < ttl);
        let pruned = before.saturating_sub(self.proposals.len());
        if pruned > 0 {
            debug!(pruned, "expired proposals dropped");
        }
        pruned
    }
}
