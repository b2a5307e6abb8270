//! `TimerRegistry` — the single source of truth for every live countdown.
//!
//! Entries live in a `DashMap` keyed by [`SessionKey`]. Every read-modify-write
//! happens while holding that key's shard lock, so a pause racing a tick
//! decrement, or two cancels racing each other, always serialise. Terminal
//! transitions remove the entry under the same lock: a key present in the map
//! is always a live (non-terminal) timer.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use countdown_core::{ConversationId, MessageRef, SessionKey};
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::{
    error::{Result, TimerError},
    types::{Timer, TimerRecord, TimerState},
};

/// What a tick did to the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Decremented by one and still running.
    Ticked(Timer),
    /// Not running (paused); nothing changed.
    Held(Timer),
    /// Reached zero: the timer is now `Completed` and no longer in the registry.
    Completed(Timer),
}

/// Thread-safe map from session key to live timer.
pub struct TimerRegistry {
    timers: DashMap<SessionKey, Timer>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            timers: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    fn generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a `Pending` timer. Fails with `AlreadyExists` if a live timer
    /// already occupies `key`; the existing timer is left untouched.
    pub fn create(
        &self,
        key: SessionKey,
        total_seconds: u64,
        label: Option<String>,
        display: MessageRef,
    ) -> Result<Timer> {
        match self.timers.entry(key) {
            Entry::Occupied(_) => Err(TimerError::AlreadyExists {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                let timer = Timer {
                    key,
                    generation: self.generation(),
                    total_seconds,
                    remaining_seconds: total_seconds,
                    state: TimerState::Pending,
                    label,
                    display,
                    created_at: Utc::now(),
                    last_tick_at: None,
                };
                slot.insert(timer.clone());
                debug!(key = %key, generation = timer.generation, total_seconds, "timer created");
                Ok(timer)
            }
        }
    }

    /// Re-insert a persisted timer exactly as it was saved.
    ///
    /// Terminal records are refused; they should never have been persisted.
    pub fn restore(&self, record: TimerRecord) -> Result<Timer> {
        if record.state.is_terminal() {
            return Err(TimerError::InvalidTransition {
                from: record.state,
                to: record.state,
            });
        }
        match self.timers.entry(record.key) {
            Entry::Occupied(_) => Err(TimerError::AlreadyExists {
                key: record.key.to_string(),
            }),
            Entry::Vacant(slot) => {
                let timer = Timer {
                    key: record.key,
                    generation: self.generation(),
                    total_seconds: record.total_seconds,
                    remaining_seconds: record.remaining_seconds,
                    state: record.state,
                    label: record.label,
                    display: record.display,
                    created_at: record.created_at,
                    last_tick_at: None,
                };
                slot.insert(timer.clone());
                Ok(timer)
            }
        }
    }

    /// Copy of the live timer under `key`.
    pub fn get(&self, key: &SessionKey) -> Result<Timer> {
        self.timers
            .get(key)
            .map(|t| t.value().clone())
            .ok_or_else(|| not_found(key))
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Whether `key` still holds the timer of this particular `generation`.
    pub fn is_live(&self, key: &SessionKey, generation: u64) -> bool {
        self.timers
            .get(key)
            .is_some_and(|t| t.generation == generation)
    }

    /// Drop the entry under `key`. Removing a missing key is a no-op.
    pub fn remove(&self, key: &SessionKey) -> Option<Timer> {
        self.timers.remove(key).map(|(_, t)| t)
    }

    /// Move the timer under `key` to `to`.
    ///
    /// Moving into a terminal state removes the entry in the same critical
    /// section and returns the final copy.
    pub fn set_state(&self, key: &SessionKey, to: TimerState) -> Result<Timer> {
        self.transition(key, None, to)
    }

    /// Like [`set_state`](Self::set_state) but only if `key` still holds
    /// `generation`. Used by tick loops so a stale loop cannot touch a successor.
    pub fn set_state_for(&self, key: &SessionKey, generation: u64, to: TimerState) -> Result<Timer> {
        self.transition(key, Some(generation), to)
    }

    fn transition(&self, key: &SessionKey, generation: Option<u64>, to: TimerState) -> Result<Timer> {
        let Entry::Occupied(mut entry) = self.timers.entry(*key) else {
            return Err(not_found(key));
        };
        if generation.is_some_and(|g| g != entry.get().generation) {
            return Err(not_found(key));
        }

        let from = entry.get().state;
        if !from.can_transition(to) {
            return Err(TimerError::InvalidTransition { from, to });
        }

        if to.is_terminal() {
            let mut timer = entry.remove();
            timer.state = to;
            debug!(key = %key, %from, %to, "timer finished");
            Ok(timer)
        } else {
            let timer = entry.get_mut();
            timer.state = to;
            debug!(key = %key, %from, %to, "timer state changed");
            Ok(timer.clone())
        }
    }

    /// Perform one tick for `key`/`generation`.
    ///
    /// A running timer loses one second (never below zero). Reaching zero
    /// completes and removes it atomically, so nothing can pause or cancel a
    /// timer that has already run out.
    pub fn advance(&self, key: &SessionKey, generation: u64) -> Result<Advance> {
        let Entry::Occupied(mut entry) = self.timers.entry(*key) else {
            return Err(not_found(key));
        };
        if entry.get().generation != generation {
            return Err(not_found(key));
        }
        if entry.get().state != TimerState::Running {
            return Ok(Advance::Held(entry.get().clone()));
        }

        let timer = entry.get_mut();
        timer.remaining_seconds = timer.remaining_seconds.saturating_sub(1);
        timer.last_tick_at = Some(Utc::now());

        if timer.remaining_seconds == 0 {
            let mut timer = entry.remove();
            timer.state = TimerState::Completed;
            Ok(Advance::Completed(timer))
        } else {
            Ok(Advance::Ticked(timer.clone()))
        }
    }

    /// Copy of `key` if it still holds `generation`.
    pub fn current(&self, key: &SessionKey, generation: u64) -> Option<Timer> {
        self.timers
            .get(key)
            .filter(|t| t.generation == generation)
            .map(|t| t.value().clone())
    }

    /// All live timers in one conversation, ordered by anchor.
    pub fn in_conversation(&self, conversation: ConversationId) -> Vec<Timer> {
        let mut timers: Vec<Timer> = self
            .timers
            .iter()
            .filter(|e| e.key().conversation == conversation)
            .map(|e| e.value().clone())
            .collect();
        timers.sort_by_key(|t| t.key);
        timers
    }

    /// The live timer whose display is `message`, if any.
    pub fn find_by_display(&self, message: &MessageRef) -> Option<Timer> {
        self.timers
            .iter()
            .find(|e| e.value().display == *message)
            .map(|e| e.value().clone())
    }

    /// Copies of every live timer, ordered by key.
    pub fn snapshot(&self) -> Vec<Timer> {
        let mut timers: Vec<Timer> = self.timers.iter().map(|e| e.value().clone()).collect();
        timers.sort_by_key(|t| t.key);
        timers
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(key: &SessionKey) -> TimerError {
    TimerError::NotFound {
        key: key.to_string(),
    }
}
