//! Display adapter: turns timer snapshots into transport calls.
//!
//! Every key gets one slot guarded by an async mutex. All edits for a key go
//! through that slot, which gives two properties:
//!
//! - a tick edit checks liveness while holding the slot, so it can never land
//!   after the terminal banner for the same timer;
//! - edits are spaced at least one tick interval apart in real time. Tick
//!   edits that would break the spacing are skipped or held back briefly;
//!   terminal edits wait for their turn;
//! - after a stalled call only the newest tick is rendered. Ticks whose
//!   successor is already due are dropped.
//!
//! Only `MessageNotFound` and `Rejected` are fatal for a timer. Timeouts,
//! platform rate limits and network errors skip that one render.

use std::{future::Future, sync::Arc, time::Duration};

use countdown_core::{
    config::TimerConfig, ConversationId, MessageRef, SessionKey, Transport, TransportError, View,
};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::{
    sync::Mutex,
    time::{sleep_until, timeout, Instant},
};
use tracing::{debug, warn};

use crate::{
    error::{Result, TimerError},
    registry::TimerRegistry,
    types::Timer,
};

/// Outcome of a non-terminal render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendered {
    Pushed,
    Skipped,
}

#[derive(Debug, Default)]
struct Slot {
    /// Scheduled instant of the last pushed tick.
    last_at: Option<Instant>,
    /// Real instant the last edit call went out.
    last_sent: Option<Instant>,
    /// Most recent milestone reminder, deleted when superseded.
    reminder: Option<MessageRef>,
}

pub struct DisplayAdapter {
    transport: Arc<dyn Transport>,
    registry: Arc<TimerRegistry>,
    min_edit_interval: Duration,
    call_timeout: Duration,
    slots: DashMap<SessionKey, (u64, Arc<Mutex<Slot>>)>,
}

impl DisplayAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<TimerRegistry>,
        config: &TimerConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            min_edit_interval: config.tick_interval(),
            call_timeout: config.edit_timeout(),
            slots: DashMap::new(),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Slot for this timer's generation. A newer generation replaces an older
    /// slot; a caller from an older generation gets a detached throwaway slot.
    fn slot(&self, timer: &Timer) -> Arc<Mutex<Slot>> {
        match self.slots.entry(timer.key) {
            Entry::Occupied(mut occupied) => {
                let (generation, slot) = occupied.get();
                if *generation == timer.generation {
                    Arc::clone(slot)
                } else if *generation > timer.generation {
                    Arc::default()
                } else {
                    let fresh: Arc<Mutex<Slot>> = Arc::default();
                    occupied.insert((timer.generation, Arc::clone(&fresh)));
                    fresh
                }
            }
            Entry::Vacant(vacant) => {
                let fresh: Arc<Mutex<Slot>> = Arc::default();
                vacant.insert((timer.generation, Arc::clone(&fresh)));
                fresh
            }
        }
    }

    /// Forget the slot of `key` if it still belongs to `generation`.
    pub fn release(&self, key: &SessionKey, generation: u64) {
        self.slots.remove_if(key, |_, (g, _)| *g == generation);
    }

    /// Number of keys currently holding a slot.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, TransportError>>,
    ) -> std::result::Result<T, TransportError> {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }

    /// Edit the display of a live timer.
    ///
    /// `at` is the instant the caller scheduled this render for. A render is
    /// skipped when the next one is already due (the caller is catching up
    /// after a stall) or when it was scheduled less than one interval after
    /// the previous push. Otherwise it is held until one interval has passed
    /// in real time since the previous call went out.
    pub async fn render(&self, timer: &Timer, view: &View, at: Instant) -> Result<Rendered> {
        let slot = self.slot(timer);
        let mut slot = slot.lock().await;

        if !self.registry.is_live(&timer.key, timer.generation) {
            drop(slot);
            self.release(&timer.key, timer.generation);
            return Ok(Rendered::Skipped);
        }
        if Instant::now() >= at + self.min_edit_interval {
            debug!(key = %timer.key, "stale tick not rendered");
            return Ok(Rendered::Skipped);
        }
        if slot
            .last_at
            .is_some_and(|last| at.saturating_duration_since(last) < self.min_edit_interval)
        {
            debug!(key = %timer.key, "edit skipped, too soon after previous one");
            return Ok(Rendered::Skipped);
        }
        if let Some(last) = slot.last_sent {
            let ready = last + self.min_edit_interval;
            if Instant::now() < ready {
                sleep_until(ready).await;
                if !self.registry.is_live(&timer.key, timer.generation) {
                    return Ok(Rendered::Skipped);
                }
            }
        }
        slot.last_at = Some(at);
        slot.last_sent = Some(Instant::now());

        match self.call(self.transport.edit_message(&timer.display, view)).await {
            Ok(()) => Ok(Rendered::Pushed),
            Err(e) if is_fatal(&e) => Err(TimerError::DisplayFailure(e.to_string())),
            Err(e) => {
                warn!(key = %timer.key, error = %e, "display edit skipped");
                Ok(Rendered::Skipped)
            }
        }
    }

    /// Replace the display with a terminal banner and drop the slot.
    ///
    /// The timer is expected to be gone from the registry already. If an edit
    /// went out less than one interval ago this waits instead of skipping.
    pub async fn finish(&self, timer: &Timer, view: &View) -> Result<()> {
        let slot = self.slot(timer);
        let mut slot = slot.lock().await;

        if let Some(last) = slot.last_sent {
            sleep_until(last + self.min_edit_interval).await;
        }
        slot.last_sent = Some(Instant::now());

        if let Some(reminder) = slot.reminder.take() {
            if let Err(e) = self.call(self.transport.delete_message(&reminder)).await {
                debug!(key = %timer.key, error = %e, "could not delete reminder");
            }
        }

        let result = self.call(self.transport.edit_message(&timer.display, view)).await;
        drop(slot);
        self.release(&timer.key, timer.generation);

        result.map_err(|e| TimerError::DisplayFailure(e.to_string()))
    }

    /// Post a separate reminder, replacing the previous one.
    pub async fn remind(&self, timer: &Timer, view: &View) -> Result<()> {
        let slot = self.slot(timer);
        let mut slot = slot.lock().await;
        if !self.registry.is_live(&timer.key, timer.generation) {
            return Ok(());
        }

        let sent = self
            .call(self.transport.send_message(timer.key.conversation, view))
            .await
            .map_err(|e| TimerError::DisplayFailure(e.to_string()))?;

        if let Some(previous) = slot.reminder.replace(sent) {
            if let Err(e) = self.call(self.transport.delete_message(&previous)).await {
                debug!(key = %timer.key, error = %e, "could not delete previous reminder");
            }
        }
        Ok(())
    }

    /// Post a standalone message into a conversation.
    pub async fn notify(&self, conversation: ConversationId, view: &View) -> Result<MessageRef> {
        self.call(self.transport.send_message(conversation, view))
            .await
            .map_err(|e| TimerError::DisplayFailure(e.to_string()))
    }

    /// Pin the display message, best effort. Returns whether the pin went out.
    pub async fn pin(&self, timer: &Timer) -> bool {
        if !self.registry.is_live(&timer.key, timer.generation) {
            return false;
        }
        match self.call(self.transport.pin_message(&timer.display)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %timer.key, error = %e, "failed to pin countdown");
                false
            }
        }
    }
}

/// Errors after which the display can never be updated again.
fn is_fatal(err: &TransportError) -> bool {
    matches!(
        err,
        TransportError::MessageNotFound(_) | TransportError::Rejected(_)
    )
}
