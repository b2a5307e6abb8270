//! `TimerEngine` — one tokio task per live countdown.
//!
//! Each loop sleeps until an absolute deadline and then advances the deadline
//! by exactly one tick, so slow edits never accumulate drift. The loop is the
//! only writer of tick, paused and resumed renders for its timer; controls
//! change registry state and the loop picks the change up on its next wake.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use countdown_core::config::TimerConfig;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    display::DisplayAdapter,
    error::TimerError,
    registry::{Advance, TimerRegistry},
    types::{Timer, TimerRecord, TimerState},
    views,
};

pub struct TimerEngine {
    registry: Arc<TimerRegistry>,
    display: Arc<DisplayAdapter>,
    config: Arc<TimerConfig>,
    shutdown_tx: watch::Sender<bool>,
    active: Arc<AtomicUsize>,
}

impl TimerEngine {
    pub fn new(
        registry: Arc<TimerRegistry>,
        display: Arc<DisplayAdapter>,
        config: TimerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry,
            display,
            config: Arc::new(config),
            shutdown_tx,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn registry(&self) -> &Arc<TimerRegistry> {
        &self.registry
    }

    pub fn display(&self) -> &Arc<DisplayAdapter> {
        &self.display
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Spawn the tick loop for a `Running` or `Paused` timer.
    ///
    /// The loop owns nothing but the key and generation; every decision is
    /// re-read from the registry.
    pub fn start(&self, timer: Timer) -> JoinHandle<()> {
        let countdown = Countdown {
            registry: Arc::clone(&self.registry),
            display: Arc::clone(&self.display),
            config: Arc::clone(&self.config),
            _active: ActiveLoop::enter(&self.active),
        };
        tokio::spawn(countdown.run(timer, self.shutdown_tx.subscribe()))
    }

    /// Re-register persisted timers and start their loops. Returns how many
    /// came back.
    pub fn restore(&self, records: Vec<TimerRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            let key = record.key;
            match self.registry.restore(record) {
                Ok(timer) => {
                    self.start(timer);
                    restored += 1;
                }
                Err(e) => warn!(key = %key, error = %e, "skipping persisted countdown"),
            }
        }
        info!(restored, "countdowns restored");
        restored
    }

    /// Stop every loop at its next wake-up. Registry entries are left as they
    /// are so they can be persisted.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        info!(active = self.active_loops(), "timer engine shutting down");
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Number of tick loops currently alive.
    pub fn active_loops(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Counts a loop as active for as long as it is held.
struct ActiveLoop(Arc<AtomicUsize>);

impl ActiveLoop {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveLoop {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Countdown {
    registry: Arc<TimerRegistry>,
    display: Arc<DisplayAdapter>,
    config: Arc<TimerConfig>,
    _active: ActiveLoop,
}

impl Countdown {
    async fn run(self, timer: Timer, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let key = timer.key;
        let generation = timer.generation;
        let tick = self.config.tick_interval();
        let poll = self.config.pause_poll();

        info!(
            key = %key,
            generation,
            total_seconds = timer.total_seconds,
            remaining_seconds = timer.remaining_seconds,
            "countdown loop started"
        );

        if timer.remaining_seconds == 0 {
            if let Ok(done) = self
                .registry
                .set_state_for(&key, generation, TimerState::Completed)
            {
                self.complete(done).await;
            }
            return;
        }

        let mut paused = timer.state == TimerState::Paused;
        // A timer that already lost time was restored from a snapshot; its
        // display is already announced and pinned.
        let fresh = timer.remaining_seconds == timer.total_seconds;
        let mut deadline = Instant::now();
        let first = if paused {
            views::paused(&timer)
        } else if fresh {
            views::started(&timer)
        } else {
            views::ticking(&timer)
        };
        if let Err(e) = self.display.render(&timer, &first, deadline).await {
            self.fail(&timer, e);
            return;
        }
        if self.config.pin && fresh {
            self.spawn_pin(timer.clone());
        }
        deadline += if paused { poll } else { tick };

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(key = %key, "countdown loop stopped for shutdown");
                        return;
                    }
                    continue;
                }
            }

            if paused {
                let Some(current) = self.registry.current(&key, generation) else {
                    break;
                };
                match current.state {
                    TimerState::Paused => deadline += poll,
                    TimerState::Running => {
                        paused = false;
                        info!(key = %key, remaining = current.remaining_seconds, "countdown resumed");
                        if let Err(e) = self
                            .display
                            .render(&current, &views::ticking(&current), deadline)
                            .await
                        {
                            self.fail(&current, e);
                            return;
                        }
                        deadline += tick;
                    }
                    _ => break,
                }
                continue;
            }

            match self.registry.advance(&key, generation) {
                Ok(Advance::Ticked(t)) => {
                    if let Err(e) = self.display.render(&t, &views::ticking(&t), deadline).await {
                        self.fail(&t, e);
                        return;
                    }
                    if self.config.is_milestone(t.remaining_seconds) {
                        if let Err(e) = self.display.remind(&t, &views::milestone(&t)).await {
                            warn!(key = %key, error = %e, "failed to post reminder");
                        }
                    }
                    deadline += tick;
                }
                Ok(Advance::Held(t)) => {
                    paused = true;
                    info!(key = %key, remaining = t.remaining_seconds, "countdown paused");
                    if let Err(e) = self.display.render(&t, &views::paused(&t), deadline).await {
                        self.fail(&t, e);
                        return;
                    }
                    deadline += poll;
                }
                Ok(Advance::Completed(t)) => {
                    self.complete(t).await;
                    return;
                }
                // Cancelled or replaced; whoever did it owns the final render.
                Err(_) => break,
            }
        }

        debug!(key = %key, generation, "countdown loop exited");
        self.display.release(&key, generation);
    }

    async fn complete(&self, timer: Timer) {
        info!(key = %timer.key, total_seconds = timer.total_seconds, "countdown completed");
        if let Err(e) = self.display.finish(&timer, &views::finished(&timer)).await {
            warn!(key = %timer.key, error = %e, "failed to show finished banner");
        }
        if let Err(e) = self
            .display
            .notify(timer.key.conversation, &views::times_up(&timer))
            .await
        {
            warn!(key = %timer.key, error = %e, "failed to post completion notice");
        }
    }

    /// The display is gone for good: finish the timer without further renders.
    fn fail(&self, timer: &Timer, err: TimerError) {
        match self
            .registry
            .set_state_for(&timer.key, timer.generation, TimerState::Completed)
        {
            Ok(_) => error!(key = %timer.key, error = %err, "display unreachable, countdown stopped"),
            Err(_) => debug!(key = %timer.key, error = %err, "display failed after timer ended"),
        }
        self.display.release(&timer.key, timer.generation);
    }

    fn spawn_pin(&self, timer: Timer) {
        let display = Arc::clone(&self.display);
        let delay = self.config.pin_delay();
        tokio::spawn(async move {
            sleep(delay).await;
            if display.pin(&timer).await {
                debug!(key = %timer.key, "countdown pinned");
            }
        });
    }
}
