use chrono::{DateTime, Utc};
use countdown_core::{MessageRef, SessionKey};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a countdown.
///
/// ```text
/// Pending ──► Running ◄──► Paused
///    │           │  \        │  \
///    ▼           ▼   ▼       ▼   ▼
/// Cancelled  Completed  Cancelled/Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Created, not yet started.
    Pending,
    /// Ticking down once per second.
    Running,
    /// Held by the user; remaining time is frozen.
    Paused,
    /// Reached zero, or its display became unreachable.
    Completed,
    /// Stopped by the user.
    Cancelled,
}

impl TimerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerState::Completed | TimerState::Cancelled)
    }

    /// A tick loop is alive exactly while the timer is in one of these states.
    pub fn has_loop(self) -> bool {
        matches!(self, TimerState::Running | TimerState::Paused)
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition(self, to: TimerState) -> bool {
        use TimerState::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Cancelled)
        )
    }
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimerState::Pending => "pending",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Completed => "completed",
            TimerState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TimerState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TimerState::Pending),
            "running" => Ok(TimerState::Running),
            "paused" => Ok(TimerState::Paused),
            "completed" => Ok(TimerState::Completed),
            "cancelled" => Ok(TimerState::Cancelled),
            other => Err(format!("unknown timer state: {other}")),
        }
    }
}

/// A live countdown as held by the registry.
///
/// Values handed out by the registry are copies; the registry entry is the only
/// authoritative one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub key: SessionKey,
    /// Registry-assigned, unique per created timer. A tick loop only acts on the
    /// generation it was started for.
    pub generation: u64,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub state: TimerState,
    pub label: Option<String>,
    /// The message being edited on every tick.
    pub display: MessageRef,
    pub created_at: DateTime<Utc>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Persistable subset of a [`Timer`].
///
/// The generation is deliberately absent: it is process-local and reassigned on
/// restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub key: SessionKey,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub state: TimerState,
    pub label: Option<String>,
    pub display: MessageRef,
    pub created_at: DateTime<Utc>,
}

impl From<&Timer> for TimerRecord {
    fn from(t: &Timer) -> Self {
        Self {
            key: t.key,
            total_seconds: t.total_seconds,
            remaining_seconds: t.remaining_seconds,
            state: t.state,
            label: t.label.clone(),
            display: t.display,
            created_at: t.created_at,
        }
    }
}

/// A parsed-but-unconfirmed countdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub key: SessionKey,
    pub seconds: u64,
    pub label: Option<String>,
    pub created_at: tokio::time::Instant,
}
