use thiserror::Error;

use crate::types::TimerState;

/// Why a piece of text did not yield a usable duration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("no duration found")]
    NoDuration,

    #[error("duration must be greater than zero")]
    Zero,

    #[error("duration is too large")]
    Overflow,
}

/// Errors produced by the timer subsystem.
///
/// Everything except `Database` is expected in normal operation and is reported
/// back to the user rather than logged as a fault.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The text could not be turned into a positive duration.
    #[error("Invalid duration: {0}")]
    InvalidDuration(#[from] DurationError),

    /// A live timer already occupies this key.
    #[error("Countdown already running: {key}")]
    AlreadyExists { key: String },

    /// No live timer (or no pending proposal) under this key.
    #[error("Countdown not found: {key}")]
    NotFound { key: String },

    /// Modify was requested but no proposal is waiting for confirmation.
    #[error("Nothing to modify: {key}")]
    NothingToModify { key: String },

    /// The requested state change is not allowed from the current state.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: TimerState, to: TimerState },

    /// The transport rejected or failed a display call.
    #[error("Display failure: {0}")]
    DisplayFailure(String),

    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl TimerError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            TimerError::InvalidDuration(_) => "INVALID_DURATION",
            TimerError::AlreadyExists { .. } => "ALREADY_EXISTS",
            TimerError::NotFound { .. } => "NOT_FOUND",
            TimerError::NothingToModify { .. } => "NOTHING_TO_MODIFY",
            TimerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TimerError::DisplayFailure(_) => "DISPLAY_FAILURE",
            TimerError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Text suitable for sending back into the conversation.
    pub fn user_message(&self) -> String {
        match self {
            TimerError::InvalidDuration(DurationError::Overflow) => {
                "That duration is too large. Please enter something smaller.".to_string()
            }
            TimerError::InvalidDuration(_) => {
                "Invalid time format! Please enter a valid duration (e.g. '2 hours 30 minutes')."
                    .to_string()
            }
            TimerError::AlreadyExists { .. } => "This countdown is already running.".to_string(),
            TimerError::NotFound { .. } => "No active countdown here.".to_string(),
            TimerError::NothingToModify { .. } => "There is nothing to modify.".to_string(),
            TimerError::InvalidTransition { from, .. } => match from {
                TimerState::Paused => "The countdown is already paused.".to_string(),
                TimerState::Running => "The countdown is already running.".to_string(),
                _ => format!("The countdown is {from}."),
            },
            TimerError::DisplayFailure(_) | TimerError::Database(_) => {
                "Something went wrong, please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TimerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_for_user_facing_kinds() {
        let errors = [
            TimerError::InvalidDuration(DurationError::Zero),
            TimerError::AlreadyExists { key: "1/1".into() },
            TimerError::NotFound { key: "1/1".into() },
            TimerError::NothingToModify { key: "1/1".into() },
            TimerError::InvalidTransition {
                from: TimerState::Running,
                to: TimerState::Running,
            },
            TimerError::DisplayFailure("gone".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(TimerError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn resume_on_running_explains_itself() {
        let err = TimerError::InvalidTransition {
            from: TimerState::Running,
            to: TimerState::Running,
        };
        assert_eq!(err.user_message(), "The countdown is already running.");
    }
}
