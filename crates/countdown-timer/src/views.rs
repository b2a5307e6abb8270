//! Message texts. Kept in one place so every transport shows the same words.

use countdown_core::{Controls, View};

use crate::{
    duration::{format_compact, format_duration},
    types::Timer,
};

fn heading(label: Option<&str>) -> String {
    match label {
        Some(label) => format!("⏳ {label}"),
        None => "⏳ Countdown".to_string(),
    }
}

/// Confirmation prompt for a parsed proposal.
pub fn proposal(seconds: u64, label: Option<&str>) -> View {
    let text = match label {
        Some(label) => format!("Set countdown for {} ({label})?", format_duration(seconds)),
        None => format!("Set countdown for {}?", format_duration(seconds)),
    };
    View::new(text, Controls::Proposal)
}

pub fn started(timer: &Timer) -> View {
    View::new(
        format!(
            "{}\nCountdown started for {}!",
            heading(timer.label.as_deref()),
            format_duration(timer.total_seconds)
        ),
        Controls::Running,
    )
}

pub fn ticking(timer: &Timer) -> View {
    View::new(
        format!(
            "{}\n{} remaining...",
            heading(timer.label.as_deref()),
            format_duration(timer.remaining_seconds)
        ),
        Controls::Running,
    )
}

pub fn paused(timer: &Timer) -> View {
    View::new(
        format!(
            "⏸️ Countdown paused\n{} remaining.",
            format_duration(timer.remaining_seconds)
        ),
        Controls::Paused,
    )
}

/// Replaces the ticking display once the countdown reaches zero.
pub fn finished(timer: &Timer) -> View {
    let text = match timer.label.as_deref() {
        Some(label) => format!("✅ Countdown finished: {label}"),
        None => "✅ Countdown finished!".to_string(),
    };
    View::plain(text)
}

/// The separate completion notice posted into the conversation.
pub fn times_up(timer: &Timer) -> View {
    let text = match timer.label.as_deref() {
        Some(label) => format!("🚨 Time's up! 🚨\n{label}"),
        None => "🚨 Time's up! 🚨".to_string(),
    };
    View::plain(text)
}

pub fn cancelled(timer: &Timer) -> View {
    View::plain(format!(
        "❌ Countdown cancelled with {} left.",
        format_duration(timer.remaining_seconds)
    ))
}

pub fn milestone(timer: &Timer) -> View {
    View::plain(format!(
        "⏳ Reminder: {} remaining!",
        format_duration(timer.remaining_seconds)
    ))
}

/// One line per live countdown, for listing commands.
pub fn listing(timers: &[Timer]) -> View {
    if timers.is_empty() {
        return View::plain("No active countdowns.");
    }
    let mut out = format!("Active countdowns ({}):", timers.len());
    for t in timers {
        out.push_str(&format!(
            "\n- {} | {} left | {}",
            t.label.as_deref().unwrap_or("countdown"),
            format_compact(t.remaining_seconds),
            t.state,
        ));
    }
    View::plain(out)
}
