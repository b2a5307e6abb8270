//! Human duration text ⇄ whole seconds.
//!
//! The parser is deliberately forgiving: it scans for `(integer, unit)` pairs
//! anywhere in the text, ignores what it does not understand, and keeps the
//! leftover words as a label. `"2 minutes quiz starts"` is 120 seconds labelled
//! `"quiz starts"`; `"2h30m"` is 9000 seconds with no label.

use crate::error::DurationError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Largest accepted total. Countdowns are stored as SQLite `INTEGER`s.
pub const MAX_SECONDS: u64 = i64::MAX as u64;

/// Result of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDuration {
    pub seconds: u64,
    pub label: Option<String>,
}

/// Seconds per unit for every spelling we accept.
fn unit_seconds(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(MINUTE),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(HOUR),
        "d" | "day" | "days" => Some(DAY),
        "w" | "wk" | "wks" | "week" | "weeks" => Some(WEEK),
        _ => None,
    }
}

/// One scanning unit: a run of digits or a run of non-digits, tagged with the
/// whitespace-separated word it came from.
struct Token<'a> {
    text: &'a str,
    word: usize,
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split `word` at digit/letter boundaries (`2h30m` → `2`,`h`,`30`,`m`) after
/// dropping trailing punctuation. Words mixing in other symbols stay whole.
fn split_word(word: &str) -> Vec<&str> {
    let word = word.trim_end_matches([',', '.', ';', '!', '?']);
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_alphanumeric()) {
        return vec![word];
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = word.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit() {
            parts.push(&word[start..i]);
            start = i;
        }
    }
    parts.push(&word[start..]);
    parts
}

/// Parse free-form text into a positive number of seconds plus an optional label.
///
/// Unknown units and bare numbers are skipped. Text with no recognised pair is
/// [`DurationError::NoDuration`]; a recognised total of zero is
/// [`DurationError::Zero`]; a total above [`MAX_SECONDS`] is
/// [`DurationError::Overflow`] rather than wrapping.
pub fn parse_duration(text: &str) -> Result<ParsedDuration, DurationError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let tokens: Vec<Token<'_>> = words
        .iter()
        .enumerate()
        .flat_map(|(word, w)| split_word(w).into_iter().map(move |text| Token { text, word }))
        .collect();

    let mut consumed = vec![false; words.len()];
    let mut total: u64 = 0;
    let mut pairs = 0usize;

    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        let unit = tokens.get(i + 1).and_then(|next| unit_seconds(next.text));
        match (is_number(tok.text), unit) {
            (true, Some(unit)) => {
                let n: u64 = tok.text.parse().map_err(|_| DurationError::Overflow)?;
                let secs = n.checked_mul(unit).ok_or(DurationError::Overflow)?;
                total = total.checked_add(secs).ok_or(DurationError::Overflow)?;
                consumed[tok.word] = true;
                consumed[tokens[i + 1].word] = true;
                pairs += 1;
                i += 2;
            }
            _ => i += 1,
        }
    }

    if pairs == 0 {
        return Err(DurationError::NoDuration);
    }
    if total == 0 {
        return Err(DurationError::Zero);
    }
    if total > MAX_SECONDS {
        return Err(DurationError::Overflow);
    }

    Ok(ParsedDuration {
        seconds: total,
        label: collect_label(&words, &consumed),
    })
}

/// Join the words not used by a duration pair. A connective `and` sitting
/// between two consumed words belongs to the duration, not the label.
fn collect_label(words: &[&str], consumed: &[bool]) -> Option<String> {
    let label: Vec<&str> = words
        .iter()
        .enumerate()
        .filter(|&(i, w)| {
            if consumed[i] {
                return false;
            }
            let connective = w.eq_ignore_ascii_case("and") || *w == "&" || *w == ",";
            let between = i > 0 && consumed[i - 1] && consumed.get(i + 1).copied().unwrap_or(false);
            !(connective && between)
        })
        .map(|(_, w)| *w)
        .collect();

    if label.is_empty() {
        None
    } else {
        Some(label.join(" "))
    }
}

/// Long, pluralised form: `1 day 2 hours 3 minutes 4 seconds`. Zero components
/// are omitted; `0` itself renders as `0 seconds`.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0 seconds".to_string();
    }

    let mut rest = seconds;
    let mut parts = Vec::with_capacity(4);
    for (size, name) in [(DAY, "day"), (HOUR, "hour"), (MINUTE, "minute"), (1, "second")] {
        let n = rest / size;
        rest %= size;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {name}{plural}"));
        }
    }
    parts.join(" ")
}

/// Short form used in compact displays: `1d 2h 3m 4s`, `0s` for zero.
pub fn format_compact(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let mut rest = seconds;
    let mut parts = Vec::with_capacity(4);
    for (size, suffix) in [(DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm'), (1, 's')] {
        let n = rest / size;
        rest %= size;
        if n > 0 {
            parts.push(format!("{n}{suffix}"));
        }
    }
    parts.join(" ")
}
