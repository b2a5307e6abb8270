//! SQLite snapshot of live countdowns, so a restart resumes where it stopped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use countdown_core::{MessageRef, SessionKey};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::{
    db::init_db,
    error::Result,
    types::{Timer, TimerRecord, TimerState},
};

pub struct TimerStore {
    conn: Mutex<Connection>,
}

impl TimerStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored snapshot with the live timers in `timers`.
    ///
    /// Only `Running` and `Paused` timers are written. A timer whose values do
    /// not fit a SQLite integer is skipped; the rest are still saved. Returns
    /// the row count.
    pub fn save_all(&self, timers: &[Timer]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM countdowns", [])?;

        let saved_at = Utc::now().to_rfc3339();
        let mut saved = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO countdowns
                 (conversation_id, anchor_id, total_seconds, remaining_seconds, state,
                  label, display_conversation, display_message, created_at, saved_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for t in timers.iter().filter(|t| t.state.has_loop()) {
                let (total, remaining) =
                    match (to_sql_int(t.total_seconds), to_sql_int(t.remaining_seconds)) {
                        (Some(total), Some(remaining)) => (total, remaining),
                        _ => {
                            warn!(
                                key = %t.key,
                                total_seconds = t.total_seconds,
                                "countdown too long to store, skipped"
                            );
                            continue;
                        }
                    };
                stmt.execute(params![
                    t.key.conversation.0,
                    t.key.anchor.0,
                    total,
                    remaining,
                    t.state.to_string(),
                    t.label,
                    t.display.conversation.0,
                    t.display.message.0,
                    t.created_at.to_rfc3339(),
                    saved_at,
                ])?;
                saved += 1;
            }
        }
        tx.commit()?;

        info!(saved, "countdowns saved");
        Ok(saved)
    }

    /// Every stored timer. Rows that no longer decode are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<TimerRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT conversation_id, anchor_id, total_seconds, remaining_seconds, state,
                    label, display_conversation, display_message, created_at
             FROM countdowns ORDER BY conversation_id, anchor_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Row {
                conversation: row.get(0)?,
                anchor: row.get(1)?,
                total: row.get(2)?,
                remaining: row.get(3)?,
                state: row.get(4)?,
                label: row.get(5)?,
                display_conversation: row.get(6)?,
                display_message: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            let key = SessionKey::new(row.conversation, row.anchor);
            match row.decode() {
                Some(record) => records.push(record),
                None => warn!(key = %key, "unreadable countdown row skipped"),
            }
        }
        Ok(records)
    }

    /// Delete the snapshot. Returns how many rows were removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM countdowns", [])?)
    }
}

struct Row {
    conversation: i64,
    anchor: i64,
    total: i64,
    remaining: i64,
    state: String,
    label: Option<String>,
    display_conversation: i64,
    display_message: i64,
    created_at: String,
}

impl Row {
    fn decode(self) -> Option<TimerRecord> {
        let total_seconds = u64::try_from(self.total).ok()?;
        let remaining_seconds = u64::try_from(self.remaining).ok()?;
        if remaining_seconds > total_seconds {
            return None;
        }
        let state: TimerState = self.state.parse().ok()?;
        if !state.has_loop() {
            return None;
        }
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .ok()?
            .with_timezone(&Utc);
        Some(TimerRecord {
            key: SessionKey::new(self.conversation, self.anchor),
            total_seconds,
            remaining_seconds,
            state,
            label: self.label,
            display: MessageRef::new(self.display_conversation, self.display_message),
            created_at,
        })
    }
}

fn to_sql_int(value: u64) -> Option<i64> {
    i64::try_from(value).ok()
}
