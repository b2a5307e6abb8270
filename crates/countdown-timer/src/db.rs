use rusqlite::Connection;

use crate::error::Result;

/// Initialise the countdown schema in `conn`.
///
/// One row per live timer, keyed by its session key. The table is a snapshot:
/// it is rewritten as a whole on shutdown and read once on startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS countdowns (
            conversation_id      INTEGER NOT NULL,
            anchor_id            INTEGER NOT NULL,
            total_seconds        INTEGER NOT NULL,
            remaining_seconds    INTEGER NOT NULL,
            state                TEXT    NOT NULL,   -- 'running' | 'paused'
            label                TEXT,
            display_conversation INTEGER NOT NULL,
            display_message      INTEGER NOT NULL,
            created_at           TEXT    NOT NULL,   -- RFC 3339
            saved_at             TEXT    NOT NULL,
            PRIMARY KEY (conversation_id, anchor_id)
        ) STRICT;
        ",
    )?;
    Ok(())
}
