//! Database schema definitions

use rusqlite::Connection;

/// Timestamps are Unix epoch milliseconds.
pub(crate) fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Devices: one row per normalized mac
        CREATE TABLE IF NOT EXISTS devices (
            mac TEXT PRIMARY KEY,
            ip TEXT NOT NULL,
            hostname TEXT,
            vendor TEXT,
            first_seen INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            os_guess TEXT
        );

        -- Anomalies: append-only alert history
        CREATE TABLE IF NOT EXISTS anomalies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts INTEGER NOT NULL,
            type TEXT NOT NULL,
            description TEXT NOT NULL,
            dedup_key TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_anomalies_ts ON anomalies(ts DESC);
        "#,
    )
}
