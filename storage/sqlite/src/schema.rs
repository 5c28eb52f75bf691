use rusqlite::Connection;
use tracing::debug;

use crate::error::SqliteError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "events"(
    "seq"      INTEGER PRIMARY KEY AUTOINCREMENT,
    "context"  TEXT NOT NULL,
    "id"       TEXT NOT NULL,
    "origin"   TEXT NOT NULL,
    "is_state" INTEGER NOT NULL,
    "pdu"      BLOB NOT NULL,
    UNIQUE ("context", "id", "origin")
);
CREATE INDEX IF NOT EXISTS "events_state_idx" ON "events"("context", "is_state");

CREATE TABLE IF NOT EXISTS "edges"(
    "context"       TEXT NOT NULL,
    "child_id"      TEXT NOT NULL,
    "child_origin"  TEXT NOT NULL,
    "parent_id"     TEXT NOT NULL,
    "parent_origin" TEXT NOT NULL,
    PRIMARY KEY ("context", "child_id", "child_origin", "parent_id", "parent_origin")
);
CREATE INDEX IF NOT EXISTS "edges_parent_idx" ON "edges"("context", "parent_id", "parent_origin");

CREATE TABLE IF NOT EXISTS "extremities"(
    "context" TEXT NOT NULL,
    "id"      TEXT NOT NULL,
    "origin"  TEXT NOT NULL,
    PRIMARY KEY ("context", "id", "origin")
);

CREATE TABLE IF NOT EXISTS "deliveries"(
    "seq"         INTEGER PRIMARY KEY AUTOINCREMENT,
    "origin"      TEXT NOT NULL,
    "checkpoint"  TEXT NOT NULL,
    "destination" TEXT NOT NULL,
    UNIQUE ("origin", "checkpoint", "destination")
);

CREATE TABLE IF NOT EXISTS "delivery_pdus"(
    "delivery_seq" INTEGER NOT NULL REFERENCES "deliveries"("seq") ON DELETE CASCADE,
    "position"     INTEGER NOT NULL,
    "context"      TEXT NOT NULL,
    "id"           TEXT NOT NULL,
    "origin"       TEXT NOT NULL,
    PRIMARY KEY ("delivery_seq", "position")
);
"#;

pub(crate) const TABLES: &[&str] = &["delivery_pdus", "deliveries", "extremities", "edges", "events"];

pub(crate) fn create_tables(conn: &Connection) -> Result<(), SqliteError> {
    debug!("Creating pdugraph tables");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
