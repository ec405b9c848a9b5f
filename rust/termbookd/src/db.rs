use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another process to release the database lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("termbook.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Starts a transaction that holds the write lock from its first statement, so checks
/// made inside it cannot be invalidated by another writer before commit.
pub fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS terms(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            term_number INTEGER NOT NULL CHECK(term_number BETWEEN 1 AND 4),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            state TEXT NOT NULL CHECK(state IN ('open', 'closed')),
            invoice_sent INTEGER NOT NULL DEFAULT 0,
            invoice_sent_date TEXT,
            created_at TEXT NOT NULL,
            closed_at TEXT
        )",
        [],
    )?;
    // One row per (term number, year); this is what ultimately rejects a duplicate
    // created by two racing transitions.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_terms_period ON terms(term_number, academic_year)",
        [],
    )?;
    // At most one open term.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_terms_single_open
         ON terms(state) WHERE state = 'open'",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade TEXT NOT NULL,
            enrolled INTEGER NOT NULL DEFAULT 1,
            payment_status TEXT NOT NULL DEFAULT 'pending',
            invoice_sent INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_enrolled ON students(enrolled)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            term_id TEXT,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS homework_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            term_id TEXT,
            date TEXT NOT NULL,
            title TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS behavior_notes(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            term_id TEXT,
            date TEXT NOT NULL,
            note TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    for table in ["attendance_records", "homework_records", "behavior_notes"] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_term_student
                 ON {table}(term_id, student_id)"
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_term_snapshots(
            id TEXT PRIMARY KEY,
            term_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            attendance_count INTEGER NOT NULL,
            homework_count INTEGER NOT NULL,
            behavior_count INTEGER NOT NULL,
            grade TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(term_id) REFERENCES terms(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(term_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_student ON student_term_snapshots(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_get_bool(conn: &Connection, key: &str, default: bool) -> bool {
    settings_get_json(conn, key)
        .ok()
        .flatten()
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
