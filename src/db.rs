use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection};

/// Owns the SQLite connection until it is handed to the service.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn connect<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        let db = Self { conn };
        db.migrate()
            .with_context(|| format!("applying schema to {}", path.display()))?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory().context("opening in-memory database")?,
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- Timestamps have millisecond resolution, so an edit within the
            -- same millisecond still moves updated_at forward by 1ms.
            CREATE TRIGGER IF NOT EXISTS todos_touch_updated_at
            AFTER UPDATE OF subject, description ON todos
            FOR EACH ROW
            BEGIN
                UPDATE todos
                SET updated_at = strftime(
                    '%Y-%m-%dT%H:%M:%fZ',
                    max(julianday('now'), julianday(OLD.updated_at) + 0.001 / 86400.0)
                )
                WHERE id = NEW.id;
            END;
            "#,
        )?;
        Ok(())
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

/// Reads an RFC 3339 timestamp column written by the store.
pub(crate) fn timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_creates_parent_directories_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".sqlite3").join("todo.db");

        let db = Database::connect(&path).unwrap();
        assert!(path.exists());

        let conn = db.into_connection();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'todos'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn connect_is_idempotent_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");

        Database::connect(&path)
            .unwrap()
            .into_connection()
            .execute("INSERT INTO todos (subject) VALUES ('kept')", [])
            .unwrap();

        let conn = Database::connect(&path).unwrap().into_connection();
        let subject: String = conn
            .query_row("SELECT subject FROM todos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(subject, "kept");
    }

    #[test]
    fn store_assigns_parsable_timestamps() {
        let conn = Database::open_in_memory().unwrap().into_connection();
        conn.execute("INSERT INTO todos (subject) VALUES ('a')", []).unwrap();

        let (created, updated) = conn
            .query_row("SELECT created_at, updated_at FROM todos", [], |row| {
                Ok((timestamp_column(row, 0)?, timestamp_column(row, 1)?))
            })
            .unwrap();
        assert_eq!(created, updated);
    }

    #[test]
    fn back_to_back_updates_always_advance_updated_at() {
        let conn = Database::open_in_memory().unwrap().into_connection();
        let read = |conn: &Connection| {
            conn.query_row("SELECT created_at, updated_at FROM todos", [], |row| {
                Ok((timestamp_column(row, 0)?, timestamp_column(row, 1)?))
            })
            .unwrap()
        };

        conn.execute("INSERT INTO todos (subject) VALUES ('a')", []).unwrap();
        let (created, mut previous) = read(&conn);
        for i in 0..200 {
            conn.execute("UPDATE todos SET subject = ?1", [format!("s{i}")]).unwrap();
            let (created_now, updated) = read(&conn);
            assert_eq!(created_now, created);
            assert!(updated > previous, "update {i} left updated_at at {updated}");
            previous = updated;
        }
    }

    #[test]
    fn malformed_timestamp_is_a_conversion_error() {
        let conn = Database::open_in_memory().unwrap().into_connection();
        conn.execute(
            "INSERT INTO todos (subject, created_at) VALUES ('a', 'yesterday')",
            [],
        )
        .unwrap();

        let err = conn
            .query_row("SELECT created_at FROM todos", [], |row| timestamp_column(row, 0))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _)));
    }
}
