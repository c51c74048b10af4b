use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

/// SQLite-backed session store with the minimal key-value surface the daemon
/// needs: `get(key) -> JSON | absent`, `set(key, JSON)`, delete. Holds the
/// session identity keys and the per-user canonical snapshot.
pub struct Store {
    conn: Connection,
}

pub fn open_store(dir: &Path) -> anyhow::Result<Store> {
    std::fs::create_dir_all(dir)?;
    let db_path = dir.join("session.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(Store { conn })
}

impl Store {
    pub fn get_json(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM session_kv WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn set_json(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO session_kv(key, value, updated_at)
             VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            (key, serde_json::to_string(value)?, chrono::Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM session_kv WHERE key = ?", [key])?;
        Ok(())
    }

    /// Used on logout to invalidate every stored snapshot at once.
    pub fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let n = self.conn.execute(
            "DELETE FROM session_kv WHERE key LIKE ? ESCAPE '\\'",
            [pattern],
        )?;
        Ok(n)
    }
}
