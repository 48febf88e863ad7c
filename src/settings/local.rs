use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

use super::{TableSettings, TableType};

/// Local fallback repository: one SQLite table of settings blobs, keyed the
/// same way as the remote document store, so a dashboard can move between
/// backends without losing state shape.
pub struct LocalStore {
    conn: tokio_rusqlite::Connection,
}

impl LocalStore {
    /// Open the store at the default path (`~/.jirakpi/jirakpi.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".jirakpi");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("jirakpi.db")).await
    }

    /// Open the store at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path.as_ref()).await?;
        Self::init(&conn).await?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(&conn).await?;
        Ok(Self { conn })
    }

    async fn init(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations =
                Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    pub async fn get(
        &self,
        table: TableType,
        user_id: Option<&str>,
    ) -> Result<Option<TableSettings>> {
        let id = TableSettings::settings_id(table, user_id);
        let payload: Option<String> = self
            .conn
            .call(move |conn| get_settings(conn, &id))
            .await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, settings: &TableSettings) -> Result<()> {
        let id = TableSettings::settings_id(settings.id, settings.user_id.as_deref());
        let payload = serde_json::to_string(settings)?;
        self.conn
            .call(move |conn| put_settings(conn, &id, &payload))
            .await?;
        log::info!("saved table settings for {}", settings.id);
        Ok(())
    }

    pub async fn delete(&self, table: TableType, user_id: Option<&str>) -> Result<()> {
        let id = TableSettings::settings_id(table, user_id);
        self.conn
            .call(move |conn| delete_settings(conn, &id))
            .await?;
        Ok(())
    }
}

// ── Repository functions ───────────────────────────────────────────

fn get_settings(conn: &Connection, settings_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT payload FROM table_settings WHERE settings_id = ?1",
        params![settings_id],
        |row| row.get(0),
    )
    .optional()
}

fn put_settings(conn: &Connection, settings_id: &str, payload: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO table_settings (settings_id, payload, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(settings_id) DO UPDATE SET
             payload = excluded.payload,
             updated_at = excluded.updated_at",
        params![settings_id, payload],
    )?;
    Ok(())
}

fn delete_settings(conn: &Connection, settings_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM table_settings WHERE settings_id = ?1",
        params![settings_id],
    )?;
    Ok(removed > 0)
}
