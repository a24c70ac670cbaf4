use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::debug;

use super::{Entry, Store};

const CREATE_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL UNIQUE,
        hours REAL NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

const SELECT_ENTRIES: &str = "SELECT date, hours FROM entries ORDER BY date DESC";

const UPSERT_ENTRY: &str = "INSERT INTO entries (date, hours) VALUES (?, ?)
    ON CONFLICT (date) DO UPDATE SET hours = excluded.hours";

const DELETE_ENTRY: &str = "DELETE FROM entries WHERE date = ?";

/// Entries in an embedded SQLite file. The file is created on first connect.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    options: SqliteConnectOptions,
}

impl SqliteStore {
    pub fn new(options: SqliteConnectOptions) -> Self {
        SqliteStore { options }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::new(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Ok(Self::new(options))
    }

    pub(crate) async fn connect(&self) -> Result<SqliteConnection> {
        Ok(SqliteConnection::connect_with(&self.options).await?)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(CREATE_ENTRIES).execute(&mut conn).await?;
        conn.close().await?;

        Ok(())
    }

    async fn list_entries(&self) -> Result<Vec<Entry>> {
        let mut conn = self.connect().await?;
        let entries = sqlx::query_as::<_, Entry>(SELECT_ENTRIES)
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;

        Ok(entries)
    }

    async fn upsert_entry(&self, date: &str, hours: f64) -> Result<Entry> {
        let mut conn = self.connect().await?;
        sqlx::query(UPSERT_ENTRY)
            .bind(date)
            .bind(hours)
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        Ok(Entry {
            date: date.to_string(),
            hours,
        })
    }

    async fn delete_entry(&self, date: &str) -> Result<()> {
        let mut conn = self.connect().await?;
        let done = sqlx::query(DELETE_ENTRY)
            .bind(date)
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        debug!(date, rows = done.rows_affected(), "delete entry");
        Ok(())
    }
}
