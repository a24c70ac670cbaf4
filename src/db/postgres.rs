use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::debug;

use super::{Entry, Store};

// DOUBLE PRECISION rather than REAL: postgres REAL is four bytes and would
// round what clients send. Tables created with `hours REAL` still work since
// reads cast to float8.
const CREATE_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS entries (
        id SERIAL PRIMARY KEY,
        date TEXT NOT NULL UNIQUE,
        hours DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

const SELECT_ENTRIES: &str =
    "SELECT date, hours::float8 AS hours FROM entries ORDER BY date DESC";

const UPSERT_ENTRY: &str = "INSERT INTO entries (date, hours) VALUES ($1, $2)
    ON CONFLICT (date) DO UPDATE SET hours = EXCLUDED.hours";

const DELETE_ENTRY: &str = "DELETE FROM entries WHERE date = $1";

/// Entries on a PostgreSQL server.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    options: PgConnectOptions,
}

impl PostgresStore {
    pub fn new(options: PgConnectOptions) -> Self {
        PostgresStore { options }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(PgConnectOptions::from_str(url)?))
    }

    pub(crate) async fn connect(&self) -> Result<PgConnection> {
        Ok(PgConnection::connect_with(&self.options).await?)
    }
}

#[async_trait]
impl Store for PostgresStore {
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
