use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DatabaseTarget;

mod postgres;
mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

/// Hours worked on one date. `date` is unique in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub date: String,
    pub hours: f64,
}

/// Persistence for entries.
///
/// Every call opens its own connection and closes it before returning, so an
/// implementation only holds connect options. Errors carry the driver's
/// message unchanged.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the entries table if it does not exist yet. Safe to call on every start.
    async fn ensure_schema(&self) -> Result<()>;

    /// All entries, newest date first.
    async fn list_entries(&self) -> Result<Vec<Entry>>;

    /// Insert the entry, or overwrite `hours` when `date` already exists.
    async fn upsert_entry(&self, date: &str, hours: f64) -> Result<Entry>;

    /// Remove the entry for `date`. Removing a missing date succeeds.
    async fn delete_entry(&self, date: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn Store>;

/// Pick the store implementation for a configured target. No connection is opened here.
pub fn store_for(target: &DatabaseTarget) -> Result<SharedStore> {
    let store: SharedStore = match target {
        DatabaseTarget::SqliteFile(path) => Arc::new(SqliteStore::from_path(path)),
        DatabaseTarget::SqliteUrl(url) => Arc::new(SqliteStore::from_url(url)?),
        DatabaseTarget::Postgres(url) => Arc::new(PostgresStore::from_url(url)?),
    };

    Ok(store)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fake::Fake;
    use rand::distributions::Alphanumeric;
    use rand::{thread_rng, Rng};
    use std::path::PathBuf;

    fn random_name() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect()
    }

    pub fn test_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("{}_test.db", random_name()))
    }

    /// Fresh SQLite store on a throwaway file, schema not created.
    pub fn setup_test_store() -> SqliteStore {
        SqliteStore::from_path(test_db_path())
    }

    pub async fn setup_test_db() -> Result<SqliteStore> {
        let store = setup_test_store();
        store.ensure_schema().await?;

        Ok(store)
    }

    fn random_hours() -> f64 {
        (0.5..12.0).fake::<f64>()
    }

    async fn check_upsert_and_list(store: &dyn Store) -> Result<()> {
        let hours = random_hours();
        let entry = store.upsert_entry("2024-01-01", hours).await?;

        assert_eq!(
            entry,
            Entry {
                date: "2024-01-01".to_string(),
                hours
            }
        );
        assert_eq!(store.list_entries().await?, vec![entry]);

        Ok(())
    }

    async fn check_upsert_replaces_hours(store: &dyn Store) -> Result<()> {
        store.upsert_entry("2024-03-05", 8.0).await?;
        store.upsert_entry("2024-03-05", 8.0).await?;
        assert_eq!(store.list_entries().await?.len(), 1);

        store.upsert_entry("2024-03-05", 6.5).await?;
        let entries = store.list_entries().await?;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 6.5);

        Ok(())
    }

    async fn check_list_order(store: &dyn Store) -> Result<()> {
        for date in &["2024-02-10", "2023-12-31", "2024-11-02", "2024-02-09"] {
            store.upsert_entry(date, random_hours()).await?;
        }

        let dates: Vec<String> = store
            .list_entries()
            .await?
            .into_iter()
            .map(|e| e.date)
            .collect();

        assert_eq!(
            dates,
            vec!["2024-11-02", "2024-02-10", "2024-02-09", "2023-12-31"]
        );

        Ok(())
    }

    async fn check_delete(store: &dyn Store) -> Result<()> {
        store.upsert_entry("2024-06-01", 4.0).await?;
        store.upsert_entry("2024-06-02", 7.25).await?;

        store.delete_entry("2024-06-01").await?;
        // Nothing left to delete, still fine.
        store.delete_entry("2024-06-01").await?;
        store.delete_entry("1999-01-01").await?;

        assert_eq!(
            store.list_entries().await?,
            vec![Entry {
                date: "2024-06-02".to_string(),
                hours: 7.25
            }]
        );

        Ok(())
    }

    async fn clear(store: &dyn Store) -> Result<()> {
        for entry in store.list_entries().await? {
            store.delete_entry(&entry.date).await?;
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() -> Result<()> {
        let store = setup_test_db().await?;
        store.upsert_entry("2024-01-01", 8.0).await?;

        store.ensure_schema().await?;
        store.ensure_schema().await?;

        assert_eq!(store.list_entries().await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_and_list() -> Result<()> {
        let store = setup_test_db().await?;
        check_upsert_and_list(&store).await
    }

    #[tokio::test]
    async fn test_upsert_replaces_hours() -> Result<()> {
        let store = setup_test_db().await?;
        check_upsert_replaces_hours(&store).await
    }

    #[tokio::test]
    async fn test_list_order() -> Result<()> {
        let store = setup_test_db().await?;
        check_list_order(&store).await
    }

    #[tokio::test]
    async fn test_delete_entry() -> Result<()> {
        let store = setup_test_db().await?;
        check_delete(&store).await
    }

    #[tokio::test]
    async fn test_list_without_schema_fails() -> Result<()> {
        let store = setup_test_store();

        let err = store.list_entries().await.unwrap_err();
        assert!(err.to_string().contains("no such table"));

        Ok(())
    }

    #[tokio::test]
    async fn test_store_for_sqlite_targets() -> Result<()> {
        let path = test_db_path();

        let store = store_for(&DatabaseTarget::SqliteFile(path.clone()))?;
        store.ensure_schema().await?;
        store.upsert_entry("2024-04-01", 3.0).await?;

        // Same file through a connection string.
        let url = format!("sqlite:{}", path.display());
        let store = store_for(&DatabaseTarget::SqliteUrl(url))?;
        assert_eq!(store.list_entries().await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "needs a running PostgreSQL server; set TEST_POSTGRES_URL"]
    async fn test_postgres_store() -> Result<()> {
        let url = std::env::var("TEST_POSTGRES_URL")?;
        let store = store_for(&DatabaseTarget::parse(&url)?)?;
        store.ensure_schema().await?;
        store.ensure_schema().await?;

        clear(store.as_ref()).await?;
        check_upsert_and_list(store.as_ref()).await?;

        clear(store.as_ref()).await?;
        check_upsert_replaces_hours(store.as_ref()).await?;

        clear(store.as_ref()).await?;
        check_list_order(store.as_ref()).await?;

        clear(store.as_ref()).await?;
        check_delete(store.as_ref()).await?;

        clear(store.as_ref()).await
    }
}
