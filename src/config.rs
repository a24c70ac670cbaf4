//! Server settings, read from the environment.
//!
//! A `.env` file in the working directory is loaded first, so local setups can
//! keep `DATABASE_URL` and friends out of the shell.

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use dotenv::dotenv;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:workhours.db";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_INDEX_FILE: &str = "static/index.html";

/// Where entries are persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseTarget {
    /// Plain path to an SQLite file.
    SqliteFile(PathBuf),
    /// `sqlite:` connection string.
    SqliteUrl(String),
    /// `postgresql://` connection string.
    Postgres(String),
}

impl DatabaseTarget {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            bail!("database target is empty");
        }

        if let Some(rest) = value.strip_prefix("postgres://") {
            return Ok(DatabaseTarget::Postgres(format!("postgresql://{}", rest)));
        }
        if value.starts_with("postgresql://") {
            return Ok(DatabaseTarget::Postgres(value.to_string()));
        }
        if value.starts_with("sqlite:") {
            return Ok(DatabaseTarget::SqliteUrl(value.to_string()));
        }
        if let Some((scheme, _)) = value.split_once("://") {
            bail!("unsupported database scheme: {}", scheme);
        }

        Ok(DatabaseTarget::SqliteFile(PathBuf::from(value)))
    }

    /// Backend name, for logs.
    pub fn backend(&self) -> &'static str {
        match self {
            DatabaseTarget::SqliteFile(_) | DatabaseTarget::SqliteUrl(_) => "sqlite",
            DatabaseTarget::Postgres(_) => "postgres",
        }
    }
}

impl fmt::Display for DatabaseTarget {
    // Never print postgres credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseTarget::SqliteFile(path) => write!(f, "{}", path.display()),
            DatabaseTarget::SqliteUrl(url) => write!(f, "{}", url),
            DatabaseTarget::Postgres(url) => {
                let host = url
                    .rsplit_once('@')
                    .map(|(_, host)| host)
                    .unwrap_or_else(|| url.trim_start_matches("postgresql://"));
                write!(f, "postgresql://{}", host)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: DatabaseTarget,
    pub host: IpAddr,
    pub port: u16,
    pub index_file: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key/value source. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let database = DatabaseTarget::parse(&database_url).context("Invalid DATABASE_URL")?;

        let port = match lookup("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("{}: {:?}", e, port))
                .context("Invalid PORT")?,
            None => DEFAULT_PORT,
        };

        let host = match lookup("HOST") {
            Some(host) => host
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| anyhow!("{}: {:?}", e, host))
                .context("Invalid HOST")?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let index_file = lookup("INDEX_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_FILE));

        Ok(Settings {
            database,
            host,
            port,
            index_file,
        })
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
