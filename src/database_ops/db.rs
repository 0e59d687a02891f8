use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// Pool sizing knobs, usually read from the environment.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolSettings {
    pub fn from_env() -> Self {
        use crate::util::env::env_parse;
        let defaults = Self::default();
        Self {
            max_connections: env_parse("DB_MAX_CONNS", defaults.max_connections),
            acquire_timeout: Duration::from_secs(env_parse(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )),
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
    }
}

/// Shared handle to the directory database. Cloning is cheap; every request
/// or loader row checks its own connection out of the pool.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, settings: PoolSettings) -> Result<Self> {
        let connect_options =
            PgConnectOptions::from_str(database_url).context("invalid database URL")?;

        let pool = settings
            .pool_options()
            .connect_with(connect_options)
            .await
            .context("failed to connect to database")?;
        info!("connected to db");
        Ok(Self { pool })
    }

    /// Pool that opens connections on first use; startup never blocks on the database.
    pub fn connect_lazy(database_url: &str, settings: PoolSettings) -> Result<Self> {
        let connect_options =
            PgConnectOptions::from_str(database_url).context("invalid database URL")?;
        let pool = settings.pool_options().connect_lazy_with(connect_options);
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

/// Create the target database when it does not exist yet.
///
/// Postgres has no `CREATE DATABASE IF NOT EXISTS`, so this connects to the
/// maintenance database on the same server, checks `pg_database`, and issues
/// the DDL only when needed. Returns true when the database was created.
#[instrument(skip(database_url))]
pub async fn ensure_database(database_url: &str, maintenance_db: &str) -> Result<bool> {
    let target = PgConnectOptions::from_str(database_url).context("invalid database URL")?;
    let Some(name) = target.get_database().map(str::to_owned) else {
        // No database in the DSN: the server default is used, nothing to create.
        return Ok(false);
    };

    let admin_options = target.clone().database(maintenance_db);
    let mut conn = admin_options
        .connect()
        .await
        .with_context(|| format!("failed to connect to maintenance database {maintenance_db}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&name)
            .fetch_one(&mut conn)
            .await?;
    if exists {
        info!(database = %name, "database already present");
        return Ok(false);
    }

    // Identifiers cannot be bound, so the name is quoted instead.
    let stmt = format!("CREATE DATABASE {}", quote_ident(&name));
    sqlx::raw_sql(&stmt)
        .execute(&mut conn)
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(database = %name, "database created");
    Ok(true)
}

/// Quote a Postgres identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifiers() {
        assert_eq!(quote_ident("directorio"), "\"directorio\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_ident("x\"; DROP"), "\"x\"\"; DROP\"");
    }

    #[test]
    fn default_pool_settings() {
        let s = PoolSettings::default();
        assert_eq!(s.max_connections, 10);
        assert_eq!(s.acquire_timeout, Duration::from_secs(10));
    }
}
