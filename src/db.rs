use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::error::MigrateError;

/// Connect attempts give up after this long.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-statement bound so a wedged store cannot hang the run.
const STATEMENT_TIMEOUT: &str = "45s";

/// The two store handles a migration run owns exclusively.
pub struct Stores {
    pub source: PgPool,
    pub target: PgPool,
}

impl Stores {
    /// Establish both connections jointly; either failing aborts the run.
    pub async fn connect(config: &AppConfig) -> Result<Self, MigrateError> {
        let (source, target) = tokio::try_join!(
            connect_pool(&config.source_database_url, "source"),
            connect_pool(&config.database_url, "target"),
        )?;
        Ok(Self { source, target })
    }
}

async fn connect_pool(url: &str, store: &'static str) -> Result<PgPool, MigrateError> {
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| MigrateError::connection(store, e))?
        .options([("statement_timeout", STATEMENT_TIMEOUT)]);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::connection(store, e))?;
    tracing::debug!(store, "connected");
    Ok(pool)
}

/// Apply the target schema. Idempotent; also used to rebuild after a reset.
pub async fn apply_schema(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("apply target schema")?;
    Ok(())
}
