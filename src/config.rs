use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Legacy store holding the accounts to migrate. Read-only.
    pub source_database_url: String,
    /// Target store owned by the salary application.
    pub database_url: String,
    /// Optional comma-separated admin emails overriding the built-in list.
    pub admin_allowlist: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let source_database_url = std::env::var("SOURCE_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("SOURCE_DATABASE_URL must be set"))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let admin_allowlist = std::env::var("ADMIN_ALLOWLIST")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Ok(Self {
            source_database_url,
            database_url,
            admin_allowlist,
        })
    }
}
