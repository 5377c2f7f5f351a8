use clap::Parser;
use tracing::info;

use staffsync::cli::Cli;
use staffsync::config::AppConfig;
use staffsync::db::{self, Stores};
use staffsync::migrate::services::{migrate_users, reset_and_migrate, RolePolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "staffsync=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    cli.ensure_confirmed()?;

    let config = AppConfig::from_env()?;
    let policy = RolePolicy::new(config.admin_allowlist.as_deref());

    // Both connections are established jointly; either store being
    // unreachable is fatal and exits non-zero.
    let stores = Stores::connect(&config).await?;
    // Idempotent, and the reset path re-applies it after the wipe.
    db::apply_schema(&stores.target).await?;

    let summary = if cli.reset {
        reset_and_migrate(&stores, &policy, cli.dry_run).await?
    } else {
        migrate_users(&stores, &policy, cli.dry_run).await?
    };

    if cli.dry_run {
        info!(%summary, "dry run complete, nothing written");
    } else {
        info!(%summary, "migration complete");
    }
    println!("{summary}");

    Ok(())
}
