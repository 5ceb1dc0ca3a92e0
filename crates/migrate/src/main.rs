//! Applies the catalogue schema to Postgres.
//!
//! `storefront-migrate --print` writes the DDL to stdout without connecting.

use anyhow::Context;

use storefront_infra::InfraConfig;
use storefront_infra::postgres::PostgresCatalogueRepository;
use storefront_infra::sql::catalogue_migration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init().context("invalid logging configuration")?;

    if std::env::args().skip(1).any(|arg| arg == "--print") {
        print!("{}", catalogue_migration());
        return Ok(());
    }

    let config = InfraConfig::from_env()?;
    let url = config.require_database_url()?;

    let repository = PostgresCatalogueRepository::connect(url, config.max_connections)
        .await
        .context("failed to connect to the catalogue database")?;
    repository.migrate().await?;

    tracing::info!(max_connections = config.max_connections, "catalogue schema is up to date");
    Ok(())
}
