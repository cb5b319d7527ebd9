//! care_kpi_server: KPI dashboard API plus the template-name migration runner.
//!
//! See `config.rs` for the `CARE_KPI_*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use care_kpi_core::{KpiService, KpiServiceImpl, Migrator};
use care_kpi_postgres::{bootstrap_schema, PgStores};
use care_kpi_server::config::{Cli, Command};
use care_kpi_server::middleware::jwt::JwtConfig;
use care_kpi_server::router::build_router;
use clap::Parser;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,care_kpi_server=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let pool = cli
        .database_config()
        .connect()
        .await
        .context("failed to connect to database")?;
    bootstrap_schema(&pool)
        .await
        .context("failed to create base tables")?;

    let stores = PgStores::new(pool);
    let migrator = Migrator::new(stores.schema.clone());

    match cli.command {
        Command::Migrate => {
            let reports = migrator.run_pending().await?;
            tracing::info!("{} migration(s) applied", reports.len());
        }
        Command::Revert => match migrator.revert_latest().await? {
            Some(version) => tracing::info!("reverted migration {version}"),
            None => tracing::info!("no migrations applied; nothing to revert"),
        },
        Command::Serve {
            bind_addr,
            jwt_secret,
            migrate,
        } => {
            if migrate {
                migrator.run_pending().await?;
            }

            let service: Arc<dyn KpiService> =
                Arc::new(KpiServiceImpl::new(stores.kpis, stores.catalog));
            let app = build_router(service, JwtConfig::from_secret(jwt_secret.as_bytes()));

            let listener = TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind to {bind_addr}"))?;
            tracing::info!("care_kpi_server listening on {bind_addr}");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
    }
}
