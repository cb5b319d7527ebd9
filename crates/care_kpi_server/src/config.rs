//! Command line and environment configuration.
//!
//! Every option can also come from a `CARE_KPI_*` environment variable;
//! `.env` is loaded before parsing.

use std::time::Duration;

use care_kpi_postgres::DatabaseConfig;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "care_kpi_server")]
#[command(version)]
#[command(about = "Care KPI dashboard server and template-name migrations")]
pub struct Cli {
    /// Postgres connection string
    #[arg(long, env = "CARE_KPI_DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, env = "CARE_KPI_DB_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "CARE_KPI_DB_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub db_connect_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the KPI HTTP API
    Serve {
        #[arg(long, env = "CARE_KPI_BIND_ADDR", default_value = "0.0.0.0:4200")]
        bind_addr: String,

        /// HMAC secret for bearer tokens
        #[arg(long, env = "CARE_KPI_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,

        /// Apply pending template-name migrations before serving
        #[arg(long)]
        migrate: bool,
    },

    /// Apply pending template-name migrations and exit
    Migrate,

    /// Revert the newest applied template-name migration and exit
    Revert,
}

impl Cli {
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.db_pool_size,
            connection_timeout: Duration::from_secs(self.db_connect_timeout_secs),
            ..DatabaseConfig::new(self.database_url.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_with_migrate() {
        let cli = Cli::try_parse_from([
            "care_kpi_server",
            "--database-url",
            "postgresql://localhost/care",
            "--db-pool-size",
            "4",
            "serve",
            "--jwt-secret",
            "s3cret",
            "--bind-addr",
            "127.0.0.1:8080",
            "--migrate",
        ])
        .unwrap();
        let db = cli.database_config();
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.connection_timeout, Duration::from_secs(30));
        match cli.command {
            Command::Serve {
                bind_addr, migrate, ..
            } => {
                assert_eq!(bind_addr, "127.0.0.1:8080");
                assert!(migrate);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn migrate_needs_no_jwt_secret() {
        let cli = Cli::try_parse_from([
            "care_kpi_server",
            "--database-url",
            "postgresql://localhost/care",
            "migrate",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Migrate));
    }
}
