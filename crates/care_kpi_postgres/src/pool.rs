//! Connection pool configuration.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

/// Base tables; every statement is idempotent.
const SCHEMA_SQL: &str = include_str!("../migrations/0001_care_kpi_schema.sql");

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }

    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        info!("Connecting to database: {}", mask_database_url(&self.database_url));

        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connection_timeout);
        if let Some(idle_timeout) = self.idle_timeout {
            options = options.idle_timeout(idle_timeout);
        }
        if let Some(max_lifetime) = self.max_lifetime {
            options = options.max_lifetime(max_lifetime);
        }

        let pool = options.connect(&self.database_url).await.map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            e
        })?;
        info!("Database connection pool created");
        Ok(pool)
    }
}

/// Create the base tables if they are missing.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) if url.len() > 20 => {
            let head: String = url.chars().take(10).collect();
            let tail: String = url.chars().rev().take(10).collect::<Vec<_>>().into_iter().rev().collect();
            format!("{head}***{tail}")
        }
        Err(_) => "***".to_string(),
    }
}
