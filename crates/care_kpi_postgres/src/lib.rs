//! PostgreSQL adapters for the care KPI port traits.
//!
//! Wraps a `PgPool` and exposes one store per port. Construction is cheap:
//! every store clones the pool handle.

pub mod kpi;
pub mod migrate;
pub mod pool;
mod sqlx_types;
pub mod templates;

use std::sync::Arc;

use sqlx::PgPool;

pub use kpi::{PgKpiStore, PgTemplateCatalogStore};
pub use migrate::{index_ddl, PgSchemaStore};
pub use pool::{bootstrap_schema, mask_database_url, DatabaseConfig};
pub use templates::PgTemplateWriter;

/// All Postgres-backed stores over one pool.
#[derive(Clone)]
pub struct PgStores {
    pub kpis: Arc<PgKpiStore>,
    pub catalog: Arc<PgTemplateCatalogStore>,
    pub templates: Arc<PgTemplateWriter>,
    pub schema: Arc<PgSchemaStore>,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            kpis: Arc::new(PgKpiStore::new(pool.clone())),
            catalog: Arc::new(PgTemplateCatalogStore::new(pool.clone())),
            templates: Arc::new(PgTemplateWriter::new(pool.clone())),
            schema: Arc::new(PgSchemaStore::new(pool)),
        }
    }
}
