//! care_kpi_core: tenant-scoped KPI aggregation and template-name
//! reconciliation.
//!
//! Pure domain types, scope derivation, declarative queries, port traits and
//! services. No database driver; adapters live in `care_kpi_postgres`.

pub mod actor;
pub mod error;
pub mod memory;
pub mod migration;
pub mod ports;
pub mod query;
pub mod reconcile;
pub mod scope;
pub mod service;
pub mod types;

pub use actor::{has_access, Actor, Role, KPI_READER_ROLES};
pub use error::KpiError;
pub use migration::{MigrationReport, Migrator, TemplateNameMigration, TEMPLATE_NAME_MIGRATIONS};
pub use query::KpiFilter;
pub use scope::Scope;
pub use service::{KpiService, KpiServiceImpl};
