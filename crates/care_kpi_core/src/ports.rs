//! Storage port traits.
//! Implemented by care_kpi_postgres and by [`crate::memory::InMemoryStore`];
//! core logic depends only on these traits.

use async_trait::async_trait;

use crate::error::KpiError;
use crate::migration::{MigrationReport, TemplateNameMigration};
use crate::query::{CatalogQuery, SessionCountQuery, SettingBreakdownQuery, UserCountQuery};
use crate::types::{CarePlansBySetting, CareSettingTemplate, NewTemplate, TemplateSummary};

pub type Result<T> = std::result::Result<T, KpiError>;

/// Read-only counters and groupings behind the KPI dashboard.
#[async_trait]
pub trait KpiStore: Send + Sync {
    async fn count_users(&self, query: &UserCountQuery) -> Result<u64>;

    async fn count_care_plans(&self, query: &SessionCountQuery) -> Result<u64>;

    async fn care_plans_by_setting(
        &self,
        query: &SettingBreakdownQuery,
    ) -> Result<Vec<CarePlansBySetting>>;
}

#[async_trait]
pub trait TemplateCatalogStore: Send + Sync {
    async fn list_templates(&self, query: &CatalogQuery) -> Result<Vec<TemplateSummary>>;
}

/// Single-row template insert, used for seeding.
///
/// Once a uniqueness guard is installed a colliding insert fails with
/// [`KpiError::DuplicateTemplateName`].
#[async_trait]
pub trait TemplateWriter: Send + Sync {
    async fn insert_template(&self, template: &NewTemplate) -> Result<CareSettingTemplate>;
}

/// Schema evolution for template-name uniqueness.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Versions already applied, in any order.
    async fn applied_versions(&self) -> Result<Vec<i64>>;

    /// Reconcile names, backfill, install the guard and record the version,
    /// all or nothing.
    async fn apply(&self, migration: &TemplateNameMigration) -> Result<MigrationReport>;

    /// Remove the guard and the version record. Renamed templates keep their
    /// new names.
    async fn revert(&self, migration: &TemplateNameMigration) -> Result<()>;
}
