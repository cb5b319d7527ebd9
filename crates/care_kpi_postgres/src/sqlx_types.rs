//! Row mappings between Postgres and core types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use care_kpi_core::reconcile::TemplateRow;
use care_kpi_core::types::{CarePlansBySetting, CareSettingTemplate, TemplateSummary};

#[derive(Debug, FromRow)]
pub(crate) struct PgTemplate {
    pub id: Uuid,
    pub name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<PgTemplate> for CareSettingTemplate {
    fn from(r: PgTemplate) -> Self {
        Self {
            id: r.id,
            name: r.name,
            health_authority: r.health_authority,
            is_master: r.is_master,
            unit_id: r.unit_id,
            created_at: r.created_at,
        }
    }
}

/// Template row with the engine's case-folded name, as loaded for
/// reconciliation.
#[derive(Debug, FromRow)]
pub(crate) struct PgFoldedTemplate {
    pub id: Uuid,
    pub name: String,
    pub folded_name: String,
    pub unit_id: Option<Uuid>,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PgFoldedTemplate> for TemplateRow {
    fn from(r: PgFoldedTemplate) -> Self {
        Self {
            id: r.id,
            name: r.name,
            folded_name: r.folded_name,
            unit_id: r.unit_id,
            health_authority: r.health_authority,
            is_master: r.is_master,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgBreakdownRow {
    pub id: Uuid,
    pub name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub count: i64,
}

impl From<PgBreakdownRow> for CarePlansBySetting {
    fn from(r: PgBreakdownRow) -> Self {
        CarePlansBySetting::new(r.id, r.name, r.health_authority, r.is_master, non_negative(r.count))
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgTemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
}

impl From<PgTemplateSummary> for TemplateSummary {
    fn from(r: PgTemplateSummary) -> Self {
        Self {
            id: r.id,
            display_name: r.name,
            health_authority: r.health_authority,
            is_master: r.is_master,
        }
    }
}

/// `COUNT(*)` arrives as BIGINT.
pub(crate) fn non_negative(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
