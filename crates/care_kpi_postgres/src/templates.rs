//! Template inserts, with unique-index violations surfaced as domain errors.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use care_kpi_core::migration::guard_index_names;
use care_kpi_core::ports::{Result, TemplateWriter};
use care_kpi_core::types::{CareSettingTemplate, NewTemplate};
use care_kpi_core::KpiError;

use crate::sqlx_types::PgTemplate;

pub struct PgTemplateWriter {
    pool: PgPool,
}

impl PgTemplateWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateWriter for PgTemplateWriter {
    async fn insert_template(&self, template: &NewTemplate) -> Result<CareSettingTemplate> {
        let row = sqlx::query_as::<_, PgTemplate>(
            r#"
            INSERT INTO care_setting_template (name, health_authority, is_master, unit_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, health_authority, is_master, unit_id, created_at
            "#,
        )
        .bind(&template.name)
        .bind(template.health_authority.as_deref())
        .bind(template.is_master)
        .bind(template.unit_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, template))?;
        Ok(row.into())
    }
}

fn map_insert_error(err: sqlx::Error, template: &NewTemplate) -> KpiError {
    if let sqlx::Error::Database(db) = &err {
        let guarded = db
            .constraint()
            .is_some_and(|c| guard_index_names().any(|name| name == c));
        if db.is_unique_violation() && guarded {
            return KpiError::DuplicateTemplateName {
                name: template.name.clone(),
                health_authority: template.health_authority.clone(),
            };
        }
    }
    KpiError::Internal(anyhow!(err))
}
