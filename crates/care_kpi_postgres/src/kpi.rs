//! Postgres evaluation of the KPI and catalog queries.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time database requirement. Scope filters arrive as nullable binds
//! so every query has a single static shape.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use care_kpi_core::ports::{KpiStore, Result, TemplateCatalogStore};
use care_kpi_core::query::{
    CatalogQuery, SessionCountQuery, SettingBreakdownQuery, UserCountQuery, UserStatus,
};
use care_kpi_core::types::{CarePlansBySetting, TemplateSummary};

use crate::sqlx_types::{non_negative, PgBreakdownRow, PgTemplateSummary};

const COUNT_ACTIVE_USERS: &str = r#"
    SELECT COUNT(*)
    FROM users u
    WHERE u.external_identity_ref IS NOT NULL
      AND u.revoked_at IS NULL
      AND ($1::text IS NULL OR u.organization = $1)
"#;

const COUNT_PENDING_USERS: &str = r#"
    SELECT COUNT(*)
    FROM users u
    WHERE u.external_identity_ref IS NULL
      AND u.revoked_at IS NULL
      AND ($1::text IS NULL OR u.organization = $1)
"#;

pub struct PgKpiStore {
    pool: PgPool,
}

impl PgKpiStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KpiStore for PgKpiStore {
    async fn count_users(&self, query: &UserCountQuery) -> Result<u64> {
        let sql = match query.status {
            UserStatus::Active => COUNT_ACTIVE_USERS,
            UserStatus::Pending => COUNT_PENDING_USERS,
        };
        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(query.organization.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(non_negative(count))
    }

    async fn count_care_plans(&self, query: &SessionCountQuery) -> Result<u64> {
        // Creator's organization, not the template's health authority: a plan
        // built from a GLOBAL template belongs to whoever created it.
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM planning_session ps
            JOIN care_setting_template cst ON cst.id = ps.care_setting_template_id
            LEFT JOIN users creator ON creator.id = ps.created_by
            WHERE ($1::text IS NULL OR creator.organization = $1)
            "#,
        )
        .bind(query.creator_organization.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(non_negative(count))
    }

    async fn care_plans_by_setting(
        &self,
        query: &SettingBreakdownQuery,
    ) -> Result<Vec<CarePlansBySetting>> {
        let rows = sqlx::query_as::<_, PgBreakdownRow>(
            r#"
            SELECT cst.id, cst.name, cst.health_authority, cst.is_master,
                   COUNT(ps.id) AS count
            FROM care_setting_template cst
            LEFT JOIN planning_session ps ON ps.care_setting_template_id = cst.id
            WHERE ($1::text[] IS NULL OR cst.health_authority = ANY($1))
              AND ($2::uuid IS NULL OR cst.id = $2)
            GROUP BY cst.id, cst.name, cst.health_authority, cst.is_master
            ORDER BY count DESC, cst.id ASC
            "#,
        )
        .bind(query.visibility.authorities().map(<[String]>::to_vec))
        .bind(query.template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

pub struct PgTemplateCatalogStore {
    pool: PgPool,
}

impl PgTemplateCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateCatalogStore for PgTemplateCatalogStore {
    async fn list_templates(&self, query: &CatalogQuery) -> Result<Vec<TemplateSummary>> {
        let rows = sqlx::query_as::<_, PgTemplateSummary>(
            r#"
            SELECT cst.id, cst.name, cst.health_authority, cst.is_master
            FROM care_setting_template cst
            WHERE ($1::text[] IS NULL OR cst.health_authority = ANY($1))
            ORDER BY cst.name COLLATE "C" ASC,
                     cst.health_authority COLLATE "C" ASC NULLS LAST,
                     cst.id ASC
            "#,
        )
        .bind(query.visibility.authorities().map(<[String]>::to_vec))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
