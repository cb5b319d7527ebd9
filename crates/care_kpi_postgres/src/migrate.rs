//! Postgres side of template-name migrations.
//!
//! `apply` runs in a single transaction: take the migration lock, block
//! concurrent template writes, load every template, rename per the core
//! planner, backfill masters, create the unique index and record the
//! version. Any failure rolls the whole step back.
//!
//! `CREATE UNIQUE INDEX IF NOT EXISTS` silently keeps any existing relation
//! with the guard's name, so the resulting definition is read back from
//! `pg_indexes` and must match the key before the version is recorded.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use care_kpi_core::migration::{MigrationReport, TemplateNameMigration};
use care_kpi_core::ports::{Result, SchemaStore};
use care_kpi_core::reconcile::{ReconciliationPlan, TemplateRow, UniquenessKey};
use care_kpi_core::KpiError;

use crate::sqlx_types::PgFoldedTemplate;

/// Key for `pg_advisory_xact_lock`, shared by every migration step.
const MIGRATION_LOCK_KEY: i64 = 0x6361_7265_6b70_6900;

/// Index columns as Postgres prints them back in `pg_indexes.indexdef`.
fn index_columns(key: UniquenessKey) -> &'static str {
    match key {
        UniquenessKey::NameUnitAuthority => "lower(name), unit_id, health_authority",
        UniquenessKey::NameAuthority => "lower(name), health_authority",
    }
}

/// `CREATE UNIQUE INDEX` statement for a migration's uniqueness key.
pub fn index_ddl(migration: &TemplateNameMigration) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON care_setting_template ({})",
        migration.index_name,
        index_columns(migration.key)
    )
}

/// Whether an existing index definition is the migration's guard.
pub fn guard_index_matches(indexdef: &str, migration: &TemplateNameMigration) -> bool {
    let expected_tail = format!(
        "care_setting_template USING btree ({})",
        index_columns(migration.key)
    );
    indexdef.starts_with(&format!("CREATE UNIQUE INDEX {} ON ", migration.index_name))
        && indexdef.ends_with(&expected_tail)
}

pub struct PgSchemaStore {
    pool: PgPool,
}

impl PgSchemaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        migration: &TemplateNameMigration,
    ) -> anyhow::Result<ReconciliationPlan> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut **tx)
            .await?;
        sqlx::query("LOCK TABLE care_setting_template IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut **tx)
            .await?;

        let rows: Vec<TemplateRow> = sqlx::query_as::<_, PgFoldedTemplate>(
            r#"
            SELECT id, name, LOWER(name) AS folded_name, unit_id,
                   health_authority, is_master, created_at
            FROM care_setting_template
            "#,
        )
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let plan = migration.plan(&rows);

        if !plan.renames.is_empty() {
            let ids: Vec<Uuid> = plan.renames.iter().map(|r| r.id).collect();
            let names: Vec<String> = plan.renames.iter().map(|r| r.to.clone()).collect();
            sqlx::query(
                r#"
                UPDATE care_setting_template AS t
                SET name = r.name
                FROM UNNEST($1::uuid[], $2::text[]) AS r(id, name)
                WHERE t.id = r.id
                "#,
            )
            .bind(&ids)
            .bind(&names)
            .execute(&mut **tx)
            .await?;
        }

        if !plan.master_backfill.is_empty() {
            sqlx::query("UPDATE care_setting_template SET is_master = true WHERE id = ANY($1)")
                .bind(&plan.master_backfill)
                .execute(&mut **tx)
                .await?;
        }

        sqlx::query(&index_ddl(migration)).execute(&mut **tx).await?;
        let indexdef = sqlx::query_scalar::<_, String>(
            r#"
            SELECT indexdef FROM pg_indexes
            WHERE indexname = $1 AND tablename = 'care_setting_template'
            "#,
        )
        .bind(migration.index_name)
        .fetch_optional(&mut **tx)
        .await?;
        match indexdef {
            Some(def) if guard_index_matches(&def, migration) => {}
            Some(def) => bail!(
                "index {} already exists with another definition: {def}",
                migration.index_name
            ),
            None => bail!(
                "relation {} exists but is not an index on care_setting_template",
                migration.index_name
            ),
        }

        sqlx::query(
            r#"
            INSERT INTO template_name_migrations (version, name)
            VALUES ($1, $2)
            ON CONFLICT (version) DO NOTHING
            "#,
        )
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut **tx)
        .await?;

        Ok(plan)
    }
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    async fn applied_versions(&self) -> Result<Vec<i64>> {
        let versions = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM template_name_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(versions)
    }

    async fn apply(&self, migration: &TemplateNameMigration) -> Result<MigrationReport> {
        let failed = |e: sqlx::Error| KpiError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;
        let plan = self
            .apply_in_tx(&mut tx, migration)
            .await
            .map_err(|e| KpiError::MigrationFailed {
                version: migration.version,
                reason: format!("{e:#}"),
            })?;
        tx.commit().await.map_err(failed)?;

        tracing::debug!(
            target: "kpi.migration",
            version = migration.version,
            renamed = plan.renames.len(),
            "template names reconciled"
        );
        Ok(MigrationReport::new(migration, plan))
    }

    async fn revert(&self, migration: &TemplateNameMigration) -> Result<()> {
        let failed = |e: sqlx::Error| KpiError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        sqlx::query(&format!("DROP INDEX IF EXISTS {}", migration.index_name))
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        sqlx::query("DELETE FROM template_name_migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;
        Ok(())
    }
}
