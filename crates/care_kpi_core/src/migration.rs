//! Versioned template-name migrations and the runner that applies them in
//! strict version order.
//!
//! Each migration narrows or installs a uniqueness key. Applying it runs the
//! reconciliation planner against the current rows before the guard goes in,
//! so the guard always succeeds. Reverting only removes the guard: template
//! names rewritten on the way up stay rewritten.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::KpiError;
use crate::ports::{Result, SchemaStore};
use crate::reconcile::{plan_reconciliation, ReconciliationPlan, TemplateRename, TemplateRow, UniquenessKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateNameMigration {
    pub version: i64,
    pub name: &'static str,
    pub key: UniquenessKey,
    /// Inserted into renamed templates as `" (<marker>-<id prefix>)"`.
    pub marker: &'static str,
    pub backfill_masters: bool,
    pub index_name: &'static str,
}

impl TemplateNameMigration {
    pub fn plan(&self, rows: &[TemplateRow]) -> ReconciliationPlan {
        plan_reconciliation(rows, self.key, self.marker, self.backfill_masters)
    }
}

pub const TEMPLATE_NAME_MIGRATIONS: &[TemplateNameMigration] = &[
    TemplateNameMigration {
        version: 1_770_100_000_000,
        name: "AddUniqueTemplateNameIndex1770100000000",
        key: UniquenessKey::NameUnitAuthority,
        marker: "dup",
        backfill_masters: true,
        index_name: "idx_unique_template_name_unit_ha",
    },
    TemplateNameMigration {
        version: 1_771_892_591_000,
        name: "AddUniqueTemplateNameIndex1771892591000",
        key: UniquenessKey::NameAuthority,
        marker: "duplicate",
        backfill_masters: false,
        index_name: "idx_unique_template_name_ha",
    },
];

/// Names of every index that enforces template-name uniqueness.
pub fn guard_index_names() -> impl Iterator<Item = &'static str> {
    TEMPLATE_NAME_MIGRATIONS.iter().map(|m| m.index_name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub version: i64,
    pub name: String,
    pub renamed: Vec<TemplateRename>,
    pub masters_backfilled: usize,
    pub index: String,
}

impl MigrationReport {
    pub fn new(migration: &TemplateNameMigration, plan: ReconciliationPlan) -> Self {
        Self {
            version: migration.version,
            name: migration.name.to_string(),
            masters_backfilled: plan.master_backfill.len(),
            renamed: plan.renames,
            index: migration.index_name.to_string(),
        }
    }
}

pub struct Migrator {
    store: Arc<dyn SchemaStore>,
    migrations: Vec<TemplateNameMigration>,
}

impl Migrator {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self::with_migrations(store, TEMPLATE_NAME_MIGRATIONS.to_vec())
    }

    pub fn with_migrations(store: Arc<dyn SchemaStore>, mut migrations: Vec<TemplateNameMigration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        Self { store, migrations }
    }

    /// Registered migrations not yet applied, lowest version first.
    pub async fn pending(&self) -> Result<Vec<TemplateNameMigration>> {
        let applied = self.store.applied_versions().await?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .copied()
            .collect())
    }

    /// Apply every pending migration in version order. Stops at the first
    /// failure; earlier migrations in the run stay applied.
    pub async fn run_pending(&self) -> Result<Vec<MigrationReport>> {
        let applied = self.store.applied_versions().await?;
        let latest = applied.iter().copied().max();
        let pending = self.pending().await?;

        if let (Some(latest), Some(first)) = (latest, pending.first()) {
            if first.version < latest {
                return Err(KpiError::MigrationOutOfOrder {
                    version: first.version,
                    latest,
                });
            }
        }

        let mut reports = Vec::with_capacity(pending.len());
        for migration in &pending {
            let report = self.store.apply(migration).await?;
            tracing::info!(
                target: "kpi.migration",
                version = report.version,
                renamed = report.renamed.len(),
                masters_backfilled = report.masters_backfilled,
                index = %report.index,
                "migration applied"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Revert the newest applied migration. Returns its version, or `None`
    /// when nothing is applied.
    pub async fn revert_latest(&self) -> Result<Option<i64>> {
        let applied = self.store.applied_versions().await?;
        let Some(latest) = applied.iter().copied().max() else {
            return Ok(None);
        };
        let migration = self
            .migrations
            .iter()
            .find(|m| m.version == latest)
            .ok_or_else(|| KpiError::NotFound(format!("migration {latest} is not registered")))?;

        self.store.revert(migration).await?;
        tracing::warn!(
            target: "kpi.migration",
            version = latest,
            index = migration.index_name,
            "migration reverted; renamed template names are not restored"
        );
        Ok(Some(latest))
    }
}
