//! In-memory implementation of every storage port.
//!
//! Evaluates the same declarative queries as the Postgres adapter. Used by
//! unit tests and by the server's router tests; a migration applies to a
//! copy of the dataset and is swapped in only on success.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::KpiError;
use crate::migration::{MigrationReport, TemplateNameMigration, TEMPLATE_NAME_MIGRATIONS};
use crate::ports::{KpiStore, Result, SchemaStore, TemplateCatalogStore, TemplateWriter};
use crate::query::{CatalogQuery, SessionCountQuery, SettingBreakdownQuery, UserCountQuery};
use crate::reconcile::{ReconciliationPlan, TemplateRow};
use crate::types::{
    CarePlansBySetting, CareSettingTemplate, NewTemplate, PlanningSession, TemplateSummary, User,
};

#[derive(Debug, Clone, Default)]
struct Dataset {
    users: Vec<User>,
    templates: Vec<CareSettingTemplate>,
    sessions: Vec<PlanningSession>,
    applied: BTreeSet<i64>,
}

impl Dataset {
    fn installed_guards(&self) -> impl Iterator<Item = &'static TemplateNameMigration> + '_ {
        TEMPLATE_NAME_MIGRATIONS
            .iter()
            .filter(|m| self.applied.contains(&m.version))
    }

    fn check_guard(&self, migration: &TemplateNameMigration) -> Result<()> {
        let rows: Vec<TemplateRow> = self.templates.iter().map(TemplateRow::from).collect();
        for (i, a) in rows.iter().enumerate() {
            if let Some(b) = rows[i + 1..].iter().find(|b| migration.key.guard_collides(a, b)) {
                return Err(KpiError::MigrationFailed {
                    version: migration.version,
                    reason: format!(
                        "could not create unique index {}: templates {} and {} collide",
                        migration.index_name, a.id, b.id
                    ),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Dataset>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows without any guard checks, the way legacy data arrived.
    pub async fn seed(
        &self,
        users: Vec<User>,
        templates: Vec<CareSettingTemplate>,
        sessions: Vec<PlanningSession>,
    ) {
        let mut data = self.data.write().await;
        data.users.extend(users);
        data.templates.extend(templates);
        data.sessions.extend(sessions);
    }

    pub async fn templates(&self) -> Vec<CareSettingTemplate> {
        self.data.read().await.templates.clone()
    }

    /// Plan against the current rows, apply the plan to a copy of the
    /// dataset, check the guard, and only then swap the copy in. The write
    /// lock is held throughout.
    async fn apply_with(
        &self,
        migration: &TemplateNameMigration,
        planner: impl FnOnce(&[TemplateRow]) -> ReconciliationPlan + Send,
    ) -> Result<MigrationReport> {
        let mut data = self.data.write().await;
        let rows: Vec<TemplateRow> = data.templates.iter().map(TemplateRow::from).collect();
        let plan = planner(&rows);
        let mut next = data.clone();

        for rename in &plan.renames {
            if let Some(t) = next.templates.iter_mut().find(|t| t.id == rename.id) {
                t.name = rename.to.clone();
            }
        }
        for t in next
            .templates
            .iter_mut()
            .filter(|t| plan.master_backfill.contains(&t.id))
        {
            t.is_master = true;
        }

        next.check_guard(migration)?;
        next.applied.insert(migration.version);
        *data = next;
        Ok(MigrationReport::new(migration, plan))
    }
}

#[async_trait]
impl KpiStore for InMemoryStore {
    async fn count_users(&self, query: &UserCountQuery) -> Result<u64> {
        let data = self.data.read().await;
        Ok(data.users.iter().filter(|u| query.matches(u)).count() as u64)
    }

    async fn count_care_plans(&self, query: &SessionCountQuery) -> Result<u64> {
        let data = self.data.read().await;
        let count = data
            .sessions
            .iter()
            .filter(|s| {
                s.care_setting_template_id
                    .is_some_and(|tid| data.templates.iter().any(|t| t.id == tid))
            })
            .filter(|s| match &query.creator_organization {
                None => true,
                Some(org) => data
                    .users
                    .iter()
                    .any(|u| u.id == s.created_by && &u.organization == org),
            })
            .count();
        Ok(count as u64)
    }

    async fn care_plans_by_setting(
        &self,
        query: &SettingBreakdownQuery,
    ) -> Result<Vec<CarePlansBySetting>> {
        let data = self.data.read().await;
        let mut rows: Vec<CarePlansBySetting> = data
            .templates
            .iter()
            .filter(|t| query.admits(t))
            .map(|t| {
                let count = data
                    .sessions
                    .iter()
                    .filter(|s| s.care_setting_template_id == Some(t.id))
                    .count() as u64;
                CarePlansBySetting::new(t.id, t.name.clone(), t.health_authority.clone(), t.is_master, count)
            })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.care_setting_id.cmp(&b.care_setting_id))
        });
        Ok(rows)
    }
}

#[async_trait]
impl TemplateCatalogStore for InMemoryStore {
    async fn list_templates(&self, query: &CatalogQuery) -> Result<Vec<TemplateSummary>> {
        let data = self.data.read().await;
        let mut visible: Vec<&CareSettingTemplate> = data
            .templates
            .iter()
            .filter(|t| query.visibility.admits(t.health_authority.as_deref()))
            .collect();
        visible.sort_by(|a, b| CatalogQuery::order(a, b));
        Ok(visible
            .into_iter()
            .map(|t| TemplateSummary {
                id: t.id,
                display_name: t.name.clone(),
                health_authority: t.health_authority.clone(),
                is_master: t.is_master,
            })
            .collect())
    }
}

#[async_trait]
impl TemplateWriter for InMemoryStore {
    async fn insert_template(&self, template: &NewTemplate) -> Result<CareSettingTemplate> {
        let mut data = self.data.write().await;
        let created = CareSettingTemplate {
            id: Uuid::new_v4(),
            name: template.name.clone(),
            health_authority: template.health_authority.clone(),
            is_master: template.is_master,
            unit_id: template.unit_id,
            created_at: Utc::now(),
        };
        let candidate = TemplateRow::from(&created);
        for guard in data.installed_guards() {
            let clash = data
                .templates
                .iter()
                .any(|t| guard.key.guard_collides(&TemplateRow::from(t), &candidate));
            if clash {
                return Err(KpiError::DuplicateTemplateName {
                    name: created.name,
                    health_authority: created.health_authority,
                });
            }
        }
        data.templates.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl SchemaStore for InMemoryStore {
    async fn applied_versions(&self) -> Result<Vec<i64>> {
        Ok(self.data.read().await.applied.iter().copied().collect())
    }

    async fn apply(&self, migration: &TemplateNameMigration) -> Result<MigrationReport> {
        self.apply_with(migration, |rows| migration.plan(rows)).await
    }

    async fn revert(&self, migration: &TemplateNameMigration) -> Result<()> {
        self.data.write().await.applied.remove(&migration.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::TemplateRename;
    use crate::types::GLOBAL_AUTHORITY;

    fn new_template(name: &str, ha: &str) -> NewTemplate {
        NewTemplate {
            name: name.into(),
            health_authority: Some(ha.into()),
            is_master: ha == GLOBAL_AUTHORITY,
            unit_id: None,
        }
    }

    #[tokio::test]
    async fn insert_without_guard_accepts_duplicates() {
        let store = InMemoryStore::new();
        store.insert_template(&new_template("ICU", "HA1")).await.unwrap();
        store.insert_template(&new_template("icu", "HA1")).await.unwrap();
        assert_eq!(store.templates().await.len(), 2);
    }

    #[tokio::test]
    async fn guard_rejects_case_insensitive_duplicate() {
        let store = InMemoryStore::new();
        store.apply(&TEMPLATE_NAME_MIGRATIONS[1]).await.unwrap();
        store.insert_template(&new_template("Acute Care", "HA1")).await.unwrap();

        let err = store
            .insert_template(&new_template("acute care", "HA1"))
            .await
            .unwrap_err();
        assert!(matches!(err, KpiError::DuplicateTemplateName { .. }));

        // Same name in another authority is fine.
        store.insert_template(&new_template("acute care", "HA2")).await.unwrap();
    }

    #[tokio::test]
    async fn guard_is_lifted_by_revert() {
        let store = InMemoryStore::new();
        let migration = TEMPLATE_NAME_MIGRATIONS[1];
        store.apply(&migration).await.unwrap();
        store.insert_template(&new_template("ICU", "HA1")).await.unwrap();
        store.revert(&migration).await.unwrap();
        store.insert_template(&new_template("ICU", "HA1")).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_plan_leaves_dataset_untouched() {
        let now = Utc::now();
        let template = |name: &str, ha: &str, secs: i64| CareSettingTemplate {
            id: Uuid::new_v4(),
            name: name.into(),
            health_authority: Some(ha.into()),
            is_master: false,
            unit_id: None,
            created_at: now + chrono::Duration::seconds(secs),
        };
        let icu = template("ICU", "HA1", 0);
        let rehab = template("Rehab", "HA1", 1);
        let global = template("Hospice", GLOBAL_AUTHORITY, 2);
        let store = InMemoryStore::new();
        store
            .seed(vec![], vec![icu.clone(), rehab.clone(), global.clone()], vec![])
            .await;
        let before = store.templates().await;

        // Renaming onto an occupied name collides under the guard.
        let plan = ReconciliationPlan {
            renames: vec![TemplateRename {
                id: rehab.id,
                from: rehab.name.clone(),
                to: "icu".into(),
            }],
            master_backfill: vec![global.id],
        };
        let migration = TEMPLATE_NAME_MIGRATIONS[1];
        let err = store.apply_with(&migration, |_| plan).await.unwrap_err();

        assert!(matches!(err, KpiError::MigrationFailed { version, .. } if version == migration.version));
        assert_eq!(store.templates().await, before);
        assert!(store.applied_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_twice_is_a_noop_the_second_time() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let dupes: Vec<_> = (0..3)
            .map(|i| CareSettingTemplate {
                id: Uuid::new_v4(),
                name: "Acute Care".into(),
                health_authority: Some("HA1".into()),
                is_master: false,
                unit_id: None,
                created_at: now + chrono::Duration::seconds(i),
            })
            .collect();
        store.seed(vec![], dupes, vec![]).await;

        let migration = TEMPLATE_NAME_MIGRATIONS[1];
        let first = store.apply(&migration).await.unwrap();
        assert_eq!(first.renamed.len(), 2);
        let snapshot = store.templates().await;

        let second = store.apply(&migration).await.unwrap();
        assert!(second.renamed.is_empty());
        assert_eq!(store.templates().await, snapshot);
    }
}
