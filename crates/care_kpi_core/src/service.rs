//! KpiService: KPI counters, the per-template breakdown and the template
//! catalog, all evaluated under a [`Scope`].
//!
//! Takes port traits via `Arc<dyn PortTrait>` so the same logic runs against
//! Postgres or the in-memory store. Independent sub-queries are issued
//! concurrently and joined; if any of them fails the whole call fails and no
//! partial result is returned.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ports::{KpiStore, Result, TemplateCatalogStore};
use crate::query::{CatalogQuery, KpiFilter, SessionCountQuery, UserCountQuery, UserStatus};
use crate::scope::Scope;
use crate::types::{CarePlansBySetting, GeneralKpis, KpisOverview, TemplateSummary};

#[async_trait]
pub trait KpiService: Send + Sync {
    /// Active users, pending users and total care plans.
    async fn general_counts(&self, scope: &Scope) -> Result<GeneralKpis>;

    /// Care plan counts per visible template, zero counts included.
    async fn care_plans_by_setting(&self, filter: &KpiFilter) -> Result<Vec<CarePlansBySetting>>;

    async fn overview(&self, filter: &KpiFilter) -> Result<KpisOverview>;

    /// Templates visible under `scope`, ordered by name then health authority.
    async fn care_settings(&self, scope: &Scope) -> Result<Vec<TemplateSummary>>;
}

pub struct KpiServiceImpl {
    kpis: Arc<dyn KpiStore>,
    catalog: Arc<dyn TemplateCatalogStore>,
}

impl KpiServiceImpl {
    pub fn new(kpis: Arc<dyn KpiStore>, catalog: Arc<dyn TemplateCatalogStore>) -> Self {
        Self { kpis, catalog }
    }
}

#[async_trait]
impl KpiService for KpiServiceImpl {
    async fn general_counts(&self, scope: &Scope) -> Result<GeneralKpis> {
        let active = UserCountQuery::new(UserStatus::Active, scope);
        let pending = UserCountQuery::new(UserStatus::Pending, scope);
        let plans = SessionCountQuery::new(scope);

        let (active_users, pending_users, total_care_plans) = tokio::try_join!(
            self.kpis.count_users(&active),
            self.kpis.count_users(&pending),
            self.kpis.count_care_plans(&plans),
        )?;

        tracing::debug!(
            target: "kpi.service",
            tenant = scope.tenant(),
            active_users,
            pending_users,
            total_care_plans,
            "general counts"
        );

        Ok(GeneralKpis {
            active_users,
            pending_users,
            total_care_plans,
        })
    }

    async fn care_plans_by_setting(&self, filter: &KpiFilter) -> Result<Vec<CarePlansBySetting>> {
        let Some(query) = filter.breakdown_query() else {
            tracing::debug!(
                target: "kpi.service",
                template_id = filter.template_id.as_deref(),
                "unparseable template id, empty breakdown"
            );
            return Ok(Vec::new());
        };
        self.kpis.care_plans_by_setting(&query).await
    }

    async fn overview(&self, filter: &KpiFilter) -> Result<KpisOverview> {
        let (general, care_plans_by_setting) = tokio::try_join!(
            self.general_counts(&filter.scope),
            self.care_plans_by_setting(filter),
        )?;
        Ok(KpisOverview {
            general,
            care_plans_by_setting,
        })
    }

    async fn care_settings(&self, scope: &Scope) -> Result<Vec<TemplateSummary>> {
        self.catalog.list_templates(&CatalogQuery::new(scope)).await
    }
}
