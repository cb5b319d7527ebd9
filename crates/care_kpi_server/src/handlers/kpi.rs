//! KPI dashboard endpoints. Readable by admin and content-admin only.
//!
//! Scope comes from the caller's token; only unrestricted callers may
//! narrow it with `healthAuthority`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use care_kpi_core::types::{CarePlansBySetting, GeneralKpis, KpisOverview, TemplateSummary};
use care_kpi_core::{Actor, KpiError, KpiFilter, KpiService, Scope, KPI_READER_ROLES};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiFilterQuery {
    pub health_authority: Option<String>,
    pub care_setting_id: Option<String>,
}

impl KpiFilterQuery {
    fn scope_for(&self, actor: &Actor) -> Scope {
        Scope::resolve(actor).narrowed_to(self.health_authority.clone())
    }

    fn filter_for(&self, actor: &Actor) -> KpiFilter {
        let filter = KpiFilter::new(self.scope_for(actor));
        match &self.care_setting_id {
            Some(id) => filter.with_template_id(id.clone()),
            None => filter,
        }
    }
}

fn require_reader(actor: &Actor) -> Result<(), KpiError> {
    if actor.has_access(KPI_READER_ROLES) {
        Ok(())
    } else {
        Err(KpiError::Unauthorized(format!(
            "{} may not read KPI dashboards",
            actor.actor_id
        )))
    }
}

/// GET /kpi/general
pub async fn general(
    Extension(actor): Extension<Actor>,
    Extension(service): Extension<Arc<dyn KpiService>>,
    Query(query): Query<KpiFilterQuery>,
) -> Result<Json<GeneralKpis>, AppError> {
    require_reader(&actor)?;
    let counts = service.general_counts(&query.scope_for(&actor)).await?;
    Ok(Json(counts))
}

/// GET /kpi/care-plans-by-setting
pub async fn care_plans_by_setting(
    Extension(actor): Extension<Actor>,
    Extension(service): Extension<Arc<dyn KpiService>>,
    Query(query): Query<KpiFilterQuery>,
) -> Result<Json<Vec<CarePlansBySetting>>, AppError> {
    require_reader(&actor)?;
    let rows = service
        .care_plans_by_setting(&query.filter_for(&actor))
        .await?;
    Ok(Json(rows))
}

/// GET /kpi/overview
pub async fn overview(
    Extension(actor): Extension<Actor>,
    Extension(service): Extension<Arc<dyn KpiService>>,
    Query(query): Query<KpiFilterQuery>,
) -> Result<Json<KpisOverview>, AppError> {
    require_reader(&actor)?;
    let overview = service.overview(&query.filter_for(&actor)).await?;
    Ok(Json(overview))
}

/// GET /kpi/care-settings
pub async fn care_settings(
    Extension(actor): Extension<Actor>,
    Extension(service): Extension<Arc<dyn KpiService>>,
    Query(query): Query<KpiFilterQuery>,
) -> Result<Json<Vec<TemplateSummary>>, AppError> {
    require_reader(&actor)?;
    let templates = service.care_settings(&query.scope_for(&actor)).await?;
    Ok(Json(templates))
}
