//! Domain rows and read models. Pure value types, no DB dependency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel health authority shared by every tenant.
pub const GLOBAL_AUTHORITY: &str = "GLOBAL";

/// Label reported for templates without a health authority.
pub const UNKNOWN_AUTHORITY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Set once the user has signed in through the identity provider.
    pub external_identity_ref: Option<String>,
    pub organization: String,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.external_identity_ref.is_some() && self.revoked_at.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.external_identity_ref.is_none() && self.revoked_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareSettingTemplate {
    pub id: Uuid,
    pub name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningSession {
    pub id: Uuid,
    pub created_by: Uuid,
    pub care_setting_template_id: Option<Uuid>,
}

/// Insert payload for a template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub unit_id: Option<Uuid>,
}

// ── Read models ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralKpis {
    pub active_users: u64,
    pub pending_users: u64,
    pub total_care_plans: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlansBySetting {
    pub care_setting_id: Uuid,
    pub care_setting_name: String,
    pub health_authority: String,
    pub is_master: bool,
    pub count: u64,
}

impl CarePlansBySetting {
    /// Build a breakdown row, substituting the `Unknown` label for a missing authority.
    pub fn new(
        care_setting_id: Uuid,
        care_setting_name: String,
        health_authority: Option<String>,
        is_master: bool,
        count: u64,
    ) -> Self {
        let health_authority = health_authority
            .filter(|ha| !ha.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHORITY.to_string());
        Self {
            care_setting_id,
            care_setting_name,
            health_authority,
            is_master,
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpisOverview {
    pub general: GeneralKpis,
    pub care_plans_by_setting: Vec<CarePlansBySetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: Uuid,
    pub display_name: String,
    pub health_authority: Option<String>,
    pub is_master: bool,
}
