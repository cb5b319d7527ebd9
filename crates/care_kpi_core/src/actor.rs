//! The caller as seen by the KPI core: roles plus the owning organization.
//!
//! Built at the transport boundary (JWT claims) and passed explicitly into
//! scope resolution. Core logic never reads raw tokens.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    Admin,
    ContentAdmin,
    User,
    /// Any role string this service does not know about.
    #[serde(other)]
    Other,
}

/// Roles allowed to read KPI dashboards.
pub const KPI_READER_ROLES: &[Role] = &[Role::Admin, Role::ContentAdmin];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub actor_id: String,
    pub roles: Vec<Role>,
    pub organization: Option<String>,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, roles: Vec<Role>, organization: Option<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            roles,
            organization,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn has_access(&self, allowed: &[Role]) -> bool {
        has_access(&self.roles, allowed, false)
    }
}

/// Allow-list role check.
///
/// Admin passes every check. Otherwise the caller needs any one of `allowed`,
/// or all of them when `require_all` is set.
pub fn has_access(user_roles: &[Role], allowed: &[Role], require_all: bool) -> bool {
    if user_roles.contains(&Role::Admin) {
        return true;
    }
    let held = |role: &Role| user_roles.contains(role);
    if require_all {
        allowed.iter().all(held)
    } else {
        allowed.iter().any(held)
    }
}
