//! Visibility scope derived from an actor.
//!
//! Every query in the crate is built from a [`Scope`]; the "admin sees every
//! tenant" rule lives only in [`Scope::resolve`].

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::query::TemplateVisibility;
use crate::types::GLOBAL_AUTHORITY;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant", rename_all = "snake_case")]
pub enum Scope {
    Unrestricted,
    RestrictedTo(String),
}

impl Scope {
    /// Admins are unrestricted. Everyone else is bound to their organization,
    /// and a missing or empty organization is the empty-string tenant.
    pub fn resolve(actor: &Actor) -> Self {
        if actor.is_admin() {
            return Self::Unrestricted;
        }
        Self::RestrictedTo(actor.organization.clone().unwrap_or_default())
    }

    /// `None` means no scoping was requested; any explicit value, including
    /// the empty string, restricts.
    pub fn from_tenant(tenant: Option<String>) -> Self {
        match tenant {
            None => Self::Unrestricted,
            Some(t) => Self::RestrictedTo(t),
        }
    }

    /// Apply a tenant filter supplied with a request.
    ///
    /// Only an unrestricted scope can be narrowed. A restricted scope ignores
    /// the request value so a caller cannot move into another tenant. An empty
    /// requested value counts as "not supplied".
    pub fn narrowed_to(self, requested: Option<String>) -> Self {
        match (self, requested) {
            (Self::Unrestricted, Some(t)) if !t.is_empty() => Self::RestrictedTo(t),
            (scope, _) => scope,
        }
    }

    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::Unrestricted => None,
            Self::RestrictedTo(t) => Some(t),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Organization filter for user counters.
    pub fn user_organization(&self) -> Option<String> {
        self.tenant().map(str::to_string)
    }

    /// Organization filter for care plans: applied to the plan creator, not to
    /// the template the plan was built from.
    pub fn session_creator_organization(&self) -> Option<String> {
        self.tenant().map(str::to_string)
    }

    /// Templates counted in the per-template breakdown: own tenant plus
    /// GLOBAL. The empty tenant is a tenant like any other here.
    pub fn template_visibility(&self) -> TemplateVisibility {
        match self.tenant() {
            None => TemplateVisibility::All,
            Some(t) => TemplateVisibility::Authorities(vec![
                t.to_string(),
                GLOBAL_AUTHORITY.to_string(),
            ]),
        }
    }

    /// Templates offered in the catalog. Same as [`Self::template_visibility`]
    /// except that the empty tenant sees GLOBAL templates only.
    pub fn catalog_visibility(&self) -> TemplateVisibility {
        match self.tenant() {
            Some("") => TemplateVisibility::Authorities(vec![GLOBAL_AUTHORITY.to_string()]),
            _ => self.template_visibility(),
        }
    }
}
