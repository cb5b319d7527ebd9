//! Declarative read queries: predicate, grouping and ordering described as
//! data, evaluated by whichever store implements the ports.

use std::cmp::Ordering;

use uuid::Uuid;

use crate::scope::Scope;
use crate::types::{CareSettingTemplate, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    /// Signed in at least once and not revoked.
    Active,
    /// Invited, never signed in, not revoked.
    Pending,
}

impl UserStatus {
    pub fn matches(self, user: &User) -> bool {
        match self {
            Self::Active => user.is_active(),
            Self::Pending => user.is_pending(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCountQuery {
    pub status: UserStatus,
    pub organization: Option<String>,
}

impl UserCountQuery {
    pub fn new(status: UserStatus, scope: &Scope) -> Self {
        Self {
            status,
            organization: scope.user_organization(),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.status.matches(user)
            && self
                .organization
                .as_deref()
                .map_or(true, |org| user.organization == org)
    }
}

/// Counts care plans that reference an existing template, optionally
/// restricted by the organization of the plan's creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCountQuery {
    pub creator_organization: Option<String>,
}

impl SessionCountQuery {
    pub fn new(scope: &Scope) -> Self {
        Self {
            creator_organization: scope.session_creator_organization(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateVisibility {
    All,
    /// Templates whose health authority is one of these values.
    Authorities(Vec<String>),
}

impl TemplateVisibility {
    pub fn admits(&self, health_authority: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Authorities(list) => {
                health_authority.map_or(false, |ha| list.iter().any(|a| a == ha))
            }
        }
    }

    /// `None` when no authority filter applies.
    pub fn authorities(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::Authorities(list) => Some(list),
        }
    }
}

/// Per-template care plan counts. Every visible template appears, zero
/// counts included; ordered by count descending, then template id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingBreakdownQuery {
    pub visibility: TemplateVisibility,
    pub template_id: Option<Uuid>,
}

impl SettingBreakdownQuery {
    pub fn admits(&self, template: &CareSettingTemplate) -> bool {
        self.visibility.admits(template.health_authority.as_deref())
            && self.template_id.map_or(true, |id| template.id == id)
    }
}

/// Template listing ordered by name, then health authority (missing last),
/// then id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub visibility: TemplateVisibility,
}

impl CatalogQuery {
    pub fn new(scope: &Scope) -> Self {
        Self {
            visibility: scope.catalog_visibility(),
        }
    }

    /// Byte-wise string comparison, i.e. the `"C"` collation. SQL stores must
    /// order with `COLLATE "C"` to agree.
    pub fn order(a: &CareSettingTemplate, b: &CareSettingTemplate) -> Ordering {
        a.name
            .cmp(&b.name)
            .then_with(|| nulls_last(a.health_authority.as_deref(), b.health_authority.as_deref()))
            .then_with(|| a.id.cmp(&b.id))
    }
}

fn nulls_last(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Request-level filter for the per-template breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiFilter {
    pub scope: Scope,
    /// Raw template id as received; parsed lazily.
    pub template_id: Option<String>,
}

impl KpiFilter {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            template_id: None,
        }
    }

    pub fn with_template_id(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// `None` when the template id cannot match any row (malformed), in which
    /// case the breakdown is empty.
    pub fn breakdown_query(&self) -> Option<SettingBreakdownQuery> {
        let template_id = match self.template_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Uuid::parse_str(raw).ok()?),
        };
        Some(SettingBreakdownQuery {
            visibility: self.scope.template_visibility(),
            template_id,
        })
    }
}
