use thiserror::Error;

#[derive(Debug, Error)]
pub enum KpiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("duplicate template name '{name}' in health authority {}", .health_authority.as_deref().unwrap_or("<none>"))]
    DuplicateTemplateName {
        name: String,
        health_authority: Option<String>,
    },

    #[error("migration {version} is older than applied migration {latest}")]
    MigrationOutOfOrder { version: i64, latest: i64 },

    #[error("migration {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl KpiError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 403,
            Self::DuplicateTemplateName { .. } => 409,
            Self::MigrationOutOfOrder { .. } => 409,
            Self::MigrationFailed { .. } => 500,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── http_status ──────────────────────────────────────────────

    #[test]
    fn http_status_not_found() {
        assert_eq!(KpiError::NotFound("x".into()).http_status(), 404);
    }

    #[test]
    fn http_status_unauthorized() {
        assert_eq!(KpiError::Unauthorized("x".into()).http_status(), 403);
    }

    #[test]
    fn http_status_duplicate_name_is_conflict() {
        let err = KpiError::DuplicateTemplateName {
            name: "Acute Care".into(),
            health_authority: Some("HA1".into()),
        };
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn http_status_migration_errors() {
        let out_of_order = KpiError::MigrationOutOfOrder {
            version: 1,
            latest: 2,
        };
        assert_eq!(out_of_order.http_status(), 409);
        let failed = KpiError::MigrationFailed {
            version: 1,
            reason: "lock timeout".into(),
        };
        assert_eq!(failed.http_status(), 500);
    }

    #[test]
    fn http_status_internal() {
        let err = KpiError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), 500);
    }

    // ── Display ──────────────────────────────────────────────────

    #[test]
    fn display_duplicate_name() {
        let err = KpiError::DuplicateTemplateName {
            name: "Acute Care".into(),
            health_authority: Some("HA1".into()),
        };
        assert_eq!(
            err.to_string(),
            "duplicate template name 'Acute Care' in health authority HA1"
        );
    }

    #[test]
    fn display_duplicate_name_without_authority() {
        let err = KpiError::DuplicateTemplateName {
            name: "Rehab".into(),
            health_authority: None,
        };
        assert_eq!(
            err.to_string(),
            "duplicate template name 'Rehab' in health authority <none>"
        );
    }

    #[test]
    fn display_out_of_order() {
        let err = KpiError::MigrationOutOfOrder {
            version: 1,
            latest: 2,
        };
        assert_eq!(err.to_string(), "migration 1 is older than applied migration 2");
    }

    #[test]
    fn display_internal() {
        let err = KpiError::Internal(anyhow::anyhow!("segfault"));
        assert_eq!(err.to_string(), "internal: segfault");
    }
}
