//! Bearer-token authentication.
//!
//! Verifies an HS256 JWT and inserts the resulting [`Actor`] into request
//! extensions for handlers to extract.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension,
};
use care_kpi_core::{Actor, Role};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Health authority the caller belongs to.
    #[serde(default)]
    pub organization: Option<String>,
}

impl From<JwtClaims> for Actor {
    fn from(claims: JwtClaims) -> Self {
        Actor::new(claims.sub, claims.roles, claims.organization)
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    key: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        // `exp` is required and checked.
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AppError> {
        decode::<JwtClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthenticated(format!("invalid token: {e}")))
    }
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthenticated("missing bearer token".into()))?;

    let actor = Actor::from(config.verify(token)?);
    tracing::debug!(actor = %actor.actor_id, roles = ?actor.roles, "authenticated");
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const FAR_FUTURE: u64 = 4_102_444_800;

    fn token(secret: &[u8], claims: &serde_json::Value) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn verify_maps_known_and_unknown_roles() {
        let config = JwtConfig::from_secret(b"secret");
        let jwt = token(
            b"secret",
            &serde_json::json!({
                "sub": "u1",
                "roles": ["content-admin", "auditor"],
                "organization": "HA1",
                "exp": FAR_FUTURE
            }),
        );
        let actor = Actor::from(config.verify(&jwt).unwrap());
        assert_eq!(actor.roles, vec![Role::ContentAdmin, Role::Other]);
        assert_eq!(actor.organization.as_deref(), Some("HA1"));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let config = JwtConfig::from_secret(b"secret");
        let jwt = token(b"other", &serde_json::json!({ "sub": "u1", "exp": FAR_FUTURE }));
        assert!(matches!(config.verify(&jwt), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn verify_rejects_token_without_expiry() {
        let config = JwtConfig::from_secret(b"secret");
        let jwt = token(b"secret", &serde_json::json!({ "sub": "u1", "roles": ["admin"] }));
        assert!(matches!(config.verify(&jwt), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn verify_rejects_expired() {
        let config = JwtConfig::from_secret(b"secret");
        let jwt = token(b"secret", &serde_json::json!({ "sub": "u1", "exp": 1_000 }));
        assert!(config.verify(&jwt).is_err());
    }
}
