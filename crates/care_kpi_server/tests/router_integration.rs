//! HTTP contract tests for the KPI routes: JWT authentication, role gating,
//! scope resolution and response shape. Backed by the in-memory store, so no
//! database is needed.

use std::sync::Arc;

use axum::body::Body;
use care_kpi_core::memory::InMemoryStore;
use care_kpi_core::types::{CareSettingTemplate, PlanningSession, User};
use care_kpi_core::{KpiService, KpiServiceImpl};
use care_kpi_server::middleware::jwt::JwtConfig;
use care_kpi_server::router::build_router;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use tower::ServiceExt;
use uuid::Uuid;

// ── Test JWT helpers ───────────────────────────────────────────

const TEST_JWT_SECRET: &[u8] = b"test-secret-for-kpi-router";

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<String>,
    exp: usize,
}

fn make_jwt(actor_id: &str, roles: &[&str], organization: Option<&str>) -> String {
    let claims = TestClaims {
        sub: actor_id.into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        organization: organization.map(str::to_string),
        exp: 4_102_444_800,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

// ── Test app builder ───────────────────────────────────────────

struct TestApp {
    router: axum::Router,
    ha1_template: Uuid,
    global_template: Uuid,
}

fn user(org: &str, identity: Option<&str>) -> User {
    User {
        id: Uuid::new_v4(),
        external_identity_ref: identity.map(str::to_string),
        organization: org.into(),
        revoked_at: None,
    }
}

fn template(name: &str, ha: &str) -> CareSettingTemplate {
    CareSettingTemplate {
        id: Uuid::new_v4(),
        name: name.into(),
        health_authority: Some(ha.into()),
        is_master: ha == "GLOBAL",
        unit_id: None,
        created_at: Utc::now(),
    }
}

fn session(created_by: Uuid, template: Uuid) -> PlanningSession {
    PlanningSession {
        id: Uuid::new_v4(),
        created_by,
        care_setting_template_id: Some(template),
    }
}

async fn build_test_app() -> TestApp {
    let ha1_user = user("HA1", Some("idp|1"));
    let ha2_user = user("HA2", Some("idp|2"));
    let ha1_pending = user("HA1", None);

    let ha1_t = template("Medicine", "HA1");
    let global_t = template("ICU", "GLOBAL");
    let ha2_t = template("Surgery", "HA2");

    let sessions = vec![
        session(ha1_user.id, ha1_t.id),
        session(ha1_user.id, global_t.id),
        session(ha1_user.id, global_t.id),
        session(ha2_user.id, ha2_t.id),
    ];
    let (ha1_template, global_template) = (ha1_t.id, global_t.id);

    let store = Arc::new(InMemoryStore::new());
    store
        .seed(
            vec![ha1_user, ha2_user, ha1_pending],
            vec![ha1_t, global_t, ha2_t],
            sessions,
        )
        .await;

    let service: Arc<dyn KpiService> = Arc::new(KpiServiceImpl::new(store.clone(), store));
    TestApp {
        router: build_router(service, JwtConfig::from_secret(TEST_JWT_SECRET)),
        ha1_template,
        global_template,
    }
}

// ── Request helpers ────────────────────────────────────────────

async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> axum::response::Response {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    app.router
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_auth() {
    let app = build_test_app().await;
    let resp = get(&app, "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

#[tokio::test]
async fn kpi_without_token_is_unauthenticated() {
    let app = build_test_app().await;
    let resp = get(&app, "/kpi/general", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn kpi_with_forged_token_is_unauthenticated() {
    let app = build_test_app().await;
    let forged = encode(
        &Header::default(),
        &serde_json::json!({ "sub": "x", "roles": ["admin"] }),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();
    let resp = get(&app, "/kpi/general", Some(&forged)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_without_expiry_is_unauthenticated() {
    let app = build_test_app().await;
    let no_exp = encode(
        &Header::default(),
        &serde_json::json!({ "sub": "root", "roles": ["admin"] }),
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .unwrap();
    let resp = get(&app, "/kpi/general", Some(&no_exp)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plain_user_is_forbidden() {
    let app = build_test_app().await;
    let token = make_jwt("u1", &["user"], Some("HA1"));
    for uri in [
        "/kpi/general",
        "/kpi/care-plans-by-setting",
        "/kpi/overview",
        "/kpi/care-settings",
    ] {
        let resp = get(&app, uri, Some(&token)).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn content_admin_sees_own_tenant_only() {
    let app = build_test_app().await;
    let token = make_jwt("ca", &["content-admin"], Some("HA1"));

    // Asking for another tenant does not widen or move the scope.
    let resp = get(&app, "/kpi/general?healthAuthority=HA2", Some(&token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({ "activeUsers": 1, "pendingUsers": 1, "totalCarePlans": 3 })
    );
}

#[tokio::test]
async fn admin_is_unrestricted_and_may_narrow() {
    let app = build_test_app().await;
    let token = make_jwt("root", &["admin"], None);

    let all = body_json(get(&app, "/kpi/general", Some(&token)).await).await;
    assert_eq!(all["activeUsers"], 2);
    assert_eq!(all["totalCarePlans"], 4);

    let ha2 = body_json(get(&app, "/kpi/general?healthAuthority=HA2", Some(&token)).await).await;
    assert_eq!(ha2["activeUsers"], 1);
    assert_eq!(ha2["totalCarePlans"], 1);
}

#[tokio::test]
async fn breakdown_shape_and_ordering() {
    let app = build_test_app().await;
    let token = make_jwt("ca", &["content-admin"], Some("HA1"));

    let resp = get(&app, "/kpi/care-plans-by-setting", Some(&token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rows = body_json(resp).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["careSettingId"], app.global_template.to_string());
    assert_eq!(rows[0]["careSettingName"], "ICU");
    assert_eq!(rows[0]["healthAuthority"], "GLOBAL");
    assert_eq!(rows[0]["isMaster"], true);
    assert_eq!(rows[0]["count"], 2);
    assert_eq!(rows[1]["careSettingId"], app.ha1_template.to_string());
    assert_eq!(rows[1]["count"], 1);
}

#[tokio::test]
async fn breakdown_filtered_by_care_setting() {
    let app = build_test_app().await;
    let token = make_jwt("ca", &["content-admin"], Some("HA1"));

    let uri = format!("/kpi/care-plans-by-setting?careSettingId={}", app.ha1_template);
    let rows = body_json(get(&app, &uri, Some(&token)).await).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    let malformed = get(&app, "/kpi/care-plans-by-setting?careSettingId=nope", Some(&token)).await;
    assert_eq!(malformed.status(), StatusCode::OK);
    assert_eq!(body_json(malformed).await, serde_json::json!([]));
}

#[tokio::test]
async fn overview_combines_general_and_breakdown() {
    let app = build_test_app().await;
    let token = make_jwt("root", &["admin"], None);

    let body = body_json(get(&app, "/kpi/overview", Some(&token)).await).await;
    assert_eq!(body["general"]["totalCarePlans"], 4);
    assert_eq!(body["carePlansBySetting"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn care_settings_catalog_is_scoped() {
    let app = build_test_app().await;
    let token = make_jwt("ca", &["content-admin"], Some("HA1"));

    let body = body_json(get(&app, "/kpi/care-settings", Some(&token)).await).await;
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["displayName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["ICU", "Medicine"]);
}
