use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use warden_api::app::services::{AppServices, default_catalog};
use warden_auth::{DataScope, Permission, Principal, ResourceCategory, RoleCode, RolePermissionRecord, ScopeLevel, SessionOrigin};
use warden_core::SubjectId;
use warden_infra::cache::InMemoryCacheStore;
use warden_infra::directory::InMemoryIdentityDirectory;
use warden_infra::resolver::PermissionResolver;
use warden_infra::session::{InMemorySessionStore, SessionManager};
use warden_infra::store::InMemoryPermissionStore;
use warden_infra::token::{TokenService, TokenSettings};
use warden_infra::verifier::DualAlgorithmVerifier;

const PRIVATE_PEM: &[u8] = include_bytes!("../../infra/tests/fixtures/signing_private.pem");
const PUBLIC_PEM: &[u8] = include_bytes!("../../infra/tests/fixtures/signing_public.pem");
const LEGACY_SECRET: &str = "legacy-test-secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    tokens: Arc<TokenService>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let tokens = Arc::new(
            TokenService::from_rsa_pem(PRIVATE_PEM, PUBLIC_PEM, TokenSettings::default())
                .expect("fixture keys load"),
        );

        let store = InMemoryPermissionStore::new()
            .with_catalog(default_catalog())
            .with_role(RolePermissionRecord::new(
                "sales_rep",
                vec![Permission::from("lead:own:read")],
                DataScope::new()
                    .with(ResourceCategory::Campaigns, ScopeLevel::Own)
                    .with(ResourceCategory::Leads, ScopeLevel::Team),
            ))
            .with_role(RolePermissionRecord::new(
                "admin",
                vec![Permission::from("settings:roles:read"), Permission::from("settings:roles:write")],
                DataScope::new().with(ResourceCategory::Campaigns, ScopeLevel::All),
            ));

        let directory = Arc::new(
            InMemoryIdentityDirectory::new()
                .with_subject(principal("rep-1", "sales_rep", &[]))
                .with_subject(principal("rep-2", "sales_rep", &[])),
        );

        let verifier = DualAlgorithmVerifier::new()
            .with_local(tokens.clone())
            .with_legacy_secret(LEGACY_SECRET);

        let services = Arc::new(AppServices {
            verifier: Arc::new(verifier),
            resolver: Arc::new(PermissionResolver::new(
                Arc::new(store),
                Arc::new(InMemoryCacheStore::new()),
            )),
            directory: directory.clone(),
            sessions: Arc::new(SessionManager::new(
                tokens.clone(),
                Arc::new(InMemorySessionStore::new()),
                directory,
            )),
        });

        // Same router as prod, bound to an ephemeral port.
        let app = warden_api::app::build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            tokens,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn access_token(&self, subject: &Principal) -> String {
        self.tokens.generate_access_token(subject).expect("token signs")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn principal(id: &str, role: &str, claimed: &[&str]) -> Principal {
    Principal {
        subject_id: SubjectId::parse(id).unwrap(),
        email: format!("{id}@example.com"),
        name: id.to_string(),
        role: RoleCode::from(role),
        roles: vec![RoleCode::from(role)],
        team: Some("north".to_string()),
        claimed_permissions: claimed.iter().map(|p| Permission::from(*p)).collect(),
    }
}

fn mint_legacy_jwt(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(LEGACY_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn missing_and_malformed_credentials_are_401_with_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "MISSING_TOKEN");

    let res = client
        .get(srv.url("/whoami"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_TOKEN_FORMAT");

    let (status, body) = get(&client, srv.url("/whoami"), "aaa.bbb.ccc").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_TOKEN");
    assert_eq!(body["message"], "token is invalid or expired");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn store_grant_replaces_broader_token_claims() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.access_token(&principal("rep-1", "sales_rep", &["lead:own:read", "lead:own:write"]));

    let (status, body) = get(&client, srv.url("/whoami"), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], "rep-1");
    assert_eq!(body["verified_by"], "local");
    assert_eq!(body["source"], "store");
    assert_eq!(body["permissions"], json!(["lead:own:read"]));
    assert_eq!(body["wildcard_override"], false);
    assert_eq!(body["data_scope"]["campaigns"], "own");
}

#[tokio::test]
async fn super_admin_claim_is_preserved_and_flagged() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.access_token(&principal("rep-1", "sales_rep", &["*"]));

    let (status, body) = get(&client, srv.url("/whoami"), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wildcard_override"], true);
    assert_eq!(body["permissions"], json!(["lead:own:read", "*"]));
}

#[tokio::test]
async fn legacy_hs256_tokens_are_normalized() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_legacy_jwt(json!({
        "user_id": "rep-2",
        "email": "rep-2@example.com",
        "name": "Rep Two",
        "role": "sales_rep",
        "team": "north",
        "permissions": ["lead:own:read"],
        "exp": Utc::now().timestamp() + 600,
    }));

    let (status, body) = get(&client, srv.url("/whoami"), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified_by"], "legacy");
    assert_eq!(body["subject_id"], "rep-2");
    assert_eq!(body["roles"], json!(["sales_rep"]));
}

#[tokio::test]
async fn token_without_role_is_403_role_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_legacy_jwt(json!({
        "sub": "rep-3",
        "role": "",
        "exp": Utc::now().timestamp() + 600,
    }));

    let (status, body) = get(&client, srv.url("/whoami"), &token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "ROLE_REQUIRED");
}

#[tokio::test]
async fn expired_token_is_401() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_legacy_jwt(json!({
        "sub": "rep-1",
        "role": "sales_rep",
        "exp": Utc::now().timestamp() - 3600,
    }));

    let (status, body) = get(&client, srv.url("/whoami"), &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn scope_filters_follow_role_descriptor() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let rep = srv.access_token(&principal("rep-1", "sales_rep", &[]));
    let admin = srv.access_token(&principal("boss", "admin", &[]));

    // own → owner or creator is the caller
    let (status, body) = get(&client, srv.url("/scope/campaigns"), &rep).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "own");
    assert_eq!(body["decision"]["decision"], "allow");
    let conditions = body["decision"]["filter"]["conditions"].as_array().unwrap();
    assert_eq!(conditions.len(), 2);
    assert_eq!(conditions[0]["field"], "owner_id");
    assert_eq!(conditions[0]["value"], "rep-1");

    // team → every registered member of the caller's team
    let (_, body) = get(&client, srv.url("/scope/leads"), &rep).await;
    assert_eq!(body["level"], "team");
    let owners = &body["decision"]["filter"]["conditions"][0];
    assert_eq!(owners["op"], "in");
    assert_eq!(owners["field"], "assigned_to");
    assert_eq!(owners["values"], json!(["rep-1", "rep-2"]));

    // all → unrestricted
    let (_, body) = get(&client, srv.url("/scope/campaigns"), &admin).await;
    assert_eq!(body["decision"]["filter"]["type"], "match_all");

    // unknown resources get the strictest category
    let (_, body) = get(&client, srv.url("/scope/invoices"), &rep).await;
    assert_eq!(body["decision"]["category"], "contacts");
}

#[tokio::test]
async fn role_update_is_visible_on_the_next_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let rep = srv.access_token(&principal("rep-1", "sales_rep", &[]));
    let admin = srv.access_token(&principal("boss", "admin", &[]));

    // Warm the cache with the old grant.
    let (_, before) = get(&client, srv.url("/whoami"), &rep).await;
    assert_eq!(before["permissions"], json!(["lead:own:read"]));

    let res = client
        .put(srv.url("/rbac/roles/sales_rep"))
        .bearer_auth(&admin)
        .json(&json!({
            "permissions": ["lead:own:read", "lead:own:write"],
            "data_scope": { "campaigns": "own" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (_, after) = get(&client, srv.url("/whoami"), &rep).await;
    assert_eq!(after["permissions"], json!(["lead:own:read", "lead:own:write"]));
}

#[tokio::test]
async fn role_mutations_map_errors_to_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let rep = srv.access_token(&principal("rep-1", "sales_rep", &[]));
    let admin = srv.access_token(&principal("boss", "admin", &[]));

    // Caller lacks settings:roles:write.
    let res = client
        .put(srv.url("/rbac/roles/sales_rep"))
        .bearer_auth(&rep)
        .json(&json!({ "permissions": ["*"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "PERMISSION_DENIED");

    // Unknown permission code.
    let res = client
        .put(srv.url("/rbac/roles/sales_rep"))
        .bearer_auth(&admin)
        .json(&json!({ "permissions": ["lead:own:teleport"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_PERMISSIONS");

    // Duplicate role.
    let res = client
        .post(srv.url("/rbac/roles"))
        .bearer_auth(&admin)
        .json(&json!({ "role": "sales_rep", "permissions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Missing role.
    let res = client
        .delete(srv.url("/rbac/roles/ghost"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "ROLE_NOT_FOUND");
}

#[tokio::test]
async fn explain_reports_the_matching_grant() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.access_token(&principal("boss", "admin", &[]));

    let (status, body) = get(&client, srv.url("/rbac/explain?permission=settings:roles:write"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["explanation"]["granted"], true);
    assert_eq!(body["explanation"]["matched_by"], json!(["settings:roles:write"]));

    let (_, body) = get(&client, srv.url("/rbac/explain?permission=lead:own:delete"), &admin).await;
    assert_eq!(body["explanation"]["granted"], false);
    assert_eq!(body["explanation"]["denial_reason"]["kind"], "missing_permission");
}

#[tokio::test]
async fn refresh_then_logout_revokes_the_session() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let pair = srv
        .services
        .sessions
        .login(&principal("rep-1", "sales_rep", &[]), SessionOrigin::default())
        .await
        .unwrap();

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": pair.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = get(&client, srv.url("/whoami"), &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["subject_id"], "rep-1");

    let res = client
        .post(srv.url("/auth/logout"))
        .json(&json!({ "refresh_token": pair.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": pair.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_bearer() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let pair = srv
        .services
        .sessions
        .login(&principal("rep-1", "sales_rep", &[]), SessionOrigin::default())
        .await
        .unwrap();

    let (status, body) = get(&client, srv.url("/whoami"), &pair.refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_TOKEN");

    let (status, _) = get(&client, srv.url("/whoami"), &pair.access_token).await;
    assert_eq!(status, StatusCode::OK);
}
