use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use rentgate_api::app::{AppServices, build_app};
use rentgate_api::auth::JwtClaims;
use rentgate_core::{PropertyId, UserId};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = build_app(SECRET.to_string(), AppServices::in_memory(ChronoDuration::days(7)));
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
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, serde_json::Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(serde_json::Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(serde_json::Value::Null))
    }

    async fn create_property(&self, token: &str, name: &str) -> String {
        let (status, body) = self.post(token, "/properties", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["property_id"].as_str().unwrap().to_string()
    }

    async fn invite(&self, token: &str, property_id: &str, invitee: &str, role: &str) -> (StatusCode, serde_json::Value) {
        self.post(
            token,
            &format!("/properties/{property_id}/invitations"),
            json!({ "invitee": invitee, "role": role }),
        )
        .await
    }

    async fn authorize(&self, token: &str, property_id: &str, operation: &str) -> serde_json::Value {
        let (status, body) = self
            .get(token, &format!("/properties/{property_id}/authorize?operation={operation}"))
            .await;
        assert_eq!(status, StatusCode::OK, "authorize failed: {body}");
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Caller {
    user_id: UserId,
    token: String,
}

fn caller(email: Option<&str>) -> Caller {
    let user_id = UserId::new();
    Caller {
        user_id,
        token: mint_jwt(user_id, email),
    }
}

fn mint_jwt(sub: UserId, email: Option<&str>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        email: email.map(str::to_string),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = srv
        .client
        .get(srv.url("/properties"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let ana = caller(Some("ana@example.com"));

    let (status, body) = srv.get(&ana.token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"].as_str().unwrap(), ana.user_id.to_string());
    assert_eq!(body["email"], "ana@example.com");
}

#[tokio::test]
async fn roles_lists_the_registry() {
    let srv = TestServer::spawn().await;
    let ana = caller(None);

    let (status, body) = srv.get(&ana.token, "/roles").await;
    assert_eq!(status, StatusCode::OK);
    let roles = body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 4);
    assert!(roles.iter().any(|r| r["role"] == "OWNER"));
}

#[tokio::test]
async fn landlord_owns_created_property() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);

    let property_id = srv.create_property(&landlord.token, "Maple Court").await;

    let (status, body) = srv.get(&landlord.token, "/properties").await;
    assert_eq!(status, StatusCode::OK);
    let props = body["properties"].as_array().unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props[0]["property_id"].as_str().unwrap(), property_id);
    assert_eq!(props[0]["role"], "OWNER");

    let decision = srv.authorize(&landlord.token, &property_id, "DELETE_PROPERTY").await;
    assert_eq!(decision["allow"], true);
    assert_eq!(decision["role"], "OWNER");
}

#[tokio::test]
async fn pending_invitation_grants_nothing_until_accepted() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let agent = caller(None);
    let property_id = srv.create_property(&landlord.token, "Oak Flats").await;

    let (status, invitation) = srv
        .invite(&landlord.token, &property_id, &agent.user_id.to_string(), "LEASING_AGENT")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invitation}");
    let invitation_id = invitation["invitation_id"].as_str().unwrap().to_string();

    let decision = srv.authorize(&agent.token, &property_id, "VIEW_PROPERTY").await;
    assert_eq!(decision["allow"], false);
    assert_eq!(decision["reason"], "NOT_A_MEMBER");

    let (status, body) = srv.get(&agent.token, "/invitations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invitations"].as_array().unwrap().len(), 1);

    let (status, accepted) = srv
        .post(&agent.token, &format!("/invitations/{invitation_id}/accept"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{accepted}");
    assert_eq!(accepted["status"], "ACTIVE");

    let decision = srv.authorize(&agent.token, &property_id, "MANAGE_TENANTS").await;
    assert_eq!(decision["allow"], true);
    assert_eq!(decision["role"], "LEASING_AGENT");

    let decision = srv.authorize(&agent.token, &property_id, "VIEW_FINANCIALS").await;
    assert_eq!(decision["allow"], false);
    assert_eq!(decision["reason"], "INSUFFICIENT_ROLE");
}

#[tokio::test]
async fn email_invitation_binds_on_accept() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let manager = caller(Some("pm@example.com"));
    let stranger = caller(Some("other@example.com"));
    let property_id = srv.create_property(&landlord.token, "Birch House").await;

    let (status, invitation) = srv
        .invite(&landlord.token, &property_id, "PM@example.com", "PROPERTY_MANAGER")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invitation}");
    let invitation_id = invitation["invitation_id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(&stranger.token, &format!("/invitations/{invitation_id}/accept"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NOT_INVITEE");

    let (status, _) = srv
        .post(&manager.token, &format!("/invitations/{invitation_id}/accept"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let decision = srv.authorize(&manager.token, &property_id, "MANAGE_USERS").await;
    assert_eq!(decision["allow"], true);
}

#[tokio::test]
async fn revocation_takes_effect_on_the_next_request() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let viewer = caller(None);
    let property_id = srv.create_property(&landlord.token, "Cedar Row").await;

    let (_, invitation) = srv
        .invite(&landlord.token, &property_id, &viewer.user_id.to_string(), "VIEWER")
        .await;
    let grant_id = invitation["invitation_id"].as_str().unwrap().to_string();
    let (status, _) = srv
        .post(&viewer.token, &format!("/invitations/{grant_id}/accept"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srv.authorize(&viewer.token, &property_id, "VIEW_PROPERTY").await["allow"], true);

    let (status, revoked) = srv
        .post(&landlord.token, &format!("/grants/{grant_id}/revoke"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{revoked}");
    assert_eq!(revoked["status"], "REVOKED");

    let decision = srv.authorize(&viewer.token, &property_id, "VIEW_PROPERTY").await;
    assert_eq!(decision["allow"], false);
    assert_eq!(decision["reason"], "NOT_A_MEMBER");

    let (status, body) = srv
        .post(&landlord.token, &format!("/grants/{grant_id}/revoke"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "GRANT_NOT_REVOCABLE");
}

#[tokio::test]
async fn duplicate_invitation_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let property_id = srv.create_property(&landlord.token, "Elm Yard").await;

    let (status, _) = srv
        .invite(&landlord.token, &property_id, "dup@example.com", "VIEWER")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = srv
        .invite(&landlord.token, &property_id, "dup@example.com", "LEASING_AGENT")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_GRANT");
}

#[tokio::test]
async fn members_listing_hides_property_from_non_members() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let outsider = caller(None);
    let property_id = srv.create_property(&landlord.token, "Fir Lane").await;

    let (status, body) = srv
        .get(&landlord.token, &format!("/properties/{property_id}/members"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"].as_array().unwrap().len(), 1);

    let (status, body) = srv
        .get(&outsider.token, &format!("/properties/{property_id}/members"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn filter_keeps_only_accessible_candidates() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let other = caller(None);
    let mine = srv.create_property(&landlord.token, "Mine").await;
    let theirs = srv.create_property(&other.token, "Theirs").await;
    let unknown = PropertyId::new().to_string();

    let (status, body) = srv
        .post(
            &landlord.token,
            "/access/filter",
            json!({ "property_ids": [theirs, mine, unknown] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["property_ids"], json!([mine]));
}

#[tokio::test]
async fn disabled_property_denies_until_restored() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let property_id = srv.create_property(&landlord.token, "Pine Court").await;

    let res = srv
        .client
        .delete(srv.url(&format!("/properties/{property_id}")))
        .bearer_auth(&landlord.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let decision = srv.authorize(&landlord.token, &property_id, "VIEW_PROPERTY").await;
    assert_eq!(decision["allow"], false);
    assert_eq!(decision["reason"], "PROPERTY_DISABLED");

    let (status, body) = srv
        .post(&landlord.token, &format!("/properties/{property_id}/restore"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disabled"], false);
    assert_eq!(srv.authorize(&landlord.token, &property_id, "VIEW_PROPERTY").await["allow"], true);
}

#[tokio::test]
async fn explain_reports_role_and_reason() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let outsider = caller(None);
    let property_id = srv.create_property(&landlord.token, "Spruce Way").await;

    let (status, body) = srv
        .get(&landlord.token, &format!("/properties/{property_id}/explain?operation=MANAGE_USERS"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], true);
    assert_eq!(body["role"], "OWNER");

    let (status, body) = srv
        .get(&outsider.token, &format!("/properties/{property_id}/explain?operation=VIEW_PROPERTY"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], false);
    assert_eq!(body["reason"], "NOT_A_MEMBER");
}

#[tokio::test]
async fn malformed_input_is_bad_request() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let property_id = srv.create_property(&landlord.token, "Willow Park").await;

    let (status, body) = srv.get(&landlord.token, "/properties/not-a-uuid/authorize?operation=VIEW_PROPERTY").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = srv
        .get(&landlord.token, &format!("/properties/{property_id}/authorize?operation=FLY"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = srv.invite(&landlord.token, &property_id, "x@example.com", "JANITOR").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outsiders_cannot_discover_grant_ids() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let outsider = caller(None);
    let property_id = srv.create_property(&landlord.token, "Hazel Row").await;
    let (_, invitation) = srv.invite(&landlord.token, &property_id, "v@example.com", "VIEWER").await;
    let grant_id = invitation["invitation_id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(&outsider.token, &format!("/grants/{grant_id}/revoke"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn last_owner_grant_cannot_be_revoked() {
    let srv = TestServer::spawn().await;
    let landlord = caller(None);
    let property_id = srv.create_property(&landlord.token, "Rowan Flats").await;

    let (_, body) = srv.get(&landlord.token, &format!("/properties/{property_id}/members")).await;
    let owner_grant = body["members"][0]["grant_id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(&landlord.token, &format!("/grants/{owner_grant}/revoke"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "LAST_OWNER");
}
