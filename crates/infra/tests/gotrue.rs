use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};

use haulway_auth::{AuthEvent, Role, RoleResolver, SessionProvider};
use haulway_core::{CoreError, UserId};
use haulway_infra::{AuthConfig, GoTrueSessionProvider};

const ANON_KEY: &str = "anon-key";
const EMAIL: &str = "mover@example.com";
const PASSWORD: &str = "correct horse";
const OTP: &str = "123456";

#[derive(Default)]
struct Accounts {
    user: UserId,
    role: Option<String>,
    live_refresh_tokens: HashMap<String, UserId>,
    issued: u32,
    logouts: u32,
}

type Shared = Arc<Mutex<Accounts>>;

fn issue(accounts: &mut Accounts) -> Value {
    accounts.issued += 1;
    let now = Utc::now();
    let mut claims = json!({
        "sub": accounts.user.to_string(),
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
        "role": "authenticated",
    });
    if let Some(role) = &accounts.role {
        claims["user_role"] = json!(role);
    }
    let access_token =
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server")).unwrap();
    let refresh_token = format!("rt-{}", accounts.issued);
    accounts.live_refresh_tokens.insert(refresh_token.clone(), accounts.user);

    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": (now + Duration::hours(1)).timestamp(),
        "refresh_token": refresh_token,
        "user": { "id": accounts.user.to_string(), "email": EMAIL },
    })
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

async fn token(
    State(accounts): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_api_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "Invalid API key" }))).into_response();
    }
    let mut accounts = accounts.lock().unwrap();

    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            if body["email"] == EMAIL && body["password"] == PASSWORD {
                Json(issue(&mut accounts)).into_response()
            } else {
                invalid_grant("Invalid login credentials")
            }
        }
        Some("refresh_token") => {
            let presented = body["refresh_token"].as_str().unwrap_or_default();
            // Refresh tokens rotate: each one is single-use.
            if accounts.live_refresh_tokens.remove(presented).is_some() {
                Json(issue(&mut accounts)).into_response()
            } else {
                invalid_grant("Invalid Refresh Token: Refresh Token Not Found")
            }
        }
        _ => invalid_grant("unsupported grant type"),
    }
}

async fn verify(State(accounts): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["type"] == "email" && body["email"] == EMAIL && body["token"] == OTP {
        Json(issue(&mut accounts.lock().unwrap())).into_response()
    } else {
        (StatusCode::FORBIDDEN, Json(json!({ "msg": "Token has expired or is invalid" }))).into_response()
    }
}

async fn logout(State(accounts): State<Shared>) -> StatusCode {
    accounts.lock().unwrap().logouts += 1;
    StatusCode::NO_CONTENT
}

struct TestServer {
    base_url: String,
    accounts: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let accounts: Shared = Arc::new(Mutex::new(Accounts {
            user: UserId::new(),
            ..Accounts::default()
        }));
        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/verify", post(verify))
            .route("/auth/v1/logout", post(logout))
            .with_state(accounts.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            accounts,
            handle,
        }
    }

    fn provider(&self, anon_key: &str) -> Arc<GoTrueSessionProvider> {
        let config = AuthConfig {
            supabase_url: Some(self.base_url.clone()),
            supabase_anon_key: Some(anon_key.to_string()),
            ..AuthConfig::default()
        };
        Arc::new(GoTrueSessionProvider::new(&config, reqwest::Client::new()).unwrap())
    }

    fn set_role(&self, role: &str) {
        self.accounts.lock().unwrap().role = Some(role.to_string());
    }

    fn revoke_all_refresh_tokens(&self) {
        self.accounts.lock().unwrap().live_refresh_tokens.clear();
    }

    fn logouts(&self) -> u32 {
        self.accounts.lock().unwrap().logouts
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn password_sign_in_installs_session_and_notifies() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    let mut changes = provider.subscribe();

    let session = provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(provider.current_session().await.unwrap(), Some(session.clone()));
    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedIn);
    assert_eq!(change.session, Some(session));
}

#[tokio::test]
async fn wrong_password_leaves_no_session_and_no_notification() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    let mut changes = provider.subscribe();

    let err = provider.sign_in_with_password(EMAIL, "nope").await.unwrap_err();

    assert!(matches!(err, CoreError::Provider(ref msg) if msg.contains("Invalid login credentials")));
    assert_eq!(provider.current_session().await.unwrap(), None);
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider("stolen-key");

    let err = provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap_err();

    assert!(matches!(err, CoreError::Provider(ref msg) if msg.contains("Invalid API key")));
}

#[tokio::test]
async fn otp_verification_signs_in() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);

    assert!(provider.verify_otp(EMAIL, "000000").await.is_err());
    let session = provider.verify_otp(EMAIL, OTP).await.unwrap();

    assert_eq!(provider.current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn refresh_mints_token_with_server_side_role() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    let resolver = RoleResolver::new(provider.clone());
    provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    let mut changes = provider.subscribe();

    assert_eq!(resolver.resolve_role().await, None);
    srv.set_role("driver");
    assert_eq!(resolver.resolve_role().await, None);

    let refreshed = provider.refresh_session().await.unwrap();

    assert_eq!(resolver.resolve_role().await, Some(Role::DRIVER));
    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::TokenRefreshed);
    assert_eq!(change.session, Some(refreshed));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_session() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    let before = provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    let mut changes = provider.subscribe();
    srv.revoke_all_refresh_tokens();

    let err = provider.refresh_session().await.unwrap_err();

    assert!(matches!(err, CoreError::Refresh(ref msg) if msg.contains("Refresh Token Not Found")));
    assert_eq!(provider.current_session().await.unwrap(), Some(before));
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn restore_uses_persisted_refresh_token() {
    let srv = TestServer::spawn().await;
    let first_run = srv.provider(ANON_KEY);
    let persisted = first_run
        .sign_in_with_password(EMAIL, PASSWORD)
        .await
        .unwrap()
        .refresh_token
        .clone();

    let relaunch = srv.provider(ANON_KEY);
    let mut changes = relaunch.subscribe();
    let restored = relaunch.restore_session(&persisted).await.unwrap();

    assert_ne!(restored.refresh_token, persisted);
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::SignedIn);

    // The persisted token was consumed by the restore.
    assert!(matches!(
        relaunch.restore_session(&persisted).await,
        Err(CoreError::Refresh(_))
    ));
}

#[tokio::test]
async fn sign_out_clears_session_and_notifies() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    let mut changes = provider.subscribe();

    provider.sign_out().await.unwrap();

    assert_eq!(srv.logouts(), 1);
    assert_eq!(provider.current_session().await.unwrap(), None);
    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedOut);
    assert_eq!(change.session, None);
}

#[tokio::test]
async fn sign_out_is_local_even_when_server_is_gone() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);
    provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    drop(srv);

    provider.sign_out().await.unwrap();

    assert_eq!(provider.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn refresh_without_session_fails() {
    let srv = TestServer::spawn().await;
    let provider = srv.provider(ANON_KEY);

    assert!(matches!(provider.refresh_session().await, Err(CoreError::Refresh(_))));
}
