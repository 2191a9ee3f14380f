//! Session provider backed by the Supabase auth (GoTrue) HTTP API.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use haulway_auth::{AuthChange, Session, SessionProvider};
use haulway_core::{CoreError, CoreResult, UserId};
use haulway_events::{EventBus, InMemoryEventBus, Subscription};

use crate::AuthConfig;

const AUTH_PATH: &str = "/auth/v1";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<Session, GrantError> {
        let expires_at = match self.expires_at.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
            Some(at) => at,
            None => Duration::try_seconds(self.expires_in)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or_else(|| GrantError::Malformed(format!("expires_in out of range: {}", self.expires_in)))?,
        };

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn message(self) -> String {
        self.error_description
            .or(self.msg)
            .or(self.error)
            .unwrap_or_else(|| "no error description".to_string())
    }
}

#[derive(Debug, Error)]
enum GrantError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Auth provider client for one Supabase project.
///
/// Reads (`current_session`) never wait on network calls. Mutations are
/// serialized: the session is replaced and the notification published while
/// the mutation lock is held, so subscribers see transitions in the order they
/// were applied.
pub struct GoTrueSessionProvider {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
    current: RwLock<Option<Arc<Session>>>,
    mutation: Mutex<()>,
    bus: InMemoryEventBus<AuthChange>,
}

impl GoTrueSessionProvider {
    pub fn new(config: &AuthConfig, http: reqwest::Client) -> CoreResult<Self> {
        let (url, anon_key) = config.supabase()?;
        Ok(Self {
            http,
            auth_url: format!("{url}{AUTH_PATH}"),
            anon_key: anon_key.to_string(),
            current: RwLock::new(None),
            mutation: Mutex::new(()),
            bus: InMemoryEventBus::new(),
        })
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> CoreResult<Arc<Session>> {
        let _guard = self.mutation.lock().await;
        let session = self
            .grant("password", json!({ "email": email, "password": password }))
            .await
            .map_err(|e| {
                warn!(error = %e, "password sign-in failed");
                CoreError::provider(format!("sign-in failed: {e}"))
            })?;
        Ok(self.install(session, AuthChange::signed_in))
    }

    /// Complete an email one-time-password sign-in.
    pub async fn verify_otp(&self, email: &str, code: &str) -> CoreResult<Arc<Session>> {
        let _guard = self.mutation.lock().await;
        let url = format!("{}/verify", self.auth_url);
        let body = json!({ "type": "email", "email": email, "token": code });
        let session = self.post_for_session(&url, &body).await.map_err(|e| {
            warn!(error = %e, "otp verification failed");
            CoreError::provider(format!("otp verification failed: {e}"))
        })?;
        Ok(self.install(session, AuthChange::signed_in))
    }

    /// Re-establish a session persisted by a previous run.
    pub async fn restore_session(&self, refresh_token: &str) -> CoreResult<Arc<Session>> {
        let _guard = self.mutation.lock().await;
        let session = self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
            .map_err(|e| {
                warn!(error = %e, "session restore failed");
                CoreError::refresh(e.to_string())
            })?;
        Ok(self.install(session, AuthChange::signed_in))
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, GrantError> {
        let url = format!("{}/token?grant_type={grant_type}", self.auth_url);
        self.post_for_session(&url, &body).await
    }

    async fn post_for_session(&self, url: &str, body: &serde_json::Value) -> Result<Session, GrantError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GrantError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .unwrap_or_default()
                .message();
            return Err(GrantError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| GrantError::Malformed(e.to_string()))?;
        parsed.into_session(Utc::now())
    }

    // Caller holds `mutation`.
    fn install(&self, session: Session, change: fn(Arc<Session>) -> AuthChange) -> Arc<Session> {
        let session = Arc::new(session);
        self.replace(Some(Arc::clone(&session)));
        info!(user_id = %session.user_id, "session installed");
        self.publish(change(Arc::clone(&session)));
        session
    }

    fn replace(&self, session: Option<Arc<Session>>) {
        match self.current.write() {
            Ok(mut current) => *current = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn snapshot(&self) -> Option<Arc<Session>> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, change: AuthChange) {
        if let Err(e) = self.bus.publish(change) {
            debug!(error = ?e, "dropping auth notification");
        }
    }
}

#[async_trait]
impl SessionProvider for GoTrueSessionProvider {
    async fn current_session(&self) -> CoreResult<Option<Arc<Session>>> {
        Ok(self.snapshot())
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        self.bus.subscribe()
    }

    async fn refresh_session(&self) -> CoreResult<Arc<Session>> {
        let _guard = self.mutation.lock().await;
        let current = self
            .snapshot()
            .ok_or_else(|| CoreError::refresh("no session to refresh"))?;

        let session = self
            .grant("refresh_token", json!({ "refresh_token": current.refresh_token }))
            .await
            .map_err(|e| {
                warn!(user_id = %current.user_id, error = %e, "token refresh failed; keeping previous session");
                CoreError::refresh(e.to_string())
            })?;

        Ok(self.install(session, AuthChange::token_refreshed))
    }

    async fn sign_out(&self) -> CoreResult<()> {
        let _guard = self.mutation.lock().await;

        if let Some(current) = self.snapshot() {
            let url = format!("{}/logout", self.auth_url);
            let result = self
                .http
                .post(&url)
                .header("apikey", &self.anon_key)
                .bearer_auth(&current.access_token)
                .send()
                .await;

            // The local session goes regardless; a dead server must not trap
            // the user in a signed-in UI.
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(status = resp.status().as_u16(), "remote sign-out rejected"),
                Err(e) => warn!(error = %e, "remote sign-out failed"),
            }
        }

        self.replace(None);
        self.publish(AuthChange::signed_out());
        info!("signed out");
        Ok(())
    }
}

impl core::fmt::Debug for GoTrueSessionProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GoTrueSessionProvider")
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}
