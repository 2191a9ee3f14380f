//! Client for the privileged role-assignment service.
//!
//! The only path through which a role changes. The service writes the role
//! server-side; it becomes visible to this client only after the next access
//! token is minted (see the session synchronizer in `haulway-app`).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use haulway_auth::{KnownRole, SessionProvider, decode_claims, validate_claims};
use haulway_core::{AssignmentFailure, CoreError, CoreResult, UserId};

use crate::AuthConfig;

pub const ASSIGN_ROLE_PATH: &str = "/assign-role";

const MAX_LOGGED_BODY: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRoleRequest<'a> {
    user_id: &'a UserId,
    role: KnownRole,
}

#[derive(Debug, Deserialize)]
struct AssignRoleResponse {
    success: bool,
    #[serde(default, alias = "error")]
    message: Option<String>,
}

pub struct RoleAssignmentClient {
    http: reqwest::Client,
    base_url: Option<String>,
    provider: Arc<dyn SessionProvider>,
}

impl RoleAssignmentClient {
    pub fn new(config: &AuthConfig, http: reqwest::Client, provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            http,
            base_url: config.role_api_base_url.clone(),
            provider,
        }
    }

    /// Ask the service to set `role` for `user_id`.
    ///
    /// Succeeds only when the response status is 2xx *and* the body says
    /// `success: true`. Sends exactly one request; retrying is the caller's
    /// decision, and concurrent calls for the same user are not deduplicated.
    pub async fn assign_role(&self, user_id: &UserId, role: KnownRole) -> CoreResult<()> {
        let session = self
            .provider
            .current_session()
            .await?
            .ok_or(CoreError::Unauthenticated)?;

        match decode_claims(&session.access_token) {
            Ok(claims) => validate_claims(&claims, Utc::now()).map_err(|e| {
                warn!(user_id = %user_id, role = %role, error = %e, "refusing role assignment with unusable token");
                CoreError::Unauthenticated
            })?,
            Err(e) => {
                warn!(user_id = %user_id, role = %role, error = %e, "refusing role assignment with undecodable token");
                return Err(CoreError::Unauthenticated);
            }
        }

        let Some(base_url) = self.base_url.as_deref() else {
            error!(user_id = %user_id, role = %role, "role assignment endpoint is not configured");
            return Err(CoreError::misconfigured(format!(
                "{} is not set",
                crate::config::ROLE_API_URL_VAR
            )));
        };

        let url = format!("{base_url}{ASSIGN_ROLE_PATH}");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&session.access_token)
            .json(&AssignRoleRequest { user_id, role })
            .send()
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, role = %role, error = %e, "role assignment request failed");
                AssignmentFailure::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_LOGGED_BODY));
            warn!(user_id = %user_id, role = %role, status = status.as_u16(), body = %body, "role assignment rejected by transport status");
            return Err(AssignmentFailure::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: AssignRoleResponse = response.json().await.map_err(|e| {
            warn!(user_id = %user_id, role = %role, status = status.as_u16(), error = %e, "role assignment response is malformed");
            AssignmentFailure::MalformedBody(e.to_string())
        })?;

        if !parsed.success {
            warn!(
                user_id = %user_id,
                role = %role,
                status = status.as_u16(),
                message = parsed.message.as_deref().unwrap_or(""),
                "role assignment reported failure"
            );
            return Err(AssignmentFailure::Rejected {
                message: parsed.message,
            }
            .into());
        }

        info!(user_id = %user_id, role = %role, "role assigned");
        Ok(())
    }
}

impl core::fmt::Debug for RoleAssignmentClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleAssignmentClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}
