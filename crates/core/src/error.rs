//! Error taxonomy for session and role handling.

use thiserror::Error;

/// Result type used across the session/role core.
pub type CoreResult<T> = Result<T, CoreError>;

/// Categorized failure of a public session/role operation.
///
/// Token decode failures have no variant: they never leave the resolver,
/// which reports them as "no role".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An operation requiring a live session was attempted without one.
    #[error("no authenticated session")]
    Unauthenticated,

    /// Required configuration is missing.
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    /// The role-assignment endpoint did not confirm the assignment.
    #[error("role assignment failed: {0}")]
    RemoteAssignment(AssignmentFailure),

    /// The auth provider refused to mint a new access token.
    #[error("session refresh failed: {0}")]
    Refresh(String),

    /// Assignment and refresh succeeded but the new token carries no role yet.
    #[error("assigned role is not visible in the refreshed session yet")]
    RolePending,

    /// The session provider failed for a reason other than refresh.
    #[error("session provider error: {0}")]
    Provider(String),
}

impl CoreError {
    pub fn misconfigured(msg: impl Into<String>) -> Self {
        Self::Misconfigured(msg.into())
    }

    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::Refresh(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Whether a user-facing retry prompt makes sense for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteAssignment(_) | Self::Refresh(_) | Self::RolePending | Self::Provider(_)
        )
    }
}

impl From<AssignmentFailure> for CoreError {
    fn from(value: AssignmentFailure) -> Self {
        Self::RemoteAssignment(value)
    }
}

/// Why the role-assignment endpoint did not confirm an assignment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentFailure {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx status; the body is kept for diagnostics.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx status but the body was not the expected JSON shape.
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// 2xx status with `success: false`.
    #[error("assignment rejected: {}", message.as_deref().unwrap_or("no reason given"))]
    Rejected { message: Option<String> },
}
