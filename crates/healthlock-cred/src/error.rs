use healthlock_core::AccessId;
use thiserror::Error;

/// Error type for the access credential engine.
///
/// Every variant is a recoverable, caller-visible outcome. Display strings
/// never include token bytes, signatures or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("unknown credential: {0}")]
    UnknownCredential(AccessId),

    #[error("credential expired")]
    Expired,

    #[error("credential revoked")]
    Revoked,

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Short machine-readable name, used as the `detail` of rejection
    /// audit entries.
    pub fn kind_str(&self) -> &'static str {
        match self {
            AccessError::UnknownRole(_) => "unknown_role",
            AccessError::InvalidDuration(_) => "invalid_duration",
            AccessError::MalformedCredential(_) => "malformed_credential",
            AccessError::UnknownCredential(_) => "unknown",
            AccessError::Expired => "expired",
            AccessError::Revoked => "revoked",
            AccessError::RenderFailed(_) => "render_failed",
            AccessError::Internal(_) => "internal",
        }
    }
}

impl From<healthlock_core::CoreError> for AccessError {
    fn from(err: healthlock_core::CoreError) -> Self {
        match err {
            healthlock_core::CoreError::Render(msg) => AccessError::RenderFailed(msg),
            other => AccessError::Internal(other.to_string()),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Map a poisoned lock to an internal error instead of panicking.
pub(crate) fn poisoned<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> AccessError {
    move |e| AccessError::Internal(format!("{} lock poisoned: {}", what, e))
}
