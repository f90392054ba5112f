use healthlock_core::{AccessId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::{PermissionSet, Role};

// ---------------------------------------------------------------------------
// Credential — an issued, time-boxed, role-scoped access grant
// ---------------------------------------------------------------------------

/// The fields carried inside an access token.
///
/// Status is not part of the credential; it is derived by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    pub access_id: AccessId,
    pub role: Role,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Credential {
    /// Lifetime in seconds. Always positive for an issued credential.
    pub fn lifetime_seconds(&self) -> u64 {
        self.issued_at.seconds_until(self.expires_at)
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// CredentialStatus — derived liveness of an access id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Expired,
    Revoked,
    Unknown,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStatus::Active => write!(f, "active"),
            CredentialStatus::Expired => write!(f, "expired"),
            CredentialStatus::Revoked => write!(f, "revoked"),
            CredentialStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Authorization — result of a successful validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub access_id: AccessId,
    pub role: Role,
    pub permissions: PermissionSet,
    pub expires_at: Timestamp,
}

// ---------------------------------------------------------------------------
// RevokeOutcome — what an (idempotent) revoke call did
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    AlreadyExpired,
}

// ---------------------------------------------------------------------------
// ActiveCredential — a live credential with its remaining time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCredential {
    pub credential: Credential,
    pub remaining_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_credential() -> Credential {
        Credential {
            access_id: AccessId::generate(),
            role: Role::Doctor,
            issued_at: Timestamp::from_seconds(1000),
            expires_at: Timestamp::from_seconds(4600),
        }
    }

    #[test]
    fn test_lifetime_and_expiry_boundary() {
        let cred = make_credential();
        assert_eq!(cred.lifetime_seconds(), 3600);
        assert!(!cred.is_expired_at(Timestamp::from_seconds(4599)));
        assert!(cred.is_expired_at(Timestamp::from_seconds(4600)));
    }

    #[test]
    fn test_credential_rejects_unknown_fields() {
        let json = r#"{"access_id":"abcdef0123456789abcdef0123456789","role":"doctor","issued_at":1,"expires_at":2,"admin":true}"#;
        assert!(serde_json::from_str::<Credential>(json).is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CredentialStatus::Active.to_string(), "active");
        assert_eq!(CredentialStatus::Unknown.to_string(), "unknown");
    }
}
