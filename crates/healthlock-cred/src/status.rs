//! Credential status machine.
//!
//! States: Active, Expired, Revoked (Unknown is "never issued", not a state
//! the tracker holds).
//! Terminal states: Expired, Revoked.
//!
//! Valid transitions:
//!   Active -> Expired (on read, once now >= expires_at)
//!   Active -> Revoked (explicit call)

use crate::error::{AccessError, AccessResult};
use crate::types::{CredentialStatus, RevokeOutcome};

/// Check whether a status transition is valid.
pub fn is_valid_transition(from: CredentialStatus, to: CredentialStatus) -> bool {
    matches!(
        (from, to),
        (CredentialStatus::Active, CredentialStatus::Expired)
            | (CredentialStatus::Active, CredentialStatus::Revoked)
    )
}

pub fn is_terminal(status: CredentialStatus) -> bool {
    matches!(status, CredentialStatus::Expired | CredentialStatus::Revoked)
}

/// Map a status to the validation failure it causes, if any.
pub fn check_presentable(status: CredentialStatus) -> AccessResult<()> {
    match status {
        CredentialStatus::Active => Ok(()),
        CredentialStatus::Expired => Err(AccessError::Expired),
        CredentialStatus::Revoked => Err(AccessError::Revoked),
        CredentialStatus::Unknown => Err(AccessError::Internal(
            "status lookup for an untracked credential".into(),
        )),
    }
}

/// Decide the effect of a revoke call on a credential in `current` state.
///
/// Idempotent: revoking a revoked or expired credential leaves its state
/// unchanged and is not an error.
pub fn revoke_transition(current: CredentialStatus) -> AccessResult<RevokeOutcome> {
    match current {
        CredentialStatus::Active => {
            debug_assert!(is_valid_transition(current, CredentialStatus::Revoked));
            Ok(RevokeOutcome::Revoked)
        }
        CredentialStatus::Revoked => Ok(RevokeOutcome::AlreadyRevoked),
        CredentialStatus::Expired => Ok(RevokeOutcome::AlreadyExpired),
        CredentialStatus::Unknown => Err(AccessError::Internal(
            "revoke on an untracked credential".into(),
        )),
    }
}
