//! Credential issuance and the token-level validation gate.
//!
//! The issuer owns the clock, the codec and a handle to the shared tracker.
//! Request validation happens before any state is touched, so a failed
//! issuance leaves neither a tracker entry nor an audit entry behind.

use healthlock_core::{AccessId, Clock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec::CredentialCodec;
use crate::duration::AccessDuration;
use crate::error::{AccessError, AccessResult};
use crate::role::Role;
use crate::tracker::Tracker;
use crate::types::{Authorization, Credential, CredentialStatus, RevokeOutcome};

/// Upper bound on access id regeneration after a collision. With 128-bit
/// random ids a single retry is already astronomically unlikely.
const MAX_ID_ATTEMPTS: usize = 8;

/// A freshly issued credential together with its encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub credential: Credential,
    pub token: String,
}

pub struct Issuer {
    clock: Arc<dyn Clock>,
    tracker: Arc<Tracker>,
    codec: CredentialCodec,
}

impl Issuer {
    pub fn new(clock: Arc<dyn Clock>, tracker: Arc<Tracker>, codec: CredentialCodec) -> Self {
        Self {
            clock,
            tracker,
            codec,
        }
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a credential from textual role and duration identifiers.
    ///
    /// Fails closed with `UnknownRole` or `InvalidDuration`; neither failure
    /// has side effects.
    pub fn issue(&self, role_id: &str, duration: &str) -> AccessResult<Credential> {
        let role: Role = role_id.parse()?;
        let duration: AccessDuration = duration.parse()?;
        self.issue_with(role, duration)
    }

    /// Issue a credential for an already-parsed role and duration.
    pub fn issue_with(&self, role: Role, duration: AccessDuration) -> AccessResult<Credential> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let issued_at = self.clock.now();
            let credential = Credential {
                access_id: AccessId::generate(),
                role,
                issued_at,
                expires_at: issued_at.plus_seconds(duration.seconds()),
            };
            if credential.expires_at <= credential.issued_at {
                return Err(AccessError::Internal("clock too close to overflow".into()));
            }

            if self.tracker.register(credential.clone())? {
                info!(
                    access_id = %credential.access_id,
                    role = %role,
                    duration = %duration,
                    expires_at = %credential.expires_at,
                    "credential issued"
                );
                return Ok(credential);
            }
        }

        warn!(attempts = MAX_ID_ATTEMPTS, "could not allocate a unique access id");
        Err(AccessError::Internal(
            "could not allocate a unique access id".into(),
        ))
    }

    /// Issue a credential and encode it for handoff to the code renderer.
    pub fn issue_token(&self, role_id: &str, duration: &str) -> AccessResult<IssuedToken> {
        let credential = self.issue(role_id, duration)?;
        let token = self.codec.encode(&credential)?;
        Ok(IssuedToken { credential, token })
    }

    /// Decode a presented token and validate it at the clock's current time.
    ///
    /// A token that fails to decode has no trustworthy access id, so it is
    /// logged but not audited.
    pub fn validate_token(&self, token: &str) -> AccessResult<Authorization> {
        let credential = match self.codec.decode(token) {
            Ok(credential) => credential,
            Err(err) => {
                warn!(error = %err, "rejected malformed access token");
                return Err(err);
            }
        };
        self.tracker.validate_credential(&credential, self.clock.now())
    }

    /// Validate by access id at the clock's current time.
    pub fn validate(&self, access_id: &AccessId) -> AccessResult<Authorization> {
        self.tracker.validate(access_id, self.clock.now())
    }

    pub fn revoke(&self, access_id: &AccessId) -> AccessResult<RevokeOutcome> {
        self.tracker.revoke(access_id, self.clock.now())
    }

    pub fn status(&self, access_id: &AccessId) -> AccessResult<CredentialStatus> {
        self.tracker.status(access_id, self.clock.now())
    }
}
