//! Expiration and revocation tracker.
//!
//! Holds every credential issued during the process lifetime, keyed by
//! access id. Nothing is ever removed; archival by age is left to callers.
//!
//! Locking: the table lock is held only to find or insert an entry. Each
//! entry has its own mutex, and every status transition together with its
//! audit append happens under that mutex. Per access id, transitions are
//! therefore linearizable and the audit order matches the transition order,
//! while validations of unrelated credentials do not contend.

use healthlock_core::{AccessId, AuditEvent, AuditEventKind, AuditLogWriter, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::error::{poisoned, AccessError, AccessResult};
use crate::status;
use crate::types::{ActiveCredential, Authorization, Credential, CredentialStatus, RevokeOutcome};

struct TrackedCredential {
    credential: Credential,
    revoked_at: Option<Timestamp>,
}

impl TrackedCredential {
    /// Revocation wins over time-based expiry.
    fn status_at(&self, now: Timestamp) -> CredentialStatus {
        if self.revoked_at.is_some() {
            CredentialStatus::Revoked
        } else if self.credential.is_expired_at(now) {
            CredentialStatus::Expired
        } else {
            CredentialStatus::Active
        }
    }
}

type EntryHandle = Arc<Mutex<TrackedCredential>>;

pub struct Tracker {
    entries: RwLock<HashMap<AccessId, EntryHandle>>,
    audit: Arc<AuditLog>,
}

impl Tracker {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            audit,
        }
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Register a freshly issued credential as active and record the
    /// `issued` audit entry.
    ///
    /// Returns `Ok(false)` without touching any state if the access id is
    /// already tracked; the caller must pick a new id.
    pub fn register(&self, credential: Credential) -> AccessResult<bool> {
        let access_id = credential.access_id.clone();
        let detail = format!(
            "role={} expires_at={}",
            credential.role, credential.expires_at
        );
        let issued_at = credential.issued_at;

        let entry: EntryHandle = Arc::new(Mutex::new(TrackedCredential {
            credential,
            revoked_at: None,
        }));
        // Held until the audit entry is written, so no validation of this id
        // can be recorded ahead of its issuance.
        let _guard = entry.lock().map_err(poisoned("tracker entry"))?;

        {
            let mut table = self.entries.write().map_err(poisoned("tracker table"))?;
            if table.contains_key(&access_id) {
                warn!(access_id = %access_id, "access id collision, not registering");
                return Ok(false);
            }
            table.insert(access_id.clone(), Arc::clone(&entry));
        }

        // A credential without its `issued` entry must not be tracked.
        if let Err(err) = self.record(&access_id, AuditEventKind::Issued, issued_at, detail) {
            let mut table = self.entries.write().map_err(poisoned("tracker table"))?;
            table.remove(&access_id);
            warn!(access_id = %access_id, error = %err, "issued entry not recorded, registration rolled back");
            return Err(err);
        }
        Ok(true)
    }

    /// The credential as issued, if this id was ever issued.
    pub fn credential(&self, access_id: &AccessId) -> AccessResult<Option<Credential>> {
        match self.lookup(access_id)? {
            Some(entry) => {
                let tracked = entry.lock().map_err(poisoned("tracker entry"))?;
                Ok(Some(tracked.credential.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn status(&self, access_id: &AccessId, now: Timestamp) -> AccessResult<CredentialStatus> {
        match self.lookup(access_id)? {
            Some(entry) => {
                let tracked = entry.lock().map_err(poisoned("tracker entry"))?;
                Ok(tracked.status_at(now))
            }
            None => Ok(CredentialStatus::Unknown),
        }
    }

    /// Revoke a credential. Idempotent: revoking a revoked or expired
    /// credential changes nothing and records nothing.
    pub fn revoke(&self, access_id: &AccessId, now: Timestamp) -> AccessResult<RevokeOutcome> {
        let entry = self
            .lookup(access_id)?
            .ok_or_else(|| AccessError::UnknownCredential(access_id.clone()))?;
        let mut tracked = entry.lock().map_err(poisoned("tracker entry"))?;

        let outcome = status::revoke_transition(tracked.status_at(now))?;
        if outcome == RevokeOutcome::Revoked {
            tracked.revoked_at = Some(now);
            self.record(access_id, AuditEventKind::Revoked, now, "")?;
            info!(access_id = %access_id, role = %tracked.credential.role, "credential revoked");
        } else {
            debug!(access_id = %access_id, ?outcome, "revoke had no effect");
        }
        Ok(outcome)
    }

    /// The single gate for record access by access id.
    ///
    /// Records `validated` on success and `rejected` (detail = failure kind)
    /// on failure, including for ids that were never issued.
    pub fn validate(&self, access_id: &AccessId, now: Timestamp) -> AccessResult<Authorization> {
        self.validate_inner(access_id, None, now)
    }

    /// Validate a decoded credential: in addition to liveness, every field
    /// must match the credential recorded at issuance.
    pub fn validate_credential(
        &self,
        presented: &Credential,
        now: Timestamp,
    ) -> AccessResult<Authorization> {
        self.validate_inner(&presented.access_id, Some(presented), now)
    }

    fn validate_inner(
        &self,
        access_id: &AccessId,
        presented: Option<&Credential>,
        now: Timestamp,
    ) -> AccessResult<Authorization> {
        let entry = match self.lookup(access_id)? {
            Some(entry) => entry,
            None => {
                let err = AccessError::UnknownCredential(access_id.clone());
                self.record(access_id, AuditEventKind::Rejected, now, err.kind_str())?;
                warn!(access_id = %access_id, "validation of unknown credential");
                return Err(err);
            }
        };
        let tracked = entry.lock().map_err(poisoned("tracker entry"))?;

        if let Some(presented) = presented {
            if *presented != tracked.credential {
                self.record(
                    access_id,
                    AuditEventKind::Rejected,
                    now,
                    "credential_mismatch",
                )?;
                warn!(access_id = %access_id, "presented credential differs from issued record");
                return Err(AccessError::MalformedCredential(
                    "credential does not match issued record".into(),
                ));
            }
        }

        match status::check_presentable(tracked.status_at(now)) {
            Ok(()) => {
                let credential = &tracked.credential;
                self.record(
                    access_id,
                    AuditEventKind::Validated,
                    now,
                    format!("role={}", credential.role),
                )?;
                debug!(access_id = %access_id, role = %credential.role, "credential validated");
                Ok(Authorization {
                    access_id: access_id.clone(),
                    role: credential.role,
                    permissions: credential.role.permissions(),
                    expires_at: credential.expires_at,
                })
            }
            Err(err) => {
                self.record(access_id, AuditEventKind::Rejected, now, err.kind_str())?;
                info!(access_id = %access_id, reason = err.kind_str(), "credential rejected");
                Err(err)
            }
        }
    }

    /// Every credential still active at `now`, soonest to expire first.
    pub fn active(&self, now: Timestamp) -> AccessResult<Vec<ActiveCredential>> {
        let handles: Vec<EntryHandle> = {
            let table = self.entries.read().map_err(poisoned("tracker table"))?;
            table.values().cloned().collect()
        };

        let mut active = Vec::new();
        for handle in handles {
            let tracked = handle.lock().map_err(poisoned("tracker entry"))?;
            if tracked.status_at(now) == CredentialStatus::Active {
                active.push(ActiveCredential {
                    credential: tracked.credential.clone(),
                    remaining_seconds: now.seconds_until(tracked.credential.expires_at),
                });
            }
        }
        active.sort_by(|a, b| {
            a.credential
                .expires_at
                .cmp(&b.credential.expires_at)
                .then_with(|| a.credential.access_id.cmp(&b.credential.access_id))
        });
        Ok(active)
    }

    /// Number of credentials ever registered.
    pub fn len(&self) -> usize {
        self.entries.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, access_id: &AccessId) -> AccessResult<Option<EntryHandle>> {
        let table = self.entries.read().map_err(poisoned("tracker table"))?;
        Ok(table.get(access_id).cloned())
    }

    fn record(
        &self,
        access_id: &AccessId,
        kind: AuditEventKind,
        at: Timestamp,
        detail: impl Into<String>,
    ) -> AccessResult<()> {
        self.audit
            .append(AuditEvent::new(access_id.clone(), kind, at, detail))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn tracker() -> Tracker {
        Tracker::new(Arc::new(AuditLog::new()))
    }

    fn make_credential(issued: u64, lifetime: u64) -> Credential {
        Credential {
            access_id: AccessId::generate(),
            role: Role::Doctor,
            issued_at: Timestamp::from_seconds(issued),
            expires_at: Timestamp::from_seconds(issued + lifetime),
        }
    }

    fn at(seconds: u64) -> Timestamp {
        Timestamp::from_seconds(seconds)
    }

    fn audit_kinds(tracker: &Tracker, id: &AccessId) -> Vec<AuditEventKind> {
        tracker
            .audit()
            .entries_for(id)
            .unwrap()
            .into_iter()
            .map(|e| e.event.kind)
            .collect()
    }

    #[test]
    fn test_register_and_status() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        assert!(tracker.register(cred.clone()).unwrap());
        assert_eq!(
            tracker.status(&cred.access_id, at(1000)).unwrap(),
            CredentialStatus::Active
        );
        assert_eq!(
            tracker.status(&cred.access_id, at(4600)).unwrap(),
            CredentialStatus::Expired
        );
        assert_eq!(audit_kinds(&tracker, &cred.access_id), vec![AuditEventKind::Issued]);
    }

    #[test]
    fn test_register_rolled_back_when_audit_fails() {
        let tracker = tracker();
        tracker.audit().poison();

        let cred = make_credential(1000, 3600);
        assert!(matches!(
            tracker.register(cred.clone()),
            Err(AccessError::Internal(_))
        ));
        assert!(tracker.is_empty());
        assert_eq!(
            tracker.status(&cred.access_id, at(1000)).unwrap(),
            CredentialStatus::Unknown
        );
        assert!(tracker.active(at(1000)).unwrap().is_empty());
    }

    #[test]
    fn test_status_unknown() {
        let tracker = tracker();
        assert_eq!(
            tracker.status(&AccessId::generate(), at(0)).unwrap(),
            CredentialStatus::Unknown
        );
    }

    #[test]
    fn test_duplicate_registration_refused() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        assert!(tracker.register(cred.clone()).unwrap());

        let mut clash = make_credential(2000, 60);
        clash.access_id = cred.access_id.clone();
        assert!(!tracker.register(clash).unwrap());

        // The original entry is untouched and only one issued entry exists
        assert_eq!(tracker.credential(&cred.access_id).unwrap(), Some(cred.clone()));
        assert_eq!(audit_kinds(&tracker, &cred.access_id).len(), 1);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();

        let auth = tracker.validate(&cred.access_id, at(4599)).unwrap();
        assert_eq!(auth.role, Role::Doctor);
        assert_eq!(
            tracker.validate(&cred.access_id, at(4600)),
            Err(AccessError::Expired)
        );
    }

    #[test]
    fn test_revocation_precedence() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();

        assert_eq!(
            tracker.revoke(&cred.access_id, at(1500)).unwrap(),
            RevokeOutcome::Revoked
        );
        for t in [0, 1000, 1500, 4599, 4600, 99_999] {
            assert_eq!(
                tracker.validate(&cred.access_id, at(t)),
                Err(AccessError::Revoked),
                "at {}",
                t
            );
            assert_eq!(
                tracker.status(&cred.access_id, at(t)).unwrap(),
                CredentialStatus::Revoked
            );
        }
    }

    #[test]
    fn test_revoke_idempotent() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();

        tracker.revoke(&cred.access_id, at(1200)).unwrap();
        let after_first = tracker.audit().all_entries().unwrap();

        assert_eq!(
            tracker.revoke(&cred.access_id, at(1300)).unwrap(),
            RevokeOutcome::AlreadyRevoked
        );
        assert_eq!(tracker.audit().all_entries().unwrap(), after_first);
        assert_eq!(
            tracker.status(&cred.access_id, at(1300)).unwrap(),
            CredentialStatus::Revoked
        );
    }

    #[test]
    fn test_revoke_expired_is_noop() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();

        assert_eq!(
            tracker.revoke(&cred.access_id, at(5000)).unwrap(),
            RevokeOutcome::AlreadyExpired
        );
        assert_eq!(
            tracker.status(&cred.access_id, at(5000)).unwrap(),
            CredentialStatus::Expired
        );
        assert_eq!(
            tracker.credential(&cred.access_id).unwrap().unwrap().expires_at,
            at(4600)
        );
        assert_eq!(audit_kinds(&tracker, &cred.access_id), vec![AuditEventKind::Issued]);
    }

    #[test]
    fn test_revoke_unknown_fails() {
        let tracker = tracker();
        let id = AccessId::generate();
        assert_eq!(
            tracker.revoke(&id, at(0)),
            Err(AccessError::UnknownCredential(id.clone()))
        );
        assert!(tracker.audit().is_empty());
    }

    #[test]
    fn test_validate_unknown_records_rejection() {
        let tracker = tracker();
        let id = AccessId::generate();
        assert_eq!(
            tracker.validate(&id, at(0)),
            Err(AccessError::UnknownCredential(id.clone()))
        );
        let entries = tracker.audit().entries_for(&id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.kind, AuditEventKind::Rejected);
        assert_eq!(entries[0].event.detail, "unknown");
    }

    #[test]
    fn test_audit_completeness() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();
        tracker.validate(&cred.access_id, at(1100)).unwrap();
        tracker.revoke(&cred.access_id, at(1200)).unwrap();

        assert_eq!(
            audit_kinds(&tracker, &cred.access_id),
            vec![
                AuditEventKind::Issued,
                AuditEventKind::Validated,
                AuditEventKind::Revoked
            ]
        );
        let times: Vec<u64> = tracker
            .audit()
            .entries_for(&cred.access_id)
            .unwrap()
            .iter()
            .map(|e| e.event.timestamp.seconds_since_epoch)
            .collect();
        assert_eq!(times, vec![1000, 1100, 1200]);
    }

    #[test]
    fn test_rejection_detail_names_failure_kind() {
        let tracker = tracker();
        let cred = make_credential(1000, 60);
        tracker.register(cred.clone()).unwrap();
        let _ = tracker.validate(&cred.access_id, at(2000));

        let entries = tracker.audit().entries_for(&cred.access_id).unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.event.kind, AuditEventKind::Rejected);
        assert_eq!(last.event.detail, "expired");
    }

    #[test]
    fn test_validate_credential_requires_exact_match() {
        let tracker = tracker();
        let cred = make_credential(1000, 3600);
        tracker.register(cred.clone()).unwrap();

        assert!(tracker.validate_credential(&cred, at(1000)).is_ok());

        let mut altered = cred.clone();
        altered.role = Role::Pharmacist;
        assert!(matches!(
            tracker.validate_credential(&altered, at(1000)),
            Err(AccessError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_active_listing() {
        let tracker = tracker();
        let short = make_credential(1000, 1800);
        let long = make_credential(1000, 7200);
        let revoked = make_credential(1000, 3600);
        for c in [&short, &long, &revoked] {
            tracker.register(c.clone()).unwrap();
        }
        tracker.revoke(&revoked.access_id, at(1100)).unwrap();

        let active = tracker.active(at(1200)).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].credential, short);
        assert_eq!(active[0].remaining_seconds, 1600);
        assert_eq!(active[1].credential, long);

        assert!(tracker.active(at(9000)).unwrap().is_empty());
        // Expired and revoked entries are retained
        assert_eq!(tracker.len(), 3);
    }
}
