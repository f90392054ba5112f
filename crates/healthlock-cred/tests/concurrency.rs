//! Concurrent issuance, validation and revocation against shared state.

use healthlock_core::{AuditEventKind, AuditLogWriter, ManualClock, Timestamp};
use healthlock_cred::{
    AccessError, AuditLog, CodecKey, CredentialCodec, CredentialStatus, Issuer, RevokeOutcome,
    Tracker,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn shared_issuer(t0: u64) -> (Arc<Issuer>, Arc<AuditLog>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_seconds(t0)));
    let audit = Arc::new(AuditLog::new());
    let tracker = Arc::new(Tracker::new(Arc::clone(&audit)));
    let issuer = Issuer::new(clock, tracker, CredentialCodec::new(CodecKey::generate()));
    (Arc::new(issuer), audit)
}

#[test]
fn test_parallel_issuance_yields_unique_ids() {
    let (issuer, audit) = shared_issuer(1000);
    let threads = 8;
    let per_thread = 100;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let issuer = Arc::clone(&issuer);
            thread::spawn(move || {
                let role = ["doctor", "pharmacist", "diagnostics", "specialist"][i % 4];
                (0..per_thread)
                    .map(|_| issuer.issue(role, "1h").unwrap().access_id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate access id issued");
        }
    }
    assert_eq!(ids.len(), threads * per_thread);
    assert_eq!(issuer.tracker().len(), threads * per_thread);
    assert_eq!(audit.len(), threads * per_thread);
    assert!(audit.verify_chain().unwrap());
}

#[test]
fn test_revoke_races_validate() {
    let (issuer, audit) = shared_issuer(1000);
    let cred = issuer.issue("doctor", "8h").unwrap();
    let id = cred.access_id.clone();

    let barrier = Arc::new(Barrier::new(5));
    let mut validators = Vec::new();
    for _ in 0..4 {
        let issuer = Arc::clone(&issuer);
        let barrier = Arc::clone(&barrier);
        let id = id.clone();
        validators.push(thread::spawn(move || {
            barrier.wait();
            let mut results = Vec::new();
            for _ in 0..50 {
                results.push(issuer.validate(&id));
            }
            results
        }));
    }

    let revoker = {
        let issuer = Arc::clone(&issuer);
        let barrier = Arc::clone(&barrier);
        let id = id.clone();
        thread::spawn(move || {
            barrier.wait();
            issuer.revoke(&id).unwrap()
        })
    };

    assert_eq!(revoker.join().unwrap(), RevokeOutcome::Revoked);
    for handle in validators {
        for result in handle.join().unwrap() {
            assert!(matches!(result, Ok(_) | Err(AccessError::Revoked)));
        }
    }

    // Once the revoked entry is in the log, no later entry is a success.
    let kinds: Vec<AuditEventKind> = audit
        .entries_for(&id)
        .unwrap()
        .into_iter()
        .map(|e| e.event.kind)
        .collect();
    assert_eq!(kinds[0], AuditEventKind::Issued);
    assert_eq!(kinds.len(), 1 + 4 * 50 + 1);
    let revoked_at = kinds
        .iter()
        .position(|k| *k == AuditEventKind::Revoked)
        .unwrap();
    assert!(kinds[..revoked_at]
        .iter()
        .skip(1)
        .all(|k| *k == AuditEventKind::Validated));
    assert!(kinds[revoked_at + 1..]
        .iter()
        .all(|k| *k == AuditEventKind::Rejected));

    assert_eq!(issuer.status(&id).unwrap(), CredentialStatus::Revoked);
    assert!(audit.verify_chain().unwrap());
}

#[test]
fn test_concurrent_revokes_record_once() {
    let (issuer, audit) = shared_issuer(1000);
    let cred = issuer.issue("specialist", "2h").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let issuer = Arc::clone(&issuer);
            let id = cred.access_id.clone();
            thread::spawn(move || issuer.revoke(&id).unwrap())
        })
        .collect();

    let outcomes: Vec<RevokeOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == RevokeOutcome::Revoked)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == RevokeOutcome::AlreadyRevoked)
            .count(),
        7
    );
    let revoked_entries = audit
        .entries_for(&cred.access_id)
        .unwrap()
        .into_iter()
        .filter(|e| e.event.kind == AuditEventKind::Revoked)
        .count();
    assert_eq!(revoked_entries, 1);
}

#[test]
fn test_validation_of_unrelated_credentials_in_parallel() {
    let (issuer, audit) = shared_issuer(1000);
    let creds: Vec<_> = (0..16)
        .map(|_| issuer.issue_token("pharmacist", "30m").unwrap())
        .collect();

    let handles: Vec<_> = creds
        .iter()
        .cloned()
        .map(|issued| {
            let issuer = Arc::clone(&issuer);
            thread::spawn(move || {
                for _ in 0..20 {
                    issuer.validate_token(&issued.token).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for issued in &creds {
        let entries = audit.entries_for(&issued.credential.access_id).unwrap();
        assert_eq!(entries.len(), 21);
        assert_eq!(entries[0].event.kind, AuditEventKind::Issued);
    }
    assert!(audit.verify_chain().unwrap());
}
