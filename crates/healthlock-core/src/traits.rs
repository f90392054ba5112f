use crate::error::CoreResult;
use crate::types::{AccessId, AuditEvent, AuditHash, Timestamp};

// ---------------------------------------------------------------------------
// Clock — source of "now", injected so time can be controlled in tests
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

// ---------------------------------------------------------------------------
// AuditLogWriter — append-only, hash-chained compliance log
//
// Entries are never mutated or removed. Each entry hashes the previous one,
// so any later edit of the stored sequence is detectable.
// ---------------------------------------------------------------------------

pub trait AuditLogWriter: Send + Sync {
    fn append(&self, event: AuditEvent) -> CoreResult<AuditHash>;
    fn events_for(&self, access_id: &AccessId) -> CoreResult<Vec<AuditEvent>>;
    fn verify_chain(&self) -> CoreResult<bool>;
    fn head(&self) -> CoreResult<Option<AuditHash>>;
}
