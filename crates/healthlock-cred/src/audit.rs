use healthlock_core::{AccessId, AuditEvent, AuditHash, AuditLogWriter, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Mutex, MutexGuard};

/// Hash-chained append-only audit log.
///
/// Insertion order is temporal order. Each entry includes the hash of the
/// previous entry, so the chain can be re-verified from the genesis entry.
/// There is no operation that mutates or removes an entry.
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub previous_hash: Option<AuditHash>,
    pub hash: AuditHash,
}

fn lock_entries(mutex: &Mutex<Vec<AuditEntry>>) -> CoreResult<MutexGuard<'_, Vec<AuditEntry>>> {
    mutex
        .lock()
        .map_err(|e| CoreError::Audit(format!("audit lock poisoned: {}", e)))
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Compute the hash of an audit event including the previous hash.
    fn compute_hash(event: &AuditEvent, previous: Option<&AuditHash>) -> AuditHash {
        let mut hasher = Sha256::new();

        if let Some(prev) = previous {
            hasher.update(prev.0);
        }

        // Length-prefix variable fields so adjacent fields cannot be shifted
        for field in [
            event.access_id.as_str(),
            event.kind.as_str(),
            event.detail.as_str(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(event.timestamp.seconds_since_epoch.to_le_bytes());

        let hash = hasher.finalize();
        let mut result = [0u8; 32];
        result.copy_from_slice(&hash);
        AuditHash(result)
    }

    /// All entries for one access id, in insertion order.
    pub fn entries_for(&self, access_id: &AccessId) -> CoreResult<Vec<AuditEntry>> {
        let entries = lock_entries(&self.entries)?;
        Ok(entries
            .iter()
            .filter(|e| &e.event.access_id == access_id)
            .cloned()
            .collect())
    }

    /// Every entry, in insertion order (for compliance export).
    pub fn all_entries(&self) -> CoreResult<Vec<AuditEntry>> {
        lock_entries(&self.entries).map(|e| e.clone())
    }

    /// Poison the entry lock so every later append fails.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _entries = self.entries.lock();
            panic!("poisoning audit log");
        }));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogWriter for AuditLog {
    fn append(&self, event: AuditEvent) -> CoreResult<AuditHash> {
        let mut entries = lock_entries(&self.entries)?;

        let previous_hash = entries.last().map(|e| e.hash.clone());
        let hash = Self::compute_hash(&event, previous_hash.as_ref());

        entries.push(AuditEntry {
            event,
            previous_hash,
            hash: hash.clone(),
        });

        Ok(hash)
    }

    fn events_for(&self, access_id: &AccessId) -> CoreResult<Vec<AuditEvent>> {
        Ok(self
            .entries_for(access_id)?
            .into_iter()
            .map(|e| e.event)
            .collect())
    }

    fn verify_chain(&self) -> CoreResult<bool> {
        let entries = lock_entries(&self.entries)?;

        let mut previous: Option<&AuditHash> = None;
        for entry in entries.iter() {
            if entry.previous_hash.as_ref() != previous {
                return Ok(false);
            }
            if Self::compute_hash(&entry.event, previous) != entry.hash {
                return Ok(false);
            }
            previous = Some(&entry.hash);
        }

        Ok(true)
    }

    fn head(&self) -> CoreResult<Option<AuditHash>> {
        let entries = lock_entries(&self.entries)?;
        Ok(entries.last().map(|e| e.hash.clone()))
    }
}
