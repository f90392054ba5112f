use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Timestamp — whole seconds since the Unix epoch, UTC
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from(chrono::Utc::now())
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
        }
    }

    /// Add a number of seconds, saturating at `u64::MAX`.
    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self::from_seconds(self.seconds_since_epoch.saturating_add(seconds))
    }

    /// Seconds from `self` until `later`, zero if `later` is not after `self`.
    pub fn seconds_until(&self, later: Timestamp) -> u64 {
        later.seconds_since_epoch.saturating_sub(self.seconds_since_epoch)
    }

    pub fn to_rfc3339(&self) -> String {
        i64::try_from(self.seconds_since_epoch)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: u64::try_from(dt.timestamp()).unwrap_or(0),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds_since_epoch)
    }
}

// ---------------------------------------------------------------------------
// AccessId — 128-bit random, encoded as 32-char lowercase hex
// ---------------------------------------------------------------------------

/// Identifier of one issued credential. Drawn from the OS CSPRNG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessId {
    value: String,
}

impl AccessId {
    pub const HEX_LEN: usize = 32;

    /// Parse an AccessId from its hex form. Rejects anything that is not
    /// exactly 32 lowercase hex characters.
    pub fn new(value: impl Into<String>) -> Result<Self, &'static str> {
        let value = value.into();
        if value.len() != Self::HEX_LEN {
            return Err("AccessId must be exactly 32 hex characters");
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err("AccessId must be lowercase hex");
        }
        Ok(Self { value })
    }

    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            value: hex::encode(bytes),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for AccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl TryFrom<String> for AccessId {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessId> for String {
    fn from(id: AccessId) -> Self {
        id.value
    }
}

// ---------------------------------------------------------------------------
// AuditEventKind — what happened to a credential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventKind {
    Issued,
    Validated,
    Rejected,
    Revoked,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Issued => "issued",
            AuditEventKind::Validated => "validated",
            AuditEventKind::Rejected => "rejected",
            AuditEventKind::Revoked => "revoked",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditEvent — one record of the compliance trail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub access_id: AccessId,
    pub kind: AuditEventKind,
    pub timestamp: Timestamp,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(
        access_id: AccessId,
        kind: AuditEventKind,
        timestamp: Timestamp,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            access_id,
            kind,
            timestamp,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditHash — hash of an audit entry (for chain integrity)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl fmt::Display for AuditHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Hex serialization helper for fixed-size byte arrays
// ---------------------------------------------------------------------------

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}
