//! Signed access-token envelope.
//!
//! Token format: `healthlock://access/v1.<base64url(payload)>.<base64url(mac)>`
//! Payload: compact JSON `{access_id, role, issued_at, expires_at}`.
//! MAC: HMAC-SHA256 over `"v1." || base64url(payload)` with the process key.
//!
//! The payload is opaque to a casual reader but NOT confidential: anyone can
//! base64-decode it. What the envelope guarantees is tamper evidence: a token
//! whose fields were edited, or that was minted without the key, fails
//! `decode`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{AccessError, AccessResult};
use crate::types::Credential;

type HmacSha256 = Hmac<Sha256>;

/// URI-like scheme prefix of every access token.
pub const ENVELOPE_SCHEME: &str = "healthlock://access/";

/// The only envelope version this build understands.
pub const ENVELOPE_VERSION: &str = "v1";

const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// CodecKey — HMAC key for the envelope signature
// ---------------------------------------------------------------------------

/// Symmetric signing key. Zeroized on drop, never printed.
#[derive(Clone)]
pub struct CodecKey(Zeroizing<[u8; KEY_LEN]>);

impl CodecKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut *bytes);
        Self(bytes)
    }

    /// Parse a key from 64 hex characters.
    pub fn from_hex(hex_key: &str) -> Result<Self, &'static str> {
        let decoded = Zeroizing::new(hex::decode(hex_key).map_err(|_| "key must be hex")?);
        if decoded.len() != KEY_LEN {
            return Err("key must be exactly 32 bytes (64 hex characters)");
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for CodecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodecKey(..)")
    }
}

// ---------------------------------------------------------------------------
// CredentialCodec
// ---------------------------------------------------------------------------

/// Deterministic, reversible mapping between a `Credential` and its token.
#[derive(Debug, Clone)]
pub struct CredentialCodec {
    key: CodecKey,
}

impl CredentialCodec {
    pub fn new(key: CodecKey) -> Self {
        Self { key }
    }

    /// Serialize and sign a credential.
    pub fn encode(&self, credential: &Credential) -> AccessResult<String> {
        let payload_json = serde_json::to_vec(credential)
            .map_err(|e| AccessError::Internal(format!("failed to encode credential: {}", e)))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let signature = self.sign(ENVELOPE_VERSION, &payload_b64)?;
        Ok(format!(
            "{}{}.{}.{}",
            ENVELOPE_SCHEME,
            ENVELOPE_VERSION,
            payload_b64,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify and parse a token. Any defect is `MalformedCredential`.
    pub fn decode(&self, token: &str) -> AccessResult<Credential> {
        let body = token
            .strip_prefix(ENVELOPE_SCHEME)
            .ok_or_else(|| malformed("not a healthlock access envelope"))?;

        let mut parts = body.split('.');
        let (version, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(v), Some(p), Some(s), None) => (v, p, s),
                _ => return Err(malformed("envelope must have version, payload and signature")),
            };

        if version != ENVELOPE_VERSION {
            return Err(malformed("unsupported envelope version"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| malformed("invalid signature encoding"))?;

        // Constant-time verification via the hmac crate
        let mut mac = self.mac()?;
        mac.update(signing_input(version, payload_b64).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| malformed("signature mismatch"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| malformed("invalid payload encoding"))?;

        let credential: Credential =
            serde_json::from_slice(&payload).map_err(|_| malformed("invalid credential payload"))?;

        if credential.expires_at <= credential.issued_at {
            return Err(malformed("expiry does not follow issuance"));
        }

        Ok(credential)
    }

    fn sign(&self, version: &str, payload_b64: &str) -> AccessResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(signing_input(version, payload_b64).as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> AccessResult<HmacSha256> {
        HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|_| AccessError::Internal("invalid codec key".into()))
    }
}

fn signing_input(version: &str, payload_b64: &str) -> String {
    format!("{}.{}", version, payload_b64)
}

fn malformed(reason: &str) -> AccessError {
    AccessError::MalformedCredential(reason.to_string())
}
