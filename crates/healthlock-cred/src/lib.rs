//! HealthLock Access Credential Engine
//!
//! Issues short-lived, role-scoped credentials that grant a healthcare
//! provider temporary access to a patient's records, and enforces them:
//! 1. Role catalog: closed set of roles with fixed permission sets
//! 2. Codec: HMAC-signed `healthlock://access/v1.` envelopes
//! 3. Issuer: fail-closed issuance against an injected clock
//! 4. Tracker: expiry and revocation, the single validation gate
//! 5. Audit log: hash-chained, append-only trail of every decision
//!
//! The envelope is tamper-evident, not confidential. Anyone holding a token
//! can read its fields; only the process key can produce one that verifies.

pub mod audit;
pub mod codec;
pub mod duration;
pub mod error;
pub mod export;
pub mod issuer;
pub mod render;
pub mod role;
pub mod status;
pub mod tracker;
pub mod types;

pub use audit::{AuditEntry, AuditLog};
pub use codec::{CodecKey, CredentialCodec, ENVELOPE_SCHEME, ENVELOPE_VERSION};
pub use duration::AccessDuration;
pub use error::{AccessError, AccessResult};
pub use export::{export, export_csv, export_json, ExportFormat, ExportRecord};
pub use issuer::{IssuedToken, Issuer};
pub use render::{
    render_credential, share_descriptor, CodeRenderer, PassthroughRenderer, RenderOptions,
    RenderedCode, ShareDescriptor,
};
pub use role::{all_roles, label_for, permissions_for, Permission, PermissionSet, Role};
pub use status::{is_terminal, is_valid_transition};
pub use tracker::Tracker;
pub use types::*;
