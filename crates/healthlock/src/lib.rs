//! HealthLock Service Library
//!
//! Configuration, error handling and the JSON-RPC request layer for the
//! HealthLock access credential service.
//!
//! # Architecture
//!
//! The binary is a thin orchestrator. `initialize_root` builds the shared
//! audit log, tracker and issuer; `handle_request` routes each JSON-RPC
//! request to the credential engine. Every access decision still passes
//! through the tracker, so the request layer cannot bypass auditing.

pub mod config;
pub mod error;

pub use config::{ExportConfig, RootConfig, SigningConfig};
pub use error::{RootError, RootResult};

use base64::{engine::general_purpose::STANDARD, Engine};
use healthlock_core::{AccessId, AuditLogWriter, Clock, SystemClock};
use healthlock_cred::{
    render_credential, share_descriptor, AccessDuration, AccessError, AuditEntry, AuditLog,
    CodeRenderer, CredentialCodec, ExportFormat, Issuer, PassthroughRenderer, Role, Tracker,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

impl JsonRpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: serde_json::Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    pub fn error_with_data(
        id: serde_json::Value,
        code: i64,
        message: String,
        data: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: Some(data),
            }),
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC error codes (standard + HealthLock-specific)
// ---------------------------------------------------------------------------

pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const UNKNOWN_ROLE: i64 = -32010;
    pub const INVALID_DURATION: i64 = -32011;
    pub const MALFORMED_CREDENTIAL: i64 = -32012;
    pub const UNKNOWN_CREDENTIAL: i64 = -32013;
    pub const EXPIRED: i64 = -32014;
    pub const REVOKED: i64 = -32015;
    /// The code renderer failed or render options are invalid.
    pub const RENDER_FAILED: i64 = -32016;
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Runtime state for the HealthLock service.
///
/// Holds the shared credential subsystem. Created by `initialize_root` and
/// consumed by `handle_request` and `shutdown_root`.
pub struct RootState {
    pub config: RootConfig,
    initialized: bool,
    pub issuer: Option<Arc<Issuer>>,
    pub audit_log: Option<Arc<AuditLog>>,
    renderer: Arc<dyn CodeRenderer>,
}

impl RootState {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Initialize the service against the system clock.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    initialize_root_with(config, Arc::new(SystemClock), Arc::new(PassthroughRenderer))
}

/// Initialize the service with an explicit clock and code renderer.
///
/// The audit log and tracker start empty.
pub fn initialize_root_with(
    config: RootConfig,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn CodeRenderer>,
) -> RootResult<RootState> {
    config.validate()?;

    let signing_key = if config.signing.key_hex.is_some() {
        "configured"
    } else {
        "ephemeral"
    };
    info!(
        signing_key,
        export_format = %config.export.format,
        "initializing healthlock"
    );

    let codec = CredentialCodec::new(config.signing.codec_key()?);
    let audit_log = Arc::new(AuditLog::new());
    let tracker = Arc::new(Tracker::new(Arc::clone(&audit_log)));
    let issuer = Arc::new(Issuer::new(clock, tracker, codec));

    info!("healthlock initialized");

    Ok(RootState {
        config,
        initialized: true,
        issuer: Some(issuer),
        audit_log: Some(audit_log),
        renderer,
    })
}

/// Shut the service down. Idempotent.
pub fn shutdown_root(state: &mut RootState) -> RootResult<()> {
    if !state.initialized {
        return Ok(());
    }

    let entries = state.audit_log.as_ref().map(|a| a.len()).unwrap_or(0);
    info!(audit_entries = entries, "shutting down healthlock");

    state.issuer = None;
    state.audit_log = None;
    state.initialized = false;
    Ok(())
}

/// Process one JSON-RPC request.
pub fn handle_request(state: &RootState, request: &JsonRpcRequest) -> JsonRpcResponse {
    let (issuer, audit) = match (&state.issuer, &state.audit_log) {
        (Some(issuer), Some(audit)) if state.is_initialized() => (issuer, audit),
        _ => {
            return JsonRpcResponse::error(
                request.id.clone(),
                rpc_codes::INTERNAL_ERROR,
                "service not initialized".into(),
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id.clone(),
            rpc_codes::INVALID_REQUEST,
            format!("unsupported JSON-RPC version: {}", request.jsonrpc),
        );
    }

    debug!(method = %request.method, "handling request");

    let ctx = Context {
        state,
        issuer,
        audit,
        request,
    };
    match request.method.as_str() {
        "initialize" => handle_initialize(&ctx),
        "roles/list" => handle_roles_list(&ctx),
        "access/issue" => handle_issue(&ctx),
        "access/validate" => handle_validate(&ctx),
        "access/revoke" => handle_revoke(&ctx),
        "access/status" => handle_status(&ctx),
        "access/active" => handle_active(&ctx),
        "access/share" => handle_share(&ctx),
        "audit/list" => handle_audit_list(&ctx),
        "audit/export" => handle_audit_export(&ctx),
        "audit/verify" => handle_audit_verify(&ctx),
        _ => {
            warn!(method = %request.method, "unknown method");
            JsonRpcResponse::error(
                request.id.clone(),
                rpc_codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", request.method),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Request handlers (internal)
// ---------------------------------------------------------------------------

struct Context<'a> {
    state: &'a RootState,
    issuer: &'a Arc<Issuer>,
    audit: &'a Arc<AuditLog>,
    request: &'a JsonRpcRequest,
}

impl Context<'_> {
    fn id(&self) -> serde_json::Value {
        self.request.id.clone()
    }

    fn ok(&self, result: serde_json::Value) -> JsonRpcResponse {
        JsonRpcResponse::success(self.id(), result)
    }

    fn params<T: DeserializeOwned>(&self) -> Result<T, JsonRpcResponse> {
        let value = self
            .request
            .params
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        serde_json::from_value(value).map_err(|e| {
            JsonRpcResponse::error(
                self.id(),
                rpc_codes::INVALID_PARAMS,
                format!("invalid params: {}", e),
            )
        })
    }

    fn access_error(&self, err: &AccessError) -> JsonRpcResponse {
        let code = match err {
            AccessError::UnknownRole(_) => rpc_codes::UNKNOWN_ROLE,
            AccessError::InvalidDuration(_) => rpc_codes::INVALID_DURATION,
            AccessError::MalformedCredential(_) => rpc_codes::MALFORMED_CREDENTIAL,
            AccessError::UnknownCredential(_) => rpc_codes::UNKNOWN_CREDENTIAL,
            AccessError::Expired => rpc_codes::EXPIRED,
            AccessError::Revoked => rpc_codes::REVOKED,
            AccessError::RenderFailed(_) => rpc_codes::RENDER_FAILED,
            AccessError::Internal(_) => rpc_codes::INTERNAL_ERROR,
        };
        JsonRpcResponse::error_with_data(
            self.id(),
            code,
            err.to_string(),
            serde_json::json!({ "kind": err.kind_str() }),
        )
    }

    fn internal(&self, message: String) -> JsonRpcResponse {
        JsonRpcResponse::error(self.id(), rpc_codes::INTERNAL_ERROR, message)
    }

    fn access_id(&self, raw: &str) -> Result<AccessId, JsonRpcResponse> {
        AccessId::new(raw).map_err(|e| {
            JsonRpcResponse::error(
                self.id(),
                rpc_codes::INVALID_PARAMS,
                format!("invalid access_id: {}", e),
            )
        })
    }
}

#[derive(Deserialize)]
struct IssueParams {
    role: String,
    duration: String,
}

#[derive(Deserialize)]
struct TokenParams {
    token: String,
}

#[derive(Deserialize)]
struct AccessIdParams {
    access_id: String,
}

#[derive(Deserialize, Default)]
struct AuditListParams {
    #[serde(default)]
    access_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize, Default)]
struct ExportParams {
    #[serde(default)]
    format: Option<String>,
}

fn entry_json(entry: &AuditEntry) -> serde_json::Value {
    serde_json::json!({
        "access_id": entry.event.access_id,
        "event_kind": entry.event.kind,
        "timestamp": entry.event.timestamp,
        "detail": entry.event.detail,
        "hash": entry.hash,
    })
}

fn handle_initialize(ctx: &Context<'_>) -> JsonRpcResponse {
    ctx.ok(serde_json::json!({
        "serverInfo": {
            "name": "healthlock",
            "version": env!("CARGO_PKG_VERSION")
        },
        "envelope": format!("{}{}", healthlock_cred::ENVELOPE_SCHEME, healthlock_cred::ENVELOPE_VERSION),
    }))
}

fn handle_roles_list(ctx: &Context<'_>) -> JsonRpcResponse {
    let roles: Vec<serde_json::Value> = Role::ALL
        .iter()
        .map(|role| {
            serde_json::json!({
                "id": role,
                "label": role.label(),
                "permissions": role.permissions(),
            })
        })
        .collect();
    let durations: Vec<serde_json::Value> = AccessDuration::ALL
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d,
                "label": d.label(),
                "seconds": d.seconds(),
            })
        })
        .collect();
    ctx.ok(serde_json::json!({ "roles": roles, "durations": durations }))
}

fn handle_issue(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: IssueParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let credential = match ctx.issuer.issue(&params.role, &params.duration) {
        Ok(c) => c,
        Err(e) => return ctx.access_error(&e),
    };
    let rendered = match render_credential(
        ctx.state.renderer.as_ref(),
        ctx.issuer.codec(),
        &credential,
        &ctx.state.config.render,
    ) {
        Ok(r) => r,
        Err(e) => {
            // The caller never receives this credential, so it must not stay live.
            if let Err(revoke_err) = ctx.issuer.revoke(&credential.access_id) {
                warn!(
                    access_id = %credential.access_id,
                    error = %revoke_err,
                    "failed to revoke unrendered credential"
                );
            }
            warn!(access_id = %credential.access_id, error = %e, "render failed, credential revoked");
            return ctx.access_error(&e);
        }
    };

    ctx.ok(serde_json::json!({
        "access_id": credential.access_id,
        "role": credential.role,
        "role_label": credential.role.label(),
        "permissions": credential.role.permissions(),
        "issued_at": credential.issued_at,
        "expires_at": credential.expires_at,
        "expires_at_rfc3339": credential.expires_at.to_rfc3339(),
        "token": rendered.token,
        "image": STANDARD.encode(&rendered.image),
        "render": ctx.state.config.render,
        "share": rendered.share,
    }))
}

fn handle_validate(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: TokenParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match ctx.issuer.validate_token(&params.token) {
        Ok(auth) => ctx.ok(serde_json::json!({
            "authorized": true,
            "access_id": auth.access_id,
            "role": auth.role,
            "permissions": auth.permissions,
            "expires_at": auth.expires_at,
        })),
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_revoke(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: AccessIdParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let access_id = match ctx.access_id(&params.access_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match ctx.issuer.revoke(&access_id) {
        Ok(outcome) => ctx.ok(serde_json::json!({
            "access_id": access_id,
            "outcome": outcome,
        })),
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_status(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: AccessIdParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let access_id = match ctx.access_id(&params.access_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match ctx.issuer.status(&access_id) {
        Ok(status) => ctx.ok(serde_json::json!({
            "access_id": access_id,
            "status": status,
        })),
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_active(ctx: &Context<'_>) -> JsonRpcResponse {
    let now = ctx.issuer.clock().now();
    match ctx.issuer.tracker().active(now) {
        Ok(active) => {
            let links: Vec<serde_json::Value> = active
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "access_id": a.credential.access_id,
                        "role": a.credential.role,
                        "role_label": a.credential.role.label(),
                        "expires_at": a.credential.expires_at,
                        "remaining_seconds": a.remaining_seconds,
                    })
                })
                .collect();
            ctx.ok(serde_json::json!({ "active": links, "total": links.len() }))
        }
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_share(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: TokenParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    // Not an access decision; nothing is audited.
    match ctx.issuer.codec().decode(&params.token) {
        Ok(credential) => ctx.ok(serde_json::json!({
            "share": share_descriptor(&credential),
            "render": ctx.state.config.render,
        })),
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_audit_list(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: AuditListParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let entries = match &params.access_id {
        Some(raw) => {
            let access_id = match ctx.access_id(raw) {
                Ok(id) => id,
                Err(resp) => return resp,
            };
            ctx.audit.entries_for(&access_id)
        }
        None => ctx.audit.all_entries(),
    };
    let entries = match entries {
        Ok(e) => e,
        Err(e) => return ctx.internal(e.to_string()),
    };

    let total = entries.len();
    let start = params
        .limit
        .map(|limit| total.saturating_sub(limit))
        .unwrap_or(0);
    let listed: Vec<serde_json::Value> = entries[start..].iter().map(entry_json).collect();
    ctx.ok(serde_json::json!({ "entries": listed, "total": total }))
}

fn handle_audit_export(ctx: &Context<'_>) -> JsonRpcResponse {
    let params: ExportParams = match ctx.params() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let format = match params.format.as_deref() {
        Some(raw) => match raw.parse::<ExportFormat>() {
            Ok(f) => f,
            Err(e) => return JsonRpcResponse::error(ctx.id(), rpc_codes::INVALID_PARAMS, e),
        },
        None => ctx.state.config.export.format,
    };
    let entries = match ctx.audit.all_entries() {
        Ok(e) => e,
        Err(e) => return ctx.internal(e.to_string()),
    };
    match healthlock_cred::export(&entries, format) {
        Ok(content) => {
            info!(format = %format, entries = entries.len(), "audit exported");
            ctx.ok(serde_json::json!({
                "format": format,
                "entries": entries.len(),
                "content": content,
            }))
        }
        Err(e) => ctx.access_error(&e),
    }
}

fn handle_audit_verify(ctx: &Context<'_>) -> JsonRpcResponse {
    let verified = ctx.audit.verify_chain().and_then(|valid| {
        let head = ctx.audit.head()?;
        Ok((valid, head))
    });
    match verified {
        Ok((valid, head)) => {
            if !valid {
                warn!("audit chain verification failed");
            }
            ctx.ok(serde_json::json!({
                "valid": valid,
                "entries": ctx.audit.len(),
                "head": head,
            }))
        }
        Err(e) => ctx.internal(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
