//! Handoff from an encoded credential to a scannable code image.
//!
//! Drawing the image is an external concern behind [`CodeRenderer`]; this
//! module only carries the options, validates them, and assembles the
//! download/share metadata that accompanies a rendered code.

use healthlock_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

use crate::codec::CredentialCodec;
use crate::duration::AccessDuration;
use crate::error::{AccessError, AccessResult};
use crate::types::Credential;

pub const DEFAULT_PIXEL_SIZE: u32 = 256;
pub const DEFAULT_MARGIN: u32 = 2;
pub const DEFAULT_DARK_COLOR: &str = "#1f2937";
pub const DEFAULT_LIGHT_COLOR: &str = "#ffffff";

pub const SHARE_TITLE: &str = "HealthLock Access QR Code";

fn default_pixel_size() -> u32 {
    DEFAULT_PIXEL_SIZE
}

fn default_margin() -> u32 {
    DEFAULT_MARGIN
}

fn default_dark_color() -> String {
    DEFAULT_DARK_COLOR.to_string()
}

fn default_light_color() -> String {
    DEFAULT_LIGHT_COLOR.to_string()
}

/// Parameters handed to the code renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_pixel_size")]
    pub pixel_size: u32,
    #[serde(default = "default_margin")]
    pub margin: u32,
    #[serde(default = "default_dark_color")]
    pub dark_color: String,
    #[serde(default = "default_light_color")]
    pub light_color: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pixel_size: DEFAULT_PIXEL_SIZE,
            margin: DEFAULT_MARGIN,
            dark_color: default_dark_color(),
            light_color: default_light_color(),
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> AccessResult<()> {
        if self.pixel_size == 0 {
            return Err(AccessError::RenderFailed(
                "pixel_size must be positive".into(),
            ));
        }
        for (name, value) in [("dark_color", &self.dark_color), ("light_color", &self.light_color)] {
            if !is_hex_color(value) {
                return Err(AccessError::RenderFailed(format!(
                    "{} must be #rrggbb, got {:?}",
                    name, value
                )));
            }
        }
        if self.dark_color.eq_ignore_ascii_case(&self.light_color) {
            return Err(AccessError::RenderFailed(
                "dark_color and light_color must differ".into(),
            ));
        }
        Ok(())
    }
}

/// `#rrggbb` with hex digits of either case.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// External encoder turning an opaque payload into image bytes.
///
/// Implementations must not interpret the payload.
pub trait CodeRenderer: Send + Sync {
    fn render(&self, payload: &str, options: &RenderOptions) -> CoreResult<Vec<u8>>;
}

/// Emits the payload bytes unchanged, for clients that draw the code
/// themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRenderer;

impl CodeRenderer for PassthroughRenderer {
    fn render(&self, payload: &str, _options: &RenderOptions) -> CoreResult<Vec<u8>> {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Download and share metadata for a rendered code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDescriptor {
    pub filename: String,
    pub title: String,
    pub text: String,
}

pub fn share_descriptor(credential: &Credential) -> ShareDescriptor {
    let lifetime = credential.lifetime_seconds();
    let expires_in = match AccessDuration::from_seconds(lifetime) {
        Some(duration) => duration.as_str().to_string(),
        None => format!("{}s", lifetime),
    };
    ShareDescriptor {
        filename: format!(
            "healthlock-qr-{}-{}.png",
            credential.role,
            credential.issued_at.seconds_since_epoch.saturating_mul(1000)
        ),
        title: SHARE_TITLE.to_string(),
        text: format!(
            "Secure {} access - expires in {}",
            credential.role, expires_in
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCode {
    pub token: String,
    pub image: Vec<u8>,
    pub share: ShareDescriptor,
}

/// Encode a credential and hand the envelope to `renderer`.
pub fn render_credential(
    renderer: &dyn CodeRenderer,
    codec: &CredentialCodec,
    credential: &Credential,
    options: &RenderOptions,
) -> AccessResult<RenderedCode> {
    options.validate()?;
    let token = codec.encode(credential)?;
    let image = renderer.render(&token, options)?;
    if image.is_empty() {
        return Err(CoreError::Render("renderer produced no output".into()).into());
    }
    Ok(RenderedCode {
        token,
        image,
        share: share_descriptor(credential),
    })
}
