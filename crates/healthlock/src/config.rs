use healthlock_cred::{CodecKey, ExportFormat, RenderOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::error::{RootError, RootResult};

/// Token signing configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// HMAC key as 64 hex characters. When absent a fresh key is generated
    /// at startup, so tokens do not survive a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hex: Option<String>,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SigningConfig {
    /// A config carrying a newly generated random key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *bytes);
        Self {
            key_hex: Some(hex::encode(*bytes)),
        }
    }

    /// The configured key, or a random one if none is configured.
    pub fn codec_key(&self) -> RootResult<CodecKey> {
        match &self.key_hex {
            Some(hex_key) => CodecKey::from_hex(hex_key)
                .map_err(|e| RootError::Config(format!("signing.key_hex: {}", e))),
            None => Ok(CodecKey::generate()),
        }
    }
}

/// Audit export configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportConfig {
    /// Format used by `audit/export` when the request does not name one.
    #[serde(default)]
    pub format: ExportFormat,
}

/// Top-level configuration for the HealthLock service.
///
/// Loaded from a TOML file (typically `~/.healthlock/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub signing: SigningConfig,

    /// Options handed to the code renderer with every issued token.
    #[serde(default)]
    pub render: RenderOptions,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        // The file may hold the signing key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if let Some(hex_key) = &self.signing.key_hex {
            CodecKey::from_hex(hex_key)
                .map_err(|e| RootError::Config(format!("signing.key_hex: {}", e)))?;
        }
        self.render
            .validate()
            .map_err(|e| RootError::Config(format!("render: {}", e)))?;
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".healthlock/config.toml")
    }
}
