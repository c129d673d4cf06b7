//! Gateway config loader (strict parsing).
//!
//! The config is read once at startup; nothing in the pipeline reloads it.

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use vigil_core::error::{Result, VigilError};

pub use schema::{
    GatewayConfig, LokiSection, LokiTarget, MetricsSection, Profile, ServerSection, SinkSpec,
};

/// Path of the config file, overridable with this variable.
pub const CONFIG_PATH_ENV: &str = "VIGIL_CONFIG";
/// Overrides `environment` from the file.
pub const PROFILE_ENV: &str = "VIGIL_ENV";

const DEFAULT_CONFIG_PATH: &str = "vigil.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VigilError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| VigilError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Startup loader: file named by `VIGIL_CONFIG` (or `vigil.yaml`), defaults
/// when that file does not exist, then the `VIGIL_ENV` profile override.
pub fn load_from_env() -> Result<GatewayConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut cfg = match fs::read_to_string(&path) {
        Ok(s) => load_from_str(&s)?,
        Err(e) if e.kind() == ErrorKind::NotFound => GatewayConfig::default(),
        Err(e) => {
            return Err(VigilError::Internal(format!(
                "read config failed ({path}): {e}"
            )))
        }
    };

    if let Ok(profile) = std::env::var(PROFILE_ENV) {
        cfg.environment = profile.parse()?;
    }

    cfg.validate()?;
    Ok(cfg)
}
